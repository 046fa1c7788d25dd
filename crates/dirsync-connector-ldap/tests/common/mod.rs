//! Common test utilities for dirsync-connector-ldap integration tests.
//!
//! `MemoryDirectory` is an in-memory `DirectorySession` that behaves like a
//! small Active Directory: it answers equality searches, keeps `member` and
//! `memberOf` in step, rejects blank values with "Invalid Attribute Syntax",
//! records every call and can be told to fail specific operations.

#![allow(dead_code)]

use async_trait::async_trait;

use dirsync_connector::prelude::*;
use dirsync_connector_ldap::dn::{dn_equals, normalize_dn, split_dn};
use dirsync_connector_ldap::LdapConfig;

pub const BASE_DN: &str = "DC=corp,DC=com";

/// Session operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Search,
    Add,
    Modify,
    Rename,
}

/// A call received by the directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search {
        base_dn: String,
        filter: String,
    },
    Add {
        dn: String,
        attributes: AttributeStore,
    },
    Modify {
        dn: String,
        modification: Modification,
    },
    Rename {
        dn: String,
        new_rdn: String,
        new_parent_dn: String,
        delete_old_rdn: bool,
    },
}

#[derive(Debug, Clone)]
struct Failure {
    op: Op,
    target: String,
    attribute: Option<String>,
    code: u32,
    message: String,
}

impl Failure {
    fn matches(&self, op: Op, target: &str, attribute: Option<&str>) -> bool {
        if self.op != op {
            return false;
        }
        let target_matches = match op {
            Op::Search => target.to_lowercase().contains(&self.target.to_lowercase()),
            _ => dn_equals(&self.target, target),
        };
        let attribute_matches = match (&self.attribute, attribute) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
            (Some(_), None) => false,
        };
        target_matches && attribute_matches
    }
}

/// In-memory directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: Vec<DirectoryEntry>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user entry. `cn` is taken from the DN.
    pub fn with_user(mut self, dn: &str, sam: &str, extra: &[(&str, AttributeValue)]) -> Self {
        let mut attributes = AttributeStore::new()
            .with("cn", rdn_value(dn))
            .with("distinguishedName", dn)
            .with("samAccountName", sam)
            .with(
                "objectClass",
                vec!["top", "person", "organizationalPerson", "user"],
            );
        for (name, value) in extra {
            attributes.set(*name, value.clone());
        }
        self.entries.push(DirectoryEntry::new(dn, attributes));
        self
    }

    /// Add a group entry with members; existing member entries get `memberOf`.
    pub fn with_group(mut self, dn: &str, sam: &str, members: &[&str]) -> Self {
        let mut attributes = AttributeStore::new()
            .with("cn", rdn_value(dn))
            .with("distinguishedName", dn)
            .with("samAccountName", sam)
            .with("objectClass", vec!["top", "group"]);
        if !members.is_empty() {
            attributes.set("member", members.to_vec());
        }
        self.entries.push(DirectoryEntry::new(dn, attributes));
        for member in members {
            self.link(dn, member);
        }
        self
    }

    /// Fail every `op` against `dn` (a filter fragment for searches).
    pub fn fail(mut self, op: Op, target: &str, code: u32, message: &str) -> Self {
        self.failures.push(Failure {
            op,
            target: target.to_string(),
            attribute: None,
            code,
            message: message.to_string(),
        });
        self
    }

    /// Fail modifications of one attribute of `dn`.
    pub fn fail_attribute(mut self, dn: &str, attribute: &str, code: u32, message: &str) -> Self {
        self.failures.push(Failure {
            op: Op::Modify,
            target: dn.to_string(),
            attribute: Some(attribute.to_string()),
            code,
            message: message.to_string(),
        });
        self
    }

    pub fn entry(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| dn_equals(&e.dn, dn))
    }

    pub fn value(&self, dn: &str, attribute: &str) -> Option<&AttributeValue> {
        self.entry(dn).and_then(|e| e.attributes.value(attribute))
    }

    pub fn strings(&self, dn: &str, attribute: &str) -> Vec<String> {
        self.value(dn, attribute)
            .map(|v| v.as_strings().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Every call that is not a search.
    pub fn writes(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| !matches!(c, Call::Search { .. }))
            .collect()
    }

    pub fn modifications(&self) -> Vec<(&str, &Modification)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Modify { dn, modification } => Some((dn.as_str(), modification)),
                _ => None,
            })
            .collect()
    }

    pub fn modified_attributes(&self) -> Vec<String> {
        self.modifications()
            .into_iter()
            .map(|(_, m)| m.attribute.clone())
            .collect()
    }

    pub fn renames(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Rename { .. }))
            .collect()
    }

    fn check_failure(&self, op: Op, target: &str, attribute: Option<&str>) -> ConnectorResult<()> {
        match self
            .failures
            .iter()
            .find(|f| f.matches(op, target, attribute))
        {
            Some(failure) => Err(ConnectorError::directory(
                Some(failure.code),
                failure.message.clone(),
            )),
            None => Ok(()),
        }
    }

    fn position(&self, dn: &str) -> ConnectorResult<usize> {
        self.entries
            .iter()
            .position(|e| dn_equals(&e.dn, dn))
            .ok_or_else(|| ConnectorError::directory(Some(32), "No Such Object"))
    }

    fn link(&mut self, group_dn: &str, member_dn: &str) {
        if let Some(member) = self.entries.iter_mut().find(|e| dn_equals(&e.dn, member_dn)) {
            let mut groups = strings_of(&member.attributes, "memberOf");
            if !groups.iter().any(|g| dn_equals(g, group_dn)) {
                groups.push(group_dn.to_string());
            }
            set_strings(&mut member.attributes, "memberOf", groups);
        }
    }

    fn unlink(&mut self, group_dn: &str, member_dn: &str) {
        if let Some(member) = self.entries.iter_mut().find(|e| dn_equals(&e.dn, member_dn)) {
            let mut groups = strings_of(&member.attributes, "memberOf");
            groups.retain(|g| !dn_equals(g, group_dn));
            set_strings(&mut member.attributes, "memberOf", groups);
        }
    }

    fn apply(&mut self, index: usize, modification: &Modification) -> ConnectorResult<()> {
        let group_dn = self.entries[index].dn.clone();
        let name = modification.attribute.as_str();
        let is_member = name.eq_ignore_ascii_case("member");
        let attributes = &mut self.entries[index].attributes;

        match modification.op {
            ModificationOp::Replace => {
                if matches!(&modification.value, AttributeValue::String(s) if s.trim().is_empty())
                {
                    return Err(ConnectorError::directory(
                        Some(21),
                        "Invalid Attribute Syntax",
                    ));
                }
                let previous = strings_of(attributes, name);
                if modification.value.is_empty() {
                    attributes.remove(name);
                } else {
                    attributes.set(name, modification.value.clone());
                }
                if is_member {
                    let current: Vec<String> = modification
                        .value
                        .as_strings()
                        .into_iter()
                        .map(String::from)
                        .collect();
                    for old in &previous {
                        self.unlink(&group_dn, old);
                    }
                    for new in &current {
                        self.link(&group_dn, new);
                    }
                }
            }
            ModificationOp::Add => {
                let mut values = strings_of(attributes, name);
                let added: Vec<String> = modification
                    .value
                    .as_strings()
                    .into_iter()
                    .map(String::from)
                    .collect();
                if added.iter().any(|a| values.iter().any(|v| same_value(v, a))) {
                    return Err(if is_member {
                        ConnectorError::directory(Some(68), "Entry Already Exists")
                    } else {
                        ConnectorError::directory(Some(20), "Attribute Or Value Exists")
                    });
                }
                values.extend(added.iter().cloned());
                set_strings(attributes, name, values);
                if is_member {
                    for member in &added {
                        self.link(&group_dn, member);
                    }
                }
            }
            ModificationOp::Delete => {
                if !attributes.contains(name) && modification.value.is_empty() {
                    return Err(ConnectorError::directory(Some(16), "No Such Attribute"));
                }
                let mut values = strings_of(attributes, name);
                let removed: Vec<String> = if modification.value.is_empty() {
                    values.clone()
                } else {
                    modification
                        .value
                        .as_strings()
                        .into_iter()
                        .map(String::from)
                        .collect()
                };
                if !removed
                    .iter()
                    .all(|r| values.iter().any(|v| same_value(v, r)))
                {
                    return Err(if is_member {
                        ConnectorError::directory(Some(53), "Unwilling To Perform")
                    } else {
                        ConnectorError::directory(Some(16), "No Such Attribute")
                    });
                }
                values.retain(|v| !removed.iter().any(|r| same_value(v, r)));
                if modification.value.is_empty() {
                    attributes.remove(name);
                } else {
                    set_strings(attributes, name, values);
                }
                if is_member {
                    for member in &removed {
                        self.unlink(&group_dn, member);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DirectorySession for MemoryDirectory {
    async fn search(
        &mut self,
        base_dn: &str,
        _scope: SearchScope,
        filter: &str,
        _attributes: &[String],
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        self.calls.push(Call::Search {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
        });
        self.check_failure(Op::Search, filter, None)?;

        let Some((attribute, value)) = parse_equality(filter) else {
            return Err(ConnectorError::directory(Some(87), "Filter Error"));
        };
        let base = normalize_dn(base_dn);

        Ok(self
            .entries
            .iter()
            .filter(|e| normalize_dn(&e.dn).ends_with(&base))
            .filter(|e| {
                if attribute.eq_ignore_ascii_case("distinguishedName") {
                    dn_equals(&e.dn, &value)
                } else {
                    strings_of(&e.attributes, &attribute)
                        .iter()
                        .any(|v| v.eq_ignore_ascii_case(&value))
                }
            })
            .cloned()
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> ConnectorResult<()> {
        self.calls.push(Call::Add {
            dn: dn.to_string(),
            attributes: attributes.clone(),
        });
        self.check_failure(Op::Add, dn, None)?;

        if self.entry(dn).is_some() {
            return Err(ConnectorError::directory(Some(68), "Entry Already Exists"));
        }

        let mut stored = attributes.clone();
        stored.remove("unicodePwd");
        if !stored.contains("cn") {
            stored.set("cn", rdn_value(dn));
        }
        self.entries.push(DirectoryEntry::new(dn, stored));
        Ok(())
    }

    async fn modify(&mut self, dn: &str, modification: &Modification) -> ConnectorResult<()> {
        self.calls.push(Call::Modify {
            dn: dn.to_string(),
            modification: modification.clone(),
        });
        self.check_failure(Op::Modify, dn, Some(modification.attribute.as_str()))?;

        let index = self.position(dn)?;
        self.apply(index, modification)
    }

    async fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent_dn: &str,
        delete_old_rdn: bool,
    ) -> ConnectorResult<()> {
        self.calls.push(Call::Rename {
            dn: dn.to_string(),
            new_rdn: new_rdn.to_string(),
            new_parent_dn: new_parent_dn.to_string(),
            delete_old_rdn,
        });
        self.check_failure(Op::Rename, dn, None)?;

        let index = self.position(dn)?;
        let new_dn = format!("{new_rdn},{new_parent_dn}");
        if self
            .entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && dn_equals(&e.dn, &new_dn))
        {
            return Err(ConnectorError::directory(Some(68), "Entry Already Exists"));
        }

        let old_dn = std::mem::replace(&mut self.entries[index].dn, new_dn.clone());
        let attributes = &mut self.entries[index].attributes;
        attributes.set("cn", rdn_value(&new_dn));
        attributes.set("distinguishedName", new_dn.clone());

        for entry in &mut self.entries {
            for link in ["member", "memberOf"] {
                let values = strings_of(&entry.attributes, link);
                if values.iter().any(|v| dn_equals(v, &old_dn)) {
                    let updated = values
                        .into_iter()
                        .map(|v| if dn_equals(&v, &old_dn) { new_dn.clone() } else { v })
                        .collect();
                    set_strings(&mut entry.attributes, link, updated);
                }
            }
        }
        Ok(())
    }
}

/// Connector configuration pointing at [`BASE_DN`].
pub fn test_config() -> LdapConfig {
    LdapConfig::new("dc01.corp.com", BASE_DN, "CN=svc-sync,OU=Service,DC=corp,DC=com")
        .with_password("secret")
        .with_ssl()
        .with_user_container("OU=Users")
        .with_group_container("OU=Groups")
}

/// Owned strings from literals.
pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn strings_of(store: &AttributeStore, name: &str) -> Vec<String> {
    store
        .value(name)
        .map(|v| v.as_strings().into_iter().map(String::from).collect())
        .unwrap_or_default()
}

fn set_strings(store: &mut AttributeStore, name: &str, mut values: Vec<String>) {
    match values.len() {
        0 => {
            store.remove(name);
        }
        1 => store.set(name, values.remove(0)),
        _ => store.set(name, values),
    }
}

fn same_value(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || dn_equals(a, b)
}

/// Unescaped value of the leading RDN of `dn`.
pub fn rdn_value(dn: &str) -> String {
    let rdn = split_dn(dn).into_iter().next().unwrap_or_default();
    let value = rdn.split_once('=').map_or(rdn, |(_, v)| v).trim();

    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

/// Parse `(attribute=value)`, undoing RFC 4515 escapes in the value.
fn parse_equality(filter: &str) -> Option<(String, String)> {
    let inner = filter.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (attribute, value) = inner.split_once('=')?;
    let value = value
        .replace("\\28", "(")
        .replace("\\29", ")")
        .replace("\\2a", "*")
        .replace("\\00", "\0")
        .replace("\\5c", "\\");
    Some((attribute.to_string(), value))
}

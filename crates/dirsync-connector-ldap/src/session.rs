//! LDAP directory session
//!
//! Implements [`DirectorySession`] on top of an `ldap3` connection.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry};
use tracing::{debug, info, instrument, warn};

use dirsync_connector::attribute::{AttributeStore, AttributeValue};
use dirsync_connector::config::ConnectorConfig;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::operation::{DirectoryEntry, Modification, ModificationOp, SearchScope};
use dirsync_connector::traits::DirectorySession;

use crate::config::LdapConfig;

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// An authenticated LDAP connection.
///
/// Keeps its configuration so that an operation failing on a dropped
/// connection can reconnect, re-bind and run once more.
pub struct LdapSession {
    ldap: Ldap,
    config: LdapConfig,
}

impl LdapSession {
    /// Connect to the server described by `config` and bind with its credentials.
    #[instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let ldap = open(config).await?;

        Ok(Self {
            ldap,
            config: config.clone(),
        })
    }

    /// Replace the current connection with a freshly bound one.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn reconnect(&mut self) -> ConnectorResult<()> {
        info!("No connection to LDAP server, reconnecting");
        self.ldap = open(&self.config).await?;
        Ok(())
    }

    /// Close the session.
    pub async fn unbind(mut self) -> ConnectorResult<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("LDAP unbind failed", e))?;
        debug!(host = %self.config.host, "LDAP session closed");
        Ok(())
    }

    fn operation_timeout(&self) -> Duration {
        self.config.connection.operation_timeout()
    }

    async fn try_search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        let timeout = self.operation_timeout();
        let result = self
            .ldap
            .with_timeout(timeout)
            .search(base_dn, to_ldap_scope(scope), filter, attributes)
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("LDAP search failed", e))?;

        let ldap3::SearchResult(entries, status) = result;
        match status.rc {
            RC_SUCCESS => {}
            RC_NO_SUCH_OBJECT => {
                debug!("Search base not found, returning no entries");
                return Ok(Vec::new());
            }
            _ => return Err(directory_error(&status)),
        }

        let (entries, referrals) = drop_referrals(entries, |entry| entry.is_ref());
        if referrals > 0 {
            warn!(
                base_dn = %base_dn,
                referrals,
                "Skipping referral entries in search result"
            );
        }

        let entries: Vec<DirectoryEntry> = entries
            .into_iter()
            .filter(|entry| !entry.is_intermediate())
            .map(|entry| to_directory_entry(SearchEntry::construct(entry)))
            .collect();

        debug!(count = entries.len(), "Search complete");
        Ok(entries)
    }

    async fn try_add(&mut self, dn: &str, attributes: &AttributeStore) -> ConnectorResult<()> {
        let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attributes
            .iter()
            .map(|record| {
                (
                    record.directory_name.as_bytes().to_vec(),
                    to_value_set(&record.value),
                )
            })
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let timeout = self.operation_timeout();
        let result = self
            .ldap
            .with_timeout(timeout)
            .add(dn, attrs)
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("LDAP add failed", e))?;

        check_result(&result)
    }

    async fn try_modify(&mut self, dn: &str, modification: &Modification) -> ConnectorResult<()> {
        let name = modification.attribute.as_bytes().to_vec();
        let values = to_value_set(&modification.value);
        let change = match modification.op {
            ModificationOp::Replace => Mod::Replace(name, values),
            ModificationOp::Add => Mod::Add(name, values),
            ModificationOp::Delete => Mod::Delete(name, values),
        };

        let timeout = self.operation_timeout();
        let result = self
            .ldap
            .with_timeout(timeout)
            .modify(dn, vec![change])
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("LDAP modify failed", e))?;

        check_result(&result)
    }

    async fn try_rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent_dn: &str,
        delete_old_rdn: bool,
    ) -> ConnectorResult<()> {
        let new_superior = if new_parent_dn.trim().is_empty() {
            None
        } else {
            Some(new_parent_dn)
        };

        let timeout = self.operation_timeout();
        let result = self
            .ldap
            .with_timeout(timeout)
            .modifydn(dn, new_rdn, delete_old_rdn, new_superior)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source("LDAP modify DN failed", e)
            })?;

        check_result(&result)
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    #[instrument(skip(self, attributes))]
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> ConnectorResult<Vec<DirectoryEntry>> {
        let result = self.try_search(base_dn, scope, filter, attributes).await;
        if !needs_reconnect(&result) {
            return result;
        }
        self.reconnect().await?;
        self.try_search(base_dn, scope, filter, attributes).await
    }

    #[instrument(skip(self, attributes))]
    async fn add(&mut self, dn: &str, attributes: &AttributeStore) -> ConnectorResult<()> {
        let mut result = self.try_add(dn, attributes).await;
        if needs_reconnect(&result) {
            self.reconnect().await?;
            result = self.try_add(dn, attributes).await;
        }
        result?;
        info!(dn = %dn, "Entry created");
        Ok(())
    }

    #[instrument(
        skip(self, modification),
        fields(op = %modification.op, attribute = %modification.attribute)
    )]
    async fn modify(&mut self, dn: &str, modification: &Modification) -> ConnectorResult<()> {
        let result = self.try_modify(dn, modification).await;
        if !needs_reconnect(&result) {
            return result;
        }
        self.reconnect().await?;
        self.try_modify(dn, modification).await
    }

    #[instrument(skip(self))]
    async fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_parent_dn: &str,
        delete_old_rdn: bool,
    ) -> ConnectorResult<()> {
        let mut result = self
            .try_rename(dn, new_rdn, new_parent_dn, delete_old_rdn)
            .await;
        if needs_reconnect(&result) {
            self.reconnect().await?;
            result = self
                .try_rename(dn, new_rdn, new_parent_dn, delete_old_rdn)
                .await;
        }
        result?;
        info!(dn = %dn, new_rdn = %new_rdn, new_parent_dn = %new_parent_dn, "Entry renamed");
        Ok(())
    }
}

/// Open a connection to the configured server and bind it.
async fn open(config: &LdapConfig) -> ConnectorResult<Ldap> {
    let started = Instant::now();
    let url = config.url();
    debug!(url = %url, "Connecting to LDAP server");

    let settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection.connection_timeout())
        .set_starttls(config.use_starttls)
        .set_no_tls_verify(!config.tls.verify_certificate);

    let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
        .await
        .map_err(|e| {
            ConnectorError::connection_failed_with_source(
                format!("Failed to connect to LDAP server at {url}"),
                e,
            )
        })?;

    // Spawn the connection driver
    tokio::spawn(async move {
        if let Err(e) = conn.drive().await {
            warn!(error = %e, "LDAP connection driver error");
        }
    });

    bind(
        &mut ldap,
        config.connection.operation_timeout(),
        &config.bind_dn,
        config.bind_password.as_deref().unwrap_or(""),
    )
    .await?;

    info!(
        host = %config.host,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "LDAP connection established"
    );
    Ok(ldap)
}

/// Simple bind.
#[instrument(skip(ldap, timeout, password))]
async fn bind(
    ldap: &mut Ldap,
    timeout: Duration,
    bind_dn: &str,
    password: &str,
) -> ConnectorResult<()> {
    let result = ldap
        .with_timeout(timeout)
        .simple_bind(bind_dn, password)
        .await
        .map_err(|e| {
            ConnectorError::connection_failed_with_source(
                format!("LDAP bind failed for {bind_dn}"),
                e,
            )
        })?;

    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_INVALID_CREDENTIALS => Err(ConnectorError::AuthenticationFailed),
        rc => Err(ConnectorError::connection_failed(format!(
            "LDAP bind failed with code {}: {}",
            rc, result.text
        ))),
    }
}

/// Whether a failed operation should be retried on a new connection.
///
/// Only connection-level failures qualify; directory result codes never do.
fn needs_reconnect<T>(result: &ConnectorResult<T>) -> bool {
    match result {
        Err(e) if e.is_transient() => {
            warn!(error = %e.full_message(), "LDAP operation failed on the connection");
            true
        }
        _ => false,
    }
}

/// Drop referral entries, returning the rest and how many were dropped.
fn drop_referrals<T>(entries: Vec<T>, is_referral: impl Fn(&T) -> bool) -> (Vec<T>, usize) {
    let total = entries.len();
    let kept: Vec<T> = entries.into_iter().filter(|e| !is_referral(e)).collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Wire values of an attribute. Null and maps carry no values.
fn to_value_set(value: &AttributeValue) -> HashSet<Vec<u8>> {
    match value {
        AttributeValue::Null | AttributeValue::Map(_) => HashSet::new(),
        AttributeValue::String(s) => HashSet::from([s.as_bytes().to_vec()]),
        AttributeValue::Strings(values) => values.iter().map(|s| s.as_bytes().to_vec()).collect(),
        AttributeValue::Binary(bytes) => HashSet::from([bytes.clone()]),
    }
}

/// Convert a search entry, ordering attributes by name.
fn to_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut values: BTreeMap<String, AttributeValue> = BTreeMap::new();

    for (name, mut strings) in entry.attrs {
        let value = match strings.len() {
            0 => continue,
            1 => AttributeValue::String(strings.remove(0)),
            _ => AttributeValue::Strings(strings),
        };
        values.insert(name, value);
    }

    for (name, binaries) in entry.bin_attrs {
        if binaries.len() > 1 {
            debug!(
                attribute = %name,
                count = binaries.len(),
                "Keeping first value of multi-valued binary attribute"
            );
        }
        if let Some(first) = binaries.into_iter().next() {
            values.insert(name, AttributeValue::Binary(first));
        }
    }

    DirectoryEntry::new(entry.dn, values.into_iter().collect())
}

fn check_result(result: &LdapResult) -> ConnectorResult<()> {
    if result.rc == RC_SUCCESS {
        Ok(())
    } else {
        Err(directory_error(result))
    }
}

fn directory_error(result: &LdapResult) -> ConnectorError {
    let name = result_code_name(result.rc);
    let message = if result.text.trim().is_empty() {
        name.to_string()
    } else {
        format!("{}: {}", name, result.text.trim())
    };
    ConnectorError::directory(Some(result.rc), message)
}

fn result_code_name(rc: u32) -> &'static str {
    match rc {
        1 => "Operations Error",
        10 => "Referral",
        16 => "No Such Attribute",
        19 => "Constraint Violation",
        20 => "Attribute Or Value Exists",
        21 => "Invalid Attribute Syntax",
        32 => "No Such Object",
        34 => "Invalid DN Syntax",
        50 => "Insufficient Access Rights",
        53 => "Unwilling To Perform",
        64 => "Naming Violation",
        65 => "Object Class Violation",
        68 => "Entry Already Exists",
        _ => "LDAP Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use dirsync_connector::error::DirectoryErrorKind;

    fn ldap_result(rc: u32, text: &str) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: text.to_string(),
            refs: vec![],
            ctrls: vec![],
        }
    }

    #[test]
    fn test_value_set_conversion() {
        assert!(to_value_set(&AttributeValue::Null).is_empty());
        assert_eq!(
            to_value_set(&AttributeValue::from("")),
            HashSet::from([Vec::new()])
        );
        assert_eq!(to_value_set(&AttributeValue::from(vec!["a", "b", "a"])).len(), 2);
        assert_eq!(
            to_value_set(&AttributeValue::Binary(vec![0x22, 0x00])),
            HashSet::from([vec![0x22, 0x00]])
        );
    }

    #[test]
    fn test_entry_conversion_orders_and_shapes() {
        let mut attrs = HashMap::new();
        attrs.insert("sn".to_string(), vec!["Doe".to_string()]);
        attrs.insert(
            "memberOf".to_string(),
            vec!["CN=A,DC=corp".to_string(), "CN=B,DC=corp".to_string()],
        );
        attrs.insert("empty".to_string(), vec![]);
        let mut bin_attrs = HashMap::new();
        bin_attrs.insert("objectSid".to_string(), vec![vec![1u8, 0, 0, 0, 0, 0, 0, 0]]);

        let entry = to_directory_entry(SearchEntry {
            dn: "CN=John Doe,DC=corp".to_string(),
            attrs,
            bin_attrs,
        });

        let names: Vec<&str> = entry.attributes.names().collect();
        assert_eq!(names, vec!["memberOf", "objectSid", "sn"]);
        assert_eq!(
            entry.attributes.value("sn"),
            Some(&AttributeValue::from("Doe"))
        );
        assert!(entry.attributes.value("memberOf").unwrap().is_multi_valued());
        assert!(entry.attributes.value("objectSid").unwrap().as_bytes().is_some());
    }

    #[test]
    fn test_directory_error_classification() {
        let err = directory_error(&ldap_result(21, "00000057: LdapErr: DSID-0C090D11"));
        assert!(err.is_directory_kind(DirectoryErrorKind::InvalidAttributeSyntax));
        assert!(err.to_string().contains("Invalid Attribute Syntax"));

        let err = directory_error(&ldap_result(53, ""));
        assert!(err.is_directory_kind(DirectoryErrorKind::UnwillingToPerform));

        assert!(check_result(&ldap_result(0, "")).is_ok());
    }

    #[test]
    fn test_reconnect_only_on_connection_errors() {
        let dropped: ConnectorResult<()> =
            Err(ConnectorError::connection_failed("connection reset by peer"));
        assert!(needs_reconnect(&dropped));

        let refused: ConnectorResult<()> = Err(directory_error(&ldap_result(50, "")));
        assert!(!needs_reconnect(&refused));

        let denied: ConnectorResult<()> = Err(ConnectorError::AuthenticationFailed);
        assert!(!needs_reconnect(&denied));

        assert!(!needs_reconnect(&Ok(Vec::<DirectoryEntry>::new())));
    }

    #[test]
    fn test_drop_referrals_counts_skipped() {
        let entries = vec!["CN=A", "ldap://dc02.corp.com/DC=corp", "CN=B"];

        let (kept, dropped) = drop_referrals(entries, |e| e.starts_with("ldap://"));

        assert_eq!(kept, vec!["CN=A", "CN=B"]);
        assert_eq!(dropped, 1);

        let (kept, dropped) = drop_referrals(vec!["CN=A"], |e| e.starts_with("ldap://"));
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_scope_mapping() {
        assert!(matches!(to_ldap_scope(SearchScope::Base), Scope::Base));
        assert!(matches!(to_ldap_scope(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(to_ldap_scope(SearchScope::Subtree), Scope::Subtree));
    }
}

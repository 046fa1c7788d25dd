//! Attribute values and the ordered attribute store
//!
//! An [`AttributeStore`] is the generic, order-preserving representation that
//! sits between directory search results and typed domain models. Each entry is
//! an [`AttributeRecord`] keyed by its wire attribute name.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// A value for an attribute, which may be single or multi-valued.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// No value (null).
    #[default]
    Null,
    /// A single string value.
    String(String),
    /// Multiple string values.
    Strings(Vec<String>),
    /// Opaque binary data.
    Binary(Vec<u8>),
    /// Generic key/value bag. Never written to the directory and never diffed.
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Check if this value carries nothing worth writing.
    ///
    /// Null, blank strings, empty lists and empty byte strings are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::String(s) => s.trim().is_empty(),
            AttributeValue::Strings(values) => values.is_empty(),
            AttributeValue::Binary(bytes) => bytes.is_empty(),
            AttributeValue::Map(map) => map.is_empty(),
        }
    }

    /// Get as a string if this is a single string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as strings (works for both single and multi-valued).
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            AttributeValue::String(s) => vec![s.as_str()],
            AttributeValue::Strings(values) => values.iter().map(String::as_str).collect(),
            _ => vec![],
        }
    }

    /// Get as bytes if this is a binary value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttributeValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Scalar string rendering of any value.
    ///
    /// Lists yield their first element and bytes are decoded as lossy UTF-8.
    /// Null, empty lists and maps yield `None`.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            AttributeValue::Null | AttributeValue::Map(_) => None,
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Strings(values) => values.first().cloned(),
            AttributeValue::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Check if this is multi-valued.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, AttributeValue::Strings(_))
    }

    /// Short name of the value shape, used in conflict reports.
    pub fn shape_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::String(_) => "string",
            AttributeValue::Strings(_) => "string list",
            AttributeValue::Binary(_) => "binary",
            AttributeValue::Map(_) => "map",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Strings(values) => write!(f, "[{}]", values.join(", ")),
            AttributeValue::Binary(bytes) => f.write_str(&BASE64.encode(bytes)),
            AttributeValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::Strings(values)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        AttributeValue::Strings(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(bytes: Vec<u8>) -> Self {
        AttributeValue::Binary(bytes)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttributeValue::Null, Into::into)
    }
}

/// One attribute of an entry: wire name, optional display alias, value and
/// the last error recorded while writing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Wire attribute name.
    pub directory_name: String,
    /// Display alias, used only for reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttributeRecord {
    /// Create a record without alias.
    pub fn new(directory_name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            directory_name: directory_name.into(),
            domain_name: None,
            value: value.into(),
            error: None,
        }
    }

    /// Key used in values and errors views: `name` or `name (alias)`.
    pub fn display_key(&self) -> String {
        match &self.domain_name {
            Some(alias) if !alias.is_empty() => format!("{} ({})", self.directory_name, alias),
            _ => self.directory_name.clone(),
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.directory_name.eq_ignore_ascii_case(name)
    }
}

/// Ordered mapping from wire attribute name to [`AttributeRecord`].
///
/// Keys are unique and compared ASCII case-insensitively, the way LDAP
/// attribute descriptions are. Insertion order is preserved. No operation
/// fails on a missing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AttributeRecord>", into = "Vec<AttributeRecord>")]
pub struct AttributeStore {
    records: Vec<AttributeRecord>,
}

impl From<Vec<AttributeRecord>> for AttributeStore {
    /// Later records with an already seen name replace the earlier one,
    /// keeping its position.
    fn from(records: Vec<AttributeRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            match store.position(&record.directory_name) {
                Some(index) => {
                    let existing = &mut store.records[index];
                    existing.value = record.value;
                    existing.domain_name = record.domain_name;
                    existing.error = record.error;
                }
                None => store.records.push(record),
            }
        }
        store
    }
}

impl From<AttributeStore> for Vec<AttributeRecord> {
    fn from(store: AttributeStore) -> Self {
        store.records
    }
}

impl AttributeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a value without alias.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.upsert(name.into(), value.into(), None);
    }

    /// Upsert a value with a display alias.
    pub fn set_with_alias(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
        domain_name: impl Into<String>,
    ) {
        self.upsert(name.into(), value.into(), Some(domain_name.into()));
    }

    /// Set an attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    fn upsert(&mut self, name: String, value: AttributeValue, domain_name: Option<String>) {
        match self.position(&name) {
            Some(index) => {
                let record = &mut self.records[index];
                record.value = value;
                record.domain_name = domain_name;
                record.error = None;
            }
            None => self.records.push(AttributeRecord {
                directory_name: name,
                domain_name,
                value,
                error: None,
            }),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.matches(name))
    }

    /// Get a record by wire name.
    pub fn get(&self, name: &str) -> Option<&AttributeRecord> {
        self.records.iter().find(|r| r.matches(name))
    }

    /// Get a mutable record by wire name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeRecord> {
        self.records.iter_mut().find(|r| r.matches(name))
    }

    /// Get the value of an attribute.
    pub fn value(&self, name: &str) -> Option<&AttributeValue> {
        self.get(name).map(|r| &r.value)
    }

    /// Get a scalar string rendering of an attribute.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.value(name).and_then(AttributeValue::to_scalar_string)
    }

    /// Check if an attribute exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttributeRecord> {
        self.position(name).map(|index| self.records.remove(index))
    }

    /// Drop every record whose value is empty.
    pub fn remove_empty(&mut self) {
        self.records.retain(|r| !r.value.is_empty());
    }

    /// Keep only the records matching the predicate.
    pub fn retain<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&AttributeRecord) -> bool,
    {
        self.records.retain(|r| predicate(r));
    }

    /// Names of the records not listed in `names`.
    pub fn names_not_in<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !names.iter().any(|n| r.matches(n.as_ref())))
            .map(|r| r.directory_name.clone())
            .collect()
    }

    /// Record an error against an attribute. Returns `false` if it is absent.
    pub fn set_error(&mut self, name: &str, message: impl Into<String>) -> bool {
        match self.get_mut(name) {
            Some(record) => {
                record.error = Some(message.into());
                true
            }
            None => false,
        }
    }

    /// Values keyed by `name` or `name (alias)`.
    pub fn values_view(&self) -> BTreeMap<String, AttributeValue> {
        self.records
            .iter()
            .map(|r| (r.display_key(), r.value.clone()))
            .collect()
    }

    /// Non-empty errors keyed by `name` or `name (alias)`.
    pub fn errors_view(&self) -> BTreeMap<String, String> {
        self.records
            .iter()
            .filter_map(|r| match &r.error {
                Some(error) if !error.trim().is_empty() => Some((r.display_key(), error.clone())),
                _ => None,
            })
            .collect()
    }

    /// Get all attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.directory_name.as_str())
    }

    /// Iterate over all records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeRecord> {
        self.records.iter()
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<N: Into<String>, V: Into<AttributeValue>> FromIterator<(N, V)> for AttributeStore {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut store = AttributeStore::new();
        for (name, value) in iter {
            store.set(name, value);
        }
        store
    }
}

impl IntoIterator for AttributeStore {
    type Item = AttributeRecord;
    type IntoIter = std::vec::IntoIter<AttributeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeStore {
    type Item = &'a AttributeRecord;
    type IntoIter = std::slice::Iter<'a, AttributeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//! Directory operation types
//!
//! Single-attribute modifications, search scopes and search result entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeStore, AttributeValue};

/// Kind of a single-attribute modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationOp {
    /// Replace all values of the attribute.
    Replace,
    /// Add values to the attribute.
    Add,
    /// Delete the given values, or the whole attribute when no value is given.
    Delete,
}

impl fmt::Display for ModificationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationOp::Replace => write!(f, "replace"),
            ModificationOp::Add => write!(f, "add"),
            ModificationOp::Delete => write!(f, "delete"),
        }
    }
}

/// One modification applied against a DN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub op: ModificationOp,
    pub attribute: String,
    pub value: AttributeValue,
}

impl Modification {
    /// Create a replace modification.
    pub fn replace(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            op: ModificationOp::Replace,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create an add modification.
    pub fn add(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            op: ModificationOp::Add,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a delete modification.
    pub fn delete(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            op: ModificationOp::Delete,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Delete every value of the attribute.
    pub fn delete_all(attribute: impl Into<String>) -> Self {
        Self::delete(attribute, AttributeValue::Null)
    }

    /// Check if this modification writes nothing but a blank value.
    pub fn has_blank_value(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.attribute, self.value)
    }
}

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all its descendants.
    #[default]
    Subtree,
}

/// One entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: AttributeStore,
}

impl DirectoryEntry {
    /// Create a new entry.
    pub fn new(dn: impl Into<String>, attributes: AttributeStore) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Attributes of the entry, with `distinguishedName` filled from the DN
    /// when the server did not return it.
    pub fn into_attributes(self) -> AttributeStore {
        let mut attributes = self.attributes;
        if !attributes.contains("distinguishedName") && !self.dn.is_empty() {
            attributes.set("distinguishedName", self.dn);
        }
        attributes
    }
}

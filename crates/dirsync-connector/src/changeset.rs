//! Change-set computation between current and desired attribute state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribute::{AttributeStore, AttributeValue};
use crate::operation::Modification;

/// A desired value whose shape cannot be compared with the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeConflict {
    pub attribute: String,
    pub message: String,
}

/// Result of comparing two stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Modifications to apply, in desired-store order.
    pub modifications: Vec<Modification>,
    /// Attributes skipped because of shape mismatches.
    pub conflicts: Vec<ShapeConflict>,
}

impl ChangeSet {
    /// Check if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Names of the attributes being modified.
    pub fn affected_attributes(&self) -> Vec<&str> {
        self.modifications
            .iter()
            .map(|m| m.attribute.as_str())
            .collect()
    }
}

enum Comparison {
    Equal,
    Different,
    Conflict(String),
}

/// Compute the modifications that bring `current` to `desired`.
///
/// Only attributes present in `desired` are considered. Attributes missing
/// from `current` are always replaced. Map values are never emitted.
pub fn compute_modifications(current: &AttributeStore, desired: &AttributeStore) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    for record in desired {
        if matches!(record.value, AttributeValue::Map(_)) {
            continue;
        }

        let comparison = match current.value(&record.directory_name) {
            Some(current_value) => compare(current_value, &record.value),
            None => Comparison::Different,
        };

        match comparison {
            Comparison::Equal => {}
            Comparison::Different => change_set.modifications.push(Modification::replace(
                record.directory_name.clone(),
                record.value.clone(),
            )),
            Comparison::Conflict(message) => {
                debug!(
                    attribute = %record.directory_name,
                    %message,
                    "Skipping attribute with shape conflict"
                );
                change_set.conflicts.push(ShapeConflict {
                    attribute: record.directory_name.clone(),
                    message,
                });
            }
        }
    }

    change_set
}

fn compare(current: &AttributeValue, desired: &AttributeValue) -> Comparison {
    match desired {
        AttributeValue::Strings(wanted) => match current_as_list(current) {
            Some(have) if have == wanted.as_slice() => Comparison::Equal,
            Some(_) => Comparison::Different,
            None => Comparison::Conflict(conflict_message(current, desired)),
        },
        AttributeValue::Binary(wanted) => match current {
            AttributeValue::Binary(have) if have == wanted => Comparison::Equal,
            AttributeValue::Binary(_) | AttributeValue::Null => Comparison::Different,
            _ => Comparison::Conflict(conflict_message(current, desired)),
        },
        AttributeValue::String(wanted) => scalar_comparison(current, wanted),
        AttributeValue::Null => scalar_comparison(current, ""),
        AttributeValue::Map(_) => Comparison::Equal,
    }
}

fn current_as_list(current: &AttributeValue) -> Option<&[String]> {
    match current {
        AttributeValue::Null => Some(&[]),
        AttributeValue::String(s) => Some(std::slice::from_ref(s)),
        AttributeValue::Strings(values) => Some(values),
        AttributeValue::Binary(_) | AttributeValue::Map(_) => None,
    }
}

fn scalar_comparison(current: &AttributeValue, wanted: &str) -> Comparison {
    let have = match current {
        AttributeValue::Null => Some(""),
        AttributeValue::String(s) => Some(s.as_str()),
        AttributeValue::Strings(values) if values.len() == 1 => Some(values[0].as_str()),
        _ => None,
    };
    if have == Some(wanted) {
        Comparison::Equal
    } else {
        Comparison::Different
    }
}

fn conflict_message(current: &AttributeValue, desired: &AttributeValue) -> String {
    format!(
        "cannot compare current {} value with desired {} value",
        current.shape_name(),
        desired.shape_name()
    )
}

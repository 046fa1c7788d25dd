//! Model binding
//!
//! Converts between an [`AttributeStore`] and typed domain models. A model
//! declares its mapped fields once, as a static table of [`FieldDescriptor`]s;
//! fields missing from the table are not mapped.
//!
//! # Example
//!
//! ```
//! use dirsync_connector::attribute::{AttributeStore, AttributeValue};
//! use dirsync_connector::binding::{bind, unbind, DirectoryModel, FieldDescriptor, into_scalar};
//!
//! #[derive(Default)]
//! struct Person {
//!     login: Option<String>,
//! }
//!
//! static PERSON_FIELDS: &[FieldDescriptor<Person>] = &[FieldDescriptor::scalar(
//!     "login",
//!     "samAccountName",
//!     |p| p.login.clone().into(),
//!     |p, v| p.login = into_scalar(v),
//! )];
//!
//! impl DirectoryModel for Person {
//!     fn fields() -> &'static [FieldDescriptor<Self>] {
//!         PERSON_FIELDS
//!     }
//! }
//!
//! let store = AttributeStore::new().with("sAMAccountName", "jdoe");
//! let person: Person = bind(&store);
//! assert_eq!(person.login.as_deref(), Some("jdoe"));
//! assert_eq!(
//!     unbind(&person).value("samAccountName"),
//!     Some(&AttributeValue::from("jdoe"))
//! );
//! ```

use std::collections::BTreeMap;

use crate::attribute::{AttributeStore, AttributeValue};
use crate::sid::decode_sid_string;

/// Wire shape of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Single string value.
    Scalar,
    /// List of strings.
    StringList,
    /// Opaque bytes.
    ByteList,
}

/// Static description of one mapped field of a model `M`.
pub struct FieldDescriptor<M> {
    /// Field name on the model, used as the display alias.
    pub field: &'static str,
    /// Wire attribute name.
    pub directory_name: &'static str,
    pub shape: FieldShape,
    pub get: fn(&M) -> AttributeValue,
    pub set: fn(&mut M, AttributeValue),
}

impl<M> FieldDescriptor<M> {
    pub const fn scalar(
        field: &'static str,
        directory_name: &'static str,
        get: fn(&M) -> AttributeValue,
        set: fn(&mut M, AttributeValue),
    ) -> Self {
        Self {
            field,
            directory_name,
            shape: FieldShape::Scalar,
            get,
            set,
        }
    }

    pub const fn string_list(
        field: &'static str,
        directory_name: &'static str,
        get: fn(&M) -> AttributeValue,
        set: fn(&mut M, AttributeValue),
    ) -> Self {
        Self {
            field,
            directory_name,
            shape: FieldShape::StringList,
            get,
            set,
        }
    }

    pub const fn byte_list(
        field: &'static str,
        directory_name: &'static str,
        get: fn(&M) -> AttributeValue,
        set: fn(&mut M, AttributeValue),
    ) -> Self {
        Self {
            field,
            directory_name,
            shape: FieldShape::ByteList,
            get,
            set,
        }
    }
}

/// A typed model bound to directory attributes through a descriptor table.
pub trait DirectoryModel: Default + Sized + 'static {
    /// The mapped fields of this model.
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// Catch-all map for attributes without a declared field.
    fn additional_attributes(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        None
    }

    /// Mutable access to the catch-all map.
    fn additional_attributes_mut(&mut self) -> Option<&mut BTreeMap<String, AttributeValue>> {
        None
    }

    /// Wire names of every mapped field.
    fn directory_names() -> Vec<&'static str> {
        Self::fields().iter().map(|f| f.directory_name).collect()
    }
}

/// Build a fresh model from a store.
///
/// Absent or empty values leave the field untouched. Records without a
/// declared field go to the model's additional attributes, if it has them.
pub fn bind<T: DirectoryModel>(store: &AttributeStore) -> T {
    let mut model = T::default();
    let fields = T::fields();

    for descriptor in fields {
        let Some(record) = store.get(descriptor.directory_name) else {
            continue;
        };
        if record.value.is_empty() {
            continue;
        }
        if let Some(value) = coerce(&record.value, descriptor.shape) {
            (descriptor.set)(&mut model, value);
        }
    }

    if let Some(additional) = model.additional_attributes_mut() {
        for record in store.iter() {
            let declared = fields
                .iter()
                .any(|f| f.directory_name.eq_ignore_ascii_case(&record.directory_name));
            if declared || record.value.is_empty() {
                continue;
            }
            additional.insert(
                record.directory_name.clone(),
                present(&record.directory_name, &record.value),
            );
        }
    }

    model
}

/// Flatten a model into a store.
///
/// Declared fields carry their field name as display alias and take
/// precedence over additional entries of the same name.
pub fn unbind<T: DirectoryModel>(model: &T) -> AttributeStore {
    let mut store = AttributeStore::new();

    for descriptor in T::fields() {
        let value = (descriptor.get)(model);
        if value.is_empty() {
            continue;
        }
        store.set_with_alias(descriptor.directory_name, value, descriptor.field);
    }

    if let Some(additional) = model.additional_attributes() {
        for (name, value) in additional {
            if value.is_empty() || store.contains(name) {
                continue;
            }
            store.set(name.clone(), value.clone());
        }
    }

    store
}

fn coerce(value: &AttributeValue, shape: FieldShape) -> Option<AttributeValue> {
    match shape {
        FieldShape::ByteList => match value {
            AttributeValue::Binary(bytes) => Some(AttributeValue::Binary(bytes.clone())),
            AttributeValue::String(s) => Some(AttributeValue::Binary(s.clone().into_bytes())),
            AttributeValue::Strings(values) => values
                .first()
                .map(|s| AttributeValue::Binary(s.clone().into_bytes())),
            AttributeValue::Null | AttributeValue::Map(_) => None,
        },
        FieldShape::StringList => match value {
            AttributeValue::Strings(values) => Some(AttributeValue::Strings(values.clone())),
            other => other
                .to_scalar_string()
                .map(|s| AttributeValue::Strings(vec![s])),
        },
        FieldShape::Scalar => value.to_scalar_string().map(AttributeValue::String),
    }
}

/// Presentation of an undeclared attribute, matching search result shapes.
fn present(name: &str, value: &AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::Strings(values) if values.len() == 1 => {
            AttributeValue::String(values[0].clone())
        }
        AttributeValue::Binary(bytes) if name.eq_ignore_ascii_case("objectSid") => {
            match decode_sid_string(bytes) {
                Ok(sid) => AttributeValue::String(sid),
                Err(_) => value.clone(),
            }
        }
        other => other.clone(),
    }
}

/// Setter helper: scalar string of a bound value.
pub fn into_scalar(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::String(s) => Some(s),
        other => other.to_scalar_string(),
    }
}

/// Setter helper: string list of a bound value.
pub fn into_strings(value: AttributeValue) -> Vec<String> {
    match value {
        AttributeValue::Strings(values) => values,
        AttributeValue::String(s) => vec![s],
        other => other.to_scalar_string().into_iter().collect(),
    }
}

/// Setter helper: bytes of a bound value.
pub fn into_bytes(value: AttributeValue) -> Option<Vec<u8>> {
    match value {
        AttributeValue::Binary(bytes) => Some(bytes),
        AttributeValue::String(s) => Some(s.into_bytes()),
        _ => None,
    }
}

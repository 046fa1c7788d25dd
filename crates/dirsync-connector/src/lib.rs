//! # Directory Reconciliation Framework
//!
//! Core abstractions for reconciling directory entries (users and groups)
//! toward a desired state.
//!
//! The framework is independent of the wire protocol: everything that talks to
//! a server goes through the [`traits::DirectorySession`] trait, so the
//! reconciliation logic can be driven by a real LDAP session or an in-memory
//! one.
//!
//! ## Architecture
//!
//! - [`attribute::AttributeStore`] - Ordered, case-insensitive attribute bag
//! - [`binding`] - Static field tables mapping typed models to attributes
//! - [`changeset::compute_modifications`] - Minimal change-set between two stores
//! - [`sid`] - Security identifier decoding
//! - [`traits::DirectorySession`] - Search/add/modify/rename seam
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//!
//! let current = session
//!     .search_one(base_dn, "(samAccountName=jdoe)", &attributes)
//!     .await?
//!     .ok_or_else(|| ConnectorError::not_found("jdoe"))?
//!     .into_attributes();
//!
//! let desired = AttributeStore::new().with("title", "Manager");
//!
//! for modification in compute_modifications(&current, &desired).modifications {
//!     session.modify(&dn, &modification).await?;
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with directory result classification
//! - [`attribute`] - Attribute values, records and stores
//! - [`binding`] - Model binding
//! - [`changeset`] - Change-set computation
//! - [`operation`] - Modifications, scopes and search entries
//! - [`sid`] - Security identifiers
//! - [`traits`] - Directory session trait
//! - [`config`] - Configuration types and traits

pub mod attribute;
pub mod binding;
pub mod changeset;
pub mod config;
pub mod error;
pub mod operation;
pub mod sid;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use dirsync_connector::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult, DirectoryErrorKind};

    // Attributes and binding
    pub use crate::attribute::{AttributeRecord, AttributeStore, AttributeValue};
    pub use crate::binding::{bind, unbind, DirectoryModel, FieldDescriptor, FieldShape};

    // Reconciliation
    pub use crate::changeset::{compute_modifications, ChangeSet, ShapeConflict};

    // Operations
    pub use crate::operation::{DirectoryEntry, Modification, ModificationOp, SearchScope};

    // Security identifiers
    pub use crate::sid::{decode_sid_string, SecurityIdentifier};

    // Traits
    pub use crate::traits::DirectorySession;

    // Configuration
    pub use crate::config::{ConnectionSettings, ConnectorConfig, TlsConfig};
}

// Re-export async_trait for session implementors
pub use async_trait::async_trait;

//! # LDAP Connector
//!
//! LDAP/Active Directory backend for the directory reconciliation framework.
//!
//! This crate provides an `ldap3` implementation of
//! [`dirsync_connector::traits::DirectorySession`] and the Active Directory
//! use cases built on it: creating, updating and archiving users and groups,
//! renaming entries and synchronizing group memberships.
//!
//! ## Features
//!
//! - LDAP v3 simple bind over plain, SSL/TLS or STARTTLS connections
//! - CN escaping and DN comparison helpers
//! - Minimal change-sets applied one modification at a time
//! - Per-group membership synchronization tolerant of partial failure
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//! use dirsync_connector_ldap::{AdConnector, LdapConfig};
//!
//! let config = LdapConfig::new(
//!     "dc01.corp.example.com",
//!     "DC=corp,DC=example,DC=com",
//!     "CN=svc-sync,OU=Service,DC=corp,DC=example,DC=com",
//! )
//! .with_password("secret")
//! .with_ssl();
//!
//! let mut connector = AdConnector::connect(config).await?;
//!
//! let desired = AttributeStore::new()
//!     .with("samAccountName", "jdoe")
//!     .with("cn", "John Doe")
//!     .with("mail", "john.doe@example.com");
//!
//! let dn = "CN=John Doe,OU=Users,DC=corp,DC=example,DC=com";
//! let report = connector
//!     .update_user(dn, "example.com", desired, "OU=Users")
//!     .await?;
//!
//! for (attribute, error) in &report.errors {
//!     tracing::warn!(%attribute, %error, "Attribute not updated");
//! }
//! ```

pub mod ad;
pub mod config;
pub mod dn;
pub mod session;

// Re-exports
pub use ad::{AdConnector, AdGroup, AdUser, UpdateReport};
pub use config::LdapConfig;
pub use session::LdapSession;

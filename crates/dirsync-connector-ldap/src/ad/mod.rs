//! Active Directory specific modules
//!
//! Builds the reconciliation use cases on top of a directory session:
//! - User and group models with static field tables
//! - CN rename and move coordination
//! - proxyAddresses reconciliation
//! - Group membership changes and synchronization
//! - unicodePwd encoding and userAccountControl defaults

pub mod connector;
pub mod groups;
pub mod models;
pub mod password;
pub mod proxy;
pub mod rename;

// Re-export key types
pub use connector::{AdConnector, UpdateReport};
pub use groups::{
    add_user_to_group, compute_membership_diff, remove_user_from_group, sync_memberships,
    GroupSyncResult, MembershipDiff, MembershipOutcome, MembershipStatus,
};
pub use models::{filetime_to_datetime, AdGroup, AdUser};
pub use password::{encode_ad_password, new_account_uac, UAC_ACCOUNTDISABLE, UAC_NORMAL_ACCOUNT};
pub use proxy::{canonical_address, reconcile_proxy_addresses};
pub use rename::{maybe_rename, RenameOutcome};

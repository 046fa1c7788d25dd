//! AD group membership.
//!
//! Provides:
//! - Single membership add/remove with business outcomes as values
//! - Membership diffing on normalized group DNs
//! - Per-group synchronization of a user's memberships toward a target set

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use dirsync_connector::error::{ConnectorResult, DirectoryErrorKind};
use dirsync_connector::operation::Modification;
use dirsync_connector::traits::DirectorySession;

use crate::dn::{group_name, normalize_dn};

/// Attribute holding the member DNs of a group.
pub const MEMBER: &str = "member";

/// Outcome of a single membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOutcome {
    /// The user was added.
    Added,
    /// The directory reported the user already in the group.
    AlreadyMember,
    /// The user was removed.
    Removed,
    /// The directory refused the removal because the user is not a member.
    NotMember,
}

/// Add `user_dn` to the `member` attribute of `group_dn`.
///
/// "Entry already exists" is reported as [`MembershipOutcome::AlreadyMember`].
#[instrument(skip(session))]
pub async fn add_user_to_group<S: DirectorySession + ?Sized>(
    session: &mut S,
    group_dn: &str,
    user_dn: &str,
) -> ConnectorResult<MembershipOutcome> {
    match session.modify(group_dn, &Modification::add(MEMBER, user_dn)).await {
        Ok(()) => {
            debug!("User added to group");
            Ok(MembershipOutcome::Added)
        }
        Err(e) if e.is_directory_kind(DirectoryErrorKind::EntryAlreadyExists) => {
            debug!("User already member of group");
            Ok(MembershipOutcome::AlreadyMember)
        }
        Err(e) => Err(e),
    }
}

/// Remove `user_dn` from the `member` attribute of `group_dn`.
///
/// "Unwilling to perform" is reported as [`MembershipOutcome::NotMember`].
#[instrument(skip(session))]
pub async fn remove_user_from_group<S: DirectorySession + ?Sized>(
    session: &mut S,
    group_dn: &str,
    user_dn: &str,
) -> ConnectorResult<MembershipOutcome> {
    match session
        .modify(group_dn, &Modification::delete(MEMBER, user_dn))
        .await
    {
        Ok(()) => {
            debug!("User removed from group");
            Ok(MembershipOutcome::Removed)
        }
        Err(e) if e.is_directory_kind(DirectoryErrorKind::UnwillingToPerform) => {
            debug!("User is not a member of group");
            Ok(MembershipOutcome::NotMember)
        }
        Err(e) => Err(e),
    }
}

/// Group DNs partitioned by what a sync has to do with them.
///
/// DNs are matched in normalized form; the first spelling seen is kept.
/// Order follows the current list, then the target list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// In both current and target.
    pub unchanged: Vec<String>,
    /// In current only.
    pub to_remove: Vec<String>,
    /// In target only.
    pub to_add: Vec<String>,
}

impl MembershipDiff {
    /// Number of groups touched by the diff.
    pub fn len(&self) -> usize {
        self.unchanged.len() + self.to_remove.len() + self.to_add.len()
    }

    /// Check if the diff is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the membership diff between current and target group DNs.
pub fn compute_membership_diff(current: &[String], target: &[String]) -> MembershipDiff {
    let current_keys: Vec<String> = current.iter().map(|dn| normalize_dn(dn)).collect();
    let target_keys: Vec<String> = target.iter().map(|dn| normalize_dn(dn)).collect();

    let mut seen: Vec<String> = Vec::new();
    let mut diff = MembershipDiff::default();

    for (dn, key) in current.iter().zip(&current_keys) {
        if key.is_empty() || seen.contains(key) {
            continue;
        }
        seen.push(key.clone());
        if target_keys.contains(key) {
            diff.unchanged.push(dn.clone());
        } else {
            diff.to_remove.push(dn.clone());
        }
    }

    for (dn, key) in target.iter().zip(&target_keys) {
        if key.is_empty() || seen.contains(key) {
            continue;
        }
        seen.push(key.clone());
        diff.to_add.push(dn.clone());
    }

    diff
}

/// What happened to one group during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    AlreadySynced,
    Added,
    Removed,
    AlreadyMember,
    NotMember,
    Failed,
}

/// Per-group result of [`sync_memberships`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSyncResult {
    pub group_dn: String,
    pub status: MembershipStatus,
    pub message: String,
    pub success: bool,
}

impl GroupSyncResult {
    fn new(group_dn: &str, status: MembershipStatus, message: impl Into<String>) -> Self {
        Self {
            group_dn: group_dn.to_string(),
            status,
            message: message.into(),
            success: status != MembershipStatus::Failed,
        }
    }

    fn from_outcome(group_dn: &str, user_key: &str, outcome: MembershipOutcome) -> Self {
        let group = group_name(group_dn);
        match outcome {
            MembershipOutcome::Added => {
                Self::new(group_dn, MembershipStatus::Added, "Has been added")
            }
            MembershipOutcome::Removed => {
                Self::new(group_dn, MembershipStatus::Removed, "Has been removed")
            }
            MembershipOutcome::AlreadyMember => Self::new(
                group_dn,
                MembershipStatus::AlreadyMember,
                format!("User {user_key} already has been added in {group}"),
            ),
            MembershipOutcome::NotMember => Self::new(
                group_dn,
                MembershipStatus::NotMember,
                format!("User {user_key} is not member of {group}"),
            ),
        }
    }
}

/// Converge the memberships of `user_dn` from `current` toward `target`.
///
/// Every group is handled independently: a failure is recorded against that
/// group and the sync moves on. Results are keyed by group name; when two
/// groups share a name the first result is kept.
#[instrument(
    skip(session, current, target),
    fields(current = current.len(), target = target.len())
)]
pub async fn sync_memberships<S: DirectorySession + ?Sized>(
    session: &mut S,
    user_dn: &str,
    user_key: &str,
    current: &[String],
    target: &[String],
) -> BTreeMap<String, GroupSyncResult> {
    let diff = compute_membership_diff(current, target);
    let mut results = BTreeMap::new();

    for group_dn in &diff.unchanged {
        insert_first(
            &mut results,
            GroupSyncResult::new(group_dn, MembershipStatus::AlreadySynced, "Already synced"),
        );
    }

    for group_dn in &diff.to_remove {
        let result = match remove_user_from_group(session, group_dn, user_dn).await {
            Ok(outcome) => GroupSyncResult::from_outcome(group_dn, user_key, outcome),
            Err(e) => {
                warn!(group = %group_dn, error = %e, "Failed to remove user from group");
                GroupSyncResult::new(
                    group_dn,
                    MembershipStatus::Failed,
                    format!("Error: {}", e.full_message()),
                )
            }
        };
        insert_first(&mut results, result);
    }

    for group_dn in &diff.to_add {
        let result = match add_user_to_group(session, group_dn, user_dn).await {
            Ok(outcome) => GroupSyncResult::from_outcome(group_dn, user_key, outcome),
            Err(e) => {
                warn!(group = %group_dn, error = %e, "Failed to add user to group");
                GroupSyncResult::new(
                    group_dn,
                    MembershipStatus::Failed,
                    format!("Error: {}", e.full_message()),
                )
            }
        };
        insert_first(&mut results, result);
    }

    let failed = results.values().filter(|r| !r.success).count();
    info!(
        groups = results.len(),
        failed,
        added = diff.to_add.len(),
        removed = diff.to_remove.len(),
        "User group sync complete"
    );

    results
}

/// Record a result under its group name. Returns false when a group with the
/// same name already holds the slot and `result` was dropped.
fn insert_first(
    results: &mut BTreeMap<String, GroupSyncResult>,
    result: GroupSyncResult,
) -> bool {
    match results.entry(group_name(&result.group_dn)) {
        Entry::Vacant(slot) => {
            slot.insert(result);
            true
        }
        Entry::Occupied(kept) => {
            warn!(
                group = %kept.key(),
                kept_dn = %kept.get().group_dn,
                dropped_dn = %result.group_dn,
                dropped_status = ?result.status,
                "Dropping sync result for a group with a duplicate name"
            );
            false
        }
    }
}

//! Entry rename coordination.
//!
//! Renames and moves happen before any attribute is written: a failed rename
//! aborts the use case, and a successful one changes the DN every later
//! modification targets.

use tracing::{debug, info, instrument};

use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::traits::DirectorySession;

use crate::dn::{dn_equals, entry_dn, escape_cn, join_dn};

/// Result of [`maybe_rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    /// DN of the entry after the call; equal to the input DN when nothing moved.
    pub dn: String,
    /// CN the entry had before the call.
    pub previous_cn: String,
    /// Whether a rename was issued.
    pub renamed: bool,
}

impl RenameOutcome {
    fn unchanged(current_cn: &str, current_dn: &str) -> Self {
        Self {
            dn: current_dn.to_string(),
            previous_cn: current_cn.to_string(),
            renamed: false,
        }
    }
}

/// Rename and/or move an entry so it sits at `CN=<desired_cn>,<new_parent_dn>,<base_dn>`.
///
/// A blank `desired_cn`, or one that escapes to nothing, leaves the entry
/// alone. Otherwise at most one rename call is issued, and only when the
/// target DN differs from `current_dn` (compared component-wise, ignoring case
/// and surrounding whitespace).
///
/// # Errors
/// Any session error is returned as [`ConnectorError::RenameFailed`].
#[instrument(skip(session))]
pub async fn maybe_rename<S: DirectorySession + ?Sized>(
    session: &mut S,
    current_cn: &str,
    desired_cn: &str,
    current_dn: &str,
    new_parent_dn: &str,
    base_dn: &str,
) -> ConnectorResult<RenameOutcome> {
    if desired_cn.trim().is_empty() {
        return Ok(RenameOutcome::unchanged(current_cn, current_dn));
    }

    let escaped = escape_cn(desired_cn);
    if escaped.is_empty() {
        debug!("Desired CN escapes to an empty value, skipping rename");
        return Ok(RenameOutcome::unchanged(current_cn, current_dn));
    }

    let new_dn = entry_dn(&escaped, new_parent_dn, base_dn);
    if dn_equals(current_dn, &new_dn) {
        return Ok(RenameOutcome::unchanged(current_cn, current_dn));
    }

    let new_rdn = format!("CN={escaped}");
    let parent = join_dn(&[new_parent_dn, base_dn]);

    session
        .rename(current_dn, &new_rdn, &parent, true)
        .await
        .map_err(|e| ConnectorError::RenameFailed {
            dn: current_dn.to_string(),
            message: e.full_message(),
        })?;

    info!(from = %current_dn, to = %new_dn, "Entry renamed");

    Ok(RenameOutcome {
        dn: new_dn,
        previous_cn: current_cn.to_string(),
        renamed: true,
    })
}

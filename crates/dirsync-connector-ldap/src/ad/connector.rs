//! AD connector use cases.
//!
//! The `AdConnector` owns a [`DirectorySession`] and runs each lifecycle
//! action as a sequential pipeline of session calls:
//! - create users and groups
//! - update users (rename, proxyAddresses, attribute change-set) and groups
//! - archive users and groups under an archive container
//! - single membership changes and bulk membership synchronization
//! - typed reads by samAccountName or DN
//!
//! Lookups and renames are fatal. Attribute modifications and membership
//! steps are recorded per key and processing continues.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use dirsync_connector::attribute::{AttributeStore, AttributeValue};
use dirsync_connector::binding::bind;
use dirsync_connector::changeset::compute_modifications;
use dirsync_connector::config::ConnectorConfig;
use dirsync_connector::error::{ConnectorError, ConnectorResult, DirectoryErrorKind};
use dirsync_connector::operation::{DirectoryEntry, Modification, ModificationOp};
use dirsync_connector::traits::DirectorySession;

use crate::config::LdapConfig;
use crate::dn::{entry_dn, equality_filter, escape_cn, group_name};
use crate::session::LdapSession;

use super::groups::{self, GroupSyncResult, MembershipOutcome, MEMBER};
use super::models::{AdGroup, AdUser};
use super::password::{encode_ad_password, new_account_uac};
use super::proxy::{reconcile_proxy_addresses, PROXY_ADDRESSES};
use super::rename::maybe_rename;

const SAM_ACCOUNT_NAME: &str = "samAccountName";
const DISTINGUISHED_NAME: &str = "distinguishedName";
const MEMBER_OF: &str = "memberOf";
const UNICODE_PWD: &str = "unicodePwd";

/// Outcome of an update or archive use case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    /// DN of the entry once the use case finished.
    pub dn: String,
    /// Per-attribute errors, keyed like [`AttributeStore::errors_view`].
    pub errors: BTreeMap<String, String>,
}

impl UpdateReport {
    /// Check if every step succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Active Directory connector over an owned session.
pub struct AdConnector<S> {
    config: LdapConfig,
    session: S,
}

impl AdConnector<LdapSession> {
    /// Connect and bind with the configured credentials.
    pub async fn connect(config: LdapConfig) -> ConnectorResult<Self> {
        // The session validates the configuration before connecting
        let session = LdapSession::connect(&config).await?;
        Ok(Self { config, session })
    }

    /// Unbind and drop the connection.
    pub async fn disconnect(self) -> ConnectorResult<()> {
        self.session.unbind().await
    }
}

impl<S: DirectorySession> AdConnector<S> {
    /// Create a connector over an already bound session.
    pub fn new(config: LdapConfig, session: S) -> ConnectorResult<Self> {
        config.validate()?;
        Ok(Self { config, session })
    }

    /// Get the configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Get the underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Get the underlying session mutably.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Release the underlying session.
    pub fn into_session(self) -> S {
        self.session
    }

    // --- Create ---

    /// Create a group at `CN=<cn>,<parent_dn>,<base_dn>` and return its DN.
    ///
    /// A blank `parent_dn` falls back to the configured group container.
    #[instrument(skip(self))]
    pub async fn create_group(
        &mut self,
        cn: &str,
        display_name: &str,
        sam_account_name: &str,
        manager_dn: &str,
        parent_dn: &str,
    ) -> ConnectorResult<String> {
        let escaped = escape_cn(cn);
        if escaped.is_empty() {
            return Err(ConnectorError::invalid_data("group CN is empty"));
        }

        let parent = self.parent_or(parent_dn, self.config.group_container.as_deref());
        let dn = entry_dn(&escaped, &parent, &self.config.base_dn);

        let mut attributes = AttributeStore::new()
            .with("objectClass", self.config.group_object_classes.clone())
            .with("displayName", display_name)
            .with("description", cn)
            .with("cn", cn)
            .with(SAM_ACCOUNT_NAME, sam_account_name)
            .with("managedBy", manager_dn);
        attributes.remove_empty();

        if let Err(e) = self.add_entry(&dn, &attributes).await {
            error!(
                dn = %dn,
                error = %e,
                attributes = ?attributes.values_view(),
                "Error while creating group"
            );
            return Err(e);
        }

        info!(dn = %dn, "Group created");
        Ok(dn)
    }

    /// Create a user named after its `displayName` and return its DN.
    ///
    /// `displayName` and `samAccountName` are required. The initial password
    /// is written to `unicodePwd`; `userAccountControl` defaults to a normal,
    /// enabled account. Every other managed, updatable, non-empty attribute of
    /// `attributes` is written as well.
    #[instrument(skip(self, attributes, default_password))]
    pub async fn create_user(
        &mut self,
        attributes: &AttributeStore,
        default_password: &str,
        parent_dn: &str,
    ) -> ConnectorResult<String> {
        let display_name = required_string(attributes, "displayName")?;
        let sam_account_name = required_string(attributes, SAM_ACCOUNT_NAME)?;

        let escaped = escape_cn(&display_name);
        if escaped.is_empty() {
            return Err(ConnectorError::invalid_data("displayName escapes to an empty CN"));
        }

        let parent = self.parent_or(parent_dn, self.config.user_container.as_deref());
        let dn = entry_dn(&escaped, &parent, &self.config.base_dn);

        let user_account_control = attributes
            .get_string("userAccountControl")
            .filter(|uac| !uac.trim().is_empty())
            .unwrap_or_else(|| new_account_uac(false).to_string());

        let mut entry = AttributeStore::new()
            .with("objectClass", self.config.user_object_classes.clone())
            .with(SAM_ACCOUNT_NAME, sam_account_name)
            .with(
                "userPrincipalName",
                attributes.value("userPrincipalName").cloned().unwrap_or_default(),
            )
            .with("userAccountControl", user_account_control)
            .with(DISTINGUISHED_NAME, dn.clone());

        for record in attributes {
            if entry.contains(&record.directory_name)
                || record.directory_name.eq_ignore_ascii_case(UNICODE_PWD)
                || matches!(record.value, AttributeValue::Map(_))
                || !self.config.is_managed(&record.directory_name)
                || !self.config.is_updatable(&record.directory_name)
            {
                continue;
            }
            entry.set(record.directory_name.clone(), record.value.clone());
        }
        entry.remove_empty();

        let logged = entry.values_view();
        entry.set(UNICODE_PWD, encode_ad_password(default_password)?);

        if let Err(e) = self.add_entry(&dn, &entry).await {
            error!(dn = %dn, error = %e, attributes = ?logged, "Error while creating user");
            return Err(e);
        }

        info!(dn = %dn, "User created");
        Ok(dn)
    }

    // --- Update ---

    /// Bring a user entry to the desired state.
    ///
    /// The entry is looked up by the desired `samAccountName`, renamed or
    /// moved when `cn` or `new_parent_dn` call for it, its proxyAddresses
    /// reconciled against `mail` and `mail_domain`, then each differing
    /// managed attribute is replaced independently.
    #[instrument(skip(self, desired))]
    pub async fn update_user(
        &mut self,
        dn: &str,
        mail_domain: &str,
        mut desired: AttributeStore,
        new_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let result = match required_string(&desired, SAM_ACCOUNT_NAME) {
            Ok(sam_account_name) => {
                let mail_domain = Some(mail_domain);
                self.try_update(dn, &sam_account_name, mail_domain, &mut desired, new_parent_dn)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!(
                dn = %dn,
                error = %e,
                attributes = ?desired.values_view(),
                "Error while updating user"
            );
        }
        result
    }

    /// Bring a group entry to the desired state.
    #[instrument(skip(self, desired))]
    pub async fn update_group(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        mut desired: AttributeStore,
        new_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let result = self
            .try_update(dn, sam_account_name, None, &mut desired, new_parent_dn)
            .await;

        if let Err(e) = &result {
            error!(
                dn = %dn,
                error = %e,
                attributes = ?desired.values_view(),
                "Error while updating group"
            );
        }
        result
    }

    async fn try_update(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        mail_domain: Option<&str>,
        desired: &mut AttributeStore,
        new_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let mut current = self.require_by_sam_account_name(sam_account_name).await?;
        let dn = resolve_dn(dn, &current);

        let current_cn = current.attributes.get_string("cn").unwrap_or_default();
        let desired_cn = desired.get_string("cn").unwrap_or_default();

        let outcome = maybe_rename(
            &mut self.session,
            &current_cn,
            &desired_cn,
            &dn,
            new_parent_dn,
            &self.config.base_dn,
        )
        .await?;

        if outcome.renamed {
            current = self.require_by_sam_account_name(sam_account_name).await?;
        }

        if let Some(mail_domain) = mail_domain {
            let current_proxies = strings_of(&current.attributes, PROXY_ADDRESSES);
            reconcile_proxy_addresses(sam_account_name, &current_proxies, mail_domain, desired);
        }

        self.retain_writable(desired);
        self.apply_changes(&outcome.dn, &current.attributes, desired)
            .await;

        Ok(UpdateReport {
            dn: outcome.dn,
            errors: desired.errors_view(),
        })
    }

    // --- Archive ---

    /// Archive a user: drop its group memberships, apply `desired`, then move
    /// it under `archived_parent_dn` keeping its CN.
    ///
    /// Membership removals that fail are reported as `memberOf (<group>)`.
    #[instrument(skip(self, desired))]
    pub async fn archive_user(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        mut desired: AttributeStore,
        archived_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let result = self
            .try_archive_user(dn, sam_account_name, &mut desired, archived_parent_dn)
            .await;

        if let Err(e) = &result {
            error!(
                dn = %dn,
                error = %e,
                attributes = ?desired.values_view(),
                "Error while archiving user"
            );
        }
        result
    }

    async fn try_archive_user(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        desired: &mut AttributeStore,
        archived_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let current = self.require_by_sam_account_name(sam_account_name).await?;
        let dn = resolve_dn(dn, &current);

        let mut errors = BTreeMap::new();
        for group_dn in strings_of(&current.attributes, MEMBER_OF) {
            match groups::remove_user_from_group(&mut self.session, &group_dn, &dn).await {
                Ok(outcome) => debug!(group = %group_dn, ?outcome, "Membership dropped"),
                Err(e) => {
                    warn!(group = %group_dn, error = %e, "Failed to remove user from group");
                    errors.insert(
                        format!("{MEMBER_OF} ({})", group_name(&group_dn)),
                        e.full_message(),
                    );
                }
            }
        }

        self.retain_writable(desired);
        self.apply_changes(&dn, &current.attributes, desired).await;
        errors.extend(desired.errors_view());

        let refreshed = self.require_by_sam_account_name(sam_account_name).await?;
        let cn = refreshed.attributes.get_string("cn").unwrap_or_default();

        let outcome = maybe_rename(
            &mut self.session,
            &cn,
            &cn,
            &dn,
            archived_parent_dn,
            &self.config.base_dn,
        )
        .await?;

        info!(dn = %outcome.dn, failures = errors.len(), "User archived");
        Ok(UpdateReport {
            dn: outcome.dn,
            errors,
        })
    }

    /// Archive a group: delete all its members, then move it under
    /// `archived_parent_dn` keeping its CN.
    #[instrument(skip(self))]
    pub async fn archive_group(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        archived_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let result = self
            .try_archive_group(dn, sam_account_name, archived_parent_dn)
            .await;

        if let Err(e) = &result {
            error!(dn = %dn, error = %e, "Error while archiving group");
        }
        result
    }

    async fn try_archive_group(
        &mut self,
        dn: &str,
        sam_account_name: &str,
        archived_parent_dn: &str,
    ) -> ConnectorResult<UpdateReport> {
        let current = self.require_by_sam_account_name(sam_account_name).await?;
        let dn = resolve_dn(dn, &current);

        match self
            .session
            .modify(&dn, &Modification::delete_all(MEMBER))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_directory_kind(DirectoryErrorKind::NoSuchAttribute) => {
                debug!("Group has no members");
            }
            Err(e) => return Err(e),
        }

        let cn = current.attributes.get_string("cn").unwrap_or_default();
        let outcome = maybe_rename(
            &mut self.session,
            &cn,
            &cn,
            &dn,
            archived_parent_dn,
            &self.config.base_dn,
        )
        .await?;

        info!(dn = %outcome.dn, "Group archived");
        Ok(UpdateReport {
            dn: outcome.dn,
            errors: BTreeMap::new(),
        })
    }

    // --- Membership ---

    /// Replace the members of a group.
    #[instrument(skip(self, member_dns), fields(members = member_dns.len()))]
    pub async fn set_group_members(
        &mut self,
        group_dn: &str,
        member_dns: &[String],
    ) -> ConnectorResult<()> {
        self.session
            .modify(group_dn, &Modification::replace(MEMBER, member_dns.to_vec()))
            .await?;
        debug!("Group members replaced");
        Ok(())
    }

    /// Add a user to a group.
    pub async fn add_user_to_group(
        &mut self,
        group_dn: &str,
        user_dn: &str,
    ) -> ConnectorResult<MembershipOutcome> {
        groups::add_user_to_group(&mut self.session, group_dn, user_dn).await
    }

    /// Remove a user from a group.
    pub async fn remove_user_from_group(
        &mut self,
        group_dn: &str,
        user_dn: &str,
    ) -> ConnectorResult<MembershipOutcome> {
        groups::remove_user_from_group(&mut self.session, group_dn, user_dn).await
    }

    /// Converge the group memberships of a user toward `target_group_dns`.
    ///
    /// Fails only when the user's current memberships cannot be read.
    #[instrument(skip(self, target_group_dns), fields(target = target_group_dns.len()))]
    pub async fn sync_user_groups(
        &mut self,
        user_dn: &str,
        user_key: &str,
        target_group_dns: &[String],
    ) -> ConnectorResult<BTreeMap<String, GroupSyncResult>> {
        let user = match self.require_by_dn(user_dn).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "Error while synchronizing user groups");
                return Err(e);
            }
        };
        let current = strings_of(&user.attributes, MEMBER_OF);

        Ok(groups::sync_memberships(
            &mut self.session,
            user_dn,
            user_key,
            &current,
            target_group_dns,
        )
        .await)
    }

    // --- Reads ---

    /// Read a user by samAccountName.
    #[instrument(skip(self))]
    pub async fn get_user_by_sam_account_name(
        &mut self,
        sam_account_name: &str,
    ) -> ConnectorResult<AdUser> {
        let entry = self.require_by_sam_account_name(sam_account_name).await?;
        Ok(bind(&entry.into_attributes()))
    }

    /// Read a user by DN.
    #[instrument(skip(self))]
    pub async fn get_user_by_dn(&mut self, dn: &str) -> ConnectorResult<AdUser> {
        let entry = self.require_by_dn(dn).await?;
        Ok(bind(&entry.into_attributes()))
    }

    /// Read a group by samAccountName.
    #[instrument(skip(self))]
    pub async fn get_group(&mut self, sam_account_name: &str) -> ConnectorResult<AdGroup> {
        let entry = self.require_by_sam_account_name(sam_account_name).await?;
        Ok(bind(&entry.into_attributes()))
    }

    /// DN of the entry with the given samAccountName, `None` if there is none.
    #[instrument(skip(self))]
    pub async fn get_entry_dn(
        &mut self,
        sam_account_name: &str,
    ) -> ConnectorResult<Option<String>> {
        let entry = self.find_by_sam_account_name(sam_account_name).await?;
        Ok(entry.and_then(|entry| {
            entry
                .attributes
                .get_string(DISTINGUISHED_NAME)
                .or(Some(entry.dn))
                .filter(|dn| !dn.trim().is_empty())
        }))
    }

    // --- Internal helpers ---

    async fn find_by_sam_account_name(
        &mut self,
        sam_account_name: &str,
    ) -> ConnectorResult<Option<DirectoryEntry>> {
        if sam_account_name.trim().is_empty() {
            return Err(ConnectorError::invalid_data("samAccountName is empty"));
        }
        let filter = equality_filter(SAM_ACCOUNT_NAME, sam_account_name);
        self.find(&filter).await
    }

    async fn find_by_dn(&mut self, dn: &str) -> ConnectorResult<Option<DirectoryEntry>> {
        if dn.trim().is_empty() {
            return Err(ConnectorError::invalid_data("DN is empty"));
        }
        let filter = equality_filter(DISTINGUISHED_NAME, dn);
        self.find(&filter).await
    }

    async fn find(&mut self, filter: &str) -> ConnectorResult<Option<DirectoryEntry>> {
        let attributes = self.config.search_attributes();
        self.session
            .search_one(&self.config.base_dn, filter, &attributes)
            .await
    }

    async fn require_by_sam_account_name(
        &mut self,
        sam_account_name: &str,
    ) -> ConnectorResult<DirectoryEntry> {
        self.find_by_sam_account_name(sam_account_name)
            .await?
            .ok_or_else(|| ConnectorError::not_found(format!("samAccountName={sam_account_name}")))
    }

    async fn require_by_dn(&mut self, dn: &str) -> ConnectorResult<DirectoryEntry> {
        self.find_by_dn(dn)
            .await?
            .ok_or_else(|| ConnectorError::not_found(dn))
    }

    async fn add_entry(&mut self, dn: &str, attributes: &AttributeStore) -> ConnectorResult<()> {
        self.session.add(dn, attributes).await.map_err(|e| {
            if e.is_directory_kind(DirectoryErrorKind::EntryAlreadyExists) {
                ConnectorError::ObjectAlreadyExists {
                    identifier: dn.to_string(),
                }
            } else {
                e
            }
        })
    }

    fn parent_or(&self, parent_dn: &str, fallback: Option<&str>) -> String {
        if parent_dn.trim().is_empty() {
            fallback.unwrap_or_default().to_string()
        } else {
            parent_dn.to_string()
        }
    }

    /// Drop the attributes update use cases must not write.
    fn retain_writable(&self, desired: &mut AttributeStore) {
        let config = &self.config;
        desired.retain(|record| {
            let name = &record.directory_name;
            let keep = config.is_updatable(name) && config.is_managed(name);
            if !keep {
                debug!(attribute = %record.directory_name, "Skipping non-writable attribute");
            }
            keep
        });
    }

    /// Apply the change-set between `current` and `desired` one modification
    /// at a time, recording failures on `desired`.
    async fn apply_changes(
        &mut self,
        dn: &str,
        current: &AttributeStore,
        desired: &mut AttributeStore,
    ) {
        let change_set = compute_modifications(current, desired);

        for conflict in &change_set.conflicts {
            desired.set_error(&conflict.attribute, conflict.message.clone());
        }

        debug!(
            modifications = change_set.modifications.len(),
            conflicts = change_set.conflicts.len(),
            "Applying change-set"
        );

        for modification in &change_set.modifications {
            if let Some(message) = self.apply_modification(dn, modification).await {
                desired.set_error(&modification.attribute, message);
            }
        }
    }

    /// Apply one modification, returning the error text on failure.
    ///
    /// A blank replace rejected for invalid syntax is retried as a delete of
    /// the attribute; "no such attribute" on that delete counts as success.
    async fn apply_modification(
        &mut self,
        dn: &str,
        modification: &Modification,
    ) -> Option<String> {
        let err = match self.session.modify(dn, modification).await {
            Ok(()) => return None,
            Err(e) => e,
        };

        let compensable = modification.op == ModificationOp::Replace
            && modification.has_blank_value()
            && err.is_directory_kind(DirectoryErrorKind::InvalidAttributeSyntax);

        if !compensable {
            warn!(%modification, error = %err, "Error while updating attribute");
            return Some(err.full_message());
        }

        debug!(attribute = %modification.attribute, "Blank value rejected, deleting attribute");
        let delete = Modification::delete_all(modification.attribute.clone());
        match self.session.modify(dn, &delete).await {
            Ok(()) => None,
            Err(e) if e.is_directory_kind(DirectoryErrorKind::NoSuchAttribute) => None,
            Err(e) => {
                warn!(%modification, error = %e, "Error while removing attribute value");
                Some(e.full_message())
            }
        }
    }
}

fn required_string(store: &AttributeStore, name: &str) -> ConnectorResult<String> {
    store
        .get_string(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConnectorError::invalid_data(format!("{name} is required")))
}

fn strings_of(store: &AttributeStore, name: &str) -> Vec<String> {
    store
        .value(name)
        .map(|value| value.as_strings().into_iter().map(String::from).collect())
        .unwrap_or_default()
}

/// The caller's DN, or the looked-up one when the caller passed none.
fn resolve_dn(dn: &str, entry: &DirectoryEntry) -> String {
    if dn.trim().is_empty() {
        entry.dn.clone()
    } else {
        dn.to_string()
    }
}

//! proxyAddresses reconciliation.
//!
//! Exchange-style proxy addresses carry a type prefix: `SMTP:` and `sip:` are
//! kept as secondary addresses, lowercase `smtp:` holds the primary set. The
//! reconciler derives the canonical primary address from the login name and
//! the mail domain, folds the desired `mail` into the secondary set and writes
//! the merged value back into the desired attributes.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use dirsync_connector::attribute::{AttributeStore, AttributeValue};

/// Directory name of the attribute being reconciled.
pub const PROXY_ADDRESSES: &str = "proxyAddresses";

const PRIMARY_PREFIX: &str = "smtp:";
const SECONDARY_SMTP_PREFIX: &str = "SMTP:";
const SIP_PREFIX: &str = "sip:";

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Classified proxy addresses.
#[derive(Debug, Default)]
struct ProxySets {
    primary: BTreeSet<String>,
    secondary: BTreeSet<String>,
    other: Vec<String>,
}

impl ProxySets {
    fn partition(current: &[String]) -> Self {
        let mut sets = Self::default();

        for address in current {
            let trimmed = address.trim();
            if let Some(rest) = trimmed.strip_prefix(PRIMARY_PREFIX) {
                insert_normalized(&mut sets.primary, rest);
            } else if let Some(rest) = trimmed.strip_prefix(SECONDARY_SMTP_PREFIX) {
                insert_normalized(&mut sets.secondary, rest);
            } else if let Some(rest) = strip_prefix_ignore_case(trimmed, SIP_PREFIX) {
                insert_normalized(&mut sets.secondary, rest);
            } else if !trimmed.is_empty() && !sets.other.iter().any(|o| o == trimmed) {
                sets.other.push(trimmed.to_string());
            }
        }

        sets
    }

    fn into_values(self) -> Vec<String> {
        let mut values = Vec::with_capacity(
            self.secondary.len() * 2 + self.primary.len() + self.other.len(),
        );
        values.extend(self.secondary.iter().map(|a| format!("{SIP_PREFIX}{a}")));
        values.extend(
            self.secondary
                .iter()
                .map(|a| format!("{SECONDARY_SMTP_PREFIX}{a}")),
        );
        values.extend(self.primary.iter().map(|a| format!("{PRIMARY_PREFIX}{a}")));
        values.extend(self.other);
        values
    }
}

fn insert_normalized(set: &mut BTreeSet<String>, address: &str) {
    let normalized = normalize(address);
    if !normalized.is_empty() {
        set.insert(normalized);
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Canonical primary address: `<login local part>@<mail domain>`.
pub fn canonical_address(login: &str, mail_domain: &str) -> Option<String> {
    let local = normalize(login.split('@').next().unwrap_or_default());
    let domain = normalize(mail_domain.trim().trim_start_matches('@'));

    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(format!("{local}@{domain}"))
}

/// Merge the current proxy addresses with the desired mail into
/// `desired["proxyAddresses"]`.
///
/// Does nothing when `desired` carries no non-blank `mail`. Addresses no
/// longer matching the mail value are kept; values with unknown prefixes are
/// passed through verbatim after the reconciled ones.
#[instrument(skip(current, desired), fields(current_count = current.len()))]
pub fn reconcile_proxy_addresses(
    login: &str,
    current: &[String],
    mail_domain: &str,
    desired: &mut AttributeStore,
) {
    let Some(mail) = desired
        .value("mail")
        .and_then(AttributeValue::to_scalar_string)
        .map(|mail| normalize(&mail))
        .filter(|mail| !mail.is_empty())
    else {
        return;
    };

    let mut sets = ProxySets::partition(current);

    if let Some(primary) = canonical_address(login, mail_domain) {
        sets.primary.insert(primary);
    }
    sets.secondary.insert(mail);

    let values = sets.into_values();
    debug!(count = values.len(), "Reconciled proxy addresses");

    desired.set_with_alias(PROXY_ADDRESSES, values, "proxy_addresses");
}

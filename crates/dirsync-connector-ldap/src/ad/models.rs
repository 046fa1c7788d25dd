//! Active Directory user and group models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dirsync_connector::attribute::AttributeValue;
use dirsync_connector::binding::{
    into_bytes, into_scalar, into_strings, DirectoryModel, FieldDescriptor,
};
use dirsync_connector::error::ConnectorResult;
use dirsync_connector::sid::SecurityIdentifier;

use super::password::uac_is_active;

/// FILETIME ticks (100 ns) per second.
const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// An Active Directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdUser {
    pub login: Option<String>,
    pub cn: Option<String>,
    pub dn: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub display_name: Option<String>,
    pub name: Option<String>,
    pub user_account_control: Option<String>,
    pub user_principal_name: Option<String>,
    pub mail_nickname: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub account_expires: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub proxy_addresses: Vec<String>,
    pub target_address: Option<String>,
    pub manager_dn: Option<String>,
    pub region: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub business_phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub zip_postal_code: Option<String>,
    pub street: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub member_of: Vec<String>,
    #[serde(default)]
    pub object_class: Vec<String>,
    pub object_sid: Option<Vec<u8>>,
    /// Attributes without a dedicated field.
    #[serde(default)]
    pub additional_attributes: BTreeMap<String, AttributeValue>,
}

static USER_FIELDS: &[FieldDescriptor<AdUser>] = &[
    FieldDescriptor::scalar(
        "login",
        "samAccountName",
        |u| u.login.clone().into(),
        |u, v| u.login = into_scalar(v),
    ),
    FieldDescriptor::scalar("cn", "cn", |u| u.cn.clone().into(), |u, v| u.cn = into_scalar(v)),
    FieldDescriptor::scalar(
        "dn",
        "distinguishedName",
        |u| u.dn.clone().into(),
        |u, v| u.dn = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "last_name",
        "sn",
        |u| u.last_name.clone().into(),
        |u, v| u.last_name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "first_name",
        "givenName",
        |u| u.first_name.clone().into(),
        |u, v| u.first_name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "display_name",
        "displayName",
        |u| u.display_name.clone().into(),
        |u, v| u.display_name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "name",
        "name",
        |u| u.name.clone().into(),
        |u, v| u.name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "user_account_control",
        "userAccountControl",
        |u| u.user_account_control.clone().into(),
        |u, v| u.user_account_control = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "user_principal_name",
        "userPrincipalName",
        |u| u.user_principal_name.clone().into(),
        |u, v| u.user_principal_name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "mail_nickname",
        "mailNickname",
        |u| u.mail_nickname.clone().into(),
        |u, v| u.mail_nickname = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "title",
        "title",
        |u| u.title.clone().into(),
        |u, v| u.title = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "description",
        "description",
        |u| u.description.clone().into(),
        |u, v| u.description = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "account_expires",
        "accountExpires",
        |u| u.account_expires.clone().into(),
        |u, v| u.account_expires = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "email",
        "mail",
        |u| u.email.clone().into(),
        |u, v| u.email = into_scalar(v),
    ),
    FieldDescriptor::string_list(
        "proxy_addresses",
        "proxyAddresses",
        |u| AttributeValue::Strings(u.proxy_addresses.clone()),
        |u, v| u.proxy_addresses = into_strings(v),
    ),
    FieldDescriptor::scalar(
        "target_address",
        "targetAddress",
        |u| u.target_address.clone().into(),
        |u, v| u.target_address = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "manager_dn",
        "manager",
        |u| u.manager_dn.clone().into(),
        |u, v| u.manager_dn = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "region",
        "c",
        |u| u.region.clone().into(),
        |u, v| u.region = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "company",
        "company",
        |u| u.company.clone().into(),
        |u, v| u.company = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "department",
        "department",
        |u| u.department.clone().into(),
        |u, v| u.department = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "business_phone",
        "telephoneNumber",
        |u| u.business_phone.clone().into(),
        |u, v| u.business_phone = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "mobile_phone",
        "mobile",
        |u| u.mobile_phone.clone().into(),
        |u, v| u.mobile_phone = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "location",
        "physicalDeliveryOfficeName",
        |u| u.location.clone().into(),
        |u, v| u.location = into_scalar(v),
    ),
    FieldDescriptor::scalar("city", "l", |u| u.city.clone().into(), |u, v| u.city = into_scalar(v)),
    FieldDescriptor::scalar(
        "zip_postal_code",
        "postalCode",
        |u| u.zip_postal_code.clone().into(),
        |u, v| u.zip_postal_code = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "street",
        "streetAddress",
        |u| u.street.clone().into(),
        |u, v| u.street = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "country",
        "co",
        |u| u.country.clone().into(),
        |u, v| u.country = into_scalar(v),
    ),
    FieldDescriptor::string_list(
        "member_of",
        "memberOf",
        |u| AttributeValue::Strings(u.member_of.clone()),
        |u, v| u.member_of = into_strings(v),
    ),
    FieldDescriptor::string_list(
        "object_class",
        "objectClass",
        |u| AttributeValue::Strings(u.object_class.clone()),
        |u, v| u.object_class = into_strings(v),
    ),
    FieldDescriptor::byte_list(
        "object_sid",
        "objectSid",
        |u| u.object_sid.clone().into(),
        |u, v| u.object_sid = into_bytes(v),
    ),
];

impl DirectoryModel for AdUser {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        USER_FIELDS
    }

    fn additional_attributes(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        Some(&self.additional_attributes)
    }

    fn additional_attributes_mut(&mut self) -> Option<&mut BTreeMap<String, AttributeValue>> {
        Some(&mut self.additional_attributes)
    }
}

impl AdUser {
    /// Whether the account is enabled (ACCOUNTDISABLE bit clear).
    ///
    /// A missing or unparsable `userAccountControl` counts as inactive.
    pub fn is_active(&self) -> bool {
        uac_is_active(self.user_account_control.as_deref())
    }

    /// Expiry of the account, `None` when it never expires.
    pub fn account_expires_at(&self) -> Option<DateTime<Utc>> {
        let ticks = self.account_expires.as_deref()?.trim().parse::<i64>().ok()?;
        filetime_to_datetime(ticks)
    }

    /// Decoded security identifier.
    pub fn sid(&self) -> ConnectorResult<Option<SecurityIdentifier>> {
        self.object_sid
            .as_deref()
            .map(SecurityIdentifier::decode)
            .transpose()
    }
}

/// An Active Directory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdGroup {
    pub technical_name: Option<String>,
    pub cn: Option<String>,
    pub dn: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub manager_dn: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub object_class: Vec<String>,
    pub object_sid: Option<Vec<u8>>,
    #[serde(default)]
    pub additional_attributes: BTreeMap<String, AttributeValue>,
}

static GROUP_FIELDS: &[FieldDescriptor<AdGroup>] = &[
    FieldDescriptor::scalar(
        "technical_name",
        "samAccountName",
        |g| g.technical_name.clone().into(),
        |g, v| g.technical_name = into_scalar(v),
    ),
    FieldDescriptor::scalar("cn", "cn", |g| g.cn.clone().into(), |g, v| g.cn = into_scalar(v)),
    FieldDescriptor::scalar(
        "dn",
        "distinguishedName",
        |g| g.dn.clone().into(),
        |g, v| g.dn = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "display_name",
        "displayName",
        |g| g.display_name.clone().into(),
        |g, v| g.display_name = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "description",
        "description",
        |g| g.description.clone().into(),
        |g, v| g.description = into_scalar(v),
    ),
    FieldDescriptor::scalar(
        "manager_dn",
        "managedBy",
        |g| g.manager_dn.clone().into(),
        |g, v| g.manager_dn = into_scalar(v),
    ),
    FieldDescriptor::string_list(
        "members",
        "member",
        |g| AttributeValue::Strings(g.members.clone()),
        |g, v| g.members = into_strings(v),
    ),
    FieldDescriptor::string_list(
        "object_class",
        "objectClass",
        |g| AttributeValue::Strings(g.object_class.clone()),
        |g, v| g.object_class = into_strings(v),
    ),
    FieldDescriptor::byte_list(
        "object_sid",
        "objectSid",
        |g| g.object_sid.clone().into(),
        |g, v| g.object_sid = into_bytes(v),
    ),
];

impl DirectoryModel for AdGroup {
    fn fields() -> &'static [FieldDescriptor<Self>] {
        GROUP_FIELDS
    }

    fn additional_attributes(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        Some(&self.additional_attributes)
    }

    fn additional_attributes_mut(&mut self) -> Option<&mut BTreeMap<String, AttributeValue>> {
        Some(&mut self.additional_attributes)
    }
}

impl AdGroup {
    /// Decoded security identifier.
    pub fn sid(&self) -> ConnectorResult<Option<SecurityIdentifier>> {
        self.object_sid
            .as_deref()
            .map(SecurityIdentifier::decode)
            .transpose()
    }
}

/// Convert a Windows FILETIME to UTC. Zero and `i64::MAX` mean "never".
pub fn filetime_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks <= 0 || ticks == i64::MAX {
        return None;
    }

    let seconds = ticks / FILETIME_TICKS_PER_SECOND - FILETIME_UNIX_DIFF;
    let nanos = (ticks % FILETIME_TICKS_PER_SECOND) * 100;
    DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
}

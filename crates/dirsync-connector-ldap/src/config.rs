//! LDAP Connector configuration
//!
//! Configuration types for LDAP/Active Directory connections and for the
//! attribute policy the reconciliation use cases apply.

use serde::{Deserialize, Serialize};

use dirsync_connector::config::{
    validate_common, ConnectionSettings, ConnectorConfig, TlsConfig, REDACTED,
};
use dirsync_connector::error::{ConnectorError, ConnectorResult};

/// Attributes every lookup requests regardless of the managed list.
pub const REQUIRED_ATTRIBUTES: &[&str] = &[
    "cn",
    "distinguishedName",
    "samAccountName",
    "proxyAddresses",
    "memberOf",
];

/// Configuration for the LDAP connector.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN for all operations (e.g., "DC=corp,DC=com").
    pub base_dn: String,

    /// Bind DN or UPN for authentication.
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Connection settings (timeouts).
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// TLS configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Default parent of new users, relative to `base_dn` (e.g., "OU=Users").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_container: Option<String>,

    /// Default parent of new groups, relative to `base_dn`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_container: Option<String>,

    /// Object classes written on user creation.
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Object classes written on group creation.
    #[serde(default = "default_group_object_classes")]
    pub group_object_classes: Vec<String>,

    /// Attributes the connector reads and may write.
    #[serde(default = "default_managed_attributes")]
    pub managed_attributes: Vec<String>,

    /// Attributes update use cases never write.
    #[serde(default = "default_not_updatable_attributes")]
    pub not_updatable_attributes: Vec<String>,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| REDACTED))
            .field("connection", &self.connection)
            .field("tls", &self.tls)
            .field("user_container", &self.user_container)
            .field("group_container", &self.group_container)
            .field("user_object_classes", &self.user_object_classes)
            .field("group_object_classes", &self.group_object_classes)
            .field("managed_attributes", &self.managed_attributes)
            .field("not_updatable_attributes", &self.not_updatable_attributes)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_user_object_classes() -> Vec<String> {
    ["top", "person", "organizationalPerson", "user"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_group_object_classes() -> Vec<String> {
    vec!["top".to_string(), "group".to_string()]
}

fn default_managed_attributes() -> Vec<String> {
    [
        "samAccountName",
        "cn",
        "distinguishedName",
        "sn",
        "givenName",
        "displayName",
        "name",
        "userAccountControl",
        "userPrincipalName",
        "mailNickname",
        "title",
        "description",
        "accountExpires",
        "mail",
        "proxyAddresses",
        "targetAddress",
        "manager",
        "c",
        "company",
        "department",
        "telephoneNumber",
        "mobile",
        "physicalDeliveryOfficeName",
        "l",
        "postalCode",
        "streetAddress",
        "co",
        "memberOf",
        "objectClass",
        "objectSid",
        "managedBy",
        "member",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_not_updatable_attributes() -> Vec<String> {
    [
        "cn",
        "distinguishedName",
        "objectClass",
        "objectSid",
        "memberOf",
        "samAccountName",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl LdapConfig {
    /// Create a new LDAP config with required fields.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: None,
            connection: ConnectionSettings::default(),
            tls: TlsConfig::default(),
            user_container: None,
            group_container: None,
            user_object_classes: default_user_object_classes(),
            group_object_classes: default_group_object_classes(),
            managed_attributes: default_managed_attributes(),
            not_updatable_attributes: default_not_updatable_attributes(),
        }
    }

    /// Set bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self.tls.enabled = true;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self.tls.enabled = true;
        self
    }

    /// Set user container.
    pub fn with_user_container(mut self, container: impl Into<String>) -> Self {
        self.user_container = Some(container.into());
        self
    }

    /// Set group container.
    pub fn with_group_container(mut self, container: impl Into<String>) -> Self {
        self.group_container = Some(container.into());
        self
    }

    /// Replace the managed attribute list.
    pub fn with_managed_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.managed_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the not-updatable attribute list.
    pub fn with_not_updatable_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_updatable_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Check if an attribute is in the managed list.
    pub fn is_managed(&self, attribute: &str) -> bool {
        self.managed_attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Check if update use cases may write an attribute.
    pub fn is_updatable(&self, attribute: &str) -> bool {
        !self
            .not_updatable_attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Attributes requested by lookups: managed ones plus the required set.
    pub fn search_attributes(&self) -> Vec<String> {
        let mut attributes = self.managed_attributes.clone();
        for required in REQUIRED_ATTRIBUTES {
            if !self.is_managed(required) {
                attributes.push((*required).to_string());
            }
        }
        attributes
    }
}

impl ConnectorConfig for LdapConfig {
    fn validate(&self) -> ConnectorResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "host is required".to_string(),
            });
        }

        if self.base_dn.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "base_dn is required".to_string(),
            });
        }

        if self.bind_dn.trim().is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "bind_dn is required".to_string(),
            });
        }

        if self.use_ssl && self.use_starttls {
            return Err(ConnectorError::InvalidConfiguration {
                message: "cannot use both SSL and STARTTLS".to_string(),
            });
        }

        if self.user_object_classes.is_empty() || self.group_object_classes.is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "user and group object classes must not be empty".to_string(),
            });
        }

        if self.managed_attributes.is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "managed_attributes must not be empty".to_string(),
            });
        }

        validate_common(&self.connection, &self.tls)
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some(REDACTED.to_string());
        }
        config
    }
}

//! Connector configuration types
//!
//! Base trait and common configuration structures.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// Placeholder written over secrets in redacted configurations.
pub const REDACTED: &str = "***REDACTED***";

/// Trait for connector-specific configuration.
pub trait ConnectorConfig: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> ConnectorResult<()>;

    /// Create a redacted version of this config (for logging/display).
    fn redacted(&self) -> Self;

    /// Parse and validate a JSON document.
    fn from_json(json: &str) -> ConnectorResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConnectorError::InvalidConfiguration {
                message: format!("failed to parse configuration: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }
}

/// Common connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl ConnectionSettings {
    /// Create new connection settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the operation timeout.
    pub fn with_operation_timeout(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = secs;
        self
    }

    /// Get connection timeout as Duration.
    pub fn connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get operation timeout as Duration.
    pub fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.operation_timeout_secs)
    }

    pub(crate) fn validate(&self) -> ConnectorResult<()> {
        if self.connection_timeout_secs == 0 || self.operation_timeout_secs == 0 {
            return Err(ConnectorError::InvalidConfiguration {
                message: "timeouts must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// SSL/TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether to use SSL/TLS.
    #[serde(default)]
    pub enabled: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_certificate: true,
        }
    }
}

impl TlsConfig {
    /// Validate the TLS configuration and log security warnings.
    ///
    /// Call after loading TLS configuration from external sources.
    pub fn validate_security(&self) {
        if self.enabled && !self.verify_certificate {
            tracing::warn!(
                target: "security",
                "SECURITY WARNING: TLS certificate verification is DISABLED. \
                 This makes the connection vulnerable to Man-in-the-Middle attacks. \
                 This should ONLY be used for local development."
            );

            #[cfg(not(debug_assertions))]
            tracing::error!(
                target: "security",
                "CRITICAL: TLS certificate verification disabled in production environment!"
            );
        }
        if !self.enabled {
            tracing::warn!(
                target: "security",
                "Directory connection is not encrypted; bind credentials travel in clear text"
            );
        }
    }

    /// Create a new TLS config with SSL enabled.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }
}

/// Validate the shared sections of a connector configuration.
pub fn validate_common(settings: &ConnectionSettings, tls: &TlsConfig) -> ConnectorResult<()> {
    settings.validate()?;
    tls.validate_security();
    Ok(())
}

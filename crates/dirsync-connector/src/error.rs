//! Connector error types
//!
//! Error definitions with directory result classification and transient/permanent
//! classification for callers that decide whether to retry a whole use case.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failure reported by the directory server.
///
/// Directory servers report failures as a numeric result code plus free text.
/// Some servers (and some client libraries) only surface the text, so both
/// routes are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryErrorKind {
    /// The server refused the operation (e.g. removing a non-member from a group).
    UnwillingToPerform,
    /// The entry or value already exists (duplicate create or membership add).
    EntryAlreadyExists,
    /// The value was rejected, typically an empty value for a syntax that forbids it.
    InvalidAttributeSyntax,
    /// The attribute is not present on the entry.
    NoSuchAttribute,
    /// The target entry does not exist.
    NoSuchObject,
    /// Anything else.
    Other,
}

impl DirectoryErrorKind {
    /// Classify an LDAP result code (RFC 4511 section 4.1.9).
    #[must_use]
    pub fn from_result_code(rc: u32) -> Self {
        match rc {
            16 => DirectoryErrorKind::NoSuchAttribute,
            21 => DirectoryErrorKind::InvalidAttributeSyntax,
            32 => DirectoryErrorKind::NoSuchObject,
            53 => DirectoryErrorKind::UnwillingToPerform,
            68 => DirectoryErrorKind::EntryAlreadyExists,
            _ => DirectoryErrorKind::Other,
        }
    }

    /// Classify a server message by its well-known text.
    ///
    /// Matching ignores case and surrounding whitespace.
    #[must_use]
    pub fn classify_message(message: &str) -> Self {
        let normalized = message.trim().to_lowercase();
        [
            DirectoryErrorKind::UnwillingToPerform,
            DirectoryErrorKind::EntryAlreadyExists,
            DirectoryErrorKind::InvalidAttributeSyntax,
            DirectoryErrorKind::NoSuchAttribute,
            DirectoryErrorKind::NoSuchObject,
        ]
        .into_iter()
        .find(|kind| normalized.contains(kind.message_text()))
        .unwrap_or(DirectoryErrorKind::Other)
    }

    /// Classify using the result code first and the message as a fallback.
    #[must_use]
    pub fn classify(rc: Option<u32>, message: &str) -> Self {
        match rc.map(Self::from_result_code) {
            Some(kind) if kind != DirectoryErrorKind::Other => kind,
            _ => Self::classify_message(message),
        }
    }

    /// Lowercase text servers use for this category.
    #[must_use]
    pub fn message_text(&self) -> &'static str {
        match self {
            DirectoryErrorKind::UnwillingToPerform => "unwilling to perform",
            DirectoryErrorKind::EntryAlreadyExists => "entry already exists",
            DirectoryErrorKind::InvalidAttributeSyntax => "invalid attribute syntax",
            DirectoryErrorKind::NoSuchAttribute => "no such attribute",
            DirectoryErrorKind::NoSuchObject => "no such object",
            DirectoryErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for DirectoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message_text())
    }
}

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish connection to the directory.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid bind credentials.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Configuration errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Lookup errors
    /// A required lookup by account name or DN returned nothing.
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// Object already exists in the directory (create conflict).
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists { identifier: String },

    // Directory protocol errors
    /// The directory rejected an operation.
    #[error("directory error ({kind}): {message}")]
    Directory {
        kind: DirectoryErrorKind,
        code: Option<u32>,
        message: String,
    },

    /// Renaming or moving an entry failed; fatal to the enclosing use case.
    #[error("error while updating CN of {dn}: {message}")]
    RenameFailed { dn: String, message: String },

    // Data errors
    /// Invalid or mismatched attribute data.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// Malformed binary security identifier.
    #[error("failed to decode security identifier: {message}")]
    SidDecode { message: String },

    // Internal errors
    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConnectorError {
    /// Check if this error is transient and the operation may be retried
    /// on a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::ConnectionFailed { .. })
    }

    /// Directory classification of this error, if it came from the server.
    pub fn directory_kind(&self) -> Option<DirectoryErrorKind> {
        match self {
            ConnectorError::Directory { kind, .. } => Some(*kind),
            ConnectorError::ObjectAlreadyExists { .. } => {
                Some(DirectoryErrorKind::EntryAlreadyExists)
            }
            _ => None,
        }
    }

    /// Check whether this is a directory error of the given kind.
    pub fn is_directory_kind(&self, kind: DirectoryErrorKind) -> bool {
        self.directory_kind() == Some(kind)
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::AuthenticationFailed => "AUTH_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            ConnectorError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            ConnectorError::Directory { .. } => "DIRECTORY_ERROR",
            ConnectorError::RenameFailed { .. } => "RENAME_FAILED",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
            ConnectorError::SidDecode { .. } => "SID_DECODE",
            ConnectorError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Full message including the chain of sources, joined with `"; "`.
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let text = err.to_string();
            if !text.trim().is_empty() {
                message.push_str("; ");
                message.push_str(&text);
            }
            source = err.source();
        }
        message
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a directory error, classifying it by code and message.
    pub fn directory(code: Option<u32>, message: impl Into<String>) -> Self {
        let message = message.into();
        ConnectorError::Directory {
            kind: DirectoryErrorKind::classify(code, &message),
            code,
            message,
        }
    }

    /// Create a not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        ConnectorError::ObjectNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ConnectorError::InvalidData {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with source.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_result_codes() {
        assert_eq!(
            DirectoryErrorKind::from_result_code(53),
            DirectoryErrorKind::UnwillingToPerform
        );
        assert_eq!(
            DirectoryErrorKind::from_result_code(68),
            DirectoryErrorKind::EntryAlreadyExists
        );
        assert_eq!(
            DirectoryErrorKind::from_result_code(21),
            DirectoryErrorKind::InvalidAttributeSyntax
        );
        assert_eq!(
            DirectoryErrorKind::from_result_code(16),
            DirectoryErrorKind::NoSuchAttribute
        );
        assert_eq!(
            DirectoryErrorKind::from_result_code(32),
            DirectoryErrorKind::NoSuchObject
        );
        assert_eq!(
            DirectoryErrorKind::from_result_code(50),
            DirectoryErrorKind::Other
        );
    }

    #[test]
    fn test_classify_message_text() {
        assert_eq!(
            DirectoryErrorKind::classify_message("  Unwilling To Perform "),
            DirectoryErrorKind::UnwillingToPerform
        );
        assert_eq!(
            DirectoryErrorKind::classify_message("Entry Already Exists"),
            DirectoryErrorKind::EntryAlreadyExists
        );
        assert_eq!(
            DirectoryErrorKind::classify_message("00000057: Invalid Attribute Syntax"),
            DirectoryErrorKind::InvalidAttributeSyntax
        );
        assert_eq!(
            DirectoryErrorKind::classify_message("No Such Attribute"),
            DirectoryErrorKind::NoSuchAttribute
        );
        assert_eq!(
            DirectoryErrorKind::classify_message("busy"),
            DirectoryErrorKind::Other
        );
    }

    #[test]
    fn test_classify_prefers_code_then_text() {
        assert_eq!(
            DirectoryErrorKind::classify(Some(68), "whatever"),
            DirectoryErrorKind::EntryAlreadyExists
        );
        assert_eq!(
            DirectoryErrorKind::classify(Some(80), "No Such Attribute"),
            DirectoryErrorKind::NoSuchAttribute
        );
        assert_eq!(
            DirectoryErrorKind::classify(None, "Unwilling To Perform"),
            DirectoryErrorKind::UnwillingToPerform
        );
    }

    #[test]
    fn test_directory_constructor_classifies() {
        let err = ConnectorError::directory(Some(53), "Unwilling To Perform");
        assert!(err.is_directory_kind(DirectoryErrorKind::UnwillingToPerform));
        assert_eq!(err.error_code(), "DIRECTORY_ERROR");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_errors() {
        let err = ConnectorError::connection_failed("refused");
        assert!(err.is_transient());
        assert!(!ConnectorError::AuthenticationFailed.is_transient());
        assert!(!ConnectorError::not_found("jdoe").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::not_found("samAccountName=jdoe");
        assert_eq!(err.to_string(), "object not found: samAccountName=jdoe");

        let err = ConnectorError::RenameFailed {
            dn: "CN=Old,OU=Users,DC=corp,DC=com".to_string(),
            message: "Unwilling To Perform".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error while updating CN of CN=Old,OU=Users,DC=corp,DC=com: Unwilling To Perform"
        );
    }

    #[test]
    fn test_full_message_includes_sources() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = ConnectorError::connection_failed_with_source("bind failed", source);
        assert_eq!(
            err.full_message(),
            "connection failed: bind failed; socket closed"
        );
    }
}

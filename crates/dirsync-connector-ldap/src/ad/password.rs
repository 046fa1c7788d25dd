//! AD password encoding and account control flags.
//!
//! Active Directory accepts an initial password through the `unicodePwd`
//! attribute only in a specific encoding:
//! 1. Surround the password with double quotes: `"password"`
//! 2. Encode the quoted string as UTF-16LE bytes
//!
//! Most domain controllers refuse `unicodePwd` writes over unencrypted
//! connections.

use dirsync_connector::error::{ConnectorError, ConnectorResult};
use tracing::instrument;

/// `ACCOUNTDISABLE` bit of `userAccountControl`.
pub const UAC_ACCOUNTDISABLE: u32 = 0x2;

/// `NORMAL_ACCOUNT` bit of `userAccountControl`.
pub const UAC_NORMAL_ACCOUNT: u32 = 0x200;

/// Encode a plaintext password for AD's unicodePwd attribute.
///
/// # Errors
/// Returns an error if the password is empty.
#[instrument(skip(password))]
pub fn encode_ad_password(password: &str) -> ConnectorResult<Vec<u8>> {
    if password.is_empty() {
        return Err(ConnectorError::invalid_data("password cannot be empty"));
    }

    let quoted = format!("\"{password}\"");
    Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

/// Compute the userAccountControl value for a newly created AD user.
#[must_use]
pub fn new_account_uac(disabled: bool) -> u32 {
    let mut uac = UAC_NORMAL_ACCOUNT;
    if disabled {
        uac |= UAC_ACCOUNTDISABLE;
    }
    uac
}

/// Whether the `ACCOUNTDISABLE` bit is clear in a raw userAccountControl.
///
/// Missing or unparsable values count as inactive.
pub fn uac_is_active(raw: Option<&str>) -> bool {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .is_some_and(|uac| uac & UAC_ACCOUNTDISABLE == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ad_password_basic() {
        let encoded = encode_ad_password("Test123!").unwrap();

        let expected: Vec<u8> = "\"Test123!\""
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();

        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_encode_ad_password_quotes() {
        let encoded = encode_ad_password("P@ssw0rd").unwrap();

        assert_eq!(&encoded[..2], &[0x22, 0x00]);
        assert_eq!(&encoded[encoded.len() - 2..], &[0x22, 0x00]);
    }

    #[test]
    fn test_encode_ad_password_length() {
        // 3 chars plus quotes, 2 bytes each
        assert_eq!(encode_ad_password("abc").unwrap().len(), 10);
    }

    #[test]
    fn test_encode_ad_password_unicode_chars() {
        let encoded = encode_ad_password("Pässwörd!").unwrap();
        assert_eq!(encoded.len(), 22);
        assert_eq!(&encoded[4..6], &[0xE4, 0x00]);
    }

    #[test]
    fn test_encode_ad_password_empty_rejected() {
        let err = encode_ad_password("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_new_account_uac() {
        assert_eq!(new_account_uac(false), 0x200);
        assert_eq!(new_account_uac(true), 0x202);
    }

    #[test]
    fn test_uac_is_active() {
        assert!(uac_is_active(Some("512")));
        assert!(!uac_is_active(Some("514")));
        assert!(!uac_is_active(Some("not a number")));
        assert!(!uac_is_active(None));
    }
}

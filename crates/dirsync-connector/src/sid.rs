//! Security identifier decoding
//!
//! Binary layout: revision byte, 48-bit identifier authority, sub-authority
//! count, then that many little-endian 32-bit sub-authorities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

const HEADER_LEN: usize = 8;
const SUB_AUTHORITY_LEN: usize = 4;

/// A decoded security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityIdentifier {
    pub revision: u8,
    pub authority: u64,
    pub sub_authorities: Vec<u32>,
}

impl SecurityIdentifier {
    /// Decode a binary SID.
    ///
    /// The authority is read big-endian over bytes 1..=6 when byte 5 or 6 is
    /// nonzero, otherwise little-endian over bytes 1..=4.
    pub fn decode(bytes: &[u8]) -> ConnectorResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ConnectorError::SidDecode {
                message: format!(
                    "expected at least {HEADER_LEN} bytes, got {}",
                    bytes.len()
                ),
            });
        }

        let revision = bytes[0];
        let authority = if bytes[5] != 0 || bytes[6] != 0 {
            bytes[1..=6]
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
        } else {
            u64::from(u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]))
        };

        let count = usize::from(bytes[7]);
        let expected = HEADER_LEN + count * SUB_AUTHORITY_LEN;
        if bytes.len() < expected {
            return Err(ConnectorError::SidDecode {
                message: format!(
                    "{count} sub-authorities need {expected} bytes, got {}",
                    bytes.len()
                ),
            });
        }

        let sub_authorities = bytes[HEADER_LEN..expected]
            .chunks_exact(SUB_AUTHORITY_LEN)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// Relative identifier (last sub-authority), if any.
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }
}

impl fmt::Display for SecurityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

/// Decode a binary SID straight to its `S-R-A-S1-...` string form.
pub fn decode_sid_string(bytes: &[u8]) -> ConnectorResult<String> {
    SecurityIdentifier::decode(bytes).map(|sid| sid.to_string())
}

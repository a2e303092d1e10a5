//! Content identities for opaque leaves

use std::fmt;
use std::str::FromStr;

const LEN: usize = 32;

/// Blake3 digest identifying an opaque leaf
///
/// Displays and parses as 64 lowercase hex characters; this is the form
/// used in saved files and sidecar entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; LEN]);

impl ContentHash {
    /// Digest of a single byte string
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of several parts, each prefixed with its length
    ///
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    #[must_use]
    pub fn compute_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Raw digest
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; LEN] {
        &self.0
    }

    /// First 16 hex characters, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; LEN];
        if text.len() != LEN * 2 {
            return Err(HashError::Length(text.len()));
        }
        hex::decode_to_slice(text, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// A string that is not a content hash
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HashError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

//! # Content Digest
//!
//! SHA-256 digests of whole cartridge files, plus the lowercase-hex helpers
//! used wherever bytes cross a text boundary (JSON-RPC payloads, cache file
//! names, manifests).
//!
//! A cartridge header carries the raw 32-byte digest of the original file.
//! Verification after reassembly compares digests case-insensitively when a
//! caller only holds the hex form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::FormatError;

/// A SHA-256 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap a raw 32-byte digest.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 64-character hex digest. Either case is accepted.
    pub fn from_hex(s: &str) -> Result<Self, FormatError> {
        let raw = from_hex(s)?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| FormatError::InvalidHex(format!("expected 32 bytes, got {}", raw.len())))?;
        Ok(Self(bytes))
    }

    /// Case-insensitive comparison against a hex digest.
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(hex.trim())
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of a byte slice.
pub fn sha256_digest(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest(bytes)
}

/// Encode bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string. An optional `0x` prefix and either case are accepted.
pub fn from_hex(s: &str) -> Result<Vec<u8>, FormatError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err(FormatError::InvalidHex(format!(
            "odd length {}",
            s.len()
        )));
    }
    if !s.is_ascii() {
        return Err(FormatError::InvalidHex("non-ASCII input".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| FormatError::InvalidHex(format!("bad byte \"{}\"", &s[i..i + 2])))
        })
        .collect()
}

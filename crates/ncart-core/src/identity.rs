//! # Ledger Identities
//!
//! A ledger identity is a 20-byte address with an IBAN-style human-readable
//! form: the `NQ` prefix, two ISO 7064 MOD 97-10 check digits, and 32 symbols
//! of a custom base32 alphabet that encodes exactly 160 bits.
//!
//! ```text
//! NQ 15 NXMP11A0TMKPG1Q84ABDU16CXD6QD948
//! ^^ ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! |  |  body: 20 bytes as a big-endian 160-bit integer, 5 bits per symbol
//! |  check digits: 98 - (body ++ "NQ00" mod 97)
//! prefix
//! ```
//!
//! ## Checksum Policy
//!
//! Decoding checks the prefix, the body length and the alphabet. Whether
//! the check digits must verify is a caller decision expressed through
//! [`ChecksumPolicy`]; the default is [`ChecksumPolicy::Lenient`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FormatError;

/// Two-letter network prefix of every identity string.
pub const ADDRESS_PREFIX: &str = "NQ";

/// Base32 alphabet: digits and uppercase letters without I, O, W and Z.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKLMNPQRSTUVXY";

/// Number of body symbols (160 bits / 5).
const BODY_LEN: usize = 32;

/// Whether identity decoding verifies the check digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Accept any check digits. The ledger backend remains the authority.
    #[default]
    Lenient,
    /// Reject strings whose check digits do not verify.
    Strict,
}

/// A 20-byte ledger identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; 20]);

impl Identity {
    /// Byte length of an identity.
    pub const LEN: usize = 20;

    /// Wrap raw identity bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Decode a human-readable identity string.
    ///
    /// Whitespace is ignored and lowercase is accepted.
    pub fn parse(s: &str, policy: ChecksumPolicy) -> Result<Self, FormatError> {
        let normalized = normalize_address(s);
        let chars: Vec<char> = normalized.chars().collect();

        if chars.len() < 2 || chars[0] != 'N' || chars[1] != 'Q' {
            return Err(FormatError::InvalidPrefix(s.to_string()));
        }
        let body_len = chars.len().saturating_sub(4);
        if chars.len() < 4 || body_len != BODY_LEN {
            return Err(FormatError::InvalidLength(body_len));
        }

        let check: String = chars[2..4].iter().collect();
        let body = &chars[4..];
        let bytes = decode_body(body)?;

        if policy == ChecksumPolicy::Strict {
            if !check.chars().all(|c| c.is_ascii_digit()) {
                return Err(FormatError::InvalidCheckDigits(check));
            }
            let body_str: String = body.iter().collect();
            let computed = check_digits(&body_str);
            if computed != check {
                return Err(FormatError::ChecksumMismatch {
                    found: check,
                    computed,
                });
            }
        }

        Ok(Self(bytes))
    }

    /// Render the compact form: `NQ` + check digits + 32 body symbols.
    pub fn to_user_friendly(&self) -> String {
        let body = encode_body(&self.0);
        let check = check_digits(&body);
        format!("{ADDRESS_PREFIX}{check}{body}")
    }

    /// Render the compact form in nine space-separated groups of four.
    pub fn to_spaced(&self) -> String {
        let compact = self.to_user_friendly();
        compact
            .as_bytes()
            .chunks(4)
            .map(|group| String::from_utf8_lossy(group).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether an address string, as reported by a ledger backend, names
    /// this identity. Comparison ignores whitespace and case.
    pub fn matches(&self, address: &str) -> bool {
        normalize_address(address) == self.to_user_friendly()
    }
}

impl FromStr for Identity {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, ChecksumPolicy::Lenient)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_friendly())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_user_friendly())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Strip all whitespace and uppercase an address string.
pub fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Compute the two MOD 97-10 check digits for a base32 body.
///
/// The checked string is `<body>NQ00`; digits map to themselves and letters
/// to their ASCII code minus 55 (A=10 .. Z=35).
pub fn check_digits(body: &str) -> String {
    let mut remainder: u32 = 0;
    for c in body.chars().chain("NQ00".chars()) {
        let value = match c.to_digit(10) {
            Some(d) => d,
            None => (c as u32).saturating_sub(55),
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    format!("{:02}", 98 - remainder)
}

fn encode_body(bytes: &[u8; 20]) -> String {
    let mut out = String::with_capacity(BODY_LEN);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &b in bytes {
        buffer = (buffer << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            let index = (buffer >> (bits - 5)) & 0x1f;
            out.push(char::from(ALPHABET[index as usize]));
            bits -= 5;
            buffer &= (1 << bits) - 1;
        }
    }
    out
}

fn decode_body(body: &[char]) -> Result<[u8; 20], FormatError> {
    let mut out = [0u8; 20];
    let mut written = 0;
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for (position, &symbol) in body.iter().enumerate() {
        let value = symbol_value(symbol).ok_or(FormatError::InvalidSymbol { symbol, position })?;
        buffer = (buffer << 5) | value;
        bits += 5;
        while bits >= 8 {
            out[written] = ((buffer >> (bits - 8)) & 0xff) as u8;
            written += 1;
            bits -= 8;
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

fn symbol_value(symbol: char) -> Option<u32> {
    if !symbol.is_ascii() {
        return None;
    }
    ALPHABET
        .iter()
        .position(|&c| c == symbol as u8)
        .map(|p| p as u32)
}

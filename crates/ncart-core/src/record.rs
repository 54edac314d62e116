//! # Fixed-Layout Records
//!
//! Every record travels as exactly 64 bytes of transaction payload. The
//! first four bytes are an ASCII tag naming the kind; multi-byte integers
//! are little-endian; reserved regions are always written as zero.
//!
//! | Tag | Layout |
//! |---|---|
//! | `CART` | 4 schema, 5 platform, 6 chunk size, 7 flags, 8 cartridge id (u32), 12 total size (u64), 20 sha256 (32), 52 reserved |
//! | `DATA` | 4 cartridge id (u32), 8 chunk index (u32), 12 len, 13 bytes (51) |
//! | `CENT` | 4 schema, 5 platform, 6 flags, 7 app id (u32), 11 semver (3), 14 cartridge address (20), 34 title (16, NUL padded), 50 reserved |
//!
//! ## Probing
//!
//! A transaction payload may be any of the three kinds, or something else
//! entirely. Decoding a payload of the wrong kind yields
//! [`CodecError::DecodeMismatch`], which callers treat as "try the next
//! kind" rather than a failure. [`Record::detect`] does exactly that.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::CodecError;
use crate::identity::Identity;

/// Size of every record payload.
pub const PAYLOAD_SIZE: usize = 64;

/// Maximum chunk bytes a DATA record can carry.
pub const DATA_CAPACITY: usize = 51;

/// Default chunk size for new cartridges.
pub const DEFAULT_CHUNK_SIZE: u8 = 51;

/// Record schema version written by this crate.
pub const SCHEMA_VERSION: u8 = 1;

/// Maximum stored title length in bytes. The 16th byte is the terminator.
pub const TITLE_MAX_BYTES: usize = 15;

/// Tag of a cartridge header record.
pub const MAGIC_CART: &[u8; 4] = b"CART";
/// Tag of a data chunk record.
pub const MAGIC_DATA: &[u8; 4] = b"DATA";
/// Tag of a catalog entry record.
pub const MAGIC_CENT: &[u8; 4] = b"CENT";

const TITLE_OFFSET: usize = 34;
const TITLE_FIELD: usize = 16;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Target platform of a cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Platform {
    /// MS-DOS program.
    #[default]
    Dos,
    /// Game Boy ROM.
    Gb,
    /// Game Boy Color ROM.
    Gbc,
    /// NES ROM.
    Nes,
    /// A code this crate does not know. Kept so foreign records still decode.
    Unknown(u8),
}

impl Platform {
    /// Wire code of the platform.
    pub fn code(self) -> u8 {
        match self {
            Self::Dos => 0,
            Self::Gb => 1,
            Self::Gbc => 2,
            Self::Nes => 3,
            Self::Unknown(code) => code,
        }
    }

    /// Platform for a wire code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Dos,
            1 => Self::Gb,
            2 => Self::Gbc,
            3 => Self::Nes,
            other => Self::Unknown(other),
        }
    }

    /// Short uppercase name.
    pub fn name(self) -> String {
        match self {
            Self::Dos => "DOS".into(),
            Self::Gb => "GB".into(),
            Self::Gbc => "GBC".into(),
            Self::Nes => "NES".into(),
            Self::Unknown(code) => format!("UNKNOWN({code})"),
        }
    }
}

impl From<u8> for Platform {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<Platform> for u8 {
    fn from(platform: Platform) -> Self {
        platform.code()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Platform {
    type Err = CodecError;

    /// Accepts a platform name (any case), a numeric code, or the
    /// `UNKNOWN(code)` form produced by [`Platform::name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let code = upper
            .strip_prefix("UNKNOWN(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);
        match upper.as_str() {
            "DOS" => Ok(Self::Dos),
            "GB" => Ok(Self::Gb),
            "GBC" => Ok(Self::Gbc),
            "NES" => Ok(Self::Nes),
            _ => code
                .parse::<u8>()
                .map(Self::from_code)
                .map_err(|_| CodecError::OutOfRange {
                    field: "platform",
                    value: s.to_string(),
                    reason: "expected DOS, GB, GBC, NES or a code 0-255".into(),
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// Semver
// ---------------------------------------------------------------------------

/// Three-component version, each component 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Semver {
    /// Major component.
    pub major: u8,
    /// Minor component.
    pub minor: u8,
    /// Patch component.
    pub patch: u8,
}

impl Semver {
    /// Construct a version.
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Semver {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(CodecError::OutOfRange {
                field: "semver",
                value: s.to_string(),
                reason: "expected major.minor.patch".into(),
            });
        }
        let mut out = [0u8; 3];
        for (slot, part) in out.iter_mut().zip(&parts) {
            let component = parse_unsigned("semver", part)
                .ok()
                .and_then(|v| u8::try_from(v).ok());
            *slot = component.ok_or_else(|| CodecError::OutOfRange {
                field: "semver",
                value: s.to_string(),
                reason: format!("component \"{part}\" must be an integer 0-255"),
            })?;
        }
        Ok(Self::new(out[0], out[1], out[2]))
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

fn check_frame(payload: &[u8], magic: &[u8; 4], kind: &'static str) -> Result<(), CodecError> {
    if payload.len() < PAYLOAD_SIZE {
        return Err(CodecError::DecodeMismatch {
            expected: kind,
            reason: format!("payload is {} bytes (need {PAYLOAD_SIZE})", payload.len()),
        });
    }
    if &payload[0..4] != magic {
        return Err(CodecError::DecodeMismatch {
            expected: kind,
            reason: format!("tag {:?}", String::from_utf8_lossy(&payload[0..4])),
        });
    }
    Ok(())
}

fn read_u32(payload: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&payload[at..at + 4]);
    u32::from_le_bytes(b)
}

fn read_u64(payload: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&payload[at..at + 8]);
    u64::from_le_bytes(b)
}

/// Truncate a title to at most [`TITLE_MAX_BYTES`] bytes on a char boundary.
pub fn truncate_title(title: &str) -> &str {
    if title.len() <= TITLE_MAX_BYTES {
        return title;
    }
    let mut end = TITLE_MAX_BYTES;
    while !title.is_char_boundary(end) {
        end -= 1;
    }
    &title[..end]
}

// ---------------------------------------------------------------------------
// CART
// ---------------------------------------------------------------------------

/// Cartridge header. One per cartridge, submitted after all its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeHeader {
    /// Record schema version.
    pub schema: u8,
    /// Target platform.
    pub platform: Platform,
    /// Bytes per chunk (the last chunk may be shorter).
    pub chunk_size: u8,
    /// Reserved flag bits.
    pub flags: u8,
    /// Caller-chosen cartridge id.
    pub cartridge_id: u32,
    /// Length of the original file.
    pub total_size: u64,
    /// Digest of the original file.
    pub sha256: ContentDigest,
}

impl CartridgeHeader {
    /// Encode into a 64-byte payload.
    pub fn encode(&self) -> [u8; PAYLOAD_SIZE] {
        let mut out = [0u8; PAYLOAD_SIZE];
        out[0..4].copy_from_slice(MAGIC_CART);
        out[4] = self.schema;
        out[5] = self.platform.code();
        out[6] = self.chunk_size;
        out[7] = self.flags;
        out[8..12].copy_from_slice(&self.cartridge_id.to_le_bytes());
        out[12..20].copy_from_slice(&self.total_size.to_le_bytes());
        out[20..52].copy_from_slice(self.sha256.as_bytes());
        out
    }

    /// Decode a 64-byte payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        check_frame(payload, MAGIC_CART, "CART")?;
        let mut sha = [0u8; 32];
        sha.copy_from_slice(&payload[20..52]);
        Ok(Self {
            schema: payload[4],
            platform: Platform::from_code(payload[5]),
            chunk_size: payload[6],
            flags: payload[7],
            cartridge_id: read_u32(payload, 8),
            total_size: read_u64(payload, 12),
            sha256: ContentDigest::new(sha),
        })
    }

    /// Chunk geometry declared by this header.
    pub fn chunk_plan(&self) -> crate::chunk::ChunkPlan {
        crate::chunk::ChunkPlan::new(self.total_size, usize::from(self.chunk_size))
    }
}

// ---------------------------------------------------------------------------
// DATA
// ---------------------------------------------------------------------------

/// One chunk of a cartridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChunk {
    /// Cartridge this chunk belongs to.
    pub cartridge_id: u32,
    /// Zero-based position of the chunk.
    pub chunk_index: u32,
    /// Chunk bytes.
    pub bytes: Vec<u8>,
}

impl DataChunk {
    /// Encode into a 64-byte payload.
    ///
    /// Fails with [`CodecError::PayloadTooLarge`] when the bytes exceed
    /// `chunk_size` or the record capacity, whichever is smaller.
    pub fn encode(&self, chunk_size: usize) -> Result<[u8; PAYLOAD_SIZE], CodecError> {
        let max = chunk_size.min(DATA_CAPACITY);
        if self.bytes.len() > max {
            return Err(CodecError::PayloadTooLarge {
                len: self.bytes.len(),
                max,
            });
        }
        let mut out = [0u8; PAYLOAD_SIZE];
        out[0..4].copy_from_slice(MAGIC_DATA);
        out[4..8].copy_from_slice(&self.cartridge_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.chunk_index.to_le_bytes());
        // len <= 51 here, so the cast is lossless.
        out[12] = self.bytes.len() as u8;
        out[13..13 + self.bytes.len()].copy_from_slice(&self.bytes);
        Ok(out)
    }

    /// Decode a 64-byte payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        check_frame(payload, MAGIC_DATA, "DATA")?;
        let len = usize::from(payload[12]);
        if len > DATA_CAPACITY {
            return Err(CodecError::DecodeMismatch {
                expected: "DATA",
                reason: format!("declared len {len} exceeds {DATA_CAPACITY}"),
            });
        }
        if payload.len() < 13 + len {
            return Err(CodecError::DecodeMismatch {
                expected: "DATA",
                reason: format!("payload too short for len {len}"),
            });
        }
        Ok(Self {
            cartridge_id: read_u32(payload, 4),
            chunk_index: read_u32(payload, 8),
            bytes: payload[13..13 + len].to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// CENT
// ---------------------------------------------------------------------------

/// Catalog entry announcing one published cartridge version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Record schema version.
    pub schema: u8,
    /// Target platform.
    pub platform: Platform,
    /// Reserved flag bits.
    pub flags: u8,
    /// Application id, stable across versions of one title.
    pub app_id: u32,
    /// Published version.
    pub semver: Semver,
    /// Identity holding the cartridge's records.
    pub cartridge_address: Identity,
    /// Short title, at most 15 bytes on the wire.
    pub title: String,
}

impl CatalogEntry {
    /// Encode into a 64-byte payload. Longer titles are truncated.
    pub fn encode(&self) -> [u8; PAYLOAD_SIZE] {
        let mut out = [0u8; PAYLOAD_SIZE];
        out[0..4].copy_from_slice(MAGIC_CENT);
        out[4] = self.schema;
        out[5] = self.platform.code();
        out[6] = self.flags;
        out[7..11].copy_from_slice(&self.app_id.to_le_bytes());
        out[11] = self.semver.major;
        out[12] = self.semver.minor;
        out[13] = self.semver.patch;
        out[14..34].copy_from_slice(self.cartridge_address.as_bytes());
        let title = truncate_title(&self.title).as_bytes();
        out[TITLE_OFFSET..TITLE_OFFSET + title.len()].copy_from_slice(title);
        out
    }

    /// Decode a 64-byte payload. The title ends at the first NUL byte.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        check_frame(payload, MAGIC_CENT, "CENT")?;
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&payload[14..34]);
        let field = &payload[TITLE_OFFSET..TITLE_OFFSET + TITLE_FIELD];
        let end = field.iter().position(|&b| b == 0).unwrap_or(TITLE_FIELD);
        Ok(Self {
            schema: payload[4],
            platform: Platform::from_code(payload[5]),
            flags: payload[6],
            app_id: read_u32(payload, 7),
            semver: Semver::new(payload[11], payload[12], payload[13]),
            cartridge_address: Identity::from_bytes(addr),
            title: String::from_utf8_lossy(&field[..end]).into_owned(),
        })
    }

    /// Whether the stored title equals `query` once both are trimmed,
    /// lowercased, and the query is truncated the way titles are stored.
    pub fn title_matches(&self, query: &str) -> bool {
        let wanted = truncate_title(query.trim()).trim().to_lowercase();
        !wanted.is_empty() && self.title.trim().to_lowercase() == wanted
    }
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Any decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A cartridge header.
    Cart(CartridgeHeader),
    /// A data chunk.
    Data(DataChunk),
    /// A catalog entry.
    Cent(CatalogEntry),
}

impl Record {
    /// Try each record kind in turn. `None` when the payload is none of them.
    pub fn detect(payload: &[u8]) -> Option<Self> {
        if let Ok(h) = CartridgeHeader::decode(payload) {
            return Some(Self::Cart(h));
        }
        if let Ok(d) = DataChunk::decode(payload) {
            return Some(Self::Data(d));
        }
        CatalogEntry::decode(payload).ok().map(Self::Cent)
    }

    /// Four-letter tag of the record.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cart(_) => "CART",
            Self::Data(_) => "DATA",
            Self::Cent(_) => "CENT",
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric text fields
// ---------------------------------------------------------------------------

fn parse_unsigned(field: &'static str, text: &str) -> Result<u64, CodecError> {
    let t = text.trim();
    let reject = |reason: &str| CodecError::OutOfRange {
        field,
        value: text.to_string(),
        reason: reason.to_string(),
    };
    if t.is_empty() {
        return Err(reject("empty"));
    }
    if t.starts_with('-') {
        return Err(reject("negative"));
    }
    if t.contains(['.', 'e', 'E']) {
        return Err(reject("fractional"));
    }
    if !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(reject("not a decimal integer"));
    }
    t.parse::<u64>().map_err(|_| reject("exceeds 64 bits"))
}

/// Parse a decimal `u32` field such as a cartridge id, app id or chunk index.
///
/// Negative, fractional and wider-than-32-bit values are rejected rather
/// than wrapped.
pub fn parse_u32_field(field: &'static str, text: &str) -> Result<u32, CodecError> {
    let v = parse_unsigned(field, text)?;
    u32::try_from(v).map_err(|_| CodecError::OutOfRange {
        field,
        value: text.to_string(),
        reason: "exceeds 32 bits".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256_digest;

    fn sample_header() -> CartridgeHeader {
        CartridgeHeader {
            schema: SCHEMA_VERSION,
            platform: Platform::Gb,
            chunk_size: DEFAULT_CHUNK_SIZE,
            flags: 0,
            cartridge_id: 0xdead_beef,
            total_size: 130,
            sha256: sha256_digest(b"abc"),
        }
    }

    fn sample_entry() -> CatalogEntry {
        CatalogEntry {
            schema: SCHEMA_VERSION,
            platform: Platform::Nes,
            flags: 0,
            app_id: 42,
            semver: Semver::new(1, 2, 3),
            cartridge_address: Identity::from_bytes([7u8; 20]),
            title: "Tetris".into(),
        }
    }

    #[test]
    fn cart_layout_is_little_endian() {
        let bytes = sample_header().encode();
        assert_eq!(&bytes[0..4], b"CART");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 1);
        assert_eq!(bytes[6], 51);
        assert_eq!(&bytes[8..12], &[0xef, 0xbe, 0xad, 0xde]);
        assert_eq!(&bytes[12..20], &[130, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[20..52], sha256_digest(b"abc").as_bytes());
        assert!(bytes[52..].iter().all(|&b| b == 0));
    }

    #[test]
    fn cart_roundtrip() {
        let h = sample_header();
        assert_eq!(CartridgeHeader::decode(&h.encode()).unwrap(), h);
    }

    #[test]
    fn cart_decode_rejects_short_and_wrong_tag() {
        let bytes = sample_header().encode();
        assert!(matches!(
            CartridgeHeader::decode(&bytes[..63]),
            Err(CodecError::DecodeMismatch { expected: "CART", .. })
        ));
        let data = DataChunk {
            cartridge_id: 1,
            chunk_index: 0,
            bytes: vec![1],
        }
        .encode(51)
        .unwrap();
        assert!(CartridgeHeader::decode(&data).is_err());
    }

    #[test]
    fn data_layout() {
        let chunk = DataChunk {
            cartridge_id: 5,
            chunk_index: 258,
            bytes: vec![0xaa; 28],
        };
        let bytes = chunk.encode(51).unwrap();
        assert_eq!(&bytes[0..4], b"DATA");
        assert_eq!(&bytes[4..8], &[5, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[2, 1, 0, 0]);
        assert_eq!(bytes[12], 28);
        assert!(bytes[13..41].iter().all(|&b| b == 0xaa));
        assert!(bytes[41..].iter().all(|&b| b == 0));
        assert_eq!(DataChunk::decode(&bytes).unwrap(), chunk);
    }

    #[test]
    fn data_encode_rejects_oversized_chunk() {
        let chunk = DataChunk {
            cartridge_id: 1,
            chunk_index: 0,
            bytes: vec![0; 52],
        };
        assert_eq!(
            chunk.encode(51).unwrap_err(),
            CodecError::PayloadTooLarge { len: 52, max: 51 }
        );
        let small = DataChunk {
            bytes: vec![0; 33],
            ..chunk
        };
        assert_eq!(
            small.encode(32).unwrap_err(),
            CodecError::PayloadTooLarge { len: 33, max: 32 }
        );
    }

    #[test]
    fn data_decode_rejects_len_52() {
        let mut bytes = [0u8; 64];
        bytes[0..4].copy_from_slice(b"DATA");
        bytes[12] = 52;
        assert!(matches!(
            DataChunk::decode(&bytes),
            Err(CodecError::DecodeMismatch { expected: "DATA", .. })
        ));
        assert!(Record::detect(&bytes).is_none());
    }

    #[test]
    fn cent_layout_and_roundtrip() {
        let e = sample_entry();
        let bytes = e.encode();
        assert_eq!(&bytes[0..4], b"CENT");
        assert_eq!(bytes[5], 3);
        assert_eq!(&bytes[7..11], &[42, 0, 0, 0]);
        assert_eq!(&bytes[11..14], &[1, 2, 3]);
        assert_eq!(&bytes[14..34], &[7u8; 20]);
        assert_eq!(&bytes[34..40], b"Tetris");
        assert!(bytes[40..].iter().all(|&b| b == 0));
        assert_eq!(CatalogEntry::decode(&bytes).unwrap(), e);
    }

    #[test]
    fn cent_title_truncated_to_fifteen_bytes() {
        let e = CatalogEntry {
            title: "ABCDEFGHIJKLMNOP".into(),
            ..sample_entry()
        };
        let bytes = e.encode();
        assert_eq!(bytes[49], 0);
        let back = CatalogEntry::decode(&bytes).unwrap();
        assert_eq!(back.title, "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn truncate_title_respects_char_boundary() {
        // 14 ASCII bytes + a 2-byte char straddles the limit.
        let t = "ABCDEFGHIJKLMNé";
        assert_eq!(truncate_title(t), "ABCDEFGHIJKLMN");
        assert_eq!(truncate_title("short"), "short");
    }

    #[test]
    fn title_matching_is_trimmed_and_case_insensitive() {
        let e = CatalogEntry {
            title: "ABCDEFGHIJKLMNO".into(),
            ..sample_entry()
        };
        assert!(e.title_matches("  abcdefghijklmno "));
        assert!(e.title_matches("ABCDEFGHIJKLMNOP"));
        assert!(!e.title_matches("ABCDEFG"));
        assert!(!e.title_matches("   "));
    }

    #[test]
    fn detect_identifies_each_kind() {
        let cart = sample_header().encode();
        let cent = sample_entry().encode();
        let data = DataChunk {
            cartridge_id: 1,
            chunk_index: 2,
            bytes: vec![9],
        }
        .encode(51)
        .unwrap();
        assert_eq!(Record::detect(&cart).map(|r| r.tag()), Some("CART"));
        assert_eq!(Record::detect(&data).map(|r| r.tag()), Some("DATA"));
        assert_eq!(Record::detect(&cent).map(|r| r.tag()), Some("CENT"));
        assert!(Record::detect(b"hello").is_none());
        assert!(Record::detect(&[0u8; 64]).is_none());
    }

    #[test]
    fn unknown_platform_survives_decode() {
        let mut bytes = sample_header().encode();
        bytes[5] = 9;
        let h = CartridgeHeader::decode(&bytes).unwrap();
        assert_eq!(h.platform, Platform::Unknown(9));
        assert_eq!(h.encode()[5], 9);
    }

    #[test]
    fn platform_parse() {
        assert_eq!("gbc".parse::<Platform>().unwrap(), Platform::Gbc);
        assert_eq!("3".parse::<Platform>().unwrap(), Platform::Nes);
        assert!("amiga".parse::<Platform>().is_err());
        assert_eq!(Platform::Dos.to_string(), "DOS");
        let foreign = Platform::Unknown(9);
        assert_eq!(foreign.to_string().parse::<Platform>().unwrap(), foreign);
        assert!("UNKNOWN(300)".parse::<Platform>().is_err());
    }

    #[test]
    fn semver_parse() {
        assert_eq!("1.0.255".parse::<Semver>().unwrap(), Semver::new(1, 0, 255));
        assert!("1.0".parse::<Semver>().is_err());
        assert!("1.0.256".parse::<Semver>().is_err());
        assert!("1.-1.0".parse::<Semver>().is_err());
        assert!("1.+1.0".parse::<Semver>().is_err());
        assert_eq!(Semver::new(2, 1, 0).to_string(), "2.1.0");
    }

    #[test]
    fn numeric_fields_reject_instead_of_wrapping() {
        assert_eq!(parse_u32_field("app_id", "4294967295").unwrap(), u32::MAX);
        assert!(parse_u32_field("app_id", "4294967296").is_err());
        assert!(parse_u32_field("app_id", "-1").is_err());
        assert!(parse_u32_field("app_id", "1.5").is_err());
        assert!(parse_u32_field("app_id", "").is_err());
        assert!(parse_u32_field("app_id", "0x10").is_err());
        assert_eq!(parse_u32_field("app_id", " 130 ").unwrap(), 130);
    }
}

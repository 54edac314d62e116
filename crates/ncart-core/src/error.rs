//! # Error Hierarchy
//!
//! Structured error types for the cartridge transport core, built with
//! `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Each error carries the diagnostic context a caller needs to decide what
//! to do next: the offending symbol, the declared length, the number of
//! chunks found versus expected. A retry should never have to guess.

use thiserror::Error;

/// Top-level error type for the core crate.
#[derive(Error, Debug)]
pub enum CartError {
    /// Malformed identity string.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Record encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Chunk set could not be assembled.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// Assembled bytes do not match the declared digest.
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Errors decoding a human-readable identity string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The string does not start with the two-letter network prefix.
    #[error("invalid address prefix in \"{0}\" (expected NQ)")]
    InvalidPrefix(String),

    /// The body after prefix and check digits is not exactly 32 symbols.
    #[error("invalid address body length: {0} symbols (expected 32)")]
    InvalidLength(usize),

    /// A body symbol is outside the 32-symbol alphabet.
    #[error("invalid base32 symbol {symbol:?} at position {position}")]
    InvalidSymbol {
        /// The rejected character.
        symbol: char,
        /// Zero-based position within the body.
        position: usize,
    },

    /// The check digits are not two decimal digits.
    #[error("invalid check digits \"{0}\"")]
    InvalidCheckDigits(String),

    /// Strict parsing only: the check digits do not verify.
    #[error("address checksum mismatch: found {found}, computed {computed}")]
    ChecksumMismatch {
        /// Check digits present in the string.
        found: String,
        /// Check digits computed from the body.
        computed: String,
    },

    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Errors from the fixed-layout record codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload is not a record of the expected kind. Not fatal: callers
    /// try the next record kind.
    #[error("payload is not a {expected} record: {reason}")]
    DecodeMismatch {
        /// The record tag that was expected.
        expected: &'static str,
        /// Why the payload was rejected.
        reason: String,
    },

    /// Chunk bytes exceed the configured chunk size.
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual byte length.
        len: usize,
        /// Maximum permitted.
        max: usize,
    },

    /// A numeric field value is negative, fractional, or wider than its field.
    #[error("{field} out of range: \"{value}\" ({reason})")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// The rejected input as given.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Errors assembling an index-keyed chunk set into the original bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// One or more chunk indices are missing.
    #[error("incomplete data: {found}/{expected} chunks found, cannot reconstruct yet")]
    IncompleteData {
        /// Distinct in-range indices present.
        found: usize,
        /// Indices required for a complete cartridge.
        expected: usize,
    },

    /// The concatenated bytes disagree with the declared total size.
    #[error("size mismatch: assembled {actual} bytes, header declares {expected}")]
    SizeMismatch {
        /// Declared total size.
        expected: u64,
        /// Actual concatenated length.
        actual: u64,
    },

    /// A chunk index lies outside `0..expected`.
    #[error("unexpected chunk index {index} (expected 0..{expected})")]
    UnexpectedIndex {
        /// The out-of-range index.
        index: u32,
        /// The expected chunk count.
        expected: usize,
    },

    /// The chunk size is zero, so no chunk count can be derived.
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Digest mismatch after reassembly.
///
/// The assembled bytes travel with the error so a caller can inspect or
/// discard them and purge any cached copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sha256 mismatch: expected {expected}, computed {actual}")]
pub struct IntegrityError {
    /// Lowercase hex digest declared by the header.
    pub expected: String,
    /// Lowercase hex digest of the assembled bytes.
    pub actual: String,
    /// The assembled bytes that failed verification.
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_invalid_symbol_display() {
        let err = FormatError::InvalidSymbol {
            symbol: 'I',
            position: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("'I'"));
        assert!(msg.contains("position 3"));
    }

    #[test]
    fn codec_error_payload_too_large_display() {
        let err = CodecError::PayloadTooLarge { len: 52, max: 51 };
        let msg = format!("{err}");
        assert!(msg.contains("52"));
        assert!(msg.contains("51"));
    }

    #[test]
    fn incomplete_data_reports_counts() {
        let err = ReassemblyError::IncompleteData {
            found: 47,
            expected: 212,
        };
        assert!(format!("{err}").contains("47/212 chunks found"));
    }

    #[test]
    fn integrity_error_keeps_bytes() {
        let err = IntegrityError {
            expected: "aa".into(),
            actual: "bb".into(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(err.bytes, vec![1, 2, 3]);
        let top = CartError::from(err);
        assert!(format!("{top}").contains("integrity error"));
    }

    #[test]
    fn cart_error_from_conversions() {
        let e: CartError = FormatError::InvalidLength(3).into();
        assert!(matches!(e, CartError::Format(_)));
        let e: CartError = ReassemblyError::ZeroChunkSize.into();
        assert!(matches!(e, CartError::Reassembly(_)));
    }
}

//! # Pipeline Errors
//!
//! [`PipelineError`] is the terminal reason an upload or sync stopped.
//! Callers never see it alone: [`UploadFailure`] and [`SyncFailure`] pair it
//! with the progress reached, so a retry can be informed ("47/212 chunks
//! found, cannot reconstruct yet").

use ncart_cache::CacheError;
use ncart_core::{CodecError, FormatError, IntegrityError, ReassemblyError};
use ncart_ledger::LedgerError;
use thiserror::Error;

use crate::sync::SyncProgress;
use crate::upload::{UploadProgress, UploadStage};

/// Why a pipeline run stopped.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Consensus absent or sender account locked.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Too many consecutive chunk submissions failed.
    #[error("upload stopped: {consecutive} consecutive chunk failures (failed chunks: {failed_chunks:?})")]
    BudgetExceeded {
        /// Consecutive failures at abort.
        consecutive: usize,
        /// Every failed chunk index, in submission order.
        failed_chunks: Vec<u32>,
    },

    /// Chunks are missing. Transactions may not be confirmed yet.
    #[error("incomplete data: {found}/{expected} chunks found, cannot reconstruct yet")]
    IncompleteData {
        /// Distinct chunk indices found.
        found: usize,
        /// Chunks the header requires.
        expected: usize,
        /// Missing indices, lowest first, capped at
        /// [`MISSING_REPORT_LIMIT`](crate::sync::MISSING_REPORT_LIMIT).
        missing: Vec<u32>,
    },

    /// Reassembled length disagrees with the header.
    #[error("size mismatch: assembled {actual} bytes, header declares {expected}")]
    SizeMismatch {
        /// Declared total size.
        expected: u64,
        /// Assembled length.
        actual: u64,
    },

    /// Digest mismatch. Carries the assembled bytes.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// No cartridge header at the identity.
    #[error("no cartridge header found at {address} ({transactions} transactions scanned)")]
    HeaderNotFound {
        /// Cartridge identity, spaced form.
        address: String,
        /// Transactions examined.
        transactions: usize,
    },

    /// Ledger transport, status or RPC failure.
    #[error("network error: {0}")]
    Network(#[from] LedgerError),

    /// Record encode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Malformed identity or hex.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Cache store failure.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The request itself is unusable (empty file, title too long, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ReassemblyError> for PipelineError {
    fn from(err: ReassemblyError) -> Self {
        match err {
            ReassemblyError::IncompleteData { found, expected } => Self::IncompleteData {
                found,
                expected,
                missing: Vec::new(),
            },
            ReassemblyError::SizeMismatch { expected, actual } => {
                Self::SizeMismatch { expected, actual }
            }
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

/// An upload that stopped before completion.
///
/// Records already submitted stay on the ledger; a retry with the same
/// cartridge id adds chunks that reassembly deduplicates.
#[derive(Error, Debug)]
#[error("{error} [stage {failed_at}; {progress}]")]
pub struct UploadFailure {
    /// Terminal reason.
    #[source]
    pub error: PipelineError,
    /// Stage that was running when the error occurred.
    pub failed_at: UploadStage,
    /// Progress at the time of failure.
    pub progress: UploadProgress,
}

/// A sync that stopped before producing verified bytes.
#[derive(Error, Debug)]
#[error("{error} [{progress}]")]
pub struct SyncFailure {
    /// Terminal reason.
    #[source]
    pub error: PipelineError,
    /// Progress at the time of failure.
    pub progress: SyncProgress,
}

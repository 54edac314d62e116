//! # ncart-pipeline: Cartridge Upload and Sync
//!
//! Orchestration on top of the codec ([`ncart_core`]), the ledger interface
//! ([`ncart_ledger`]) and the cache ([`ncart_cache`]).
//!
//! - [`catalog`]: app id allocation and lookup over a catalog identity.
//! - [`rate_limit`]: minimum interval between submissions.
//! - [`upload`]: validate, encode, submit chunks, header, catalog entry.
//! - [`sync`]: fetch history (or follow a manifest), locate header, collect
//!   chunks, verify, cache.
//!
//! ## Concurrency
//!
//! One cooperative stream per run. Chunk submissions are strictly ordered,
//! page fetches are strictly sequential, and the chunk map and dedup set
//! belong to a single run. The cache is the only shared resource, and each
//! key is written at most once per successful verification.
//!
//! ## Partial Progress
//!
//! Runs never fail with a bare error. [`UploadFailure`] and [`SyncFailure`]
//! carry the progress reached so a retry can be informed.

pub mod catalog;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod sync;
pub mod upload;

pub use catalog::{timestamp_id, CatalogListing, CatalogScanner};
pub use config::{resolve_catalog, ScanDepth, SyncConfig, UploadConfig, MAIN_CATALOG, TEST_CATALOG};
pub use error::{PipelineError, SyncFailure, UploadFailure};
pub use rate_limit::RateLimiter;
pub use sync::{
    collect_chunks, header_defect, locate_header, CartridgeInfo, LocatedHeader, SyncOutcome,
    SyncPipeline, SyncProgress, SyncSource, SyncStage, MISSING_REPORT_LIMIT,
};
pub use upload::{
    CartridgeManifest, PlannedTransaction, PreparedUpload, RecordKind, TransactionPlan,
    UploadPipeline, UploadProgress, UploadReport, UploadRequest, UploadStage,
};

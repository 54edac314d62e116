//! # Pipeline Configuration
//!
//! Plain structs with `Default`. The CLI fills them from flags; tests build
//! them directly.
//!
//! | Setting | Default |
//! |---|---|
//! | upload rate | 25 tx/s |
//! | consecutive failure budget | 5 |
//! | chunk size | 51 bytes |
//! | catalog scan depth | 500 × 20 pages |
//! | sync page size | 500 |
//! | sync page ceiling | 100 |

use ncart_core::{ChecksumPolicy, FormatError, Identity, DEFAULT_CHUNK_SIZE};
use ncart_ledger::Pagination;

/// Well-known production catalog identity.
pub const MAIN_CATALOG: &str = "NQ15 NXMP 11A0 TMKP G1Q8 4ABD U16C XD6Q D948";

/// Well-known test catalog identity.
pub const TEST_CATALOG: &str = "NQ32 0VD4 26TR 1394 KXBJ 862C NFKG 61M5 GFJ0";

/// Largest file accepted for upload.
pub const MAX_CARTRIDGE_BYTES: usize = 6 * 1024 * 1024;

/// Longest title accepted for upload, in characters. Stored truncated to
/// 15 bytes.
pub const TITLE_MAX_CHARS: usize = 16;

/// Default submission rate in transactions per second.
pub const DEFAULT_RATE_PER_SEC: u32 = 25;

/// Default consecutive chunk failures tolerated before aborting.
pub const DEFAULT_FAILURE_BUDGET: usize = 5;

/// Default pace of by-hash chunk lookups during a manifest sync.
pub const DEFAULT_FETCH_RATE_PER_SEC: u32 = 10;

/// Resolve a catalog argument: `main`, `test`, or an address string.
pub fn resolve_catalog(arg: &str, policy: ChecksumPolicy) -> Result<Identity, FormatError> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "main" => Identity::parse(MAIN_CATALOG, policy),
        "test" => Identity::parse(TEST_CATALOG, policy),
        _ => Identity::parse(arg, policy),
    }
}

/// Bound on catalog history walked by identifier resolution and listing.
///
/// One bound is shared by next-app-id, find-by-title and listing so they
/// always see the same window. Catalogs with more than
/// `page_size * max_pages` transactions can yield a stale answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanDepth {
    /// Transactions per page.
    pub page_size: usize,
    /// Maximum pages walked.
    pub max_pages: usize,
}

impl Default for ScanDepth {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_pages: 20,
        }
    }
}

impl ScanDepth {
    /// Paging limits for this depth.
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page_size: self.page_size,
            max_pages: self.max_pages,
            ..Pagination::default()
        }
    }
}

/// Upload pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Submissions per second. `0` disables pacing.
    pub rate_per_sec: u32,
    /// Encode and log only. No preflight, no submission.
    pub dry_run: bool,
    /// Check consensus and sender unlock state before submitting.
    pub preflight: bool,
    /// Consecutive chunk failures that abort the upload.
    pub failure_budget: usize,
    /// Bytes per data chunk, 1-51.
    pub chunk_size: u8,
    /// Catalog window used to resolve the app id.
    pub catalog_scan: ScanDepth,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            dry_run: false,
            preflight: true,
            failure_budget: DEFAULT_FAILURE_BUDGET,
            chunk_size: DEFAULT_CHUNK_SIZE,
            catalog_scan: ScanDepth::default(),
        }
    }
}

/// Sync pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// History paging limits.
    pub pagination: Pagination,
    /// When set, only transactions sent by this identity are trusted.
    pub publisher: Option<Identity>,
    /// Lookups per second when fetching chunks by hash from a manifest.
    /// `0` disables pacing.
    pub fetch_rate_per_sec: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pagination: Pagination::default(),
            publisher: None,
            fetch_rate_per_sec: DEFAULT_FETCH_RATE_PER_SEC,
        }
    }
}

//! # Download/Sync Pipeline
//!
//! Rebuilds a cartridge from the transactions at its identity:
//!
//! 1. Fetch the full history (paginated, deduplicated by hash).
//! 2. Keep only the publisher's transactions when a publisher is configured.
//! 3. Find the header, scanning newest to oldest by height. The header is
//!    submitted last, so the newest end finds it quickest.
//! 4. Derive the expected chunk count from `total_size / chunk_size`.
//! 5. Collect `DATA` records for the header's cartridge id; the first
//!    occurrence of an index wins.
//! 6. Missing indices stop the run with `IncompleteData`. Transactions may
//!    simply be unconfirmed, so this is not treated as corruption.
//! 7. Reassemble, verify the digest, and store the bytes in the cache
//!    under `(cartridge_id, sha256)`.
//!
//! The cache is consulted as soon as the header is known: before step 1
//! for [`SyncPipeline::sync_with_header`], after step 3 for
//! [`SyncPipeline::sync`]. A cached copy that fails re-verification is
//! purged and the run falls through to full reconstruction.
//!
//! [`SyncPipeline::sync_from_manifest`] skips history entirely: the
//! manifest written at upload time lists every chunk's transaction hash,
//! and each one is looked up directly at a paced rate.
//!
//! ## Header admission
//!
//! Headers are untrusted input. One is only used when its chunk size fits
//! a `DATA` record (1-51), its total size is within the cartridge limit,
//! and its chunk count fits a `u32` index. Anything else is skipped in
//! favour of the next-older header.

use std::fmt;

use ncart_cache::{CacheKey, CacheMetadata, CartridgeCache};
use ncart_core::{
    reassemble, sha256_digest, verify, CartridgeHeader, ChunkMap, ChunkPlan, DataChunk, Identity,
    Record, DATA_CAPACITY,
};
use ncart_ledger::{fetch_all_transactions, History, Ledger, Transaction};
use serde::Serialize;

use crate::config::{SyncConfig, MAX_CARTRIDGE_BYTES};
use crate::error::{PipelineError, SyncFailure};
use crate::rate_limit::RateLimiter;
use crate::upload::CartridgeManifest;

/// Missing chunk indices reported by an incomplete sync, lowest first.
pub const MISSING_REPORT_LIMIT: usize = 1024;

/// Sync stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    /// Not started.
    #[default]
    Idle,
    /// Checking the cache for a verified copy.
    CacheLookup,
    /// Walking transaction history.
    Fetching,
    /// Searching for the header.
    LocatingHeader,
    /// Collecting data chunks.
    Collecting,
    /// Reassembling and checking the digest.
    Verifying,
    /// Verified bytes available. Terminal.
    Complete,
    /// Stopped by an error. Terminal.
    Error,
}

impl SyncStage {
    /// Whether no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CacheLookup => "cache_lookup",
            Self::Fetching => "fetching",
            Self::LocatingHeader => "locating_header",
            Self::Collecting => "collecting",
            Self::Verifying => "verifying",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable sync progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    /// Current stage.
    pub stage: SyncStage,
    /// History pages fetched.
    pub pages: usize,
    /// Unique trusted transactions retrieved.
    pub transactions: usize,
    /// Distinct chunk indices found for the cartridge.
    pub chunks_found: usize,
    /// Chunks the header requires.
    pub chunks_expected: usize,
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} chunks found, {} transactions over {} pages",
            self.chunks_found, self.chunks_expected, self.transactions, self.pages
        )
    }
}

/// Where verified bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    /// A cached copy that passed re-verification.
    Cache,
    /// Reconstructed from ledger records.
    Ledger,
}

/// A verified cartridge.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The header the bytes were verified against.
    pub header: CartridgeHeader,
    /// Verified cartridge bytes.
    pub bytes: Vec<u8>,
    /// Origin of the bytes.
    pub source: SyncSource,
    /// Final progress.
    pub progress: SyncProgress,
}

impl SyncOutcome {
    /// Cache key of this cartridge.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.header.cartridge_id, self.header.sha256)
    }
}

/// A header and the transaction carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedHeader {
    /// Decoded header.
    pub header: CartridgeHeader,
    /// Carrying transaction.
    pub tx_hash: String,
    /// Block height.
    pub height: u64,
}

/// Summary of a cartridge identity without reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartridgeInfo {
    /// Inspected identity.
    pub address: Identity,
    /// Newest header, if any.
    pub header: Option<LocatedHeader>,
    /// History pages fetched.
    pub pages: usize,
    /// Whether history was truncated by the page ceiling.
    pub hit_page_ceiling: bool,
    /// Trusted transactions examined.
    pub transactions: usize,
    /// `CART` records.
    pub cart_records: usize,
    /// `DATA` records, any cartridge id, duplicates included.
    pub data_records: usize,
    /// Anything else.
    pub other_records: usize,
    /// Distinct in-range chunk indices for the header's cartridge id.
    pub chunks_found: usize,
    /// Chunks the header requires.
    pub chunks_expected: usize,
}

impl CartridgeInfo {
    /// Whether a header exists and every chunk it requires is present.
    pub fn is_complete(&self) -> bool {
        self.header.is_some() && self.chunks_found == self.chunks_expected
    }
}

/// Why `header` cannot describe a cartridge this pipeline rebuilds, or
/// `None` when it can.
pub fn header_defect(header: &CartridgeHeader) -> Option<&'static str> {
    if header.chunk_size == 0 || usize::from(header.chunk_size) > DATA_CAPACITY {
        return Some("chunk size outside 1-51");
    }
    if header.total_size > MAX_CARTRIDGE_BYTES as u64 {
        return Some("total size above the cartridge limit");
    }
    match header.chunk_plan().expected_chunks() {
        Ok(n) if u32::try_from(n).is_ok() => None,
        _ => Some("chunk count does not fit a chunk index"),
    }
}

fn admit(header: &CartridgeHeader) -> Result<(), PipelineError> {
    match header_defect(header) {
        Some(defect) => Err(PipelineError::InvalidRequest(format!(
            "unusable cartridge header: {defect}"
        ))),
        None => Ok(()),
    }
}

/// Newest admissible header in `transactions`, by block height. Ties keep
/// retrieval order.
pub fn locate_header(transactions: &[Transaction]) -> Option<LocatedHeader> {
    let mut newest_first: Vec<&Transaction> = transactions.iter().collect();
    newest_first.sort_by(|a, b| b.height.cmp(&a.height));
    newest_first.into_iter().find_map(|tx| {
        let header = CartridgeHeader::decode(&tx.payload).ok()?;
        if let Some(defect) = header_defect(&header) {
            tracing::warn!(
                tx_hash = %tx.hash,
                chunk_size = header.chunk_size,
                total_size = header.total_size,
                "skipping unusable header: {defect}"
            );
            return None;
        }
        Some(LocatedHeader {
            header,
            tx_hash: tx.hash.clone(),
            height: tx.height,
        })
    })
}

/// Collect the chunks of `cartridge_id` with indices below `expected`.
/// The first occurrence of an index in `transactions` wins.
pub fn collect_chunks(transactions: &[Transaction], cartridge_id: u32, expected: usize) -> ChunkMap {
    let mut chunks = ChunkMap::new();
    let mut duplicates = 0usize;
    let mut out_of_range = 0usize;
    for tx in transactions {
        let Ok(chunk) = DataChunk::decode(&tx.payload) else {
            continue;
        };
        if chunk.cartridge_id != cartridge_id {
            continue;
        }
        if chunk.chunk_index as usize >= expected {
            out_of_range += 1;
            continue;
        }
        if !chunks.insert(chunk.chunk_index, chunk.bytes) {
            duplicates += 1;
        }
    }
    tracing::debug!(
        cartridge_id,
        found = chunks.len(),
        expected,
        duplicates,
        out_of_range,
        "collected chunks"
    );
    chunks
}

/// Rebuilds cartridges from a ledger into a cache.
#[derive(Debug)]
pub struct SyncPipeline<L, C> {
    ledger: L,
    cache: C,
    config: SyncConfig,
}

impl<L: Ledger, C: CartridgeCache> SyncPipeline<L, C> {
    /// Pipeline over `ledger`, storing into `cache`.
    pub fn new(ledger: L, cache: C, config: SyncConfig) -> Self {
        Self {
            ledger,
            cache,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Underlying cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Reconstruct the cartridge at `address`.
    pub async fn sync(&self, address: &Identity) -> Result<SyncOutcome, SyncFailure> {
        let mut progress = SyncProgress::default();
        let result = self.reconstruct(address, None, &mut progress).await;
        self.finish(address, result, progress)
    }

    /// Reconstruct the cartridge at `address` against a known header. The
    /// cache is checked before any ledger call.
    pub async fn sync_with_header(
        &self,
        address: &Identity,
        header: &CartridgeHeader,
    ) -> Result<SyncOutcome, SyncFailure> {
        let mut progress = SyncProgress::default();
        let result = self.reconstruct(address, Some(header), &mut progress).await;
        self.finish(address, result, progress)
    }

    /// Rebuild the cartridge a manifest describes. The cache is checked
    /// first; otherwise each chunk is fetched by its recorded transaction
    /// hash, paced at [`SyncConfig::fetch_rate_per_sec`]. Chunks with no
    /// recorded hash, unknown hashes and failed lookups count as missing.
    pub async fn sync_from_manifest(
        &self,
        manifest: &CartridgeManifest,
    ) -> Result<SyncOutcome, SyncFailure> {
        let mut progress = SyncProgress::default();
        let result = self.fetch_manifest(manifest, &mut progress).await;
        self.finish(&manifest.cartridge_address, result, progress)
    }

    /// Locate the header and count records without reconstructing.
    pub async fn inspect(&self, address: &Identity) -> Result<CartridgeInfo, SyncFailure> {
        let mut progress = SyncProgress::default();
        match self.examine(address, &mut progress).await {
            Ok(info) => Ok(info),
            Err(error) => {
                progress.stage = SyncStage::Error;
                tracing::error!(address = %address, "inspect failed: {error}");
                Err(SyncFailure { error, progress })
            }
        }
    }

    /// Remove the cached copy of the cartridge described by `header`.
    pub fn purge(&self, header: &CartridgeHeader) -> Result<bool, PipelineError> {
        let key = CacheKey::new(header.cartridge_id, header.sha256);
        let removed = self.cache.delete(&key)?;
        tracing::info!(key = %key, removed, "purged cached cartridge");
        Ok(removed)
    }

    fn finish(
        &self,
        address: &Identity,
        result: Result<SyncOutcome, PipelineError>,
        mut progress: SyncProgress,
    ) -> Result<SyncOutcome, SyncFailure> {
        result.map_err(|error| {
            progress.stage = SyncStage::Error;
            tracing::error!(address = %address, %progress, "sync failed: {error}");
            SyncFailure { error, progress }
        })
    }

    async fn reconstruct(
        &self,
        address: &Identity,
        known: Option<&CartridgeHeader>,
        progress: &mut SyncProgress,
    ) -> Result<SyncOutcome, PipelineError> {
        if let Some(header) = known {
            admit(header)?;
            if let Some(outcome) = self.from_cache(header, progress) {
                return Ok(outcome);
            }
        }

        let history = self.fetch(address, progress).await?;
        let transactions = history.transactions;

        progress.stage = SyncStage::LocatingHeader;
        let header = match known {
            Some(header) => header.clone(),
            None => {
                let located =
                    locate_header(&transactions).ok_or_else(|| PipelineError::HeaderNotFound {
                        address: address.to_spaced(),
                        transactions: transactions.len(),
                    })?;
                tracing::info!(
                    cartridge_id = located.header.cartridge_id,
                    tx_hash = %located.tx_hash,
                    height = located.height,
                    total_size = located.header.total_size,
                    "found cartridge header"
                );
                if let Some(outcome) = self.from_cache(&located.header, progress) {
                    return Ok(outcome);
                }
                located.header
            }
        };

        let plan = header.chunk_plan();
        let expected = plan.expected_chunks()?;
        progress.stage = SyncStage::Collecting;
        progress.chunks_expected = expected;
        let chunks = collect_chunks(&transactions, header.cartridge_id, expected);
        self.assemble(address, header, &chunks, &plan, progress)
    }

    async fn fetch_manifest(
        &self,
        manifest: &CartridgeManifest,
        progress: &mut SyncProgress,
    ) -> Result<SyncOutcome, PipelineError> {
        let header = manifest.header()?;
        admit(&header)?;
        if let Some(outcome) = self.from_cache(&header, progress) {
            return Ok(outcome);
        }

        let plan = header.chunk_plan();
        let expected = plan.expected_chunks()?;
        if manifest.data_tx_hashes.len() != expected {
            return Err(PipelineError::InvalidRequest(format!(
                "manifest lists {} chunk transactions, header requires {expected}",
                manifest.data_tx_hashes.len()
            )));
        }

        progress.stage = SyncStage::Collecting;
        progress.chunks_expected = expected;
        let mut limiter = RateLimiter::per_second(self.config.fetch_rate_per_sec);
        let mut chunks = ChunkMap::new();
        for (index, hash) in manifest.data_tx_hashes.iter().enumerate() {
            let Some(hash) = hash else {
                tracing::debug!(chunk_index = index, "no transaction recorded for chunk");
                continue;
            };
            limiter.wait().await;
            let tx = match self.ledger.transaction_by_hash(hash).await {
                Ok(Some(tx)) => tx,
                Ok(None) => {
                    tracing::warn!(chunk_index = index, tx_hash = %hash, "chunk transaction not found");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(chunk_index = index, tx_hash = %hash, "chunk lookup failed: {e}");
                    continue;
                }
            };
            progress.transactions += 1;
            if let Some(chunk) = self.manifest_chunk(&tx, header.cartridge_id, index) {
                chunks.insert(chunk.chunk_index, chunk.bytes);
                progress.chunks_found = chunks.len();
            }
        }

        let address = manifest.cartridge_address;
        self.assemble(&address, header, &chunks, &plan, progress)
    }

    /// The chunk carried by `tx`, when it is the one the manifest expects
    /// at `index` and comes from a trusted sender.
    fn manifest_chunk(&self, tx: &Transaction, cartridge_id: u32, index: usize) -> Option<DataChunk> {
        if let Some(publisher) = &self.config.publisher {
            if !tx.is_from(publisher, self.ledger.checksum_policy()) {
                tracing::warn!(tx_hash = %tx.hash, "chunk transaction from an untrusted sender");
                return None;
            }
        }
        let chunk = match DataChunk::decode(&tx.payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(tx_hash = %tx.hash, "transaction does not carry a chunk: {e}");
                return None;
            }
        };
        if chunk.cartridge_id != cartridge_id || chunk.chunk_index as usize != index {
            tracing::warn!(
                tx_hash = %tx.hash,
                cartridge_id = chunk.cartridge_id,
                chunk_index = chunk.chunk_index,
                expected_index = index,
                "chunk does not match the manifest"
            );
            return None;
        }
        Some(chunk)
    }

    /// Check completeness, reassemble, verify and cache.
    fn assemble(
        &self,
        address: &Identity,
        header: CartridgeHeader,
        chunks: &ChunkMap,
        plan: &ChunkPlan,
        progress: &mut SyncProgress,
    ) -> Result<SyncOutcome, PipelineError> {
        let expected = progress.chunks_expected;
        progress.chunks_found = chunks.len();
        if chunks.len() < expected {
            return Err(PipelineError::IncompleteData {
                found: chunks.len(),
                expected,
                missing: chunks.missing(expected, MISSING_REPORT_LIMIT),
            });
        }

        progress.stage = SyncStage::Verifying;
        let key = CacheKey::new(header.cartridge_id, header.sha256);
        let bytes = match verify(reassemble(chunks, plan)?, &header.sha256) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.discard(&key);
                return Err(e.into());
            }
        };

        let metadata = CacheMetadata::now(Some(address.to_spaced()), header.total_size);
        if let Err(e) = self.cache.put(&key, &bytes, &metadata) {
            tracing::warn!(key = %key, "failed to cache cartridge: {e}");
        }

        progress.stage = SyncStage::Complete;
        tracing::info!(
            cartridge_id = header.cartridge_id,
            bytes = bytes.len(),
            %progress,
            "cartridge reconstructed and verified"
        );
        Ok(SyncOutcome {
            header,
            bytes,
            source: SyncSource::Ledger,
            progress: progress.clone(),
        })
    }

    async fn examine(
        &self,
        address: &Identity,
        progress: &mut SyncProgress,
    ) -> Result<CartridgeInfo, PipelineError> {
        let history = self.fetch(address, progress).await?;
        let transactions = &history.transactions;

        let (mut cart_records, mut data_records, mut other_records) = (0, 0, 0);
        for tx in transactions {
            match Record::detect(&tx.payload) {
                Some(Record::Cart(_)) => cart_records += 1,
                Some(Record::Data(_)) => data_records += 1,
                _ => other_records += 1,
            }
        }

        progress.stage = SyncStage::LocatingHeader;
        let header = locate_header(transactions);
        let (chunks_found, chunks_expected) = match &header {
            Some(located) => {
                let expected = located.header.chunk_plan().expected_chunks()?;
                let found = collect_chunks(transactions, located.header.cartridge_id, expected).len();
                (found, expected)
            }
            None => (0, 0),
        };
        progress.chunks_found = chunks_found;
        progress.chunks_expected = chunks_expected;
        progress.stage = SyncStage::Complete;

        Ok(CartridgeInfo {
            address: *address,
            header,
            pages: history.pages,
            hit_page_ceiling: history.hit_page_ceiling,
            transactions: transactions.len(),
            cart_records,
            data_records,
            other_records,
            chunks_found,
            chunks_expected,
        })
    }

    async fn fetch(
        &self,
        address: &Identity,
        progress: &mut SyncProgress,
    ) -> Result<History, PipelineError> {
        progress.stage = SyncStage::Fetching;
        let mut history = fetch_all_transactions(
            &self.ledger,
            address,
            &self.config.pagination,
            |p| {
                progress.pages = p.page;
                progress.transactions = p.total_fetched;
                tracing::debug!(page = p.page, fetched = p.total_fetched, new = p.new_in_page, "history page");
            },
        )
        .await?;

        if history.hit_page_ceiling {
            tracing::warn!(
                address = %address,
                pages = history.pages,
                "history truncated at page ceiling; older records not examined"
            );
        }
        if let Some(publisher) = &self.config.publisher {
            let before = history.transactions.len();
            let policy = self.ledger.checksum_policy();
            history.transactions.retain(|tx| tx.is_from(publisher, policy));
            tracing::debug!(
                kept = history.transactions.len(),
                dropped = before - history.transactions.len(),
                "filtered by publisher"
            );
        }
        progress.pages = history.pages;
        progress.transactions = history.transactions.len();
        Ok(history)
    }

    fn from_cache(&self, header: &CartridgeHeader, progress: &mut SyncProgress) -> Option<SyncOutcome> {
        progress.stage = SyncStage::CacheLookup;
        let key = CacheKey::new(header.cartridge_id, header.sha256);
        let bytes = match self.cache.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, "cache lookup failed, reconstructing: {e}");
                return None;
            }
        };

        if bytes.len() as u64 != header.total_size || sha256_digest(&bytes) != header.sha256 {
            tracing::warn!(key = %key, "cached cartridge failed verification, purging");
            self.discard(&key);
            return None;
        }

        let expected = header.chunk_plan().expected_chunks().unwrap_or(0);
        progress.chunks_found = expected;
        progress.chunks_expected = expected;
        progress.stage = SyncStage::Complete;
        tracing::info!(key = %key, "cache hit");
        Some(SyncOutcome {
            header: header.clone(),
            bytes,
            source: SyncSource::Cache,
            progress: progress.clone(),
        })
    }

    fn discard(&self, key: &CacheKey) {
        if let Err(e) = self.cache.delete(key) {
            tracing::warn!(key = %key, "failed to purge cached cartridge: {e}");
        }
    }
}

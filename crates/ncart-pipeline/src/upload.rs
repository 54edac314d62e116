//! # Upload Pipeline
//!
//! Strictly sequential stages:
//!
//! ```text
//! idle → preparing → uploading → cart → cent → complete
//!            │            │        │      │
//!            └────────────┴────────┴──────┴──→ error
//! ```
//!
//! 1. **preparing**: validate, optional preflight (consensus, sender
//!    unlocked), resolve cartridge id and app id, encode every record.
//! 2. **uploading**: one `DATA` transaction per chunk, index order, to the
//!    cartridge identity.
//! 3. **cart**: the header, to the cartridge identity. Sent last among the
//!    cartridge records so a visible header means all chunks were attempted.
//! 4. **cent**: the catalog entry, to the catalog identity.
//!
//! Every submission waits on the [`RateLimiter`] first. A failed chunk is
//! recorded and skipped; `failure_budget` consecutive failures abort the
//! run with [`PipelineError::BudgetExceeded`]. Header and catalog entry
//! failures abort immediately.
//!
//! There is no rollback. Records already on the ledger stay there, and a
//! retry with the same cartridge id only adds duplicates that reassembly
//! ignores.
//!
//! Dry-run mode skips preflight and every submission but still encodes
//! everything, so the whole pipeline can be exercised offline.

use std::fmt;

use chrono::{DateTime, Utc};
use ncart_core::{
    sha256_digest, split, to_hex, truncate_title, CartridgeHeader, CatalogEntry, CodecError,
    ContentDigest, DataChunk, Identity, Platform, Semver, DATA_CAPACITY, SCHEMA_VERSION,
};
use ncart_ledger::{Ledger, LedgerError, OutgoingTransaction};
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{timestamp_id, CatalogScanner};
use crate::config::{UploadConfig, MAX_CARTRIDGE_BYTES, TITLE_MAX_CHARS};
use crate::error::{PipelineError, UploadFailure};
use crate::rate_limit::RateLimiter;

/// Header hash reported by a dry run.
pub const DRY_RUN_CART_HASH: &str = "dry-run-cart-hash";

/// Catalog entry hash reported by a dry run.
pub const DRY_RUN_CENT_HASH: &str = "dry-run-cent-hash";

// ---------------------------------------------------------------------------
// Stage and progress
// ---------------------------------------------------------------------------

/// Upload stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    /// Not started.
    #[default]
    Idle,
    /// Validating, preflight, id resolution, encoding.
    Preparing,
    /// Submitting data chunks.
    Uploading,
    /// Submitting the header.
    Cart,
    /// Submitting the catalog entry.
    Cent,
    /// Finished. Terminal.
    Complete,
    /// Stopped by an error. Terminal.
    Error,
}

impl UploadStage {
    /// Whether no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Lowercase stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Uploading => "uploading",
            Self::Cart => "cart",
            Self::Cent => "cent",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable upload progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    /// Current stage.
    pub stage: UploadStage,
    /// Data chunks in the cartridge.
    pub total_chunks: usize,
    /// Data chunks accepted by the ledger (or encoded, in a dry run).
    pub sent_chunks: usize,
    /// Indices of chunks whose submission failed, in submission order.
    pub failed_chunks: Vec<u32>,
    /// Header transaction hash.
    pub cart_tx_hash: Option<String>,
    /// Catalog entry transaction hash.
    pub cent_tx_hash: Option<String>,
}

impl fmt::Display for UploadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} chunks sent", self.sent_chunks, self.total_chunks)?;
        if !self.failed_chunks.is_empty() {
            write!(f, ", {} failed", self.failed_chunks.len())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything needed to publish one cartridge.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Original file name, for the manifest.
    pub filename: Option<String>,
    /// Catalog title, 1-16 characters. Stored truncated to 15 bytes.
    pub title: String,
    /// Version published in the catalog entry.
    pub semver: Semver,
    /// Target platform.
    pub platform: Platform,
    /// Cartridge id; time-derived when `None`.
    pub cartridge_id: Option<u32>,
    /// App id; resolved from the catalog when `None`.
    pub app_id: Option<u32>,
    /// Publishing wallet. Must be unlocked on the node.
    pub sender: Identity,
    /// Identity receiving the header and chunks.
    pub cartridge_address: Identity,
    /// Catalog identity receiving the entry.
    pub catalog_address: Identity,
}

impl UploadRequest {
    /// Reject requests that cannot produce a valid cartridge.
    pub fn validate(&self, chunk_size: u8) -> Result<(), PipelineError> {
        if self.bytes.is_empty() {
            return Err(PipelineError::InvalidRequest("file is empty".into()));
        }
        if self.bytes.len() > MAX_CARTRIDGE_BYTES {
            return Err(PipelineError::InvalidRequest(format!(
                "file is {} bytes (max {MAX_CARTRIDGE_BYTES})",
                self.bytes.len()
            )));
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PipelineError::InvalidRequest("title is required".into()));
        }
        let chars = title.chars().count();
        if chars > TITLE_MAX_CHARS {
            return Err(PipelineError::InvalidRequest(format!(
                "title is {chars} characters (max {TITLE_MAX_CHARS})"
            )));
        }
        if chunk_size == 0 || usize::from(chunk_size) > DATA_CAPACITY {
            return Err(PipelineError::InvalidRequest(format!(
                "chunk size {chunk_size} outside 1-{DATA_CAPACITY}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transaction plan
// ---------------------------------------------------------------------------

/// Record kind carried by a planned transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// Data chunk.
    Data,
    /// Cartridge header.
    Cart,
    /// Catalog entry.
    Cent,
}

fn serialize_hex<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_hex(bytes))
}

/// One transaction of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTransaction {
    /// Record kind.
    pub kind: RecordKind,
    /// Chunk index, for data records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    /// Recipient identity.
    pub recipient: Identity,
    /// Encoded 64-byte record.
    #[serde(rename = "payload_hex", serialize_with = "serialize_hex")]
    pub payload: Vec<u8>,
    /// Hash once submitted.
    pub tx_hash: Option<String>,
}

/// Every transaction of an upload in submission order: chunks, header,
/// catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPlan {
    /// Sending wallet.
    pub sender: Identity,
    /// Cartridge id.
    pub cartridge_id: u32,
    /// App id.
    pub app_id: u32,
    /// Planned transactions.
    pub transactions: Vec<PlannedTransaction>,
}

impl TransactionPlan {
    /// Data transactions in index order.
    pub fn data(&self) -> impl Iterator<Item = &PlannedTransaction> {
        self.transactions.iter().filter(|t| t.kind == RecordKind::Data)
    }

    /// The single header or catalog entry transaction.
    pub fn record(&self, kind: RecordKind) -> Option<&PlannedTransaction> {
        self.transactions.iter().find(|t| t.kind == kind)
    }

    fn record_mut(&mut self, kind: RecordKind) -> Result<&mut PlannedTransaction, PipelineError> {
        self.transactions
            .iter_mut()
            .find(|t| t.kind == kind)
            .ok_or_else(|| PipelineError::InvalidRequest(format!("plan has no {kind:?} record")))
    }

    /// Number of planned transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// A fully encoded upload, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    /// Cartridge header.
    pub header: CartridgeHeader,
    /// Catalog entry.
    pub entry: CatalogEntry,
    /// Catalog identity.
    pub catalog_address: Identity,
    /// Transactions in submission order.
    pub plan: TransactionPlan,
}

impl PreparedUpload {
    /// Encode every record of `request`. Pure; touches no ledger.
    pub fn new(
        request: &UploadRequest,
        cartridge_id: u32,
        app_id: u32,
        chunk_size: u8,
    ) -> Result<Self, PipelineError> {
        request.validate(chunk_size)?;

        let header = CartridgeHeader {
            schema: SCHEMA_VERSION,
            platform: request.platform,
            chunk_size,
            flags: 0,
            cartridge_id,
            total_size: request.bytes.len() as u64,
            sha256: sha256_digest(&request.bytes),
        };
        let entry = CatalogEntry {
            schema: SCHEMA_VERSION,
            platform: request.platform,
            flags: 0,
            app_id,
            semver: request.semver,
            cartridge_address: request.cartridge_address,
            title: truncate_title(request.title.trim()).to_string(),
        };

        let chunks = split(&request.bytes, usize::from(chunk_size))?;
        let mut transactions = Vec::with_capacity(chunks.len() + 2);
        for (chunk_index, bytes) in chunks {
            let chunk = DataChunk {
                cartridge_id,
                chunk_index,
                bytes: bytes.to_vec(),
            };
            transactions.push(PlannedTransaction {
                kind: RecordKind::Data,
                chunk_index: Some(chunk_index),
                recipient: request.cartridge_address,
                payload: chunk.encode(usize::from(chunk_size))?.to_vec(),
                tx_hash: None,
            });
        }
        transactions.push(PlannedTransaction {
            kind: RecordKind::Cart,
            chunk_index: None,
            recipient: request.cartridge_address,
            payload: header.encode().to_vec(),
            tx_hash: None,
        });
        transactions.push(PlannedTransaction {
            kind: RecordKind::Cent,
            chunk_index: None,
            recipient: request.catalog_address,
            payload: entry.encode().to_vec(),
            tx_hash: None,
        });

        Ok(Self {
            header,
            entry,
            catalog_address: request.catalog_address,
            plan: TransactionPlan {
                sender: request.sender,
                cartridge_id,
                app_id,
                transactions,
            },
        })
    }

    /// Number of data chunks.
    pub fn chunk_count(&self) -> usize {
        self.plan.data().count()
    }

    /// Manifest describing this upload.
    pub fn manifest(&self, filename: Option<&str>) -> CartridgeManifest {
        let hash_of = |kind| self.plan.record(kind).and_then(|t| t.tx_hash.clone());
        CartridgeManifest {
            cartridge_id: self.header.cartridge_id,
            app_id: self.entry.app_id,
            title: self.entry.title.clone(),
            semver: self.entry.semver.to_string(),
            platform: self.header.platform.name(),
            filename: filename.map(str::to_string),
            total_size: self.header.total_size,
            chunk_size: self.header.chunk_size,
            chunk_count: self.chunk_count(),
            sha256: self.header.sha256,
            sender: self.plan.sender,
            cartridge_address: self.entry.cartridge_address,
            catalog_address: self.catalog_address,
            cart_tx_hash: hash_of(RecordKind::Cart),
            cent_tx_hash: hash_of(RecordKind::Cent),
            data_tx_hashes: self.plan.data().map(|t| t.tx_hash.clone()).collect(),
            created_at: Utc::now(),
        }
    }
}

/// Summary of a published cartridge, written next to the plan.
///
/// [`SyncPipeline::sync_from_manifest`](crate::SyncPipeline::sync_from_manifest)
/// reads it back to fetch each chunk by transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeManifest {
    /// Cartridge id.
    pub cartridge_id: u32,
    /// App id.
    pub app_id: u32,
    /// Stored title.
    pub title: String,
    /// Version, `major.minor.patch`.
    pub semver: String,
    /// Platform name.
    pub platform: String,
    /// Source file name.
    pub filename: Option<String>,
    /// File length.
    pub total_size: u64,
    /// Bytes per chunk.
    pub chunk_size: u8,
    /// Data chunks.
    pub chunk_count: usize,
    /// File digest.
    pub sha256: ContentDigest,
    /// Publishing wallet.
    pub sender: Identity,
    /// Cartridge identity.
    pub cartridge_address: Identity,
    /// Catalog identity.
    pub catalog_address: Identity,
    /// Header transaction hash.
    pub cart_tx_hash: Option<String>,
    /// Catalog entry transaction hash.
    pub cent_tx_hash: Option<String>,
    /// Per-chunk transaction hashes, `null` where the chunk failed or was
    /// not sent.
    pub data_tx_hashes: Vec<Option<String>>,
    /// When the manifest was produced.
    pub created_at: DateTime<Utc>,
}

impl CartridgeManifest {
    /// Header the manifest describes. Schema and flags take the values this
    /// crate writes.
    pub fn header(&self) -> Result<CartridgeHeader, CodecError> {
        Ok(CartridgeHeader {
            schema: SCHEMA_VERSION,
            platform: self.platform.parse()?,
            chunk_size: self.chunk_size,
            flags: 0,
            cartridge_id: self.cartridge_id,
            total_size: self.total_size,
            sha256: self.sha256,
        })
    }
}

/// Result of a finished upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    /// Final progress. `failed_chunks` may be non-empty.
    pub progress: UploadProgress,
    /// Encoded records with their transaction hashes.
    pub prepared: PreparedUpload,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Publishes cartridges to a ledger.
#[derive(Debug)]
pub struct UploadPipeline<L> {
    ledger: L,
    config: UploadConfig,
}

impl<L: Ledger> UploadPipeline<L> {
    /// Pipeline over `ledger`.
    pub fn new(ledger: L, config: UploadConfig) -> Self {
        Self { ledger, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Run an upload to completion.
    pub async fn run(&self, request: &UploadRequest) -> Result<UploadReport, UploadFailure> {
        self.run_with_progress(request, |_| {}).await
    }

    /// Run an upload, reporting progress after every stage change and chunk.
    pub async fn run_with_progress<F>(
        &self,
        request: &UploadRequest,
        mut on_progress: F,
    ) -> Result<UploadReport, UploadFailure>
    where
        F: FnMut(&UploadProgress) + Send,
    {
        let mut progress = UploadProgress::default();
        match self.execute(request, &mut progress, &mut on_progress).await {
            Ok(prepared) => Ok(UploadReport { progress, prepared }),
            Err(error) => {
                let failed_at = progress.stage;
                progress.stage = UploadStage::Error;
                tracing::error!(stage = %failed_at, %progress, "upload failed: {error}");
                on_progress(&progress);
                Err(UploadFailure {
                    error,
                    failed_at,
                    progress,
                })
            }
        }
    }

    async fn execute<F>(
        &self,
        request: &UploadRequest,
        progress: &mut UploadProgress,
        on_progress: &mut F,
    ) -> Result<PreparedUpload, PipelineError>
    where
        F: FnMut(&UploadProgress) + Send,
    {
        let dry_run = self.config.dry_run;

        progress.stage = UploadStage::Preparing;
        on_progress(progress);
        request.validate(self.config.chunk_size)?;

        if dry_run {
            tracing::info!("dry run: skipping preflight and submission");
        } else if self.config.preflight {
            self.preflight(&request.sender).await?;
        }

        let cartridge_id = match request.cartridge_id {
            Some(id) => id,
            None => {
                let id = timestamp_id();
                tracing::info!(cartridge_id = id, "auto-generated cartridge id");
                id
            }
        };
        let app_id = match request.app_id {
            Some(id) => id,
            None => {
                CatalogScanner::new(&self.ledger, request.catalog_address)
                    .with_publisher(Some(request.sender))
                    .with_depth(self.config.catalog_scan)
                    .resolve_app_id(&request.title)
                    .await
            }
        };

        let mut prepared =
            PreparedUpload::new(request, cartridge_id, app_id, self.config.chunk_size)?;
        progress.total_chunks = prepared.chunk_count();
        tracing::info!(
            cartridge_id,
            app_id,
            chunks = progress.total_chunks,
            total_size = prepared.header.total_size,
            rate = self.config.rate_per_sec,
            "prepared upload"
        );

        let mut limiter = if dry_run {
            RateLimiter::unpaced()
        } else {
            RateLimiter::per_second(self.config.rate_per_sec)
        };
        let budget = self.config.failure_budget.max(1);
        let mut consecutive = 0usize;

        progress.stage = UploadStage::Uploading;
        on_progress(progress);
        let total = progress.total_chunks;
        for planned in prepared
            .plan
            .transactions
            .iter_mut()
            .filter(|t| t.kind == RecordKind::Data)
        {
            let index = planned.chunk_index.unwrap_or_default();
            if dry_run {
                progress.sent_chunks += 1;
                tracing::debug!(chunk_index = index, "[dry-run] chunk encoded");
                on_progress(progress);
                continue;
            }

            limiter.wait().await;
            match self.submit(&request.sender, &planned.recipient, &planned.payload).await {
                Ok(hash) => {
                    tracing::debug!(chunk_index = index, tx_hash = %hash, "chunk sent");
                    planned.tx_hash = Some(hash);
                    progress.sent_chunks += 1;
                    consecutive = 0;
                    if progress.sent_chunks % 50 == 0 || index as usize + 1 == total {
                        tracing::info!("sent chunk {}/{}", index + 1, total);
                    }
                }
                Err(e) => {
                    progress.failed_chunks.push(index);
                    consecutive += 1;
                    tracing::warn!(chunk_index = index, consecutive, "chunk submission failed: {e}");
                    if consecutive >= budget {
                        return Err(PipelineError::BudgetExceeded {
                            consecutive,
                            failed_chunks: progress.failed_chunks.clone(),
                        });
                    }
                }
            }
            on_progress(progress);
        }

        progress.stage = UploadStage::Cart;
        on_progress(progress);
        let cart = prepared.plan.record_mut(RecordKind::Cart)?;
        let cart_hash = self
            .submit_record(&mut limiter, &request.sender, cart, DRY_RUN_CART_HASH)
            .await?;
        tracing::info!(tx_hash = %cart_hash, "header sent");
        progress.cart_tx_hash = Some(cart_hash);

        progress.stage = UploadStage::Cent;
        on_progress(progress);
        let cent = prepared.plan.record_mut(RecordKind::Cent)?;
        let cent_hash = self
            .submit_record(&mut limiter, &request.sender, cent, DRY_RUN_CENT_HASH)
            .await?;
        tracing::info!(tx_hash = %cent_hash, "catalog entry sent");
        progress.cent_tx_hash = Some(cent_hash);

        progress.stage = UploadStage::Complete;
        if !progress.failed_chunks.is_empty() {
            tracing::warn!(
                failed = ?progress.failed_chunks,
                "upload finished with failed chunks; re-upload with cartridge id {cartridge_id} to fill them"
            );
        }
        tracing::info!(cartridge_id, app_id, %progress, "upload complete");
        on_progress(progress);
        Ok(prepared)
    }

    async fn preflight(&self, sender: &Identity) -> Result<(), PipelineError> {
        if !self.ledger.is_consensus_established().await? {
            return Err(PipelineError::PreconditionFailed(
                "node does not have consensus with the network".into(),
            ));
        }
        tracing::info!("consensus established");
        if !self.ledger.is_account_unlocked(sender).await? {
            return Err(PipelineError::PreconditionFailed(format!(
                "sender account {} is locked; unlock it on the node first",
                sender.to_spaced()
            )));
        }
        tracing::info!(sender = %sender, "sender account unlocked");
        Ok(())
    }

    async fn submit_record(
        &self,
        limiter: &mut RateLimiter,
        sender: &Identity,
        planned: &mut PlannedTransaction,
        dry_run_hash: &str,
    ) -> Result<String, PipelineError> {
        let hash = if self.config.dry_run {
            dry_run_hash.to_string()
        } else {
            limiter.wait().await;
            self.submit(sender, &planned.recipient, &planned.payload).await?
        };
        planned.tx_hash = Some(hash.clone());
        Ok(hash)
    }

    async fn submit(
        &self,
        sender: &Identity,
        recipient: &Identity,
        payload: &[u8],
    ) -> Result<String, LedgerError> {
        let height = self.ledger.block_number().await?;
        let tx = OutgoingTransaction::data(*sender, *recipient, payload.to_vec(), height);
        self.ledger.send_transaction(&tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncart_core::Record;

    fn request(len: usize) -> UploadRequest {
        UploadRequest {
            bytes: (0..len).map(|i| (i % 251) as u8).collect(),
            filename: Some("game.zip".into()),
            title: "Commander Keen".into(),
            semver: Semver::new(1, 2, 3),
            platform: Platform::Dos,
            cartridge_id: Some(42),
            app_id: Some(7),
            sender: Identity::from_bytes([1; 20]),
            cartridge_address: Identity::from_bytes([2; 20]),
            catalog_address: Identity::from_bytes([3; 20]),
        }
    }

    #[test]
    fn stage_names_and_terminality() {
        assert_eq!(UploadStage::default(), UploadStage::Idle);
        assert_eq!(UploadStage::Uploading.to_string(), "uploading");
        assert!(UploadStage::Complete.is_terminal());
        assert!(UploadStage::Error.is_terminal());
        assert!(!UploadStage::Cent.is_terminal());
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let mut r = request(0);
        assert!(matches!(r.validate(51), Err(PipelineError::InvalidRequest(_))));

        r = request(10);
        r.title = "   ".into();
        assert!(r.validate(51).is_err());

        r.title = "A Title Of 17 Chr".into();
        assert_eq!(r.title.chars().count(), 17);
        assert!(r.validate(51).is_err());

        r.title = "Sixteen chars ok".into();
        assert!(r.validate(51).is_ok());
        assert!(r.validate(0).is_err());
        assert!(r.validate(52).is_err());

        let big = request(MAX_CARTRIDGE_BYTES + 1);
        assert!(big.validate(51).is_err());
        assert!(request(MAX_CARTRIDGE_BYTES).validate(51).is_ok());
    }

    #[test]
    fn prepared_upload_orders_records() {
        let prepared = PreparedUpload::new(&request(130), 42, 7, 51).unwrap();
        let kinds: Vec<RecordKind> = prepared.plan.transactions.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Data,
                RecordKind::Data,
                RecordKind::Data,
                RecordKind::Cart,
                RecordKind::Cent
            ]
        );
        assert_eq!(prepared.chunk_count(), 3);

        let lens: Vec<usize> = prepared
            .plan
            .data()
            .map(|t| match Record::detect(&t.payload) {
                Some(Record::Data(d)) => d.bytes.len(),
                other => panic!("expected DATA, got {other:?}"),
            })
            .collect();
        assert_eq!(lens, vec![51, 51, 28]);

        let cent = prepared.plan.record(RecordKind::Cent).unwrap();
        assert_eq!(cent.recipient, Identity::from_bytes([3; 20]));
        let entry = CatalogEntry::decode(&cent.payload).unwrap();
        assert_eq!(entry.title, "Commander Keen");
        assert_eq!(entry.app_id, 7);

        let cart = prepared.plan.record(RecordKind::Cart).unwrap();
        let header = CartridgeHeader::decode(&cart.payload).unwrap();
        assert_eq!(header, prepared.header);
        assert_eq!(header.total_size, 130);
    }

    #[test]
    fn long_titles_are_stored_truncated() {
        let mut r = request(10);
        r.title = "Sixteen chars ok".into();
        let prepared = PreparedUpload::new(&r, 1, 1, 51).unwrap();
        assert_eq!(prepared.entry.title, "Sixteen chars o");
    }

    #[test]
    fn plan_serializes_payload_hex() {
        let prepared = PreparedUpload::new(&request(10), 42, 7, 51).unwrap();
        let json = serde_json::to_value(&prepared.plan).unwrap();
        let first = &json["transactions"][0];
        assert_eq!(first["kind"], "DATA");
        assert_eq!(first["chunk_index"], 0);
        assert!(first["payload_hex"].as_str().unwrap().starts_with("44415441"));
        assert_eq!(json["transactions"][1]["kind"], "CART");
        assert!(json["transactions"][1].get("chunk_index").is_none());
    }

    #[test]
    fn manifest_reflects_plan() {
        let mut prepared = PreparedUpload::new(&request(130), 42, 7, 51).unwrap();
        prepared.plan.transactions[0].tx_hash = Some("h0".into());
        let manifest = prepared.manifest(Some("game.zip"));
        assert_eq!(manifest.cartridge_id, 42);
        assert_eq!(manifest.chunk_count, 3);
        assert_eq!(manifest.semver, "1.2.3");
        assert_eq!(manifest.platform, "DOS");
        assert_eq!(manifest.data_tx_hashes, vec![Some("h0".into()), None, None]);
        assert_eq!(manifest.cart_tx_hash, None);
    }

    #[test]
    fn progress_display() {
        let p = UploadProgress {
            total_chunks: 212,
            sent_chunks: 47,
            failed_chunks: vec![3, 9],
            ..UploadProgress::default()
        };
        assert_eq!(p.to_string(), "47/212 chunks sent, 2 failed");
    }
}

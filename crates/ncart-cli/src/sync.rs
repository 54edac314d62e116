//! # Sync Subcommand
//!
//! Rebuilds a cartridge from its ledger identity, verifies it and stores it
//! in the cache. A verified cached copy is returned without reconstruction.
//!
//! `--manifest` reads the manifest written by `ncart upload --manifest-out`
//! and fetches each chunk by transaction hash instead of walking history.
//!
//! Exit codes: 0 on a verified cartridge, 2 when chunks are still missing
//! (the upload may be unconfirmed or partial), 1 on any other error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use ncart_cache::{CartridgeCache, MemoryCartridgeCache};
use ncart_ledger::Pagination;
use ncart_pipeline::config::DEFAULT_FETCH_RATE_PER_SEC;
use ncart_pipeline::{
    CartridgeManifest, PipelineError, SyncConfig, SyncPipeline, SyncSource, MISSING_REPORT_LIMIT,
};

use crate::cache::CacheDirArgs;
use crate::node::{runtime, NodeArgs};

/// History paging flags shared by `sync` and `inspect`.
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Only trust records sent by this identity.
    #[arg(long)]
    pub publisher: Option<String>,

    /// Transactions requested per history page.
    #[arg(long, default_value_t = Pagination::default().page_size)]
    pub page_size: usize,

    /// Maximum history pages walked.
    #[arg(long, default_value_t = Pagination::default().max_pages)]
    pub max_pages: usize,
}

impl HistoryArgs {
    /// Sync settings from these flags.
    pub fn config(&self, node: &NodeArgs) -> Result<SyncConfig> {
        let publisher = self
            .publisher
            .as_deref()
            .map(|p| node.identity("--publisher", p))
            .transpose()?;
        Ok(SyncConfig {
            pagination: Pagination {
                page_size: self.page_size,
                max_pages: self.max_pages,
                ..Pagination::default()
            },
            publisher,
            ..SyncConfig::default()
        })
    }
}

/// Arguments for `ncart sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Cartridge identity.
    #[arg(required_unless_present = "manifest")]
    pub address: Option<String>,

    /// Upload manifest to sync from by transaction hash.
    #[arg(long, conflicts_with = "address")]
    pub manifest: Option<PathBuf>,

    /// Chunk lookups per second for `--manifest`. 0 disables pacing.
    #[arg(long, default_value_t = DEFAULT_FETCH_RATE_PER_SEC)]
    pub fetch_rate: u32,

    /// Write the verified cartridge to this file.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Do not read or write the on-disk cache.
    #[arg(long)]
    pub no_cache: bool,

    #[command(flatten)]
    pub history: HistoryArgs,

    #[command(flatten)]
    pub cache: CacheDirArgs,

    #[command(flatten)]
    pub node: NodeArgs,
}

/// Execute the sync subcommand.
pub fn run_sync(args: &SyncArgs) -> Result<u8> {
    let cache: Arc<dyn CartridgeCache> = if args.no_cache {
        Arc::new(MemoryCartridgeCache::new())
    } else {
        Arc::new(args.cache.open()?)
    };
    let config = SyncConfig {
        fetch_rate_per_sec: args.fetch_rate,
        ..args.history.config(&args.node)?
    };
    let pipeline = SyncPipeline::new(args.node.connect()?, cache, config);

    let rt = runtime()?;
    let result = match (&args.manifest, &args.address) {
        (Some(path), _) => {
            let manifest = read_manifest(path)?;
            rt.block_on(pipeline.sync_from_manifest(&manifest))
        }
        (None, Some(address)) => {
            let address = args.node.identity("address", address)?;
            rt.block_on(pipeline.sync(&address))
        }
        (None, None) => bail!("either an address or --manifest is required"),
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            if let PipelineError::IncompleteData { missing, .. } = &failure.error {
                eprintln!("{failure}");
                let shown = if missing.len() == MISSING_REPORT_LIMIT { " (first)" } else { "" };
                eprintln!("  missing chunk indices{shown}: {}", summarize(missing));
                return Ok(2);
            }
            return Err(failure).context("sync failed");
        }
    };

    let source = match outcome.source {
        SyncSource::Cache => "cache",
        SyncSource::Ledger => "ledger",
    };
    println!(
        "Verified cartridge {} ({} bytes, {}) from {source}",
        outcome.header.cartridge_id,
        outcome.bytes.len(),
        outcome.header.platform
    );
    println!("  SHA256: {}", outcome.header.sha256);
    println!("  {}", outcome.progress);

    if let Some(path) = &args.out {
        std::fs::write(path, &outcome.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Written to {}", path.display());
    }
    Ok(0)
}

/// Load a manifest written by `ncart upload --manifest-out`.
pub fn read_manifest(path: &Path) -> Result<CartridgeManifest> {
    let json = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&json).with_context(|| format!("invalid manifest {}", path.display()))
}

/// Render indices compactly, collapsing consecutive runs: `2, 5-9, 14`.
pub fn summarize(indices: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = indices.iter().copied().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(next) = end.checked_add(1) {
            if iter.peek() != Some(&next) {
                break;
            }
            end = next;
            iter.next();
        }
        parts.push(if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        });
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SyncArgs,
    }

    #[test]
    fn summarize_collapses_runs() {
        assert_eq!(summarize(&[]), "");
        assert_eq!(summarize(&[2]), "2");
        assert_eq!(summarize(&[2, 5, 6, 7, 8, 9, 14]), "2, 5-9, 14");
        assert_eq!(summarize(&[0, 1]), "0-1");
    }

    #[test]
    fn history_defaults_match_pagination() {
        let h = Harness::try_parse_from(["t", "NQ00"]).unwrap();
        assert_eq!(h.args.history.page_size, 500);
        assert_eq!(h.args.history.max_pages, 100);
        assert!(h.args.history.publisher.is_none());
        assert_eq!(h.args.fetch_rate, DEFAULT_FETCH_RATE_PER_SEC);
        assert!(!h.args.no_cache);
    }

    #[test]
    fn address_or_manifest_is_required() {
        assert!(Harness::try_parse_from(["t"]).is_err());
        let h = Harness::try_parse_from(["t", "--manifest", "m.json"]).unwrap();
        assert!(h.args.address.is_none());
        assert_eq!(h.args.manifest.as_deref(), Some(Path::new("m.json")));
        assert!(Harness::try_parse_from(["t", "NQ00", "--manifest", "m.json"]).is_err());
    }

    #[test]
    fn invalid_manifest_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, b"{\"cartridge_id\": 1}").unwrap();
        let err = read_manifest(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid manifest"));
        assert!(read_manifest(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn publisher_is_parsed_into_config() {
        let publisher = ncart_core::Identity::from_bytes([3; 20]);
        let spaced = publisher.to_spaced();
        let h = Harness::try_parse_from(["t", "NQ00", "--publisher", spaced.as_str(), "--page-size", "50"])
            .unwrap();
        let config = h.args.history.config(&h.args.node).unwrap();
        assert_eq!(config.publisher, Some(publisher));
        assert_eq!(config.pagination.page_size, 50);
    }
}

//! # Upload Subcommand
//!
//! Publishes a file as a cartridge: data chunks, then the header, then the
//! catalog entry.
//!
//! `--dry-run` encodes everything and submits nothing. `--offline` runs the
//! full pipeline against a simulated in-memory ledger, which yields real
//! transaction hashes in the plan and manifest without a node.
//!
//! Exit codes: 0 when every record was submitted, 2 when the upload
//! finished with failed chunks (re-run with the same `--cartridge-id` to
//! fill the gaps), 1 on any hard error.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ncart_core::{Platform, Semver, DEFAULT_CHUNK_SIZE};
use ncart_ledger::{InMemoryLedger, Ledger};
use ncart_pipeline::config::{DEFAULT_FAILURE_BUDGET, DEFAULT_RATE_PER_SEC};
use ncart_pipeline::{
    resolve_catalog, ScanDepth, UploadConfig, UploadPipeline, UploadReport, UploadRequest,
};

use crate::node::{parse_id, runtime, NodeArgs};
use crate::preview::{file_name, write_json};

/// Arguments for `ncart upload`.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to publish.
    pub file: PathBuf,

    /// Catalog title, at most 16 characters.
    #[arg(long)]
    pub title: String,

    /// Version, `major.minor.patch`.
    #[arg(long, default_value = "1.0.0")]
    pub semver: Semver,

    /// Target platform: DOS, GB, GBC, NES or a numeric code.
    #[arg(long, default_value = "DOS")]
    pub platform: Platform,

    /// Publishing wallet. Must be unlocked on the node.
    #[arg(long, env = "NCART_SENDER")]
    pub sender: String,

    /// Identity that receives the header and chunks.
    #[arg(long)]
    pub cartridge_address: String,

    /// Catalog identity: `main`, `test` or an address.
    #[arg(long, default_value = "main")]
    pub catalog: String,

    /// Cartridge id. Derived from the current time when omitted. Reuse an
    /// earlier id to fill gaps left by a partial upload.
    #[arg(long, value_parser = parse_id)]
    pub cartridge_id: Option<u32>,

    /// App id. 0 or omitted resolves it from the catalog.
    #[arg(long, value_parser = parse_id)]
    pub app_id: Option<u32>,

    /// Submissions per second. 0 disables pacing.
    #[arg(long, default_value_t = DEFAULT_RATE_PER_SEC)]
    pub rate: u32,

    /// Consecutive chunk failures tolerated before aborting.
    #[arg(long, default_value_t = DEFAULT_FAILURE_BUDGET)]
    pub failure_budget: usize,

    /// Bytes per data chunk, 1-51.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u8,

    /// Encode and log only; submit nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the consensus and unlocked-sender checks.
    #[arg(long)]
    pub no_preflight: bool,

    /// Submit to a simulated in-memory ledger instead of a node.
    #[arg(long, conflicts_with = "dry_run")]
    pub offline: bool,

    /// Write the transaction plan as JSON.
    #[arg(long)]
    pub plan_out: Option<PathBuf>,

    /// Write the cartridge manifest as JSON.
    #[arg(long)]
    pub manifest_out: Option<PathBuf>,

    #[command(flatten)]
    pub node: NodeArgs,
}

impl UploadArgs {
    fn config(&self) -> UploadConfig {
        UploadConfig {
            rate_per_sec: self.rate,
            dry_run: self.dry_run,
            preflight: !self.no_preflight,
            failure_budget: self.failure_budget,
            chunk_size: self.chunk_size,
            catalog_scan: ScanDepth::default(),
        }
    }

    fn request(&self) -> Result<UploadRequest> {
        let bytes = std::fs::read(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let catalog_address = resolve_catalog(&self.catalog, self.node.policy())
            .with_context(|| format!("invalid --catalog: {:?}", self.catalog))?;
        Ok(UploadRequest {
            bytes,
            filename: file_name(&self.file),
            title: self.title.clone(),
            semver: self.semver,
            platform: self.platform,
            cartridge_id: self.cartridge_id,
            app_id: self.app_id.filter(|&id| id != 0),
            sender: self.node.identity("--sender", &self.sender)?,
            cartridge_address: self.node.identity("--cartridge-address", &self.cartridge_address)?,
            catalog_address,
        })
    }
}

/// Execute the upload subcommand.
pub fn run_upload(args: &UploadArgs) -> Result<u8> {
    let request = args.request()?;
    let ledger: Arc<dyn Ledger> = if args.offline {
        tracing::info!("offline mode: submitting to a simulated ledger");
        Arc::new(InMemoryLedger::permissive())
    } else {
        args.node.connect()?
    };
    let pipeline = UploadPipeline::new(ledger, args.config());

    let report = runtime()?
        .block_on(pipeline.run(&request))
        .context("upload failed")?;
    print_report(&report);

    if let Some(path) = &args.plan_out {
        write_json(path, &report.prepared.plan)?;
        println!("Plan written to {}", path.display());
    }
    if let Some(path) = &args.manifest_out {
        write_json(path, &report.prepared.manifest(request.filename.as_deref()))?;
        println!("Manifest written to {}", path.display());
    }

    Ok(if report.progress.failed_chunks.is_empty() { 0 } else { 2 })
}

fn print_report(report: &UploadReport) {
    let progress = &report.progress;
    let prepared = &report.prepared;
    println!(
        "Uploaded cartridge {} (app id {}): {progress}",
        prepared.header.cartridge_id, prepared.entry.app_id
    );
    println!("  SHA256: {}", prepared.header.sha256);
    if let Some(hash) = &progress.cart_tx_hash {
        println!("  CART tx: {hash}");
    }
    if let Some(hash) = &progress.cent_tx_hash {
        println!("  CENT tx: {hash}");
    }
    if !progress.failed_chunks.is_empty() {
        eprintln!(
            "WARNING: {} chunks failed: {:?}. Re-run with --cartridge-id {} to fill the gaps.",
            progress.failed_chunks.len(),
            progress.failed_chunks,
            prepared.header.cartridge_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ncart_core::Identity;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: UploadArgs,
    }

    fn addr(b: u8) -> String {
        Identity::from_bytes([b; 20]).to_user_friendly()
    }

    fn parse(extra: &[&str], file: &str) -> UploadArgs {
        let sender = addr(1);
        let cartridge = addr(2);
        let mut argv = vec![
            "t",
            file,
            "--title",
            "Keen",
            "--sender",
            sender.as_str(),
            "--cartridge-address",
            cartridge.as_str(),
            "--rate",
            "0",
        ];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn zero_app_id_means_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("game.bin");
        std::fs::write(&file, b"payload").unwrap();
        let args = parse(&["--app-id", "0"], file.to_str().unwrap());
        let request = args.request().unwrap();
        assert_eq!(request.app_id, None);
        assert_eq!(request.filename.as_deref(), Some("game.bin"));
    }

    #[test]
    fn negative_app_id_is_rejected() {
        let sender = addr(1);
        let cartridge = addr(2);
        let result = Harness::try_parse_from([
            "t",
            "f",
            "--title",
            "x",
            "--sender",
            sender.as_str(),
            "--cartridge-address",
            cartridge.as_str(),
            "--app-id",
            "-1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_follow_pipeline_defaults() {
        let args = parse(&[], "game.bin");
        let config = args.config();
        assert!(config.preflight);
        assert!(!config.dry_run);
        assert_eq!(config.failure_budget, DEFAULT_FAILURE_BUDGET);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(args.semver, Semver::new(1, 0, 0));
    }

    #[test]
    fn offline_conflicts_with_dry_run() {
        let sender = addr(1);
        let cartridge = addr(2);
        let result = Harness::try_parse_from([
            "t",
            "f",
            "--title",
            "x",
            "--sender",
            sender.as_str(),
            "--cartridge-address",
            cartridge.as_str(),
            "--dry-run",
            "--offline",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn offline_upload_writes_plan_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keen.zip");
        std::fs::write(&file, vec![9u8; 200]).unwrap();
        let plan = dir.path().join("plan.json");
        let manifest = dir.path().join("manifest.json");

        let args = parse(
            &[
                "--offline",
                "--cartridge-id",
                "42",
                "--plan-out",
                plan.to_str().unwrap(),
                "--manifest-out",
                manifest.to_str().unwrap(),
            ],
            file.to_str().unwrap(),
        );
        assert_eq!(run_upload(&args).unwrap(), 0);

        let plan: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(plan).unwrap()).unwrap();
        let txs = plan["transactions"].as_array().unwrap();
        assert_eq!(txs.len(), 6);
        assert!(txs.iter().all(|t| t["tx_hash"].is_string()));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(manifest).unwrap()).unwrap();
        assert_eq!(manifest["cartridge_id"], 42);
        assert_eq!(manifest["app_id"], 1);
        assert_eq!(manifest["filename"], "keen.zip");
        assert_eq!(manifest["chunk_count"], 4);
    }
}

//! # Preview Subcommand
//!
//! Encodes a file into its `CENT`, `CART` and `DATA` records and prints the
//! transaction plan without contacting a ledger node.
//!
//! With `--out-dir` the payloads are also written as hex files
//! (`CENT.hex`, `CART.hex`, `DATA.hex` with one chunk per line) next to a
//! `plan.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use ncart_core::{to_hex, ChecksumPolicy, Identity, Platform, Semver, DEFAULT_CHUNK_SIZE};
use ncart_pipeline::{resolve_catalog, PreparedUpload, RecordKind, UploadRequest};

use crate::node::parse_id;

/// Chunks shown at each end of the plan listing.
const SHOWN_CHUNKS: usize = 3;

/// Arguments for `ncart preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// File to encode.
    pub file: PathBuf,

    /// App id written into the catalog entry.
    #[arg(long, value_parser = parse_id)]
    pub app_id: u32,

    /// Cartridge id shared by the header and every chunk.
    #[arg(long, value_parser = parse_id)]
    pub cartridge_id: u32,

    /// Catalog title, at most 16 characters.
    #[arg(long)]
    pub title: String,

    /// Version, `major.minor.patch`.
    #[arg(long)]
    pub semver: Semver,

    /// Identity that receives the header and chunks.
    #[arg(long)]
    pub cartridge_address: String,

    /// Target platform: DOS, GB, GBC, NES or a numeric code.
    #[arg(long, default_value = "DOS")]
    pub platform: Platform,

    /// Bytes per data chunk, 1-51.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u8,

    /// Catalog identity: `main`, `test` or an address.
    #[arg(long, default_value = "main")]
    pub catalog: String,

    /// Publishing wallet recorded in the plan. Defaults to the all-zero
    /// identity.
    #[arg(long)]
    pub sender: Option<String>,

    /// Directory for hex payload files and `plan.json`.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

/// Execute the preview subcommand.
pub fn run_preview(args: &PreviewArgs) -> Result<u8> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let prepared = prepare(args, bytes)?;
    print_plan(args, &prepared);

    if let Some(dir) = &args.out_dir {
        write_payloads(dir, &prepared)?;
        println!("Payloads written to {}", dir.display());
    }
    Ok(0)
}

fn prepare(args: &PreviewArgs, bytes: Vec<u8>) -> Result<PreparedUpload> {
    let cartridge_address = Identity::parse(&args.cartridge_address, ChecksumPolicy::Lenient)
        .with_context(|| format!("invalid --cartridge-address: {:?}", args.cartridge_address))?;
    let catalog_address = resolve_catalog(&args.catalog, ChecksumPolicy::Lenient)
        .with_context(|| format!("invalid --catalog: {:?}", args.catalog))?;
    let sender = match &args.sender {
        Some(s) => Identity::parse(s, ChecksumPolicy::Lenient)
            .with_context(|| format!("invalid --sender: {s:?}"))?,
        None => Identity::from_bytes([0; Identity::LEN]),
    };
    if args.app_id == 0 {
        bail!("--app-id must be at least 1");
    }

    let request = UploadRequest {
        bytes,
        filename: file_name(&args.file),
        title: args.title.clone(),
        semver: args.semver,
        platform: args.platform,
        cartridge_id: Some(args.cartridge_id),
        app_id: Some(args.app_id),
        sender,
        cartridge_address,
        catalog_address,
    };
    PreparedUpload::new(&request, args.cartridge_id, args.app_id, args.chunk_size)
        .context("failed to encode cartridge")
}

fn print_plan(args: &PreviewArgs, prepared: &PreparedUpload) {
    let header = &prepared.header;
    let entry = &prepared.entry;
    println!("Input: {}", args.file.display());
    println!("  Size: {} bytes", header.total_size);
    println!("  SHA256: {}", header.sha256);
    println!("Cartridge:");
    println!("  App id: {}", entry.app_id);
    println!("  Cartridge id: {}", header.cartridge_id);
    println!("  Title: {:?}", entry.title);
    println!("  Platform: {} ({})", header.platform, header.platform.code());
    println!("  Semver: {}", entry.semver);
    println!("  Cartridge address: {}", entry.cartridge_address.to_spaced());
    println!("  Catalog address: {}", prepared.catalog_address.to_spaced());
    println!("  Chunk size: {} bytes", header.chunk_size);
    println!("  Chunks: {}", prepared.chunk_count());

    for (kind, name) in [(RecordKind::Cent, "CENT"), (RecordKind::Cart, "CART")] {
        if let Some(tx) = prepared.plan.record(kind) {
            println!("{name} -> {}", tx.recipient.to_spaced());
            println!("  {}", to_hex(&tx.payload));
        }
    }

    let data: Vec<_> = prepared.plan.data().collect();
    for (i, tx) in data.iter().enumerate() {
        if data.len() > SHOWN_CHUNKS * 2 && i == SHOWN_CHUNKS {
            println!("  ... {} more chunks ...", data.len() - SHOWN_CHUNKS * 2);
        }
        if i < SHOWN_CHUNKS || i + SHOWN_CHUNKS >= data.len() {
            println!("DATA {} -> {}", tx.chunk_index.unwrap_or(0), tx.recipient.to_spaced());
            println!("  {}", to_hex(&tx.payload));
        }
    }
    println!("Total: {} transactions", prepared.plan.len());
}

/// Write `CENT.hex`, `CART.hex`, `DATA.hex` and `plan.json` into `dir`.
pub fn write_payloads(dir: &Path, prepared: &PreparedUpload) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    for (kind, name) in [(RecordKind::Cent, "CENT.hex"), (RecordKind::Cart, "CART.hex")] {
        if let Some(tx) = prepared.plan.record(kind) {
            write(&dir.join(name), to_hex(&tx.payload))?;
        }
    }
    let data: Vec<String> = prepared.plan.data().map(|tx| to_hex(&tx.payload)).collect();
    write(&dir.join("DATA.hex"), data.join("\n") + "\n")?;
    write_json(&dir.join("plan.json"), &prepared.plan)
}

/// Pretty JSON to `path`.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    write(path, json)
}

fn write(path: &Path, contents: String) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// File name component of `path`, if any.
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

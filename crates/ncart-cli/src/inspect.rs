//! # Inspect Subcommand
//!
//! Reports what a cartridge identity holds without reconstructing it: the
//! newest header and a breakdown of the records found.

use anyhow::{Context, Result};
use clap::Args;
use ncart_cache::MemoryCartridgeCache;
use ncart_pipeline::{CartridgeInfo, SyncPipeline};

use crate::node::{runtime, NodeArgs};
use crate::sync::HistoryArgs;

/// Arguments for `ncart inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Cartridge identity.
    pub address: String,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub history: HistoryArgs,

    #[command(flatten)]
    pub node: NodeArgs,
}

/// Execute the inspect subcommand.
pub fn run_inspect(args: &InspectArgs) -> Result<u8> {
    let address = args.node.identity("address", &args.address)?;
    let pipeline = SyncPipeline::new(
        args.node.connect()?,
        MemoryCartridgeCache::new(),
        args.history.config(&args.node)?,
    );
    let info = runtime()?
        .block_on(pipeline.inspect(&address))
        .context("inspect failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }
    Ok(if info.is_complete() { 0 } else { 2 })
}

fn print_info(info: &CartridgeInfo) {
    println!("Cartridge address: {}", info.address.to_spaced());
    println!(
        "  Transactions: {} over {} pages{}",
        info.transactions,
        info.pages,
        if info.hit_page_ceiling { " (truncated)" } else { "" }
    );
    println!(
        "  Records: {} CART, {} DATA, {} other",
        info.cart_records, info.data_records, info.other_records
    );
    match &info.header {
        Some(located) => {
            let h = &located.header;
            println!("Header (tx {}, height {}):", located.tx_hash, located.height);
            println!("  Cartridge id: {}", h.cartridge_id);
            println!("  Platform: {}", h.platform);
            println!("  Schema: {}", h.schema);
            println!("  Size: {} bytes in {}-byte chunks", h.total_size, h.chunk_size);
            println!("  SHA256: {}", h.sha256);
            println!("  Chunks: {}/{} found", info.chunks_found, info.chunks_expected);
        }
        None => println!("No cartridge header found."),
    }
}

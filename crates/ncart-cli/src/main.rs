//! # ncart CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ncart_cli::cache::{run_cache, CacheArgs};
use ncart_cli::catalog::{run_catalog, CatalogArgs};
use ncart_cli::identity::{run_identity, IdentityArgs};
use ncart_cli::inspect::{run_inspect, InspectArgs};
use ncart_cli::preview::{run_preview, PreviewArgs};
use ncart_cli::sync::{run_sync, SyncArgs};
use ncart_cli::upload::{run_upload, UploadArgs};

/// Publish files to a ledger as cartridges and rebuild them again.
#[derive(Parser, Debug)]
#[command(name = "ncart", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a file into CENT, CART and DATA records without a ledger.
    Preview(PreviewArgs),

    /// Publish a file: data chunks, header, catalog entry.
    Upload(UploadArgs),

    /// Rebuild and verify a cartridge from its ledger identity.
    Sync(SyncArgs),

    /// Show the header and record counts at a cartridge identity.
    Inspect(InspectArgs),

    /// Catalog queries (next-id, find, list).
    Catalog(CatalogArgs),

    /// Convert and check identity strings.
    Identity(IdentityArgs),

    /// Local cartridge cache maintenance.
    Cache(CacheArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!("ncart v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Preview(args) => run_preview(&args),
        Commands::Upload(args) => run_upload(&args),
        Commands::Sync(args) => run_sync(&args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Catalog(args) => run_catalog(&args),
        Commands::Identity(args) => run_identity(&args),
        Commands::Cache(args) => run_cache(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

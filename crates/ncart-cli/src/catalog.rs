//! # Catalog Subcommand
//!
//! Read-only queries over a catalog identity.
//!
//! ## Subcommands
//!
//! - `next-id`: the app id a new title would receive.
//! - `find`: the app id already used for a title.
//! - `list`: every catalog entry, newest first.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ncart_pipeline::{resolve_catalog, CatalogListing, CatalogScanner, ScanDepth};

use crate::node::{runtime, NodeArgs};

/// Arguments for `ncart catalog`.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Catalog identity: `main`, `test` or an address.
    #[arg(long, default_value = "main")]
    pub catalog: String,

    /// Only consider entries published by this identity.
    #[arg(long)]
    pub publisher: Option<String>,

    /// Transactions requested per history page.
    #[arg(long, default_value_t = ScanDepth::default().page_size)]
    pub page_size: usize,

    /// Maximum history pages walked.
    #[arg(long, default_value_t = ScanDepth::default().max_pages)]
    pub max_pages: usize,

    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub command: CatalogCommand,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Print the next free app id.
    NextId,

    /// Print the app id of an existing title.
    Find {
        /// Title to look up, case-insensitive.
        #[arg(long)]
        title: String,
    },

    /// List catalog entries.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the catalog subcommand.
pub fn run_catalog(args: &CatalogArgs) -> Result<u8> {
    let catalog = resolve_catalog(&args.catalog, args.node.policy())
        .with_context(|| format!("invalid --catalog: {:?}", args.catalog))?;
    let publisher = args
        .publisher
        .as_deref()
        .map(|p| args.node.identity("--publisher", p))
        .transpose()?;
    let ledger = args.node.connect()?;
    let scanner = CatalogScanner::new(&ledger, catalog)
        .with_publisher(publisher)
        .with_depth(ScanDepth {
            page_size: args.page_size,
            max_pages: args.max_pages,
        });
    let rt = runtime()?;

    match &args.command {
        CatalogCommand::NextId => {
            let id = rt
                .block_on(scanner.try_next_app_id())
                .context("failed to scan catalog")?;
            println!("{id}");
            Ok(0)
        }
        CatalogCommand::Find { title } => {
            match rt
                .block_on(scanner.find_by_title(title))
                .context("failed to scan catalog")?
            {
                Some(id) => {
                    println!("{id}");
                    Ok(0)
                }
                None => {
                    eprintln!("No catalog entry titled {title:?}.");
                    Ok(1)
                }
            }
        }
        CatalogCommand::List { json } => {
            let entries = rt
                .block_on(scanner.entries())
                .context("failed to scan catalog")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_entries(&entries);
            }
            Ok(0)
        }
    }
}

fn print_entries(entries: &[CatalogListing]) {
    if entries.is_empty() {
        println!("No catalog entries found.");
        return;
    }
    println!("Catalog entries ({}):", entries.len());
    for listing in entries {
        let e = &listing.entry;
        println!(
            "  {:>6}  {:<16} {:>9}  {:<4} {}",
            e.app_id,
            e.title,
            e.semver.to_string(),
            e.platform.name(),
            e.cartridge_address.to_spaced()
        );
    }
}

//! # Catalog Scanner
//!
//! Read-only queries over a catalog identity's history. Every query walks
//! the same bounded window ([`ScanDepth`]), keeps only transactions from
//! the publisher when one is set, and decodes payloads as `CENT` entries.
//! Other payloads are skipped.
//!
//! - [`CatalogScanner::entries`]: every entry, newest first.
//! - [`CatalogScanner::try_next_app_id`]: `max(app_id) + 1`, or `1` for an
//!   empty catalog.
//! - [`CatalogScanner::find_by_title`]: app id of the newest entry whose
//!   title matches, so a title keeps its id across versions.
//!
//! [`CatalogScanner::next_app_id`] and [`CatalogScanner::resolve_app_id`]
//! never fail: a retrieval error falls back to a timestamp-derived id.

use chrono::Utc;
use ncart_core::{CatalogEntry, Identity};
use ncart_ledger::{fetch_all_transactions, Ledger, LedgerError};
use serde::Serialize;

use crate::config::ScanDepth;

/// One decoded catalog entry and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogListing {
    /// The decoded entry.
    pub entry: CatalogEntry,
    /// Carrying transaction.
    pub tx_hash: String,
    /// Sender as reported by the node.
    pub sender: String,
    /// Block height.
    pub height: u64,
}

/// Identifier derived from the current unix time, used for cartridge ids
/// and as the app id fallback.
pub fn timestamp_id() -> u32 {
    let secs = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    // Modulus keeps the value inside u32 range.
    (secs % 0xFFFF_FFFF) as u32
}

/// Queries over one catalog identity.
#[derive(Debug)]
pub struct CatalogScanner<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    catalog: Identity,
    publisher: Option<Identity>,
    depth: ScanDepth,
}

impl<'a, L: Ledger + ?Sized> CatalogScanner<'a, L> {
    /// Scanner over `catalog` with the default depth and no publisher filter.
    pub fn new(ledger: &'a L, catalog: Identity) -> Self {
        Self {
            ledger,
            catalog,
            publisher: None,
            depth: ScanDepth::default(),
        }
    }

    /// Only trust entries sent by `publisher`.
    pub fn with_publisher(mut self, publisher: Option<Identity>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Override the scan window.
    pub fn with_depth(mut self, depth: ScanDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Every catalog entry in the window, newest first.
    pub async fn entries(&self) -> Result<Vec<CatalogListing>, LedgerError> {
        let history = fetch_all_transactions(
            self.ledger,
            &self.catalog,
            &self.depth.pagination(),
            |p| tracing::debug!(page = p.page, fetched = p.total_fetched, "catalog page"),
        )
        .await?;

        if history.hit_page_ceiling {
            tracing::warn!(
                catalog = %self.catalog,
                max_pages = self.depth.max_pages,
                "catalog scan hit its page ceiling; identifiers may be stale"
            );
        }

        let policy = self.ledger.checksum_policy();
        let listings: Vec<CatalogListing> = history
            .transactions
            .into_iter()
            .filter(|tx| self.publisher.map_or(true, |p| tx.is_from(&p, policy)))
            .filter_map(|tx| {
                let entry = CatalogEntry::decode(&tx.payload).ok()?;
                Some(CatalogListing {
                    entry,
                    tx_hash: tx.hash,
                    sender: tx.from,
                    height: tx.height,
                })
            })
            .collect();

        tracing::debug!(catalog = %self.catalog, entries = listings.len(), "catalog scanned");
        Ok(listings)
    }

    /// Next unused app id: one past the largest seen, `1` when none.
    pub async fn try_next_app_id(&self) -> Result<u32, LedgerError> {
        Ok(next_after(&self.entries().await?))
    }

    /// [`try_next_app_id`](Self::try_next_app_id), falling back to a
    /// timestamp-derived id when the catalog cannot be read.
    pub async fn next_app_id(&self) -> u32 {
        match self.try_next_app_id().await {
            Ok(id) => id,
            Err(e) => self.fallback_app_id(&e),
        }
    }

    /// App id of the newest entry whose title matches `title` (trimmed,
    /// case-insensitive). `None` when no entry matches.
    pub async fn find_by_title(&self, title: &str) -> Result<Option<u32>, LedgerError> {
        Ok(newest_with_title(&self.entries().await?, title))
    }

    /// App id for publishing `title`: the existing id for a matching title,
    /// else the next unused id. Both come from a single catalog scan.
    pub async fn resolve_app_id(&self, title: &str) -> u32 {
        let listings = match self.entries().await {
            Ok(listings) => listings,
            Err(e) => return self.fallback_app_id(&e),
        };
        if let Some(app_id) = newest_with_title(&listings, title).filter(|&id| id > 0) {
            tracing::info!(app_id, title, "found existing app id (new version)");
            return app_id;
        }
        let app_id = next_after(&listings);
        tracing::info!(app_id, title, "allocated app id (new title)");
        app_id
    }

    fn fallback_app_id(&self, e: &LedgerError) -> u32 {
        let fallback = timestamp_id();
        tracing::warn!(
            catalog = %self.catalog,
            fallback,
            "failed to query catalog: {e}; using timestamp fallback"
        );
        fallback
    }
}

fn newest_with_title(listings: &[CatalogListing], title: &str) -> Option<u32> {
    listings
        .iter()
        .find(|l| l.entry.title_matches(title))
        .map(|l| l.entry.app_id)
}

fn next_after(listings: &[CatalogListing]) -> u32 {
    listings
        .iter()
        .map(|l| l.entry.app_id)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

//! Full-history retrieval over the paged `transactions_by_address` call.
//!
//! Pages arrive newest first and the cursor is the last (oldest) hash of
//! the previous page. Transactions are deduplicated by hash across pages.
//! The walk stops when:
//!
//! - a page is empty,
//! - a page is shorter than the page size,
//! - `max_stale_pages` consecutive pages add no new hash,
//! - `max_pages` pages have been fetched.
//!
//! A backend that ignores the cursor returns the same page again. When the
//! cursor would not move, the walk retries once from the page's first hash
//! instead.

use std::collections::HashSet;

use ncart_core::Identity;

use crate::error::LedgerError;
use crate::types::Transaction;
use crate::Ledger;

/// Paging limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Transactions requested per page.
    pub page_size: usize,
    /// Hard ceiling on pages fetched.
    pub max_pages: usize,
    /// Consecutive pages without a new hash before giving up.
    pub max_stale_pages: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_pages: 100,
            max_stale_pages: 3,
        }
    }
}

/// Progress after each fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// One-based page number.
    pub page: usize,
    /// Unique transactions collected so far.
    pub total_fetched: usize,
    /// Unique transactions this page added.
    pub new_in_page: usize,
}

/// Result of a full-history walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    /// Unique transactions in the order first received.
    pub transactions: Vec<Transaction>,
    /// Pages fetched, including the terminating one.
    pub pages: usize,
    /// Pages that contributed no new hash.
    pub duplicate_pages: usize,
    /// Whether the walk stopped at `max_pages`; older history may exist.
    pub hit_page_ceiling: bool,
}

/// Fetch every transaction at `address`, reporting progress per page.
pub async fn fetch_all_transactions<L, F>(
    ledger: &L,
    address: &Identity,
    pagination: &Pagination,
    mut on_progress: F,
) -> Result<History, LedgerError>
where
    L: Ledger + ?Sized,
    F: FnMut(PageProgress) + Send,
{
    let page_size = pagination.page_size.max(1);
    let mut history = History::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut stale = 0usize;

    loop {
        let page = ledger
            .transactions_by_address(address, page_size, cursor.as_deref())
            .await?;
        history.pages += 1;
        tracing::debug!(
            page = history.pages,
            received = page.len(),
            cursor = cursor.as_deref().unwrap_or("-"),
            "fetched history page"
        );

        let (first_hash, last_hash) = match (page.first(), page.last()) {
            (Some(first), Some(last)) => (first.hash.clone(), last.hash.clone()),
            _ => break,
        };
        let received = page.len();

        let before = history.transactions.len();
        for tx in page {
            if seen.insert(tx.hash.clone()) {
                history.transactions.push(tx);
            }
        }
        let new_in_page = history.transactions.len() - before;

        on_progress(PageProgress {
            page: history.pages,
            total_fetched: history.transactions.len(),
            new_in_page,
        });

        if new_in_page == 0 {
            stale += 1;
            history.duplicate_pages += 1;
            if stale >= pagination.max_stale_pages {
                tracing::warn!(
                    address = %address,
                    pages = history.pages,
                    "{stale} consecutive pages without new transactions, stopping"
                );
                break;
            }
        } else {
            stale = 0;
        }

        if cursor.as_deref() == Some(last_hash.as_str()) {
            tracing::warn!(page = history.pages, "cursor did not advance, retrying from first hash");
            cursor = Some(first_hash);
        } else {
            cursor = Some(last_hash);
        }

        if received < page_size {
            break;
        }
        if history.pages >= pagination.max_pages {
            tracing::warn!(
                address = %address,
                max_pages = pagination.max_pages,
                "page ceiling reached, older history not fetched"
            );
            history.hit_page_ceiling = true;
            break;
        }
    }

    tracing::debug!(
        address = %address,
        transactions = history.transactions.len(),
        pages = history.pages,
        "history fetch complete"
    );
    Ok(history)
}

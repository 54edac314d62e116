//! # ncart-ledger: Ledger Query/Command Interface
//!
//! Everything the cartridge pipelines need from a ledger node, behind one
//! async trait:
//!
//! | Operation | JSON-RPC method |
//! |---|---|
//! | [`Ledger::is_consensus_established`] | `isConsensusEstablished` |
//! | [`Ledger::is_account_unlocked`] | `isAccountUnlocked` |
//! | [`Ledger::block_number`] | `getBlockNumber` |
//! | [`Ledger::transaction_by_hash`] | `getTransactionByHash` |
//! | [`Ledger::transactions_by_address`] | `getTransactionsByAddress` |
//! | [`Ledger::send_transaction`] | `sendBasicTransactionWithData` |
//!
//! Two implementations ship with the crate: [`RpcLedger`] talks JSON-RPC to
//! a node over HTTP, [`InMemoryLedger`] simulates an append-only ledger for
//! tests and offline runs.
//!
//! [`pagination::fetch_all_transactions`] walks an identity's full history
//! on top of any implementation.
//!
//! Each backend also reports the [`ChecksumPolicy`] under which the sender
//! strings it returns are read back into identities.

pub mod config;
pub mod error;
pub mod memory;
pub mod pagination;
pub mod retry;
pub mod rpc;
pub mod types;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use pagination::{fetch_all_transactions, History, PageProgress, Pagination};
pub use retry::RetryPolicy;
pub use rpc::RpcLedger;
pub use types::{OutgoingTransaction, Transaction};

use async_trait::async_trait;
use ncart_core::{ChecksumPolicy, Identity};

/// Query/command contract of a ledger node.
///
/// Transaction lists are newest first. `start_at` is exclusive: a page
/// starting at hash `h` holds transactions older than `h`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the node's view of the chain has caught up with the network.
    async fn is_consensus_established(&self) -> Result<bool, LedgerError>;

    /// Whether the node holds `account` unlocked and can sign for it.
    async fn is_account_unlocked(&self, account: &Identity) -> Result<bool, LedgerError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Look up one transaction. `None` when the node does not know it.
    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, LedgerError>;

    /// One page of an identity's history.
    async fn transactions_by_address(
        &self,
        address: &Identity,
        max: usize,
        start_at: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Submit a transaction and return its hash.
    async fn send_transaction(&self, tx: &OutgoingTransaction) -> Result<String, LedgerError>;

    /// Check digit handling for address strings this backend reports.
    fn checksum_policy(&self) -> ChecksumPolicy {
        ChecksumPolicy::Lenient
    }
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    async fn is_consensus_established(&self) -> Result<bool, LedgerError> {
        (**self).is_consensus_established().await
    }

    async fn is_account_unlocked(&self, account: &Identity) -> Result<bool, LedgerError> {
        (**self).is_account_unlocked(account).await
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        (**self).block_number().await
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, LedgerError> {
        (**self).transaction_by_hash(hash).await
    }

    async fn transactions_by_address(
        &self,
        address: &Identity,
        max: usize,
        start_at: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        (**self).transactions_by_address(address, max, start_at).await
    }

    async fn send_transaction(&self, tx: &OutgoingTransaction) -> Result<String, LedgerError> {
        (**self).send_transaction(tx).await
    }

    fn checksum_policy(&self) -> ChecksumPolicy {
        (**self).checksum_policy()
    }
}

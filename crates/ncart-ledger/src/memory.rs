//! In-memory ledger.
//!
//! An append-only transaction log with one transaction per block. History
//! queries follow the node contract: newest first, exclusive cursor,
//! address-indexed on both sender and recipient.
//!
//! Switches for consensus, account unlock state and injected send failures
//! let tests drive every precondition and failure path of the pipelines.

use std::collections::HashSet;

use async_trait::async_trait;
use ncart_core::{sha256_digest, Identity};
use parking_lot::RwLock;

use crate::error::LedgerError;
use crate::types::{OutgoingTransaction, Transaction};
use crate::Ledger;

#[derive(Debug)]
struct State {
    /// Oldest first.
    log: Vec<Transaction>,
    height: u64,
    consensus: bool,
    unlocked: HashSet<Identity>,
    unlock_all: bool,
    fail_next_sends: usize,
    fail_all_sends: bool,
    send_attempts: usize,
    history_queries: usize,
}

/// Simulated append-only ledger.
#[derive(Debug)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Empty ledger at height 1 with consensus established and every
    /// account locked.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                log: Vec::new(),
                height: 1,
                consensus: true,
                unlocked: HashSet::new(),
                unlock_all: false,
                fail_next_sends: 0,
                fail_all_sends: false,
                send_attempts: 0,
                history_queries: 0,
            }),
        }
    }

    /// Ledger that treats every account as unlocked. Used for offline runs.
    pub fn permissive() -> Self {
        let ledger = Self::new();
        ledger.state.write().unlock_all = true;
        ledger
    }

    /// Mark an account as unlocked.
    pub fn unlock(&self, account: &Identity) {
        self.state.write().unlocked.insert(*account);
    }

    /// Toggle consensus.
    pub fn set_consensus(&self, established: bool) {
        self.state.write().consensus = established;
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        self.state.write().fail_next_sends = n;
    }

    /// Make every send fail until switched off.
    pub fn fail_all_sends(&self, fail: bool) {
        self.state.write().fail_all_sends = fail;
    }

    /// Append a transaction directly, bypassing unlock checks and failure
    /// injection. Returns its hash.
    pub fn push(&self, from: &Identity, to: &Identity, payload: Vec<u8>) -> String {
        let mut state = self.state.write();
        append(&mut state, from, to, payload)
    }

    /// Snapshot of the log, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.read().log.clone()
    }

    /// Sends attempted through [`Ledger::send_transaction`], failed or not.
    pub fn send_attempts(&self) -> usize {
        self.state.read().send_attempts
    }

    /// History pages served through [`Ledger::transactions_by_address`].
    pub fn history_queries(&self) -> usize {
        self.state.read().history_queries
    }
}

fn append(state: &mut State, from: &Identity, to: &Identity, payload: Vec<u8>) -> String {
    let seq = state.log.len() as u64;
    let mut preimage = seq.to_le_bytes().to_vec();
    preimage.extend_from_slice(from.as_bytes());
    preimage.extend_from_slice(to.as_bytes());
    preimage.extend_from_slice(&payload);
    let hash = sha256_digest(&preimage).to_hex();

    state.log.push(Transaction {
        hash: hash.clone(),
        height: state.height,
        from: from.to_user_friendly(),
        to: to.to_user_friendly(),
        payload,
    });
    state.height += 1;
    hash
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn is_consensus_established(&self) -> Result<bool, LedgerError> {
        Ok(self.state.read().consensus)
    }

    async fn is_account_unlocked(&self, account: &Identity) -> Result<bool, LedgerError> {
        let state = self.state.read();
        Ok(state.unlock_all || state.unlocked.contains(account))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.state.read().height)
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, LedgerError> {
        Ok(self
            .state
            .read()
            .log
            .iter()
            .find(|t| t.hash == hash)
            .cloned())
    }

    async fn transactions_by_address(
        &self,
        address: &Identity,
        max: usize,
        start_at: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut state = self.state.write();
        state.history_queries += 1;
        let mut newest_first = state
            .log
            .iter()
            .rev()
            .filter(|t| address.matches(&t.to) || address.matches(&t.from));

        if let Some(cursor) = start_at {
            if !newest_first.by_ref().any(|t| t.hash == cursor) {
                return Ok(Vec::new());
            }
        }
        Ok(newest_first.take(max).cloned().collect())
    }

    async fn send_transaction(&self, tx: &OutgoingTransaction) -> Result<String, LedgerError> {
        let mut state = self.state.write();
        state.send_attempts += 1;

        if state.fail_all_sends {
            return Err(LedgerError::Unavailable("send rejected (all sends failing)".into()));
        }
        if state.fail_next_sends > 0 {
            state.fail_next_sends -= 1;
            return Err(LedgerError::Unavailable("send rejected (injected failure)".into()));
        }
        if !(state.unlock_all || state.unlocked.contains(&tx.sender)) {
            return Err(LedgerError::Rpc {
                method: "sendBasicTransactionWithData".into(),
                code: -32000,
                message: format!("account {} is locked", tx.sender),
            });
        }
        Ok(append(&mut state, &tx.sender, &tx.recipient, tx.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Identity, Identity, Identity) {
        (
            Identity::from_bytes([1; 20]),
            Identity::from_bytes([2; 20]),
            Identity::from_bytes([3; 20]),
        )
    }

    #[tokio::test]
    async fn history_is_newest_first_with_exclusive_cursor() {
        let ledger = InMemoryLedger::new();
        let (a, b, _) = ids();
        let h0 = ledger.push(&a, &b, vec![0]);
        let h1 = ledger.push(&a, &b, vec![1]);
        let h2 = ledger.push(&a, &b, vec![2]);

        let page = ledger.transactions_by_address(&b, 2, None).await.unwrap();
        let hashes: Vec<_> = page.iter().map(|t| t.hash.clone()).collect();
        assert_eq!(hashes, vec![h2, h1.clone()]);

        let next = ledger.transactions_by_address(&b, 2, Some(&h1)).await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].hash, h0);
        assert!(next[0].height < page[0].height);
    }

    #[tokio::test]
    async fn history_is_address_indexed() {
        let ledger = InMemoryLedger::new();
        let (a, b, c) = ids();
        ledger.push(&a, &b, vec![]);
        ledger.push(&c, &a, vec![]);
        assert_eq!(ledger.transactions_by_address(&a, 10, None).await.unwrap().len(), 2);
        assert_eq!(ledger.transactions_by_address(&b, 10, None).await.unwrap().len(), 1);
        assert_eq!(ledger.transactions_by_address(&c, 10, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_queries_are_counted() {
        let ledger = InMemoryLedger::new();
        let (a, _, _) = ids();
        assert_eq!(ledger.history_queries(), 0);
        ledger.transactions_by_address(&a, 10, None).await.unwrap();
        ledger.transactions_by_address(&a, 10, Some("nope")).await.unwrap();
        assert_eq!(ledger.history_queries(), 2);
    }

    #[tokio::test]
    async fn unknown_cursor_yields_empty_page() {
        let ledger = InMemoryLedger::new();
        let (a, b, _) = ids();
        ledger.push(&a, &b, vec![]);
        let page = ledger
            .transactions_by_address(&b, 10, Some("nope"))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn locked_sender_is_rejected() {
        let ledger = InMemoryLedger::new();
        let (a, b, _) = ids();
        let tx = OutgoingTransaction::data(a, b, vec![1], 1);
        assert!(matches!(
            ledger.send_transaction(&tx).await,
            Err(LedgerError::Rpc { .. })
        ));
        ledger.unlock(&a);
        let hash = ledger.send_transaction(&tx).await.unwrap();
        let found = ledger.transaction_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.payload, vec![1]);
        assert!(found.is_from(&a, ncart_core::ChecksumPolicy::Strict));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let ledger = InMemoryLedger::permissive();
        let (a, b, _) = ids();
        ledger.fail_next_sends(2);
        let tx = OutgoingTransaction::data(a, b, vec![], 1);
        assert!(ledger.send_transaction(&tx).await.is_err());
        assert!(ledger.send_transaction(&tx).await.is_err());
        assert!(ledger.send_transaction(&tx).await.is_ok());
        assert_eq!(ledger.send_attempts(), 3);
        assert_eq!(ledger.transactions().len(), 1);
    }

    #[tokio::test]
    async fn height_advances_per_transaction() {
        let ledger = InMemoryLedger::permissive();
        let (a, b, _) = ids();
        assert_eq!(ledger.block_number().await.unwrap(), 1);
        ledger.push(&a, &b, vec![]);
        assert_eq!(ledger.block_number().await.unwrap(), 2);
        ledger.set_consensus(false);
        assert!(!ledger.is_consensus_established().await.unwrap());
    }
}

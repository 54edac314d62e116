//! Ledger transaction shapes and response normalization.
//!
//! Nodes disagree on field names (`hash` vs `Hash`, `recipientData` vs
//! `data`, `height` vs `blockNumber`). [`Transaction::normalize`] is the one
//! place that knows about those variants; everything downstream sees a
//! fixed shape.

use ncart_core::{from_hex, ChecksumPolicy, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum value, in the smallest unit, of a transaction carrying data.
pub const MIN_DATA_TX_VALUE: u64 = 1;

const HASH_FIELDS: &[&str] = &["hash", "Hash"];
const HEIGHT_FIELDS: &[&str] = &["height", "Height", "blockNumber", "BlockNumber", "block_number"];
const PAYLOAD_FIELDS: &[&str] = &[
    "recipientData",
    "RecipientData",
    "recipient_data",
    "data",
    "Data",
    "senderData",
    "SenderData",
    "sender_data",
];
const FROM_FIELDS: &[&str] = &["from", "From", "fromAddress", "from_address"];
const TO_FIELDS: &[&str] = &["to", "To", "toAddress", "to_address"];

/// A confirmed (or pending) ledger transaction in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash as reported by the node.
    pub hash: String,
    /// Block height, 0 when unconfirmed or unreported.
    pub height: u64,
    /// Sender address string as reported by the node.
    pub from: String,
    /// Recipient address string as reported by the node.
    pub to: String,
    /// Attached data bytes. Empty when absent or not valid hex.
    pub payload: Vec<u8>,
}

impl Transaction {
    /// Normalize one transaction object from any known response shape.
    ///
    /// Returns `None` for non-objects and objects without a hash.
    pub fn normalize(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let hash = first_str(obj, HASH_FIELDS)?.to_string();
        if hash.is_empty() {
            return None;
        }

        let payload = match first_str(obj, PAYLOAD_FIELDS) {
            Some(hex) => from_hex(hex).unwrap_or_else(|e| {
                tracing::debug!(tx_hash = %hash, "ignoring undecodable payload: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Some(Self {
            height: first_u64(obj, HEIGHT_FIELDS).unwrap_or(0),
            from: first_str(obj, FROM_FIELDS).unwrap_or_default().to_string(),
            to: first_str(obj, TO_FIELDS).unwrap_or_default().to_string(),
            payload,
            hash,
        })
    }

    /// The reported sender, parsed under `policy`. `None` when the node
    /// reported no sender or one that does not parse.
    pub fn sender(&self, policy: ChecksumPolicy) -> Option<Identity> {
        Identity::parse(&self.from, policy).ok()
    }

    /// Whether the reported sender is `identity`. Whitespace and case are
    /// ignored; check digits are verified only under
    /// [`ChecksumPolicy::Strict`].
    pub fn is_from(&self, identity: &Identity, policy: ChecksumPolicy) -> bool {
        self.sender(policy).as_ref() == Some(identity)
    }
}

/// A transaction to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingTransaction {
    /// Sending wallet. Must be unlocked on the node.
    pub sender: Identity,
    /// Recipient identity.
    pub recipient: Identity,
    /// Data bytes to attach.
    pub payload: Vec<u8>,
    /// Value transferred.
    pub value: u64,
    /// Fee offered.
    pub fee: u64,
    /// Height from which the transaction is valid.
    pub validity_start_height: u64,
}

impl OutgoingTransaction {
    /// A minimum-value, zero-fee data transaction.
    pub fn data(sender: Identity, recipient: Identity, payload: Vec<u8>, height: u64) -> Self {
        Self {
            sender,
            recipient,
            payload,
            value: MIN_DATA_TX_VALUE,
            fee: 0,
            validity_start_height: height,
        }
    }
}

fn first_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn first_u64(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Normalize a `getTransactionsByAddress` result: a bare array, or an
/// object with a `transactions` array. Entries that fail normalization are
/// dropped.
pub fn normalize_transaction_list(value: &Value) -> Option<Vec<Transaction>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => obj.get("transactions")?.as_array()?,
        Value::Null => return Some(Vec::new()),
        _ => return None,
    };
    Some(items.iter().filter_map(Transaction::normalize).collect())
}

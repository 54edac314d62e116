//! JSON-RPC 2.0 client for a ledger node.
//!
//! ## Response Envelope
//!
//! Some node versions wrap every result as `{"data": ..., "metadata": ...}`.
//! The wrapper is removed when `data` is present and no keys other than
//! `data` and `metadata` appear, so a transaction object that happens to
//! carry a `data` field is left intact.
//!
//! ## Submission
//!
//! `sendBasicTransactionWithData` is called with named parameters first.
//! If the node rejects that call (a 4xx status or a JSON-RPC error object),
//! the same call is repeated once with positional parameters. Transport
//! failures and 5xx statuses are not followed by a second attempt, since
//! the first may have reached the node.
//!
//! ## Retries
//!
//! Queries run under a [`RetryPolicy`] (three retries with doubling delay
//! by default). Every attempt is a fresh request with its own id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ncart_core::{to_hex, ChecksumPolicy, Identity};
use serde_json::{json, Value};
use url::Url;

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::retry::RetryPolicy;
use crate::types::{normalize_transaction_list, OutgoingTransaction, Transaction};
use crate::Ledger;

const SEND_METHOD: &str = "sendBasicTransactionWithData";

/// Ledger backed by a node's JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcLedger {
    http: reqwest::Client,
    url: Url,
    credentials: Option<(String, String)>,
    checksum_policy: ChecksumPolicy,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Create a client from configuration.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Http {
                method: "client_init".into(),
                source: e,
            })?;

        let credentials = match (config.username, config.password) {
            (Some(u), Some(p)) => Some((u, p)),
            (None, None) => None,
            _ => return Err(crate::config::ConfigError::IncompleteCredentials.into()),
        };

        Ok(Self {
            http,
            url: config.rpc_url,
            credentials,
            checksum_policy: config.checksum_policy,
            retry: RetryPolicy::default(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Replace the retry policy for queries.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self, body: &Value) -> reqwest::RequestBuilder {
        let req = self.http.post(self.url.clone()).json(body);
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    /// A side-effect-free call, repeated under the retry policy.
    async fn query(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        self.retry.run(method, || self.call(method, &params)).await
    }

    /// Perform one JSON-RPC call and return the unwrapped `result`.
    async fn call(&self, method: &str, params: &Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self.request(&body).send().await.map_err(|e| LedgerError::Http {
            method: method.into(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                method: method.into(),
                status,
                body,
            });
        }

        let envelope: Value = resp.json().await.map_err(|e| LedgerError::Deserialization {
            method: method.into(),
            source: e,
        })?;
        parse_envelope(method, envelope)
    }
}

fn parse_envelope(method: &str, envelope: Value) -> Result<Value, LedgerError> {
    if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(LedgerError::Rpc {
            method: method.into(),
            code,
            message,
        });
    }
    let result = envelope.get("result").cloned().unwrap_or(Value::Null);
    Ok(unwrap_data(result))
}

fn unwrap_data(result: Value) -> Value {
    match result {
        Value::Object(mut obj)
            if obj.contains_key("data") && obj.keys().all(|k| k == "data" || k == "metadata") =>
        {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Pull a transaction hash out of a send result: a bare string, or an
/// object carrying `Blake2bHash`, `hash` or `Hash`.
fn extract_tx_hash(result: &Value) -> Option<String> {
    match result {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => ["Blake2bHash", "hash", "Hash"]
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

fn malformed(method: &str, reason: impl Into<String>) -> LedgerError {
    LedgerError::Malformed {
        method: method.into(),
        reason: reason.into(),
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn is_consensus_established(&self) -> Result<bool, LedgerError> {
        let method = "isConsensusEstablished";
        let v = self.query(method, json!({})).await?;
        v.as_bool()
            .ok_or_else(|| malformed(method, format!("expected boolean, got {v}")))
    }

    async fn is_account_unlocked(&self, account: &Identity) -> Result<bool, LedgerError> {
        let method = "isAccountUnlocked";
        let params = json!({ "address": account.to_user_friendly() });
        let v = self.query(method, params).await?;
        v.as_bool()
            .ok_or_else(|| malformed(method, format!("expected boolean, got {v}")))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let method = "getBlockNumber";
        let v = self.query(method, json!({})).await?;
        let height = match &v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        height.ok_or_else(|| malformed(method, format!("expected block height, got {v}")))
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, LedgerError> {
        let method = "getTransactionByHash";
        let v = self.query(method, json!({ "hash": hash })).await?;
        match v {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Transaction {
                hash: s,
                height: 0,
                from: String::new(),
                to: String::new(),
                payload: Vec::new(),
            })),
            Value::Object(mut obj) => {
                if !obj.contains_key("hash") && !obj.contains_key("Hash") {
                    obj.insert("hash".into(), Value::String(hash.to_string()));
                }
                Ok(Transaction::normalize(&Value::Object(obj)))
            }
            other => Err(malformed(method, format!("expected transaction, got {other}"))),
        }
    }

    async fn transactions_by_address(
        &self,
        address: &Identity,
        max: usize,
        start_at: Option<&str>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let method = "getTransactionsByAddress";
        let mut params = json!({
            "address": address.to_user_friendly(),
            "max": max,
        });
        if let Some(cursor) = start_at {
            params["start_at"] = Value::String(cursor.to_string());
        }
        let v = self.query(method, params).await?;
        normalize_transaction_list(&v)
            .ok_or_else(|| malformed(method, "expected a transaction list"))
    }

    async fn send_transaction(&self, tx: &OutgoingTransaction) -> Result<String, LedgerError> {
        let wallet = tx.sender.to_user_friendly();
        let recipient = tx.recipient.to_user_friendly();
        let data = to_hex(&tx.payload);

        let named = json!({
            "wallet": wallet,
            "recipient": recipient,
            "data": data,
            "value": tx.value,
            "fee": tx.fee,
            "validityStartHeight": tx.validity_start_height,
        });

        let result = match self.call(SEND_METHOD, &named).await {
            Ok(v) => v,
            Err(e @ (LedgerError::Rpc { .. } | LedgerError::Status { .. })) if !e.is_transient() => {
                tracing::warn!(
                    method = SEND_METHOD,
                    "named-parameter call rejected, retrying with positional parameters: {e}"
                );
                let positional = json!([
                    wallet,
                    recipient,
                    data,
                    tx.value,
                    tx.fee,
                    tx.validity_start_height
                ]);
                self.call(SEND_METHOD, &positional).await?
            }
            Err(e) => return Err(e),
        };

        extract_tx_hash(&result)
            .ok_or_else(|| malformed(SEND_METHOD, "no transaction hash in response"))
    }

    fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_data_strips_envelope() {
        assert_eq!(unwrap_data(json!({"data": 5, "metadata": {}})), json!(5));
        assert_eq!(unwrap_data(json!({"data": true})), json!(true));
    }

    #[test]
    fn unwrap_data_keeps_transaction_objects() {
        let tx = json!({"hash": "aa", "data": "00"});
        assert_eq!(unwrap_data(tx.clone()), tx);
    }

    #[test]
    fn envelope_error_object() {
        let err = parse_envelope(
            "getBlockNumber",
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -1, "message": "nope"}}),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { code: -1, .. }));
    }

    #[test]
    fn envelope_null_error_is_success() {
        let v = parse_envelope("x", json!({"error": null, "result": 3})).unwrap();
        assert_eq!(v, json!(3));
    }

    #[test]
    fn tx_hash_shapes() {
        assert_eq!(extract_tx_hash(&json!("abc")).as_deref(), Some("abc"));
        assert_eq!(
            extract_tx_hash(&json!({"Blake2bHash": "def"})).as_deref(),
            Some("def")
        );
        assert_eq!(extract_tx_hash(&json!({"hash": "ghi"})).as_deref(), Some("ghi"));
        assert!(extract_tx_hash(&json!({})).is_none());
        assert!(extract_tx_hash(&json!("")).is_none());
    }

    #[test]
    fn checksum_policy_comes_from_config() {
        let mut cfg = LedgerConfig::local(9000).unwrap();
        assert_eq!(RpcLedger::new(cfg.clone()).unwrap().checksum_policy(), ChecksumPolicy::Lenient);
        cfg.checksum_policy = ChecksumPolicy::Strict;
        assert_eq!(RpcLedger::new(cfg).unwrap().checksum_policy(), ChecksumPolicy::Strict);
    }

    #[test]
    fn incomplete_credentials_rejected() {
        let mut cfg = LedgerConfig::local(9000).unwrap();
        cfg.username = Some("node".into());
        assert!(matches!(
            RpcLedger::new(cfg),
            Err(LedgerError::Config(_))
        ));
    }
}

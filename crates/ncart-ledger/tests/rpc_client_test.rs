//! Contract tests for `RpcLedger` against a mocked JSON-RPC node.
//!
//! ## Methods Tested
//!
//! | Method | Test |
//! |---|---|
//! | `isConsensusEstablished` | `consensus_*` |
//! | `isAccountUnlocked` | `account_unlocked_*` |
//! | `getBlockNumber` | `block_number_*` |
//! | `getTransactionByHash` | `transaction_by_hash_*` |
//! | `getTransactionsByAddress` | `transactions_by_address_*` |
//! | `sendBasicTransactionWithData` | `send_*` |
//! | retry policy | `retry_*` |

use std::time::Duration;

use ncart_core::Identity;
use ncart_ledger::{Ledger, LedgerConfig, LedgerError, OutgoingTransaction, RetryPolicy, RpcLedger};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CATALOG: &str = "NQ15 NXMP 11A0 TMKP G1Q8 4ABD U16C XD6Q D948";

fn test_client(mock_server: &MockServer) -> RpcLedger {
    let mut config = LedgerConfig::local(0).unwrap();
    config.rpc_url = mock_server.uri().parse().unwrap();
    RpcLedger::new(config).unwrap().with_retry(RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
    })
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message },
    }))
}

fn params_are_positional(req: &Request) -> bool {
    serde_json::from_slice::<Value>(&req.body)
        .map(|v| v["params"].is_array())
        .unwrap_or(false)
}

fn params_are_named(req: &Request) -> bool {
    serde_json::from_slice::<Value>(&req.body)
        .map(|v| v["params"].is_object())
        .unwrap_or(false)
}

// ── isConsensusEstablished ─────────────────────────────────────────

#[tokio::test]
async fn consensus_unwraps_data_envelope() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "isConsensusEstablished"})))
        .respond_with(rpc_result(json!({"data": true, "metadata": null})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(client.is_consensus_established().await.unwrap());
}

#[tokio::test]
async fn consensus_non_boolean_is_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!("yes")))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.is_consensus_established().await.unwrap_err();
    assert!(matches!(err, LedgerError::Malformed { .. }));
}

// ── isAccountUnlocked ──────────────────────────────────────────────

#[tokio::test]
async fn account_unlocked_sends_compact_address() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "isAccountUnlocked",
            "params": {"address": "NQ15NXMP11A0TMKPG1Q84ABDU16CXD6QD948"}
        })))
        .respond_with(rpc_result(json!(false)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let account: Identity = CATALOG.parse().unwrap();
    assert!(!client.is_account_unlocked(&account).await.unwrap());
}

// ── getBlockNumber ─────────────────────────────────────────────────

#[tokio::test]
async fn block_number_plain_and_wrapped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!({"data": 123456})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.block_number().await.unwrap(), 123456);
}

#[tokio::test]
async fn block_number_http_error_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("node syncing"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    match client.block_number().await.unwrap_err() {
        LedgerError::Status { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, "node syncing");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

// ── getTransactionByHash ───────────────────────────────────────────

#[tokio::test]
async fn transaction_by_hash_normalizes_fields() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "getTransactionByHash",
            "params": {"hash": "abc"}
        })))
        .respond_with(rpc_result(json!({
            "Hash": "abc",
            "BlockNumber": 77,
            "From": "NQ07 0000 0000 0000 0000 0000 0000 0000 0000",
            "To": CATALOG,
            "RecipientData": "44415441"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let tx = client.transaction_by_hash("abc").await.unwrap().unwrap();
    assert_eq!(tx.hash, "abc");
    assert_eq!(tx.height, 77);
    assert_eq!(tx.payload, b"DATA".to_vec());
}

#[tokio::test]
async fn transaction_by_hash_null_is_none() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(Value::Null))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(client.transaction_by_hash("missing").await.unwrap().is_none());
}

// ── getTransactionsByAddress ───────────────────────────────────────

#[tokio::test]
async fn transactions_by_address_passes_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "getTransactionsByAddress",
            "params": {"max": 500, "start_at": "h9"}
        })))
        .respond_with(rpc_result(json!({
            "data": [
                {"hash": "h8", "height": 8, "data": "00"},
                {"hash": "h7", "height": 7, "data": "01"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let addr: Identity = CATALOG.parse().unwrap();
    let txs = client
        .transactions_by_address(&addr, 500, Some("h9"))
        .await
        .unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].hash, "h8");
    assert_eq!(txs[1].payload, vec![1]);
}

#[tokio::test]
async fn transactions_by_address_wrapped_list() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!({"transactions": [{"hash": "h1"}]})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let addr: Identity = CATALOG.parse().unwrap();
    let txs = client.transactions_by_address(&addr, 10, None).await.unwrap();
    assert_eq!(txs.len(), 1);
}

// ── sendBasicTransactionWithData ───────────────────────────────────

fn outgoing() -> OutgoingTransaction {
    let sender = Identity::from_bytes([0u8; 20]);
    let recipient: Identity = CATALOG.parse().unwrap();
    OutgoingTransaction::data(sender, recipient, vec![0xca, 0xfe], 1000)
}

#[tokio::test]
async fn send_uses_named_parameters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "sendBasicTransactionWithData",
            "params": {
                "wallet": "NQ0700000000000000000000000000000000",
                "recipient": "NQ15NXMP11A0TMKPG1Q84ABDU16CXD6QD948",
                "data": "cafe",
                "value": 1,
                "fee": 0,
                "validityStartHeight": 1000
            }
        })))
        .respond_with(rpc_result(json!({"Blake2bHash": "txhash1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.send_transaction(&outgoing()).await.unwrap(), "txhash1");
}

#[tokio::test]
async fn send_falls_back_to_positional_parameters() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(params_are_named)
        .respond_with(rpc_error(-32602, "Invalid params"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(params_are_positional)
        .and(body_partial_json(json!({
            "params": [
                "NQ0700000000000000000000000000000000",
                "NQ15NXMP11A0TMKPG1Q84ABDU16CXD6QD948",
                "cafe",
                1,
                0,
                1000
            ]
        })))
        .respond_with(rpc_result(json!({"data": "txhash2"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.send_transaction(&outgoing()).await.unwrap(), "txhash2");
}

#[tokio::test]
async fn send_reports_positional_error_when_both_fail() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(-32000, "insufficient funds"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    match client.send_transaction(&outgoing()).await.unwrap_err() {
        LedgerError::Rpc { code, message, .. } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "insufficient funds");
        }
        other => panic!("expected Rpc, got {other:?}"),
    }
}

#[tokio::test]
async fn send_without_hash_is_malformed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.send_transaction(&outgoing()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Malformed { .. }));
}

// ── retry policy ───────────────────────────────────────────────────

#[tokio::test]
async fn retry_recovers_from_server_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!(77)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert_eq!(client.block_number().await.unwrap(), 77);
}

#[tokio::test]
async fn retry_skips_client_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.block_number().await.unwrap_err();
    assert!(matches!(err, LedgerError::Status { status: 401, .. }));
}

#[tokio::test]
async fn retry_skips_rpc_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(-32601, "Method not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.block_number().await.unwrap_err();
    assert!(matches!(err, LedgerError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn retry_never_resends_a_transaction() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.send_transaction(&outgoing()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Status { status: 502, .. }));
}

#[tokio::test]
async fn retry_reaches_an_unreachable_node_once_per_attempt() {
    let mut config = LedgerConfig::local(0).unwrap();
    config.rpc_url = "http://127.0.0.1:1".parse().unwrap();
    let client = RpcLedger::new(config).unwrap().with_retry(RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_millis(1),
    });
    let err = client.block_number().await.unwrap_err();
    assert!(matches!(err, LedgerError::Http { .. }));
}

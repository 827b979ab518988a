//! HTTP ledger gateway
//!
//! Talks to a JSON gateway that fronts the step challenge contract. The
//! gateway relays reads to the chain and, for signer-bound calls, forwards the
//! transaction to the account's signer.
//!
//! Endpoints:
//! ```text
//! GET  /api/v1/records/ids            -> ["steps-...", ...]
//! GET  /api/v1/records/{id}           -> StepRecord
//! GET  /api/v1/records/{id}/handle    -> { "handle": "0x..." }
//! GET  /api/v1/available              -> { "available": true }
//! POST /api/v1/records                -> { "txHash": "0x..." }
//! POST /api/v1/records/{id}/verify    -> { "txHash": "0x..." }
//! GET  /api/v1/tx/{hash}              -> { "status": "pending" | "finalized" | "failed", ... }
//! ```
//!
//! Error responses keep the response body in the error message so that
//! revert reasons ("Data already verified") and wallet rejections reach the
//! pipeline's classifier.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    CreateRecordRequest, EncryptedHandle, LedgerReader, LedgerSigner, PendingTransaction,
    SignerProvider, TxReceipt,
};
use crate::record::{RecordId, StepRecord};

/// Header carrying the signing account on signer-bound requests
pub const ACCOUNT_HEADER: &str = "x-account-address";

/// Gateway connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway
    pub url: String,
    /// Address of the step challenge contract
    pub contract_address: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Delay between finality polls
    pub finality_poll_ms: u64,
    /// Polls before a pending transaction is reported as stuck
    pub finality_max_polls: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            contract_address: String::new(),
            timeout_secs: 30,
            finality_poll_ms: 1000,
            finality_max_polls: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HandleResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct AvailableResponse {
    available: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationRequest<'a> {
    clear_values: &'a str,
    proof: &'a str,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TxState {
    Pending,
    Finalized,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxStatusResponse {
    status: TxState,
    #[serde(default)]
    block_number: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// Read-only gateway client
#[derive(Clone)]
pub struct HttpLedgerGateway {
    base_url: String,
    config: GatewayConfig,
    client: Client,
}

impl HttpLedgerGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build gateway HTTP client")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
            client,
        })
    }

    /// Signer-bound view of the same gateway for `account`
    pub fn signer(&self, account: impl Into<String>) -> HttpLedgerSigner {
        HttpLedgerSigner {
            gateway: self.clone(),
            account: account.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        let resp = check_status(resp, path).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse gateway response for {}", path))
    }
}

impl SignerProvider for HttpLedgerGateway {
    fn signer_for(&self, account: &str) -> Arc<dyn LedgerSigner> {
        Arc::new(self.signer(account))
    }
}

async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow!("Gateway returned {} for {}: {}", status, what, body))
}

#[async_trait]
impl LedgerReader for HttpLedgerGateway {
    fn contract_address(&self) -> &str {
        &self.config.contract_address
    }

    async fn get_all_ids(&self) -> Result<Vec<RecordId>> {
        self.get_json("records/ids").await
    }

    async fn get_record(&self, id: &RecordId) -> Result<StepRecord> {
        debug!("Fetching record {}", id);
        self.get_json(&format!("records/{}", id)).await
    }

    async fn get_encrypted_value_handle(&self, id: &RecordId) -> Result<EncryptedHandle> {
        let resp: HandleResponse = self.get_json(&format!("records/{}/handle", id)).await?;
        Ok(EncryptedHandle::new(resp.handle))
    }

    async fn is_available(&self) -> Result<bool> {
        let resp: AvailableResponse = self.get_json("available").await?;
        Ok(resp.available)
    }
}

/// Gateway client that submits transactions on behalf of one account
#[derive(Clone)]
pub struct HttpLedgerSigner {
    gateway: HttpLedgerGateway,
    account: String,
}

impl HttpLedgerSigner {
    pub fn account(&self) -> &str {
        &self.account
    }

    async fn submit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Box<dyn PendingTransaction>> {
        let resp = self
            .gateway
            .client
            .post(self.gateway.url(path))
            .header(ACCOUNT_HEADER, &self.account)
            .json(body)
            .send()
            .await?;
        let resp = check_status(resp, path).await?;
        let submitted: SubmitResponse = resp
            .json()
            .await
            .context("Failed to parse transaction submission response")?;

        debug!("Submitted transaction {} via {}", submitted.tx_hash, path);
        Ok(Box::new(HttpPendingTransaction {
            gateway: self.gateway.clone(),
            tx_hash: submitted.tx_hash,
        }))
    }
}

#[async_trait]
impl LedgerSigner for HttpLedgerSigner {
    fn contract_address(&self) -> &str {
        &self.gateway.config.contract_address
    }

    async fn create_record(&self, request: CreateRecordRequest) -> Result<Box<dyn PendingTransaction>> {
        self.submit("records", &request).await
    }

    async fn submit_verification(
        &self,
        id: &RecordId,
        clear_values: &str,
        proof: &str,
    ) -> Result<Box<dyn PendingTransaction>> {
        self.submit(
            &format!("records/{}/verify", id),
            &VerificationRequest {
                clear_values,
                proof,
            },
        )
        .await
    }
}

/// Transaction tracked by polling the gateway
pub struct HttpPendingTransaction {
    gateway: HttpLedgerGateway,
    tx_hash: String,
}

#[async_trait]
impl PendingTransaction for HttpPendingTransaction {
    fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    async fn await_finality(self: Box<Self>) -> Result<TxReceipt> {
        let poll = Duration::from_millis(self.gateway.config.finality_poll_ms);
        let max_polls = self.gateway.config.finality_max_polls.max(1);

        for attempt in 0..max_polls {
            let status: TxStatusResponse = self
                .gateway
                .get_json(&format!("tx/{}", self.tx_hash))
                .await?;

            match status.status {
                TxState::Finalized => {
                    return Ok(TxReceipt {
                        tx_hash: self.tx_hash.clone(),
                        block_number: status.block_number,
                    })
                }
                TxState::Failed => {
                    return Err(anyhow!(
                        "Transaction {} failed: {}",
                        self.tx_hash,
                        status.error.unwrap_or_else(|| "unknown error".to_string())
                    ))
                }
                TxState::Pending => {
                    debug!(
                        "Transaction {} pending (poll {}/{})",
                        self.tx_hash,
                        attempt + 1,
                        max_polls
                    );
                    tokio::time::sleep(poll).await;
                }
            }
        }

        warn!("Transaction {} not finalized after {} polls", self.tx_hash, max_polls);
        Err(anyhow!(
            "Transaction {} not finalized after {} polls",
            self.tx_hash,
            max_polls
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn gateway(server: &MockServer) -> HttpLedgerGateway {
        HttpLedgerGateway::new(GatewayConfig {
            url: server.base_url(),
            contract_address: "0xcontract".to_string(),
            finality_poll_ms: 1,
            finality_max_polls: 3,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_all_ids() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/records/ids");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"["steps-1-aaaaaa", "steps-2-bbbbbb"]"#);
        });

        let ids = gateway(&server).get_all_ids().await.unwrap();
        assert_eq!(
            ids,
            vec![RecordId::new("steps-1-aaaaaa"), RecordId::new("steps-2-bbbbbb")]
        );
    }

    #[tokio::test]
    async fn test_get_record_and_handle() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/records/steps-1-aaaaaa");
            then.status(200).json_body(serde_json::json!({
                "id": "steps-1-aaaaaa",
                "name": "Alice",
                "creator": "0xaaaaaa",
                "timestamp": 1700000000,
                "publicValue1": 500,
                "publicValue2": 0,
                "isVerified": false,
                "decryptedValue": 0
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/records/steps-1-aaaaaa/handle");
            then.status(200)
                .json_body(serde_json::json!({ "handle": "0xhandle" }));
        });

        let gw = gateway(&server);
        let id = RecordId::new("steps-1-aaaaaa");
        let record = gw.get_record(&id).await.unwrap();
        assert_eq!(record.name, "Alice");
        assert!(!record.is_verified);

        let handle = gw.get_encrypted_value_handle(&id).await.unwrap();
        assert_eq!(handle.as_str(), "0xhandle");
    }

    #[tokio::test]
    async fn test_error_body_is_kept() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/records/steps-1-aaaaaa/verify");
            then.status(400)
                .body("execution reverted: Data already verified");
        });

        let signer = gateway(&server).signer("0xaaaaaa");
        let err = signer
            .submit_verification(&RecordId::new("steps-1-aaaaaa"), "0x00", "0x01")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Data already verified"));
    }

    #[tokio::test]
    async fn test_create_record_and_await_finality() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/records")
                .header(ACCOUNT_HEADER, "0xaaaaaa")
                .json_body_partial(r#"{"id": "steps-1-aaaaaa", "publicValue1": 7}"#);
            then.status(200)
                .json_body(serde_json::json!({ "txHash": "0xtx" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/tx/0xtx");
            then.status(200)
                .json_body(serde_json::json!({ "status": "finalized", "blockNumber": 42 }));
        });

        let signer = gateway(&server).signer("0xaaaaaa");
        let pending = signer
            .create_record(CreateRecordRequest {
                id: RecordId::new("steps-1-aaaaaa"),
                name: "Alice".to_string(),
                encrypted_data: "0xdead".to_string(),
                proof: "0xbeef".to_string(),
                public_value1: 7,
                public_value2: 0,
                description: "Daily steps: 7".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(pending.tx_hash(), "0xtx");

        let receipt = pending.await_finality().await.unwrap();
        assert_eq!(receipt.block_number, Some(42));
        create.assert();
    }

    #[tokio::test]
    async fn test_failed_transaction() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/tx/0xbad");
            then.status(200)
                .json_body(serde_json::json!({ "status": "failed", "error": "out of gas" }));
        });

        let pending = Box::new(HttpPendingTransaction {
            gateway: gateway(&server),
            tx_hash: "0xbad".to_string(),
        });
        let err = pending.await_finality().await.unwrap_err();
        assert!(err.to_string().contains("out of gas"));
    }

    #[tokio::test]
    async fn test_pending_transaction_gives_up() {
        let server = MockServer::start();
        let status = server.mock(|when, then| {
            when.method(GET).path("/api/v1/tx/0xslow");
            then.status(200)
                .json_body(serde_json::json!({ "status": "pending" }));
        });

        let pending = Box::new(HttpPendingTransaction {
            gateway: gateway(&server),
            tx_hash: "0xslow".to_string(),
        });
        let err = pending.await_finality().await.unwrap_err();
        assert!(err.to_string().contains("not finalized"));
        status.assert_hits(3);
    }

    #[tokio::test]
    async fn test_is_available() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/available");
            then.status(200)
                .json_body(serde_json::json!({ "available": true }));
        });

        assert!(gateway(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_connection_error() {
        let gw = HttpLedgerGateway::new(GatewayConfig {
            url: "http://127.0.0.1:65534".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(gw.get_all_ids().await.is_err());
    }
}

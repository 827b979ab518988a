//! Ledger gateway
//!
//! The contract that stores step records is reached through two capability
//! modes: a read-only view ([`LedgerReader`]) and a signer-bound view
//! ([`LedgerSigner`]) whose mutations return a [`PendingTransaction`].
//! Signer-bound views are handed out per account by a [`SignerProvider`], so
//! a session switch never submits under the previous account.
//!
//! Adapters:
//! - `http`: JSON gateway in front of the contract
//! - `crate::mock::InMemoryLedger`: in-process ledger for tests and demos

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::record::{RecordId, StepRecord};

pub use http::{GatewayConfig, HttpLedgerGateway, HttpLedgerSigner};

/// Opaque reference to an encrypted value held by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedHandle(String);

impl EncryptedHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arguments of the record creation transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    pub id: RecordId,
    pub name: String,
    /// Hex encoded encrypted step count
    pub encrypted_data: String,
    /// Hex encoded input proof binding the ciphertext to (contract, account)
    pub proof: String,
    pub public_value1: u32,
    pub public_value2: u32,
    pub description: String,
}

/// Finalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// A submitted transaction that has not been finalized yet
#[async_trait]
pub trait PendingTransaction: Send {
    fn tx_hash(&self) -> &str;

    /// Wait until the ledger finalizes (or reverts) the transaction
    async fn await_finality(self: Box<Self>) -> Result<TxReceipt>;
}

/// Read-only ledger access
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Address of the step challenge contract
    fn contract_address(&self) -> &str;

    async fn get_all_ids(&self) -> Result<Vec<RecordId>>;

    async fn get_record(&self, id: &RecordId) -> Result<StepRecord>;

    async fn get_encrypted_value_handle(&self, id: &RecordId) -> Result<EncryptedHandle>;

    async fn is_available(&self) -> Result<bool>;
}

/// Ledger access bound to the connected account's signer
#[async_trait]
pub trait LedgerSigner: Send + Sync {
    fn contract_address(&self) -> &str;

    async fn create_record(&self, request: CreateRecordRequest) -> Result<Box<dyn PendingTransaction>>;

    /// Submit the clear values and decryption proof for one record
    async fn submit_verification(
        &self,
        id: &RecordId,
        clear_values: &str,
        proof: &str,
    ) -> Result<Box<dyn PendingTransaction>>;
}

/// Hands out signer-bound views of the ledger
pub trait SignerProvider: Send + Sync {
    fn signer_for(&self, account: &str) -> Arc<dyn LedgerSigner>;
}

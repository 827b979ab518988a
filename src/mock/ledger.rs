use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{decryption_proof, random_hex};
use crate::encryption::decode_clear_values;
use crate::ledger::{
    CreateRecordRequest, EncryptedHandle, LedgerReader, LedgerSigner, PendingTransaction,
    SignerProvider, TxReceipt,
};
use crate::record::{RecordId, StepRecord};

#[derive(Default)]
struct LedgerInner {
    /// Insertion order is the id order returned to readers
    order: Vec<RecordId>,
    records: HashMap<RecordId, StepRecord>,
    handles: HashMap<RecordId, EncryptedHandle>,
    failing_reads: HashSet<RecordId>,
    failing_ids: bool,
    /// Records another actor verifies right before our next submission
    races: HashMap<RecordId, u32>,
    rejecting: bool,
    unavailable: bool,
    submissions: usize,
    block: u64,
}

impl LedgerInner {
    fn next_tx(&mut self) -> MockPendingTransaction {
        self.block += 1;
        MockPendingTransaction {
            tx_hash: random_hex(32),
            block: self.block,
        }
    }
}

/// Ledger kept in memory, shared between its reader and signers
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    contract_address: String,
    inner: Arc<Mutex<LedgerInner>>,
}

impl InMemoryLedger {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            inner: Arc::default(),
        }
    }

    /// Signer-bound view for `account`
    pub fn signer(&self, account: impl Into<String>) -> InMemorySigner {
        InMemorySigner {
            ledger: self.clone(),
            account: account.into(),
        }
    }

    /// Seed a record directly, bypassing encryption
    pub fn insert_record(&self, record: StepRecord) {
        let mut inner = self.inner.lock();
        let handle = EncryptedHandle::new(format!("0xseed-{}", record.id));
        if !inner.records.contains_key(&record.id) {
            inner.order.push(record.id.clone());
        }
        inner.handles.insert(record.id.clone(), handle);
        inner.records.insert(record.id.clone(), record);
    }

    /// Make every read of `id` fail
    pub fn fail_reads_for(&self, id: &RecordId) {
        self.inner.lock().failing_reads.insert(id.clone());
    }

    /// Make listing the record ids fail
    pub fn fail_id_listing(&self, fail: bool) {
        self.inner.lock().failing_ids = fail;
    }

    /// Simulate the account holder declining every signature request
    pub fn set_rejecting(&self, rejecting: bool) {
        self.inner.lock().rejecting = rejecting;
    }

    pub fn set_available(&self, available: bool) {
        self.inner.lock().unavailable = !available;
    }

    /// Have another actor verify `id` with `value` just before our next submission for it
    pub fn race_verification(&self, id: &RecordId, value: u32) {
        self.inner.lock().races.insert(id.clone(), value);
    }

    /// Mark `id` verified as if another actor had revealed it
    pub fn mark_verified(&self, id: &RecordId, value: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| anyhow!("Record {} not found", id))?;
        record.is_verified = true;
        record.decrypted_value = value;
        Ok(())
    }

    /// Number of verification transactions submitted, accepted or not
    pub fn submission_count(&self) -> usize {
        self.inner.lock().submissions
    }

    pub fn handle_of(&self, id: &RecordId) -> Option<EncryptedHandle> {
        self.inner.lock().handles.get(id).cloned()
    }

    pub fn record(&self, id: &RecordId) -> Option<StepRecord> {
        self.inner.lock().records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignerProvider for InMemoryLedger {
    fn signer_for(&self, account: &str) -> Arc<dyn LedgerSigner> {
        Arc::new(self.signer(account))
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    fn contract_address(&self) -> &str {
        &self.contract_address
    }

    async fn get_all_ids(&self) -> Result<Vec<RecordId>> {
        let inner = self.inner.lock();
        if inner.failing_ids {
            return Err(anyhow!("rpc unavailable while listing records"));
        }
        Ok(inner.order.clone())
    }

    async fn get_record(&self, id: &RecordId) -> Result<StepRecord> {
        let inner = self.inner.lock();
        if inner.failing_reads.contains(id) {
            return Err(anyhow!("call reverted while reading {}", id));
        }
        inner
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Record {} not found", id))
    }

    async fn get_encrypted_value_handle(&self, id: &RecordId) -> Result<EncryptedHandle> {
        self.inner
            .lock()
            .handles
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("No encrypted value for {}", id))
    }

    async fn is_available(&self) -> Result<bool> {
        Ok(!self.inner.lock().unavailable)
    }
}

/// [`InMemoryLedger`] bound to one account
#[derive(Clone)]
pub struct InMemorySigner {
    ledger: InMemoryLedger,
    account: String,
}

impl InMemorySigner {
    pub fn account(&self) -> &str {
        &self.account
    }
}

#[async_trait]
impl LedgerSigner for InMemorySigner {
    fn contract_address(&self) -> &str {
        &self.ledger.contract_address
    }

    async fn create_record(&self, request: CreateRecordRequest) -> Result<Box<dyn PendingTransaction>> {
        let mut inner = self.ledger.inner.lock();
        if inner.rejecting {
            return Err(anyhow!("user rejected transaction"));
        }
        if inner.records.contains_key(&request.id) {
            return Err(anyhow!("execution reverted: Record already exists"));
        }

        let record = StepRecord {
            id: request.id.clone(),
            name: request.name,
            creator: self.account.clone(),
            timestamp: Utc::now().timestamp(),
            public_value1: request.public_value1,
            public_value2: request.public_value2,
            is_verified: false,
            decrypted_value: 0,
            rank: None,
        };
        debug!("Creating record {} for {}", record.id, self.account);

        inner.order.push(request.id.clone());
        inner
            .handles
            .insert(request.id.clone(), EncryptedHandle::new(request.encrypted_data));
        inner.records.insert(request.id, record);
        Ok(Box::new(inner.next_tx()))
    }

    async fn submit_verification(
        &self,
        id: &RecordId,
        clear_values: &str,
        proof: &str,
    ) -> Result<Box<dyn PendingTransaction>> {
        let mut inner = self.ledger.inner.lock();
        if inner.rejecting {
            return Err(anyhow!("user rejected transaction"));
        }
        inner.submissions += 1;

        if let Some(value) = inner.races.remove(id) {
            if let Some(record) = inner.records.get_mut(id) {
                record.is_verified = true;
                record.decrypted_value = value;
            }
        }

        let record = inner
            .records
            .get(id)
            .ok_or_else(|| anyhow!("execution reverted: Record not found"))?;
        if record.is_verified {
            return Err(anyhow!("execution reverted: Data already verified"));
        }
        if proof != decryption_proof(clear_values) {
            return Err(anyhow!("execution reverted: Invalid decryption proof"));
        }

        let value = decode_clear_values(clear_values)?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("execution reverted: Empty clear values"))?;

        if let Some(record) = inner.records.get_mut(id) {
            record.is_verified = true;
            record.decrypted_value = value;
        }
        Ok(Box::new(inner.next_tx()))
    }
}

struct MockPendingTransaction {
    tx_hash: String,
    block: u64,
}

#[async_trait]
impl PendingTransaction for MockPendingTransaction {
    fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    async fn await_finality(self: Box<Self>) -> Result<TxReceipt> {
        Ok(TxReceipt {
            tx_hash: self.tx_hash,
            block_number: Some(self.block),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::encode_clear_values;

    fn request(id: &str) -> CreateRecordRequest {
        CreateRecordRequest {
            id: RecordId::new(id),
            name: "Alice".to_string(),
            encrypted_data: "0xcipher".to_string(),
            proof: "0xproof".to_string(),
            public_value1: 42,
            public_value2: 0,
            description: "Daily steps: 42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let ledger = InMemoryLedger::new("0xcontract");
        let signer = ledger.signer("0xAlice");

        let pending = signer.create_record(request("steps-1-a")).await.unwrap();
        let receipt = pending.await_finality().await.unwrap();
        assert!(receipt.tx_hash.starts_with("0x"));

        let id = RecordId::new("steps-1-a");
        assert_eq!(ledger.get_all_ids().await.unwrap(), vec![id.clone()]);
        let record = ledger.get_record(&id).await.unwrap();
        assert_eq!(record.creator, "0xAlice");
        assert_eq!(record.public_value1, 42);
        assert!(!record.is_verified);
        assert_eq!(
            ledger.get_encrypted_value_handle(&id).await.unwrap(),
            EncryptedHandle::new("0xcipher")
        );
    }

    #[tokio::test]
    async fn test_signer_for_binds_creator() {
        let ledger = InMemoryLedger::new("0xcontract");
        let signer = ledger.signer_for("0xBob");
        signer
            .create_record(request("steps-2-b"))
            .await
            .unwrap()
            .await_finality()
            .await
            .unwrap();

        let record = ledger.record(&RecordId::new("steps-2-b")).unwrap();
        assert_eq!(record.creator, "0xBob");
    }

    #[tokio::test]
    async fn test_failing_id_listing() {
        let ledger = InMemoryLedger::new("0xc");
        ledger.fail_id_listing(true);
        assert!(ledger.get_all_ids().await.is_err());
        ledger.fail_id_listing(false);
        assert!(ledger.get_all_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_reverts() {
        let ledger = InMemoryLedger::new("0xc");
        let signer = ledger.signer("0xa");
        signer.create_record(request("steps-1-a")).await.unwrap();
        assert!(signer.create_record(request("steps-1-a")).await.is_err());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_signer() {
        let ledger = InMemoryLedger::new("0xc");
        ledger.set_rejecting(true);
        let err = ledger
            .signer("0xa")
            .create_record(request("steps-1-a"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("user rejected"));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_verification_checks_proof_and_is_one_way() {
        let ledger = InMemoryLedger::new("0xc");
        let signer = ledger.signer("0xa");
        signer.create_record(request("steps-1-a")).await.unwrap();
        let id = RecordId::new("steps-1-a");

        let bundle = encode_clear_values(&[42]);
        assert!(signer
            .submit_verification(&id, &bundle, "0xforged")
            .await
            .is_err());
        assert!(!ledger.record(&id).unwrap().is_verified);

        signer
            .submit_verification(&id, &bundle, &decryption_proof(&bundle))
            .await
            .unwrap();
        let record = ledger.record(&id).unwrap();
        assert!(record.is_verified);
        assert_eq!(record.decrypted_value, 42);

        let err = signer
            .submit_verification(&id, &bundle, &decryption_proof(&bundle))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Data already verified"));
        assert_eq!(ledger.submission_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_reads_and_availability() {
        let ledger = InMemoryLedger::new("0xc");
        let signer = ledger.signer("0xa");
        signer.create_record(request("steps-1-a")).await.unwrap();
        let id = RecordId::new("steps-1-a");

        ledger.fail_reads_for(&id);
        assert!(ledger.get_record(&id).await.is_err());
        assert_eq!(ledger.get_all_ids().await.unwrap().len(), 1);

        assert!(ledger.is_available().await.unwrap());
        ledger.set_available(false);
        assert!(!ledger.is_available().await.unwrap());
    }
}

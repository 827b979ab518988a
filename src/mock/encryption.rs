use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use super::{decryption_proof, digest, random_hex};
use crate::encryption::{
    encode_clear_values, DecryptionResult, EncryptedInput, EncryptionService, SubmitVerification,
    VerifiedDecryption,
};
use crate::ledger::EncryptedHandle;

/// Encryption service that keeps plaintexts in memory behind random handles
#[derive(Default)]
pub struct SimulatedEncryption {
    values: Mutex<HashMap<EncryptedHandle, u32>>,
    initialized: AtomicBool,
    fail_initialize: AtomicBool,
    fail_encrypt: AtomicBool,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl SimulatedEncryption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already initialized, as after a successful key fetch
    pub fn ready() -> Self {
        let service = Self::default();
        service.initialized.store(true, Ordering::SeqCst);
        service
    }

    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_encrypt(&self, fail: bool) {
        self.fail_encrypt.store(fail, Ordering::SeqCst);
    }

    /// Register a plaintext for a handle created elsewhere (seeded records)
    pub fn register(&self, handle: EncryptedHandle, value: u32) {
        self.values.lock().insert(handle, value);
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(anyhow!("Encryption service not initialized"))
        }
    }
}

#[async_trait]
impl EncryptionService for SimulatedEncryption {
    async fn initialize(&self) -> Result<()> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(anyhow!("Failed to fetch public key"));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn encrypt(
        &self,
        contract_address: &str,
        account_address: &str,
        value: u32,
    ) -> Result<EncryptedInput> {
        self.ensure_initialized()?;
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_encrypt.load(Ordering::SeqCst) {
            return Err(anyhow!("Input proof generation failed"));
        }

        let nonce = random_hex(16);
        let handle = digest(&[contract_address, account_address, &value.to_string(), &nonce]);
        let proof = digest(&["input", &handle, contract_address, account_address]);
        self.values
            .lock()
            .insert(EncryptedHandle::new(handle.clone()), value);

        Ok(EncryptedInput {
            encrypted_data: handle,
            proof,
        })
    }

    async fn verify_decrypt(
        &self,
        handles: Vec<EncryptedHandle>,
        contract_address: &str,
        submit: SubmitVerification,
    ) -> Result<VerifiedDecryption> {
        self.ensure_initialized()?;
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let clear_values = {
            let values = self.values.lock();
            handles
                .iter()
                .map(|handle| {
                    values
                        .get(handle)
                        .map(|value| (handle.clone(), *value))
                        .ok_or_else(|| anyhow!("Unknown handle {}", handle))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let ordered: Vec<u32> = clear_values.iter().map(|(_, value)| *value).collect();
        let bundle = encode_clear_values(&ordered);
        let proof = decryption_proof(&bundle);
        debug!(
            "Decrypted {} handle(s) for {}",
            clear_values.len(),
            contract_address
        );

        let pending = submit(bundle, proof).await?;
        let receipt = pending.await_finality().await?;

        Ok(VerifiedDecryption {
            decryption_result: DecryptionResult {
                clear_values: clear_values.into_iter().collect(),
            },
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{decode_clear_values, SubmitFuture};
    use crate::ledger::{PendingTransaction, TxReceipt};
    use std::sync::Arc;

    struct Finalized;

    #[async_trait]
    impl PendingTransaction for Finalized {
        fn tx_hash(&self) -> &str {
            "0xtx"
        }

        async fn await_finality(self: Box<Self>) -> Result<TxReceipt> {
            Ok(TxReceipt {
                tx_hash: "0xtx".to_string(),
                block_number: None,
            })
        }
    }

    #[tokio::test]
    async fn test_requires_initialization() {
        let service = SimulatedEncryption::new();
        assert!(service.encrypt("0xc", "0xa", 1).await.is_err());
        service.initialize().await.unwrap();
        assert!(service.encrypt("0xc", "0xa", 1).await.is_ok());

        let failing = SimulatedEncryption::new();
        failing.set_fail_initialize(true);
        assert!(failing.initialize().await.is_err());
        assert!(!failing.is_initialized());
    }

    #[tokio::test]
    async fn test_handles_are_unique_per_encryption() {
        let service = SimulatedEncryption::ready();
        let a = service.encrypt("0xc", "0xa", 7).await.unwrap();
        let b = service.encrypt("0xc", "0xa", 7).await.unwrap();
        assert_ne!(a.encrypted_data, b.encrypted_data);
        assert_eq!(service.encrypt_calls(), 2);
    }

    #[tokio::test]
    async fn test_verify_decrypt_submits_matching_bundle() {
        let service = SimulatedEncryption::ready();
        let input = service.encrypt("0xc", "0xa", 1200).await.unwrap();
        let handle = EncryptedHandle::new(input.encrypted_data);

        let seen = Arc::new(Mutex::new(None));
        let seen_in_submit = seen.clone();
        let submit: SubmitVerification = Box::new(move |bundle: String, proof: String| {
            let fut: SubmitFuture = Box::pin(async move {
                *seen_in_submit.lock() = Some((bundle, proof));
                Ok(Box::new(Finalized) as Box<dyn PendingTransaction>)
            });
            fut
        });

        let verified = service
            .verify_decrypt(vec![handle.clone()], "0xc", submit)
            .await
            .unwrap();
        assert_eq!(verified.decryption_result.clear_values[&handle], 1200);

        let (bundle, proof) = seen.lock().clone().unwrap();
        assert_eq!(decode_clear_values(&bundle).unwrap(), vec![1200]);
        assert_eq!(proof, decryption_proof(&bundle));
        assert_eq!(service.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_handle_fails_before_submission() {
        let service = SimulatedEncryption::ready();
        let submit: SubmitVerification = Box::new(|_: String, _: String| {
            let fut: SubmitFuture = Box::pin(async { Err(anyhow!("must not be called")) });
            fut
        });
        let err = service
            .verify_decrypt(vec![EncryptedHandle::new("0xnope")], "0xc", submit)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Unknown handle"));
    }
}

//! Encryption service
//!
//! The FHE co-processor encrypts step counts before they reach the ledger and
//! performs verified decryption when a participant reveals a record.
//!
//! Verified decryption produces a clear-values bundle and a proof that is only
//! valid for that exact bundle, so the ledger submission is handed to the
//! service as a continuation ([`SubmitVerification`]) and the service invokes
//! it with the bundle it produced.

pub mod relayer;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::{EncryptedHandle, PendingTransaction, TxReceipt};

pub use relayer::{RelayerClient, RelayerConfig};

/// Width of one ABI word in the clear-values bundle
const ABI_WORD_BYTES: usize = 32;

/// Ciphertext and input proof for one plaintext value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInput {
    /// Hex encoded ciphertext handle
    pub encrypted_data: String,
    /// Hex encoded proof binding the ciphertext to (contract, account)
    pub proof: String,
}

/// Clear values revealed by a verified decryption
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionResult {
    pub clear_values: HashMap<EncryptedHandle, u32>,
}

/// Outcome of [`EncryptionService::verify_decrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDecryption {
    pub decryption_result: DecryptionResult,
    /// Receipt of the verification transaction submitted through the continuation
    pub receipt: TxReceipt,
}

/// Future returned by a verification submission
pub type SubmitFuture = BoxFuture<'static, Result<Box<dyn PendingTransaction>>>;

/// Continuation that submits `(abi encoded clear values, decryption proof)` to the ledger
pub type SubmitVerification = Box<dyn FnOnce(String, String) -> SubmitFuture + Send>;

#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Fetch key material; must succeed before `encrypt` or `verify_decrypt`
    async fn initialize(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Encrypt `value` for `contract_address`, bound to `account_address`
    async fn encrypt(
        &self,
        contract_address: &str,
        account_address: &str,
        value: u32,
    ) -> Result<EncryptedInput>;

    /// Decrypt `handles` and have the ledger verify the result.
    ///
    /// Implementations call `submit` exactly once with the bundle they
    /// produced and wait for the returned transaction to finalize before
    /// returning.
    async fn verify_decrypt(
        &self,
        handles: Vec<EncryptedHandle>,
        contract_address: &str,
        submit: SubmitVerification,
    ) -> Result<VerifiedDecryption>;
}

/// ABI encode clear values as consecutive big-endian 32-byte words
pub fn encode_clear_values(values: &[u32]) -> String {
    let mut bytes = Vec::with_capacity(values.len() * ABI_WORD_BYTES);
    for value in values {
        bytes.extend_from_slice(&[0u8; ABI_WORD_BYTES - 4]);
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    format!("0x{}", hex::encode(bytes))
}

/// Inverse of [`encode_clear_values`]
pub fn decode_clear_values(encoded: &str) -> Result<Vec<u32>> {
    let bytes = hex::decode(encoded.trim_start_matches("0x"))?;
    if bytes.len() % ABI_WORD_BYTES != 0 {
        return Err(anyhow!(
            "Clear values length {} is not a multiple of {}",
            bytes.len(),
            ABI_WORD_BYTES
        ));
    }

    bytes
        .chunks(ABI_WORD_BYTES)
        .map(|word| {
            let (high, low) = word.split_at(ABI_WORD_BYTES - 4);
            if high.iter().any(|b| *b != 0) {
                return Err(anyhow!("Clear value does not fit in 32 bits"));
            }
            Ok(u32::from_be_bytes([low[0], low[1], low[2], low[3]]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_clear_values() {
        let encoded = encode_clear_values(&[7]);
        assert_eq!(encoded.len(), 2 + 64);
        assert!(encoded.ends_with("00000007"));
        assert_eq!(decode_clear_values(&encoded).unwrap(), vec![7]);
    }

    #[test]
    fn test_decode_multiple_words() {
        let encoded = encode_clear_values(&[1200, 500, 0]);
        assert_eq!(decode_clear_values(&encoded).unwrap(), vec![1200, 500, 0]);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_clear_values("0x1234").is_err());
        assert!(decode_clear_values("0xzz").is_err());

        let mut wide = "0x01".to_string();
        wide.push_str(&"00".repeat(31));
        assert!(decode_clear_values(&wide).is_err());
    }

    #[test]
    fn test_decryption_result_json_keys_are_handles() {
        let mut result = DecryptionResult::default();
        result
            .clear_values
            .insert(EncryptedHandle::new("0xabc"), 1200);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["clearValues"]["0xabc"], 1200);
    }
}

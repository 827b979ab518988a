//! FHE relayer client
//!
//! HTTP client for the relayer that fronts the FHE co-processor:
//! - `GET  /v1/keys`            public key material (initialization)
//! - `POST /v1/encrypt`         encrypted input + input proof
//! - `POST /v1/public-decrypt`  clear values, ABI bundle and decryption proof

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    DecryptionResult, EncryptedInput, EncryptionService, SubmitVerification, VerifiedDecryption,
};
use crate::ledger::EncryptedHandle;

/// Relayer connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest<'a> {
    contract_address: &'a str,
    user_address: &'a str,
    value: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicDecryptRequest<'a> {
    contract_address: &'a str,
    handles: &'a [EncryptedHandle],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicDecryptResponse {
    clear_values: HashMap<EncryptedHandle, u32>,
    abi_encoded_clear_values: String,
    decryption_proof: String,
}

/// Relayer-backed [`EncryptionService`]
pub struct RelayerClient {
    base_url: String,
    client: Client,
    initialized: AtomicBool,
}

impl RelayerClient {
    pub fn new(config: &RelayerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build relayer HTTP client")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            initialized: AtomicBool::new(false),
        })
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(anyhow!("Relayer not initialized"))
        }
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/v1/{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Relayer returned {} for {}: {}", status, path, body));
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse relayer response for {}", path))
    }
}

#[async_trait]
impl EncryptionService for RelayerClient {
    async fn initialize(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/v1/keys", self.base_url))
            .send()
            .await
            .context("Failed to connect to relayer")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Relayer returned {} for keys", resp.status()));
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!("Relayer initialized at {}", self.base_url);
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
        self.post(
            "encrypt",
            &EncryptRequest {
                contract_address,
                user_address: account_address,
                value,
            },
        )
        .await
    }

    async fn verify_decrypt(
        &self,
        handles: Vec<EncryptedHandle>,
        contract_address: &str,
        submit: SubmitVerification,
    ) -> Result<VerifiedDecryption> {
        self.ensure_initialized()?;
        let decrypted: PublicDecryptResponse = self
            .post(
                "public-decrypt",
                &PublicDecryptRequest {
                    contract_address,
                    handles: &handles,
                },
            )
            .await?;

        for handle in &handles {
            if !decrypted.clear_values.contains_key(handle) {
                return Err(anyhow!("Relayer returned no clear value for {}", handle));
            }
        }

        debug!("Submitting decryption proof for {} handle(s)", handles.len());
        let pending = submit(
            decrypted.abi_encoded_clear_values,
            decrypted.decryption_proof,
        )
        .await?;
        let receipt = pending.await_finality().await?;

        Ok(VerifiedDecryption {
            decryption_result: DecryptionResult {
                clear_values: decrypted.clear_values,
            },
            receipt,
        })
    }
}

//! Error types for the record pipeline

use crate::state::Operation;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Phrases a wallet or gateway uses when the account holder declines to sign
static USER_REJECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)user rejected|user denied|ACTION_REJECTED").expect("valid regex")
});

/// Revert reason the contract gives when a record was verified by someone else first
static ALREADY_VERIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)data already verified").expect("valid regex"));

/// Errors surfaced by pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Not connected: an account address is required")]
    NotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("Data already verified")]
    AlreadyVerified,

    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Failed to fetch record {id}: {message}")]
    FetchFailure { id: String, message: String },

    #[error("Failed to load records: {0}")]
    LoadFailure(String),
}

impl PipelineError {
    /// Classify an error coming back from a signer-bound ledger call
    pub fn from_transaction(err: &anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if USER_REJECTED.is_match(&message) {
            PipelineError::UserRejected
        } else if ALREADY_VERIFIED.is_match(&message) {
            PipelineError::AlreadyVerified
        } else {
            PipelineError::TransactionFailure(message)
        }
    }

    /// Classify an error coming back from the encryption service.
    ///
    /// Verified decryption runs the ledger submission inside the service, so
    /// rejection and already-verified reasons can surface here too.
    pub fn from_encryption(err: &anyhow::Error) -> Self {
        match Self::from_transaction(err) {
            PipelineError::TransactionFailure(message) => PipelineError::EncryptionFailure(message),
            classified => classified,
        }
    }

    /// Whether the error means another actor already finished the verification
    pub fn is_already_verified(&self) -> bool {
        matches!(self, PipelineError::AlreadyVerified)
    }

    /// Text of the transient notification shown when `operation` fails with this error
    pub fn notification_message(&self, operation: Operation) -> String {
        match (self, operation) {
            (PipelineError::NotConnected, _) => "Please connect wallet first".to_string(),
            (PipelineError::UserRejected, Operation::Upload) => "Transaction rejected".to_string(),
            (PipelineError::InvalidInput(msg), _) => msg.clone(),
            (_, Operation::Load) => "Failed to load data".to_string(),
            (_, Operation::Verify) => "Verification failed".to_string(),
            (_, Operation::Availability) => "Availability check failed".to_string(),
            (_, Operation::Initialize) => "Encryption initialization failed".to_string(),
            (PipelineError::TransactionFailure(msg), Operation::Upload)
            | (PipelineError::EncryptionFailure(msg), Operation::Upload) => {
                format!("Upload failed: {}", msg)
            }
            (other, Operation::Upload) => format!("Upload failed: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_user_rejection_is_classified() {
        let err = anyhow!("MetaMask Tx Signature: user rejected transaction");
        assert_eq!(
            PipelineError::from_transaction(&err),
            PipelineError::UserRejected
        );

        let err = anyhow!("code=ACTION_REJECTED");
        assert_eq!(
            PipelineError::from_transaction(&err),
            PipelineError::UserRejected
        );
    }

    #[test]
    fn test_rejection_found_in_context_chain() {
        let err = anyhow!("User denied transaction signature").context("createRecord failed");
        assert_eq!(
            PipelineError::from_transaction(&err),
            PipelineError::UserRejected
        );
    }

    #[test]
    fn test_already_verified_is_classified() {
        let err = anyhow!("execution reverted: Data already verified");
        let classified = PipelineError::from_transaction(&err);
        assert!(classified.is_already_verified());

        let classified = PipelineError::from_encryption(&err);
        assert!(classified.is_already_verified());
    }

    #[test]
    fn test_generic_failures_keep_message() {
        let err = anyhow!("nonce too low");
        assert_eq!(
            PipelineError::from_transaction(&err),
            PipelineError::TransactionFailure("nonce too low".to_string())
        );
        assert_eq!(
            PipelineError::from_encryption(&err),
            PipelineError::EncryptionFailure("nonce too low".to_string())
        );
    }

    #[test]
    fn test_notification_messages() {
        assert_eq!(
            PipelineError::NotConnected.notification_message(Operation::Upload),
            "Please connect wallet first"
        );
        assert_eq!(
            PipelineError::UserRejected.notification_message(Operation::Upload),
            "Transaction rejected"
        );
        assert_eq!(
            PipelineError::UserRejected.notification_message(Operation::Verify),
            "Verification failed"
        );
        assert_eq!(
            PipelineError::TransactionFailure("out of gas".to_string())
                .notification_message(Operation::Upload),
            "Upload failed: out of gas"
        );
        assert_eq!(
            PipelineError::EncryptionFailure("relayer down".to_string())
                .notification_message(Operation::Verify),
            "Verification failed"
        );
        assert_eq!(
            PipelineError::LoadFailure("timeout".to_string())
                .notification_message(Operation::Load),
            "Failed to load data"
        );
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::FetchFailure {
            id: "steps-1-abc".to_string(),
            message: "reverted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch record steps-1-abc: reverted"
        );
    }
}

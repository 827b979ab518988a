//! Private Step Challenge client
//!
//! Participants upload an encrypted daily step count; a verified decryption
//! later reveals it on-chain and ranks it on a public leaderboard.
//!
//! ## Module Structure
//!
//! - `record`: step records and record ids
//! - `session`: account connection state
//! - `ledger`: read-only and signer-bound contract access (HTTP gateway)
//! - `encryption`: FHE encryption and verified decryption (HTTP relayer)
//! - `leaderboard`: ranking, statistics and filtering
//! - `state`: pipeline state and its reducer
//! - `pipeline`: load, upload and verify orchestration
//! - `form`: upload form input handling
//! - `config`: client configuration
//! - `mock`: in-process ledger and encryption backends

pub mod config;
pub mod encryption;
pub mod error;
pub mod form;
pub mod leaderboard;
pub mod ledger;
pub mod mock;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod state;

pub use config::{ClientConfig, NotificationConfig};
pub use encryption::{EncryptionService, RelayerClient, RelayerConfig, SubmitVerification};
pub use error::{PipelineError, PipelineResult};
pub use form::UploadForm;
pub use leaderboard::{rank_records, ChallengeStats, LeaderboardFilter};
pub use ledger::{
    GatewayConfig, HttpLedgerGateway, HttpLedgerSigner, LedgerReader, LedgerSigner,
    PendingTransaction, SignerProvider,
};
pub use pipeline::{LoadedRecords, PipelineDeps, RecordPipeline, UploadReceipt};
pub use record::{RecordId, StepRecord};
pub use session::{Session, SessionProvider, SharedSession};
pub use state::{Notification, NotificationKind, Operation, OperationState, PipelineState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Record Pipeline
//!
//! Sequences calls to the ledger gateway and the encryption service and folds
//! their results into [`PipelineState`]:
//!
//! ```text
//!  view ──load/upload/verify──► RecordPipeline ──► LedgerReader / LedgerSigner
//!    ▲                               │        └──► EncryptionService
//!    └──── watch::Receiver ◄── PipelineState (reducer)
//! ```
//!
//! Every operation reports progress through a transient notification and its
//! own busy state. Failures are notified and returned, never panicked on.
//! Overlapping operations are not serialized; the last completion wins.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::NotificationConfig;
use crate::encryption::{EncryptionService, SubmitFuture, SubmitVerification};
use crate::error::{PipelineError, PipelineResult};
use crate::ledger::{CreateRecordRequest, LedgerReader, SignerProvider};
use crate::record::{parse_steps, RecordId, StepRecord};
use crate::session::SessionProvider;
use crate::state::{Event, NotificationKind, Operation, PipelineState};

/// Result of a completed load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRecords {
    /// Verified records, ranked
    pub leaderboard: Vec<StepRecord>,
    /// Records created by the connected account
    pub personal_history: Vec<StepRecord>,
    /// Every record fetched, in fetch order
    pub records: Vec<StepRecord>,
    /// Ids whose fetch failed and were left out
    pub skipped: Vec<RecordId>,
}

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: RecordId,
    pub steps: u32,
    pub tx_hash: String,
}

/// Collaborators of the pipeline
pub struct PipelineDeps {
    pub reader: Arc<dyn LedgerReader>,
    /// Signer-bound views, resolved for the session account on every call
    pub signers: Arc<dyn SignerProvider>,
    pub encryption: Arc<dyn EncryptionService>,
    pub session: Arc<dyn SessionProvider>,
}

/// Orchestrates load, upload and verify against the external collaborators
#[derive(Clone)]
pub struct RecordPipeline {
    reader: Arc<dyn LedgerReader>,
    signers: Arc<dyn SignerProvider>,
    encryption: Arc<dyn EncryptionService>,
    session: Arc<dyn SessionProvider>,
    notifications: NotificationConfig,
    state: Arc<watch::Sender<PipelineState>>,
}

impl RecordPipeline {
    pub fn new(deps: PipelineDeps, notifications: NotificationConfig) -> Self {
        let (state, _) = watch::channel(PipelineState::default());
        Self {
            reader: deps.reader,
            signers: deps.signers,
            encryption: deps.encryption,
            session: deps.session,
            notifications,
            state: Arc::new(state),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    fn dispatch(&self, event: Event) -> Option<u64> {
        let mut raised = None;
        self.state.send_modify(|state| raised = state.apply(event));
        raised
    }

    fn notify(&self, kind: NotificationKind, message: impl Into<String>, operation: Operation) {
        let message = message.into();
        debug!("[{}] {:?}: {}", operation, kind, message);

        let Some(notification_id) = self.dispatch(Event::Notified {
            kind,
            message,
            operation: Some(operation),
        }) else {
            return;
        };

        let delay = match kind {
            NotificationKind::Pending => return,
            NotificationKind::Success => self.notifications.success_delay(),
            NotificationKind::Error => self.notifications.error_delay(),
        };
        self.schedule_dismissal(notification_id, delay);
    }

    fn schedule_dismissal(&self, notification_id: u64, delay: Duration) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_modify(|state| {
                state.apply(Event::Dismissed { notification_id });
            });
        });
    }

    fn finish(&self, operation: Operation, success: bool) {
        self.dispatch(Event::Finished { operation, success });
    }

    /// Report a failed operation and hand the error back
    fn fail<T>(&self, operation: Operation, err: PipelineError) -> PipelineResult<T> {
        error!("{} failed: {}", operation, err);
        self.notify(
            NotificationKind::Error,
            err.notification_message(operation),
            operation,
        );
        self.finish(operation, false);
        Err(err)
    }

    /// Reject an operation before it starts (no state machine transition)
    fn reject<T>(&self, operation: Operation, err: PipelineError) -> PipelineResult<T> {
        warn!("{} rejected: {}", operation, err);
        self.notify(
            NotificationKind::Error,
            err.notification_message(operation),
            operation,
        );
        Err(err)
    }

    fn connected_account(&self) -> Option<String> {
        self.session.session().account().map(str::to_string)
    }

    /// Initialize the encryption service once an account is connected.
    ///
    /// Returns `Ok(false)` when there is no connected account yet.
    pub async fn initialize_encryption(&self) -> PipelineResult<bool> {
        if self.connected_account().is_none() {
            return Ok(false);
        }
        if self.encryption.is_initialized() {
            return Ok(true);
        }

        self.dispatch(Event::Started(Operation::Initialize));
        match self.encryption.initialize().await {
            Ok(()) => {
                info!("Encryption service initialized");
                self.finish(Operation::Initialize, true);
                Ok(true)
            }
            Err(e) => self.fail(
                Operation::Initialize,
                PipelineError::EncryptionFailure(format!("{:#}", e)),
            ),
        }
    }

    async fn ensure_encryption_ready(&self) -> PipelineResult<()> {
        if self.encryption.is_initialized() {
            return Ok(());
        }
        self.initialize_encryption().await.map(|_| ())
    }

    /// React to a session change: initialize and load when connected, drop
    /// personal history when not
    pub async fn sync_session(&self) -> PipelineResult<()> {
        if self.connected_account().is_none() {
            self.dispatch(Event::SessionCleared);
            return Ok(());
        }
        self.initialize_encryption().await?;
        self.load().await.map(|_| ())
    }

    /// Load every record, rank the verified ones and collect the caller's history.
    ///
    /// A record whose fetch fails is logged and skipped. If the id list
    /// cannot be fetched the previous state is kept.
    pub async fn load(&self) -> PipelineResult<LoadedRecords> {
        self.dispatch(Event::Started(Operation::Load));

        let ids = match self.reader.get_all_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                return self.fail(Operation::Load, PipelineError::LoadFailure(format!("{:#}", e)))
            }
        };

        let mut records = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for id in ids {
            match self.reader.get_record(&id).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    let err = PipelineError::FetchFailure {
                        id: id.to_string(),
                        message: format!("{:#}", e),
                    };
                    warn!("Skipping record: {}", err);
                    skipped.push(id);
                }
            }
        }

        let account = self.connected_account();
        let mut loaded = None;
        self.state.send_modify(|state| {
            state.apply(Event::Loaded {
                records,
                account,
            });
            state.apply(Event::Finished {
                operation: Operation::Load,
                success: true,
            });
            loaded = Some(LoadedRecords {
                leaderboard: state.leaderboard.clone(),
                personal_history: state.personal_history.clone(),
                records: state.records.clone(),
                skipped: Vec::new(),
            });
        });

        let mut loaded = loaded.unwrap_or_default();
        info!(
            "Loaded {} records ({} ranked, {} skipped)",
            loaded.records.len(),
            loaded.leaderboard.len(),
            skipped.len()
        );
        loaded.skipped = skipped;
        Ok(loaded)
    }

    /// Encrypt a step count and submit it as a new record.
    ///
    /// `steps_input` is the raw form value: leading zeros are accepted and
    /// negative or non-numeric input counts as 0.
    pub async fn upload(&self, name: &str, steps_input: &str) -> PipelineResult<UploadReceipt> {
        let Some(account) = self.connected_account() else {
            return self.reject(Operation::Upload, PipelineError::NotConnected);
        };

        let name = name.trim();
        if name.is_empty() {
            return self.reject(
                Operation::Upload,
                PipelineError::InvalidInput("Participant name is required".to_string()),
            );
        }
        let Some(steps) = parse_steps(steps_input) else {
            return self.reject(
                Operation::Upload,
                PipelineError::InvalidInput("Step count is too large".to_string()),
            );
        };

        self.ensure_encryption_ready().await?;

        self.dispatch(Event::Started(Operation::Upload));
        self.notify(
            NotificationKind::Pending,
            "Encrypting step data...",
            Operation::Upload,
        );

        let signer = self.signers.signer_for(&account);
        let id = RecordId::generate(&account, Utc::now());
        let contract_address = signer.contract_address().to_string();

        let encrypted = match self
            .encryption
            .encrypt(&contract_address, &account, steps)
            .await
        {
            Ok(encrypted) => encrypted,
            Err(e) => return self.fail(Operation::Upload, PipelineError::from_encryption(&e)),
        };

        let request = CreateRecordRequest {
            id: id.clone(),
            name: name.to_string(),
            encrypted_data: encrypted.encrypted_data,
            proof: encrypted.proof,
            public_value1: steps,
            public_value2: 0,
            description: format!("Daily steps: {}", steps),
        };

        let pending = match signer.create_record(request).await {
            Ok(pending) => pending,
            Err(e) => return self.fail(Operation::Upload, PipelineError::from_transaction(&e)),
        };

        self.notify(
            NotificationKind::Pending,
            "Uploading encrypted steps...",
            Operation::Upload,
        );

        let receipt = match pending.await_finality().await {
            Ok(receipt) => receipt,
            Err(e) => return self.fail(Operation::Upload, PipelineError::from_transaction(&e)),
        };

        info!("Uploaded record {} in tx {}", id, receipt.tx_hash);
        self.notify(
            NotificationKind::Success,
            "Steps uploaded successfully!",
            Operation::Upload,
        );
        self.finish(Operation::Upload, true);

        // A failed refresh is notified by load itself; the upload stands.
        let _ = self.load().await;

        Ok(UploadReceipt {
            id,
            steps,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Reveal a record's step count on-chain.
    ///
    /// Returns the revealed count, or `None` when another actor verified the
    /// record while this request was in flight (the refreshed state then holds
    /// the value). A record that is already verified short-circuits with its
    /// stored value and never reaches the encryption service.
    pub async fn verify(&self, id: &RecordId) -> PipelineResult<Option<u32>> {
        let Some(account) = self.connected_account() else {
            return self.reject(Operation::Verify, PipelineError::NotConnected);
        };

        self.dispatch(Event::Started(Operation::Verify));
        self.dispatch(Event::VerifyStarted(id.clone()));
        let outcome = self.run_verification(id, &account).await;
        self.dispatch(Event::VerifyEnded(id.clone()));

        match outcome {
            Ok(Verification::Revealed(value)) => {
                info!("Record {} verified with {} steps", id, value);
                let _ = self.load().await;
                self.notify(
                    NotificationKind::Success,
                    "Steps verified successfully!",
                    Operation::Verify,
                );
                self.finish(Operation::Verify, true);
                Ok(Some(value))
            }
            Ok(Verification::Stored(value)) => {
                debug!("Record {} was already verified", id);
                self.notify(
                    NotificationKind::Success,
                    "Steps already verified",
                    Operation::Verify,
                );
                self.finish(Operation::Verify, true);
                let _ = self.load().await;
                Ok(Some(value))
            }
            Err(PipelineError::AlreadyVerified) => {
                info!("Record {} was verified concurrently", id);
                self.notify(
                    NotificationKind::Success,
                    "Steps already verified",
                    Operation::Verify,
                );
                self.finish(Operation::Verify, true);
                let _ = self.load().await;
                Ok(None)
            }
            Err(err) => self.fail(Operation::Verify, err),
        }
    }

    async fn run_verification(
        &self,
        id: &RecordId,
        account: &str,
    ) -> PipelineResult<Verification> {
        let record = self
            .reader
            .get_record(id)
            .await
            .map_err(|e| PipelineError::FetchFailure {
                id: id.to_string(),
                message: format!("{:#}", e),
            })?;
        if record.is_verified {
            return Ok(Verification::Stored(record.decrypted_value));
        }

        self.ensure_encryption_ready().await?;

        let handle = self
            .reader
            .get_encrypted_value_handle(id)
            .await
            .map_err(|e| PipelineError::FetchFailure {
                id: id.to_string(),
                message: format!("{:#}", e),
            })?;

        self.notify(
            NotificationKind::Pending,
            "Verifying steps...",
            Operation::Verify,
        );

        let signer = self.signers.signer_for(account);
        let contract_address = signer.contract_address().to_string();
        let record_id = id.clone();
        let submit: SubmitVerification = Box::new(move |clear_values: String, proof: String| {
            let fut: SubmitFuture = Box::pin(async move {
                signer
                    .submit_verification(&record_id, &clear_values, &proof)
                    .await
            });
            fut
        });

        let verified = self
            .encryption
            .verify_decrypt(vec![handle.clone()], &contract_address, submit)
            .await
            .map_err(|e| PipelineError::from_encryption(&e))?;
        debug!("Verification finalized in tx {}", verified.receipt.tx_hash);

        let value = verified
            .decryption_result
            .clear_values
            .get(&handle)
            .copied()
            .ok_or_else(|| {
                PipelineError::EncryptionFailure(format!("No clear value returned for {}", handle))
            })?;

        Ok(Verification::Revealed(value))
    }

    /// Ask the ledger whether the challenge is accepting records
    pub async fn check_availability(&self) -> PipelineResult<bool> {
        self.dispatch(Event::Started(Operation::Availability));
        match self.reader.is_available().await {
            Ok(available) => {
                info!("Challenge availability: {}", available);
                self.notify(
                    NotificationKind::Success,
                    format!("System available: {}", available),
                    Operation::Availability,
                );
                self.finish(Operation::Availability, true);
                Ok(available)
            }
            Err(e) => self.fail(
                Operation::Availability,
                PipelineError::TransactionFailure(format!("{:#}", e)),
            ),
        }
    }
}

/// How a verification concluded
enum Verification {
    /// Revealed by this request
    Revealed(u32),
    /// Already verified before this request
    Stored(u32),
}

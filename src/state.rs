//! Pipeline state and its reducer
//!
//! Everything a view renders lives in one [`PipelineState`] value. It only
//! changes through [`PipelineState::apply`], one [`Event`] at a time, so
//! interleaved operations can be reasoned about as a sequence of events.
//!
//! Each operation runs the state machine `Idle -> Pending -> Succeeded | Failed -> Idle`.
//! The terminal states fall back to `Idle` when the notification they raised
//! is dismissed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::leaderboard::{self, ChallengeStats, LeaderboardFilter};
use crate::record::{RecordId, StepRecord};

/// Operations a view can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Load,
    Upload,
    Verify,
    Availability,
    Initialize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Upload => "upload",
            Operation::Verify => "verify",
            Operation::Availability => "availability",
            Operation::Initialize => "initialize",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OperationState {
    #[default]
    Idle,
    /// `in_flight` overlapping runs of the same operation
    Pending { in_flight: u32 },
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_busy(&self) -> bool {
        matches!(self, OperationState::Pending { .. })
    }

    fn start(self) -> Self {
        match self {
            OperationState::Pending { in_flight } => OperationState::Pending {
                in_flight: in_flight + 1,
            },
            _ => OperationState::Pending { in_flight: 1 },
        }
    }

    fn finish(self, success: bool) -> Self {
        match self {
            OperationState::Pending { in_flight } if in_flight > 1 => OperationState::Pending {
                in_flight: in_flight - 1,
            },
            _ if success => OperationState::Succeeded,
            _ => OperationState::Failed,
        }
    }

    fn settle(self) -> Self {
        match self {
            OperationState::Pending { .. } => self,
            _ => OperationState::Idle,
        }
    }
}

/// Per-operation state machines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operations {
    pub load: OperationState,
    pub upload: OperationState,
    pub verify: OperationState,
    pub availability: OperationState,
    pub initialize: OperationState,
}

impl Operations {
    pub fn get(&self, operation: Operation) -> OperationState {
        match operation {
            Operation::Load => self.load,
            Operation::Upload => self.upload,
            Operation::Verify => self.verify,
            Operation::Availability => self.availability,
            Operation::Initialize => self.initialize,
        }
    }

    fn slot(&mut self, operation: Operation) -> &mut OperationState {
        match operation {
            Operation::Load => &mut self.load,
            Operation::Upload => &mut self.upload,
            Operation::Verify => &mut self.verify,
            Operation::Availability => &mut self.availability,
            Operation::Initialize => &mut self.initialize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Pending,
    Success,
    Error,
}

/// Transient status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic id, used to match dismissal timers
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub operation: Option<Operation>,
}

/// State transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(Operation),
    Finished { operation: Operation, success: bool },
    VerifyStarted(RecordId),
    VerifyEnded(RecordId),
    /// A load completed; replaces the record set wholesale
    Loaded {
        records: Vec<StepRecord>,
        account: Option<String>,
    },
    /// Account went away; personal history no longer applies
    SessionCleared,
    Notified {
        kind: NotificationKind,
        message: String,
        operation: Option<Operation>,
    },
    Dismissed { notification_id: u64 },
}

/// Everything the view layer renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    /// All records from the last successful load, in fetch order
    pub records: Vec<StepRecord>,
    /// Verified records, ranked
    pub leaderboard: Vec<StepRecord>,
    /// Records created by the connected account
    pub personal_history: Vec<StepRecord>,
    pub notification: Option<Notification>,
    pub operations: Operations,
    /// Records with a verification in flight
    pub verifying: BTreeSet<RecordId>,
    /// Whether at least one load has completed
    pub loaded: bool,
    next_notification_id: u64,
}

impl PipelineState {
    /// Apply one event; returns the id of a notification raised by it
    pub fn apply(&mut self, event: Event) -> Option<u64> {
        match event {
            Event::Started(operation) => {
                let slot = self.operations.slot(operation);
                *slot = slot.start();
            }
            Event::Finished { operation, success } => {
                let slot = self.operations.slot(operation);
                *slot = slot.finish(success);
            }
            Event::VerifyStarted(id) => {
                self.verifying.insert(id);
            }
            Event::VerifyEnded(id) => {
                self.verifying.remove(&id);
            }
            Event::Loaded { records, account } => {
                self.leaderboard = leaderboard::rank_records(&records);
                self.personal_history = match account {
                    Some(account) => leaderboard::personal_history(&records, &account),
                    None => Vec::new(),
                };
                self.records = records;
                self.loaded = true;
            }
            Event::SessionCleared => {
                self.personal_history.clear();
            }
            Event::Notified {
                kind,
                message,
                operation,
            } => {
                // The superseded notification can no longer be dismissed
                if let Some(operation) = self.notification.take().and_then(|n| n.operation) {
                    let slot = self.operations.slot(operation);
                    *slot = slot.settle();
                }
                self.next_notification_id += 1;
                let id = self.next_notification_id;
                self.notification = Some(Notification {
                    id,
                    kind,
                    message,
                    operation,
                });
                return Some(id);
            }
            Event::Dismissed { notification_id } => {
                let current = self.notification.as_ref().map(|n| (n.id, n.operation));
                if let Some((id, operation)) = current {
                    if id == notification_id {
                        self.notification = None;
                        if let Some(operation) = operation {
                            let slot = self.operations.slot(operation);
                            *slot = slot.settle();
                        }
                    }
                }
            }
        }
        None
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.operations.get(operation).is_busy()
    }

    pub fn is_verifying(&self, id: &RecordId) -> bool {
        self.verifying.contains(id)
    }

    /// Statistics over the current snapshot
    pub fn stats(&self) -> ChallengeStats {
        ChallengeStats::from_records(&self.records)
    }

    /// Leaderboard rows matching `filter`
    pub fn visible_leaderboard(&self, filter: &LeaderboardFilter) -> Vec<StepRecord> {
        filter.apply(&self.leaderboard)
    }

    pub fn find(&self, id: &RecordId) -> Option<&StepRecord> {
        self.records.iter().find(|r| &r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, creator: &str, verified: bool, value: u32) -> StepRecord {
        StepRecord {
            id: RecordId::new(id),
            name: id.to_string(),
            creator: creator.to_string(),
            timestamp: 0,
            public_value1: value,
            public_value2: 0,
            is_verified: verified,
            decrypted_value: if verified { value } else { 0 },
            rank: None,
        }
    }

    fn notify(state: &mut PipelineState, kind: NotificationKind, op: Operation) -> u64 {
        state
            .apply(Event::Notified {
                kind,
                message: "msg".to_string(),
                operation: Some(op),
            })
            .unwrap()
    }

    #[test]
    fn test_operation_lifecycle() {
        let mut state = PipelineState::default();
        assert_eq!(state.operations.upload, OperationState::Idle);

        state.apply(Event::Started(Operation::Upload));
        assert!(state.is_busy(Operation::Upload));

        state.apply(Event::Finished {
            operation: Operation::Upload,
            success: true,
        });
        assert_eq!(state.operations.upload, OperationState::Succeeded);

        let id = notify(&mut state, NotificationKind::Success, Operation::Upload);
        state.apply(Event::Dismissed {
            notification_id: id,
        });
        assert_eq!(state.operations.upload, OperationState::Idle);
        assert!(state.notification.is_none());
    }

    #[test]
    fn test_overlapping_runs_stay_pending() {
        let mut state = PipelineState::default();
        state.apply(Event::Started(Operation::Load));
        state.apply(Event::Started(Operation::Load));
        assert_eq!(
            state.operations.load,
            OperationState::Pending { in_flight: 2 }
        );

        state.apply(Event::Finished {
            operation: Operation::Load,
            success: false,
        });
        assert!(state.is_busy(Operation::Load));

        state.apply(Event::Finished {
            operation: Operation::Load,
            success: true,
        });
        assert_eq!(state.operations.load, OperationState::Succeeded);
    }

    #[test]
    fn test_stale_dismissal_keeps_newer_notification() {
        let mut state = PipelineState::default();
        let first = notify(&mut state, NotificationKind::Success, Operation::Load);
        let second = notify(&mut state, NotificationKind::Error, Operation::Upload);
        assert!(second > first);

        state.apply(Event::Dismissed {
            notification_id: first,
        });
        assert_eq!(state.notification.as_ref().map(|n| n.id), Some(second));
    }

    #[test]
    fn test_replaced_notification_settles_its_operation() {
        let mut state = PipelineState::default();
        state.apply(Event::Started(Operation::Upload));
        state.apply(Event::Finished {
            operation: Operation::Upload,
            success: true,
        });
        notify(&mut state, NotificationKind::Success, Operation::Upload);

        state.apply(Event::Started(Operation::Load));
        let load_error = notify(&mut state, NotificationKind::Error, Operation::Load);
        assert_eq!(state.operations.upload, OperationState::Idle);
        assert!(state.is_busy(Operation::Load));

        state.apply(Event::Finished {
            operation: Operation::Load,
            success: false,
        });
        state.apply(Event::Dismissed {
            notification_id: load_error,
        });
        assert_eq!(state.operations.load, OperationState::Idle);
    }

    #[test]
    fn test_dismissal_does_not_settle_pending_operation() {
        let mut state = PipelineState::default();
        state.apply(Event::Started(Operation::Verify));
        let id = notify(&mut state, NotificationKind::Success, Operation::Verify);
        state.apply(Event::Dismissed {
            notification_id: id,
        });
        assert!(state.is_busy(Operation::Verify));
    }

    #[test]
    fn test_loaded_derives_leaderboard_and_history() {
        let mut state = PipelineState::default();
        state.apply(Event::Loaded {
            records: vec![
                record("a", "0xAAA", true, 500),
                record("b", "0xbbb", false, 0),
                record("c", "0xaaa", true, 1200),
            ],
            account: Some("0xaaa".to_string()),
        });

        assert!(state.loaded);
        assert_eq!(state.records.len(), 3);
        let ids: Vec<_> = state.leaderboard.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(state.personal_history.len(), 2);

        state.apply(Event::SessionCleared);
        assert!(state.personal_history.is_empty());
        assert_eq!(state.records.len(), 3);
    }

    #[test]
    fn test_verifying_set() {
        let mut state = PipelineState::default();
        let id = RecordId::new("steps-1-a");
        state.apply(Event::VerifyStarted(id.clone()));
        assert!(state.is_verifying(&id));
        state.apply(Event::VerifyEnded(id.clone()));
        assert!(!state.is_verifying(&id));
    }
}

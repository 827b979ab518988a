//! Ranking, statistics and filtering for step records
//!
//! All functions here are pure projections over a record snapshot.

use serde::{Deserialize, Serialize};

use crate::record::StepRecord;

/// Rank verified records by revealed step count (descending).
///
/// The sort is stable, so equal counts keep their fetch order. Unverified
/// records are left out and never receive a rank.
pub fn rank_records(records: &[StepRecord]) -> Vec<StepRecord> {
    let mut ranked: Vec<StepRecord> = records
        .iter()
        .filter(|r| r.is_verified)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| b.decrypted_value.cmp(&a.decrypted_value));

    for (index, record) in ranked.iter_mut().enumerate() {
        record.rank = Some(index as u32 + 1);
    }
    ranked
}

/// Records created by `account`, verified or not, in fetch order
pub fn personal_history(records: &[StepRecord], account: &str) -> Vec<StepRecord> {
    records
        .iter()
        .filter(|r| r.is_created_by(account))
        .cloned()
        .collect()
}

/// Search and verification filter for the leaderboard view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardFilter {
    /// Case-insensitive substring matched against participant names
    pub search_term: String,
    pub verified_only: bool,
}

impl LeaderboardFilter {
    pub fn new(search_term: impl Into<String>, verified_only: bool) -> Self {
        Self {
            search_term: search_term.into(),
            verified_only,
        }
    }

    pub fn matches(&self, record: &StepRecord) -> bool {
        let term = self.search_term.to_lowercase();
        record.name.to_lowercase().contains(&term) && (!self.verified_only || record.is_verified)
    }

    pub fn apply(&self, records: &[StepRecord]) -> Vec<StepRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Aggregate statistics for the challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeStats {
    pub total_records: usize,
    pub verified_records: usize,
    pub total_steps: u64,
    /// Rounded mean over verified records, 0 when none are verified
    pub avg_steps: u64,
    pub top_performer: Option<StepRecord>,
}

impl ChallengeStats {
    pub fn from_records(records: &[StepRecord]) -> Self {
        let ranked = rank_records(records);
        let verified_records = ranked.len();
        let total_steps: u64 = ranked.iter().map(|r| r.decrypted_value as u64).sum();
        let avg_steps = if verified_records > 0 {
            let count = verified_records as u64;
            (total_steps + count / 2) / count
        } else {
            0
        };

        Self {
            total_records: records.len(),
            verified_records,
            total_steps,
            avg_steps,
            top_performer: ranked.into_iter().next(),
        }
    }
}

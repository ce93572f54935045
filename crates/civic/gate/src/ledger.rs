use civic_types::{CommitId, GrantId, Rejection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LedgerError;

/// What the kernel decided about a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EntryDecision {
    Accepted,
    Rejected {
        reason: Rejection,
        constitutional_violation: bool,
    },
}

/// A single ledger entry. Never modified once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub commit_id: CommitId,
    pub commit_type: String,
    /// The commit in wire form
    pub commit: Value,
    pub decision: EntryDecision,
    /// Grants that justified the decision, for audit replay
    pub chain: Vec<GrantId>,
    pub recorded_at_ms: i64,
}

impl LedgerEntry {
    pub fn is_accepted(&self) -> bool {
        matches!(self.decision, EntryDecision::Accepted)
    }
}

/// Filter for querying the ledger.
#[derive(Clone, Debug, Default)]
pub struct LedgerFilter {
    pub commit_type: Option<String>,
    pub accepted: Option<bool>,
    pub time_range: Option<(i64, i64)>,
}

impl LedgerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_type(mut self, commit_type: impl Into<String>) -> Self {
        self.commit_type = Some(commit_type.into());
        self
    }

    pub fn accepted_only(mut self) -> Self {
        self.accepted = Some(true);
        self
    }

    pub fn rejected_only(mut self) -> Self {
        self.accepted = Some(false);
        self
    }

    pub fn with_time_range(mut self, from_ms: i64, to_ms: i64) -> Self {
        self.time_range = Some((from_ms, to_ms));
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(ref commit_type) = self.commit_type {
            if entry.commit_type != *commit_type {
                return false;
            }
        }

        if let Some(accepted) = self.accepted {
            if entry.is_accepted() != accepted {
                return false;
            }
        }

        if let Some((from, to)) = self.time_range {
            if entry.recorded_at_ms < from || entry.recorded_at_ms > to {
                return false;
            }
        }

        true
    }
}

/// Append-only record of every commit the kernel has decided on,
/// accepted or rejected. There are no delete or modify operations.
pub struct CommitLedger {
    entries: Vec<LedgerEntry>,
}

impl CommitLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry, assigning its sequence number.
    ///
    /// Returns an error if an entry with the same commit id exists.
    pub fn append(&mut self, mut entry: LedgerEntry) -> Result<u64, LedgerError> {
        if self.contains(&entry.commit_id) {
            return Err(LedgerError::DuplicateEntry(entry.commit_id));
        }

        let sequence = self.entries.len() as u64;
        entry.sequence = sequence;
        self.entries.push(entry);
        Ok(sequence)
    }

    pub fn contains(&self, commit_id: &CommitId) -> bool {
        self.entries.iter().any(|e| e.commit_id == *commit_id)
    }

    pub fn get(&self, commit_id: &CommitId) -> Result<&LedgerEntry, LedgerError> {
        self.entries
            .iter()
            .find(|e| e.commit_id == *commit_id)
            .ok_or_else(|| LedgerError::NotFound(commit_id.clone()))
    }

    pub fn query(&self, filter: &LedgerFilter) -> Vec<&LedgerEntry> {
        self.entries.iter().filter(|e| filter.matches(e)).collect()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommitLedger {
    fn default() -> Self {
        Self::new()
    }
}

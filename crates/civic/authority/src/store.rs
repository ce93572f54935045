use std::collections::HashMap;
use std::sync::RwLock;

use civic_types::CommitId;

use crate::error::StoreError;
use crate::grant::{AuthorityGrant, RevocationRecord};

/// Grants and revocations for one subject, read atomically.
///
/// Taken under a single read so no reader can observe a grant without a
/// revocation that was registered before the read.
#[derive(Clone, Debug, Default)]
pub struct SubjectSnapshot {
    /// In registration order
    pub grants: Vec<AuthorityGrant>,
    pub revocations: HashMap<CommitId, RevocationRecord>,
}

/// Append-only store of grants and revocations.
///
/// Durable implementations live outside this crate; the resolver only
/// needs get-by-subject, append and contains.
pub trait GrantStore: Send + Sync {
    /// Append a grant. Returns `false` if a grant with the same commit id
    /// is already stored, or if the grant is a genesis grant and one was
    /// already seeded (the call is then a no-op).
    fn append_grant(&self, grant: AuthorityGrant) -> Result<bool, StoreError>;

    fn contains_grant(&self, grant_commit_id: &CommitId) -> Result<bool, StoreError>;

    fn get_grant(&self, grant_commit_id: &CommitId) -> Result<Option<AuthorityGrant>, StoreError>;

    /// Append a revocation. Returns `false` if the grant was already
    /// revoked; the earlier record stays authoritative.
    fn append_revocation(&self, record: RevocationRecord) -> Result<bool, StoreError>;

    fn revocation_for(
        &self,
        grant_commit_id: &CommitId,
    ) -> Result<Option<RevocationRecord>, StoreError>;

    fn subject_snapshot(&self, subject: &str) -> Result<SubjectSnapshot, StoreError>;

    /// Every revocation, in registration order.
    fn revocations(&self) -> Result<Vec<RevocationRecord>, StoreError>;

    /// The genesis grant, if one was seeded.
    fn genesis(&self) -> Result<Option<AuthorityGrant>, StoreError>;
}

#[derive(Default)]
struct StoreState {
    grants: Vec<AuthorityGrant>,
    by_commit: HashMap<CommitId, usize>,
    by_subject: HashMap<String, Vec<usize>>,
    revocations: Vec<RevocationRecord>,
    revoked: HashMap<CommitId, usize>,
    genesis: Option<usize>,
}

/// In-memory [`GrantStore`] guarded by a single `RwLock`.
///
/// Writers are serialized by the lock; reads see a consistent snapshot of
/// grants and revocations together.
pub struct InMemoryGrantStore {
    state: RwLock<StoreState>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Number of grants ever registered (including revoked and expired).
    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.grants.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantStore for InMemoryGrantStore {
    fn append_grant(&self, grant: AuthorityGrant) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.by_commit.contains_key(&grant.commit_id)
            || (grant.is_genesis() && state.genesis.is_some())
        {
            return Ok(false);
        }

        let idx = state.grants.len();
        state.by_commit.insert(grant.commit_id.clone(), idx);
        state
            .by_subject
            .entry(grant.subject.clone())
            .or_default()
            .push(idx);
        if grant.is_genesis() {
            state.genesis = Some(idx);
        }
        state.grants.push(grant);
        Ok(true)
    }

    fn contains_grant(&self, grant_commit_id: &CommitId) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.by_commit.contains_key(grant_commit_id))
    }

    fn get_grant(&self, grant_commit_id: &CommitId) -> Result<Option<AuthorityGrant>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .by_commit
            .get(grant_commit_id)
            .map(|idx| state.grants[*idx].clone()))
    }

    fn append_revocation(&self, record: RevocationRecord) -> Result<bool, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.revoked.contains_key(&record.grant_commit_id) {
            return Ok(false);
        }
        let idx = state.revocations.len();
        state.revoked.insert(record.grant_commit_id.clone(), idx);
        state.revocations.push(record);
        Ok(true)
    }

    fn revocation_for(
        &self,
        grant_commit_id: &CommitId,
    ) -> Result<Option<RevocationRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .revoked
            .get(grant_commit_id)
            .map(|idx| state.revocations[*idx].clone()))
    }

    fn subject_snapshot(&self, subject: &str) -> Result<SubjectSnapshot, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(indices) = state.by_subject.get(subject) else {
            return Ok(SubjectSnapshot::default());
        };

        let grants: Vec<AuthorityGrant> = indices
            .iter()
            .map(|idx| state.grants[*idx].clone())
            .collect();
        let revocations = grants
            .iter()
            .filter_map(|g| {
                state
                    .revoked
                    .get(&g.commit_id)
                    .map(|idx| (g.commit_id.clone(), state.revocations[*idx].clone()))
            })
            .collect();

        Ok(SubjectSnapshot {
            grants,
            revocations,
        })
    }

    fn revocations(&self) -> Result<Vec<RevocationRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.revocations.clone())
    }

    fn genesis(&self) -> Result<Option<AuthorityGrant>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.genesis.map(|idx| state.grants[idx].clone()))
    }
}

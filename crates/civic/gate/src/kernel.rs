use std::sync::Arc;

use civic_authority::{AuthorityGrant, AuthorityResolver, GrantStore};
use civic_commit::decode_commit;
use civic_transition::TransitionEngine;
use civic_types::{
    Clock, Commit, CommitId, GovernancePolicy, GrantId, ObjectState, ReasonCode, Rejection,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::boundary::{BoundaryDecision, CommitBoundary};
use crate::error::GateError;
use crate::ledger::{CommitLedger, EntryDecision, LedgerEntry};
use crate::registry::ObjectStateRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Crossed the boundary and took effect
    Applied,
    /// Refused, at the boundary or when applying
    Rejected,
    /// Commit id already in the ledger; ignored
    Duplicate,
}

/// What happened to a submitted commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub commit_id: Option<CommitId>,
    pub commit_type: String,
    pub status: SubmissionStatus,
    pub reason: Option<Rejection>,
    pub constitutional_violation: bool,
    pub chain: Vec<GrantId>,
    /// New state of the object, for applied transitions
    pub new_state: Option<ObjectState>,
}

impl SubmissionOutcome {
    pub fn is_applied(&self) -> bool {
        self.status == SubmissionStatus::Applied
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// The governance kernel: the only way commits mutate governed state.
///
/// Every submission goes through [`CommitBoundary`] first. Accepted
/// transitions update the [`ObjectStateRegistry`]; accepted grants and
/// revokes go to the [`AuthorityResolver`]; all other accepted types are
/// recorded only. Rejections are recorded too.
pub struct GovernanceKernel {
    boundary: CommitBoundary,
    resolver: Arc<AuthorityResolver>,
    objects: ObjectStateRegistry,
    ledger: CommitLedger,
    clock: Arc<dyn Clock>,
}

impl GovernanceKernel {
    pub fn new(
        store: Arc<dyn GrantStore>,
        clock: Arc<dyn Clock>,
        policy: &GovernancePolicy,
    ) -> Self {
        let resolver = Arc::new(AuthorityResolver::new(
            store,
            clock.clone(),
            policy.grants.clone(),
        ));
        let engine = TransitionEngine::new(resolver.clone(), clock.clone());
        Self {
            boundary: CommitBoundary::new(engine),
            resolver,
            objects: ObjectStateRegistry::new(),
            ledger: CommitLedger::new(),
            clock,
        }
    }

    pub fn resolver(&self) -> &Arc<AuthorityResolver> {
        &self.resolver
    }

    pub fn boundary(&self) -> &CommitBoundary {
        &self.boundary
    }

    pub fn objects(&self) -> &ObjectStateRegistry {
        &self.objects
    }

    pub fn ledger(&self) -> &CommitLedger {
        &self.ledger
    }

    /// Seed the root grant. See [`AuthorityResolver::seed_genesis`].
    pub fn seed_genesis(&self, custodian: &str) -> Result<AuthorityGrant, GateError> {
        Ok(self.resolver.seed_genesis(custodian)?)
    }

    /// Submit a commit.
    pub fn submit(&mut self, commit: Commit) -> Result<SubmissionOutcome, GateError> {
        let commit_id = commit.commit_id().clone();
        let commit_type = commit.commit_type().to_string();

        if self.ledger.contains(&commit_id) {
            debug!(commit = %commit_id, "Commit already recorded, ignoring replay");
            return Ok(SubmissionOutcome {
                commit_id: Some(commit_id),
                commit_type,
                status: SubmissionStatus::Duplicate,
                reason: None,
                constitutional_violation: false,
                chain: Vec::new(),
                new_state: None,
            });
        }

        let decision = self.boundary.can_commit_change_state(&commit)?;
        let chain = decision
            .transition
            .as_ref()
            .map(|t| t.chain.clone())
            .unwrap_or_default();

        if !decision.allowed {
            return self.reject(&commit, decision.reason, decision.constitutional_violation, chain);
        }

        let now = self.clock.now_ms();
        let applied: Result<Option<ObjectState>, Rejection> = match &commit {
            Commit::StateTransition(c) => self.objects.apply(c, now).map(Some),
            Commit::AuthorityGrant(c) => self.resolver.register_grant(c)?.into_result().map(|_| None),
            Commit::AuthorityRevoke(c) => self.resolver.register_revoke(c)?.into_result().map(|_| None),
            Commit::Other(_) => Ok(None),
            // The boundary never lets dialogue through.
            Commit::Dialogue(_) => Err(Rejection::new(
                ReasonCode::DialogueCannotMutateState,
                "dialogue commits can never change state",
            )),
        };

        let new_state = match applied {
            Ok(state) => state,
            Err(reason) => return self.reject(&commit, Some(reason), false, chain),
        };

        self.ledger.append(LedgerEntry {
            sequence: 0,
            commit_id: commit_id.clone(),
            commit_type: commit_type.clone(),
            commit: commit.to_json(),
            decision: EntryDecision::Accepted,
            chain: chain.clone(),
            recorded_at_ms: now,
        })?;

        info!(
            commit = %commit_id,
            commit_type = %commit_type,
            authority = commit.authority_ref().unwrap_or_default(),
            new_state = ?new_state,
            "Commit applied"
        );
        Ok(SubmissionOutcome {
            commit_id: Some(commit_id),
            commit_type,
            status: SubmissionStatus::Applied,
            reason: None,
            constitutional_violation: false,
            chain,
            new_state,
        })
    }

    /// Decode then submit. Commits that fail to decode are rejected
    /// without a ledger entry, since they have no trustworthy identity.
    pub fn submit_raw(&mut self, raw: &Value) -> Result<SubmissionOutcome, GateError> {
        match decode_commit(raw) {
            Ok(commit) => self.submit(commit),
            Err(_) => {
                let decision = self.boundary.can_commit_change_state_raw(raw)?;
                warn!(
                    commit = ?decision.commit_id,
                    code = ?decision.code(),
                    "Undecodable commit rejected"
                );
                Ok(Self::outcome_from_decision(decision))
            }
        }
    }

    /// Is this commit acceptable right now? Runs the boundary without
    /// applying or recording anything.
    pub fn check(&self, commit: &Commit) -> Result<BoundaryDecision, GateError> {
        Ok(self.boundary.can_commit_change_state(commit)?)
    }

    fn reject(
        &mut self,
        commit: &Commit,
        reason: Option<Rejection>,
        constitutional_violation: bool,
        chain: Vec<GrantId>,
    ) -> Result<SubmissionOutcome, GateError> {
        let reason = reason.unwrap_or_else(|| {
            Rejection::new(ReasonCode::InvalidType, "commit was not explicitly allowed")
        });
        let commit_id = commit.commit_id().clone();
        let commit_type = commit.commit_type().to_string();

        warn!(
            commit = %commit_id,
            commit_type = %commit_type,
            code = %reason.code,
            constitutional_violation,
            "Commit rejected"
        );

        self.ledger.append(LedgerEntry {
            sequence: 0,
            commit_id: commit_id.clone(),
            commit_type: commit_type.clone(),
            commit: commit.to_json(),
            decision: EntryDecision::Rejected {
                reason: reason.clone(),
                constitutional_violation,
            },
            chain: chain.clone(),
            recorded_at_ms: self.clock.now_ms(),
        })?;

        Ok(SubmissionOutcome {
            commit_id: Some(commit_id),
            commit_type,
            status: SubmissionStatus::Rejected,
            reason: Some(reason),
            constitutional_violation,
            chain,
            new_state: None,
        })
    }

    fn outcome_from_decision(decision: BoundaryDecision) -> SubmissionOutcome {
        SubmissionOutcome {
            commit_id: decision.commit_id,
            commit_type: decision.commit_type,
            status: SubmissionStatus::Rejected,
            reason: decision.reason,
            constitutional_violation: decision.constitutional_violation,
            chain: Vec::new(),
            new_state: None,
        }
    }
}

use civic_commit::validate_state_transition;
use civic_types::{
    Clock, CommitId, ObjectId, ObjectState, Rejection, StateTransitionCommit, SystemClock,
};

/// Create a builder for a state transition commit.
pub fn create_state_transition_commit(
    object_id: impl Into<ObjectId>,
    object_type: impl Into<String>,
    from: ObjectState,
    to: ObjectState,
) -> StateTransitionCommitBuilder {
    StateTransitionCommitBuilder {
        commit_id: None,
        timestamp_ms: None,
        object_id: object_id.into(),
        object_type: object_type.into(),
        from_state: from,
        to_state: to,
        authority_ref: None,
        evidence_refs: Vec::new(),
        reason: String::new(),
        signature: None,
    }
}

/// Builder for [`StateTransitionCommit`].
///
/// Unless set explicitly, the commit id is a fresh UUID and the timestamp
/// is taken from the system clock at `build` time.
pub struct StateTransitionCommitBuilder {
    commit_id: Option<CommitId>,
    timestamp_ms: Option<i64>,
    object_id: ObjectId,
    object_type: String,
    from_state: ObjectState,
    to_state: ObjectState,
    authority_ref: Option<String>,
    evidence_refs: Vec<String>,
    reason: String,
    signature: Option<String>,
}

impl StateTransitionCommitBuilder {
    pub fn commit_id(mut self, id: impl Into<CommitId>) -> Self {
        self.commit_id = Some(id.into());
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn authority_ref(mut self, authority_ref: impl Into<String>) -> Self {
        self.authority_ref = Some(authority_ref.into());
        self
    }

    pub fn evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence_refs.push(evidence.into());
        self
    }

    pub fn evidence_refs(mut self, refs: Vec<String>) -> Self {
        self.evidence_refs = refs;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn build(self) -> StateTransitionCommit {
        StateTransitionCommit {
            commit_id: self
                .commit_id
                .unwrap_or_else(|| CommitId::new(uuid::Uuid::new_v4().to_string())),
            timestamp_ms: self.timestamp_ms.unwrap_or_else(|| SystemClock.now_ms()),
            object_id: self.object_id,
            object_type: self.object_type,
            from_state: self.from_state,
            to_state: self.to_state,
            authority_ref: self.authority_ref,
            evidence_refs: self.evidence_refs,
            reason: self.reason,
            signature: self.signature,
        }
    }

    /// Build and run the commit validator.
    pub fn build_checked(self) -> Result<StateTransitionCommit, Rejection> {
        let commit = self.build();
        validate_state_transition(&commit).into_result()?;
        Ok(commit)
    }
}

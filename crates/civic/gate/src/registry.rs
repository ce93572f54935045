use std::collections::HashMap;

use civic_types::{
    CommitId, ObjectId, ObjectState, ReasonCode, Rejection, StateTransitionCommit,
};
use serde::{Deserialize, Serialize};

/// One applied edge traversal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub commit_id: CommitId,
    pub from: ObjectState,
    pub to: ObjectState,
    pub applied_at_ms: i64,
}

/// Current state of a governed object plus how it got there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: ObjectId,
    pub object_type: String,
    pub state: ObjectState,
    pub history: Vec<TransitionRecord>,
}

/// Current state of every governed object.
///
/// Objects not seen before are in DRAFT. A transition applies only if its
/// `from_state` is the object's current state.
#[derive(Default)]
pub struct ObjectStateRegistry {
    objects: HashMap<ObjectId, ObjectRecord>,
}

impl ObjectStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, object_id: &ObjectId) -> Option<&ObjectRecord> {
        self.objects.get(object_id)
    }

    pub fn current_state(&self, object_id: &ObjectId) -> ObjectState {
        self.objects
            .get(object_id)
            .map_or(ObjectState::Draft, |r| r.state)
    }

    /// Apply an already-authorized transition.
    pub fn apply(
        &mut self,
        commit: &StateTransitionCommit,
        applied_at_ms: i64,
    ) -> Result<ObjectState, Rejection> {
        if let Some(existing) = self.objects.get(&commit.object_id) {
            if existing.object_type != commit.object_type {
                return Err(Rejection::new(
                    ReasonCode::InvalidType,
                    format!(
                        "object {} is a {}, not a {}",
                        commit.object_id, existing.object_type, commit.object_type
                    ),
                ));
            }
        }

        let current = self.current_state(&commit.object_id);
        if current != commit.from_state {
            return Err(Rejection::new(
                ReasonCode::StaleFromState,
                format!(
                    "object {} is in {current}, commit expects {}",
                    commit.object_id, commit.from_state
                ),
            ));
        }

        let record = self
            .objects
            .entry(commit.object_id.clone())
            .or_insert_with(|| ObjectRecord {
                object_id: commit.object_id.clone(),
                object_type: commit.object_type.clone(),
                state: ObjectState::Draft,
                history: Vec::new(),
            });
        record.state = commit.to_state;
        record.history.push(TransitionRecord {
            commit_id: commit.commit_id.clone(),
            from: commit.from_state,
            to: commit.to_state,
            applied_at_ms,
        });
        Ok(record.state)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(id: &str, object_type: &str, from: ObjectState, to: ObjectState) -> StateTransitionCommit {
        StateTransitionCommit {
            commit_id: CommitId::new(id),
            timestamp_ms: 0,
            object_id: ObjectId::new("po-1"),
            object_type: object_type.into(),
            from_state: from,
            to_state: to,
            authority_ref: Some("user:bob".into()),
            evidence_refs: vec![],
            reason: String::new(),
            signature: None,
        }
    }

    #[test]
    fn unknown_objects_start_in_draft() {
        let mut registry = ObjectStateRegistry::new();
        assert_eq!(registry.current_state(&ObjectId::new("po-1")), ObjectState::Draft);

        let state = registry
            .apply(&transition("t1", "PO", ObjectState::Draft, ObjectState::Propose), 5)
            .unwrap();
        assert_eq!(state, ObjectState::Propose);
        assert_eq!(registry.get(&ObjectId::new("po-1")).unwrap().history.len(), 1);
    }

    #[test]
    fn stale_from_state_is_rejected() {
        let mut registry = ObjectStateRegistry::new();
        registry
            .apply(&transition("t1", "PO", ObjectState::Draft, ObjectState::Hold), 5)
            .unwrap();
        let err = registry
            .apply(&transition("t2", "PO", ObjectState::Draft, ObjectState::Propose), 6)
            .unwrap_err();
        assert_eq!(err.code, ReasonCode::StaleFromState);
        assert_eq!(registry.current_state(&ObjectId::new("po-1")), ObjectState::Hold);
    }

    #[test]
    fn object_type_is_fixed() {
        let mut registry = ObjectStateRegistry::new();
        registry
            .apply(&transition("t1", "PO", ObjectState::Draft, ObjectState::Hold), 5)
            .unwrap();
        let err = registry
            .apply(&transition("t2", "BUDGET", ObjectState::Hold, ObjectState::Propose), 6)
            .unwrap_err();
        assert_eq!(err.code, ReasonCode::InvalidType);
    }
}

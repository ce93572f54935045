use std::sync::Arc;

use civic_authority::{AuthorityError, AuthorityProvider};
use civic_commit::validate_state_transition;
use civic_types::{
    CapabilityToken, Clock, CommitId, GrantId, ObjectId, ObjectState, ReasonCode, Rejection,
    StateTransitionCommit,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::builder::{create_state_transition_commit, StateTransitionCommitBuilder};

/// Result of the pure transition check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCheck {
    pub allowed: bool,
    pub from: Option<ObjectState>,
    pub to: Option<ObjectState>,
    pub reason: Option<Rejection>,
}

impl TransitionCheck {
    fn allowed(from: ObjectState, to: ObjectState) -> Self {
        Self {
            allowed: true,
            from: Some(from),
            to: Some(to),
            reason: None,
        }
    }

    fn rejected(from: Option<ObjectState>, to: Option<ObjectState>, reason: Rejection) -> Self {
        Self {
            allowed: false,
            from,
            to,
            reason: Some(reason),
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// States reachable from `state` in one step. Empty for REVERT.
pub fn get_next_states(state: ObjectState) -> &'static [ObjectState] {
    state.next_states()
}

/// Check a single edge traversal without consulting any grants.
///
/// The edge must be declared, `authority_ref` must be present and
/// non-blank, and entering COMMIT needs at least one evidence reference.
pub fn check_transition(
    from: ObjectState,
    to: ObjectState,
    authority_ref: Option<&str>,
    evidence_refs: &[String],
) -> TransitionCheck {
    if !from.can_transition_to(to) {
        return TransitionCheck::rejected(
            Some(from),
            Some(to),
            Rejection::new(
                ReasonCode::InvalidTransition,
                format!("{from} -> {to} is not a declared transition"),
            ),
        );
    }

    if authority_ref.map_or(true, |r| r.trim().is_empty()) {
        return TransitionCheck::rejected(
            Some(from),
            Some(to),
            Rejection::new(
                ReasonCode::MissingAuthority,
                format!("{from} -> {to} requires an authority_ref"),
            ),
        );
    }

    if to.requires_evidence() && !evidence_refs.iter().any(|e| !e.trim().is_empty()) {
        return TransitionCheck::rejected(
            Some(from),
            Some(to),
            Rejection::new(
                ReasonCode::MissingEvidence,
                format!("transition into {to} requires evidence"),
            ),
        );
    }

    TransitionCheck::allowed(from, to)
}

/// [`check_transition`] over state names as they appear on the wire.
/// Unknown state names are invalid transitions.
pub fn check_transition_str(
    from: &str,
    to: &str,
    authority_ref: Option<&str>,
    evidence_refs: &[String],
) -> TransitionCheck {
    let from_state = from.parse::<ObjectState>();
    let to_state = to.parse::<ObjectState>();
    match (from_state, to_state) {
        (Ok(f), Ok(t)) => check_transition(f, t, authority_ref, evidence_refs),
        (f, t) => {
            let unknown = if f.is_err() { from } else { to };
            TransitionCheck::rejected(
                f.ok(),
                t.ok(),
                Rejection::new(
                    ReasonCode::InvalidTransition,
                    format!("unknown object state {unknown:?}"),
                ),
            )
        }
    }
}

/// Full decision for a transition commit, including the authority chain
/// that justified it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub allowed: bool,
    pub commit_id: CommitId,
    pub object_id: ObjectId,
    pub from: ObjectState,
    pub to: ObjectState,
    /// Capability that was checked; `None` for the exempt edge
    pub required_capability: Option<String>,
    pub chain: Vec<GrantId>,
    pub authority_exempt: bool,
    pub reason: Option<Rejection>,
}

impl TransitionDecision {
    fn new(commit: &StateTransitionCommit) -> Self {
        Self {
            allowed: false,
            commit_id: commit.commit_id.clone(),
            object_id: commit.object_id.clone(),
            from: commit.from_state,
            to: commit.to_state,
            required_capability: None,
            chain: Vec::new(),
            authority_exempt: false,
            reason: None,
        }
    }

    fn reject(mut self, reason: Rejection) -> Self {
        self.allowed = false;
        self.reason = Some(reason);
        self
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// Authority-aware transition engine.
pub struct TransitionEngine {
    authority: Arc<dyn AuthorityProvider>,
    clock: Arc<dyn Clock>,
}

impl TransitionEngine {
    pub fn new(authority: Arc<dyn AuthorityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { authority, clock }
    }

    /// Is DRAFT to HOLD, the private parking edge.
    pub fn is_exempt_edge(from: ObjectState, to: ObjectState) -> bool {
        from == ObjectState::Draft && to == ObjectState::Hold
    }

    /// Decide whether `commit` may traverse its edge.
    ///
    /// Runs the commit validator, the pure transition check, and then
    /// (unless the edge is exempt) resolves the commit's authority to
    /// `STATE_TRANSITION:<object_type>:<to_state>`.
    pub fn authorize(
        &self,
        commit: &StateTransitionCommit,
    ) -> Result<TransitionDecision, AuthorityError> {
        let decision = TransitionDecision::new(commit);

        let validation = validate_state_transition(commit);
        if let Some(reason) = validation.reason {
            return Ok(decision.reject(reason));
        }

        let check = check_transition(
            commit.from_state,
            commit.to_state,
            commit.authority_ref.as_deref(),
            &commit.evidence_refs,
        );
        if let Some(reason) = check.reason {
            return Ok(decision.reject(reason));
        }

        if Self::is_exempt_edge(commit.from_state, commit.to_state) {
            debug!(
                commit = %commit.commit_id,
                object = %commit.object_id,
                "DRAFT -> HOLD is exempt from authority discovery"
            );
            return Ok(TransitionDecision {
                allowed: true,
                authority_exempt: true,
                ..decision
            });
        }

        let required =
            match CapabilityToken::state_transition(&commit.object_type, commit.to_state.as_str()) {
                Ok(t) => t.to_string(),
                Err(e) => {
                    return Ok(decision.reject(Rejection::new(ReasonCode::InvalidCapability, e.to_string())))
                }
            };
        let authority_ref = commit.authority_ref.as_deref().unwrap_or_default();
        let auth = self.authority.has_capability(authority_ref, &required, None)?;

        let decision = TransitionDecision {
            required_capability: Some(required),
            chain: auth.chain,
            ..decision
        };
        if let Some(reason) = auth.reason {
            debug!(
                commit = %commit.commit_id,
                authority = %authority_ref,
                code = %reason.code,
                "Transition denied by authority check"
            );
            return Ok(decision.reject(reason));
        }

        info!(
            commit = %commit.commit_id,
            object = %commit.object_id,
            from = %commit.from_state,
            to = %commit.to_state,
            authority = %authority_ref,
            "Transition authorized"
        );
        Ok(TransitionDecision {
            allowed: true,
            ..decision
        })
    }

    /// Start a transition commit stamped with this engine's clock.
    pub fn create_state_transition_commit(
        &self,
        object_id: impl Into<ObjectId>,
        object_type: impl Into<String>,
        from: ObjectState,
        to: ObjectState,
    ) -> StateTransitionCommitBuilder {
        create_state_transition_commit(object_id, object_type, from, to).at(self.clock.now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_authority::{AuthorityResolver, InMemoryGrantStore};
    use civic_types::{AuthorityGrantCommit, GrantPolicy, ManualClock};
    use proptest::prelude::*;

    fn evidence(refs: &[&str]) -> Vec<String> {
        refs.iter().map(|s| s.to_string()).collect()
    }

    fn engine_with_grant(caps: &[&str]) -> TransitionEngine {
        let clock = Arc::new(ManualClock::new(10_000));
        let resolver = AuthorityResolver::new(
            Arc::new(InMemoryGrantStore::new()),
            clock.clone(),
            GrantPolicy::default(),
        );
        let grant = AuthorityGrantCommit {
            commit_id: CommitId::new("g1"),
            timestamp_ms: 10_000,
            grant_id: GrantId::new("grant-1"),
            scope: "*".into(),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            grantee_id: "user:treasurer".into(),
            grantor_authority_ref: "user:root".into(),
            evidence_refs: vec![],
            effective_from_ms: 0,
            expires_at_ms: None,
            signature: "sig".into(),
        };
        assert!(resolver.register_grant(&grant).unwrap().valid);
        TransitionEngine::new(Arc::new(resolver), clock)
    }

    #[test]
    fn revert_is_terminal() {
        assert!(get_next_states(ObjectState::Revert).is_empty());
        assert_eq!(get_next_states(ObjectState::Commit), &[ObjectState::Revert]);
    }

    #[test]
    fn commit_needs_evidence() {
        let check = check_transition_str("PROPOSE", "COMMIT", Some("user:bob"), &[]);
        assert!(!check.allowed);
        assert_eq!(check.code(), Some(ReasonCode::MissingEvidence));

        let check = check_transition_str("PROPOSE", "COMMIT", Some("user:bob"), &evidence(&["ev1"]));
        assert!(check.allowed);

        let check = check_transition_str("PROPOSE", "COMMIT", Some("user:bob"), &evidence(&["  "]));
        assert_eq!(check.code(), Some(ReasonCode::MissingEvidence));
    }

    #[test]
    fn authority_ref_is_required() {
        let check = check_transition(ObjectState::Draft, ObjectState::Hold, None, &[]);
        assert_eq!(check.code(), Some(ReasonCode::MissingAuthority));
        let check = check_transition(ObjectState::Draft, ObjectState::Hold, Some(" "), &[]);
        assert_eq!(check.code(), Some(ReasonCode::MissingAuthority));
    }

    #[test]
    fn undeclared_and_unknown_states_are_invalid() {
        let check = check_transition_str("DRAFT", "COMMIT", Some("bob"), &evidence(&["ev"]));
        assert_eq!(check.code(), Some(ReasonCode::InvalidTransition));
        let check = check_transition_str("DRAFT", "ARCHIVED", Some("bob"), &[]);
        assert_eq!(check.code(), Some(ReasonCode::InvalidTransition));
        assert_eq!(check.from, Some(ObjectState::Draft));
        assert_eq!(check.to, None);
    }

    #[test]
    fn draft_to_hold_skips_discovery() {
        let engine = engine_with_grant(&["A:B:C"]);
        let commit = engine
            .create_state_transition_commit("po-1", "PURCHASE_ORDER", ObjectState::Draft, ObjectState::Hold)
            .authority_ref("user:nobody")
            .build();
        let decision = engine.authorize(&commit).unwrap();
        assert!(decision.allowed);
        assert!(decision.authority_exempt);
        assert!(decision.required_capability.is_none());
    }

    #[test]
    fn propose_requires_matching_capability() {
        let engine = engine_with_grant(&["STATE_TRANSITION:PURCHASE_ORDER:PROPOSE"]);

        let ok = engine
            .create_state_transition_commit("po-1", "PURCHASE_ORDER", ObjectState::Draft, ObjectState::Propose)
            .authority_ref("user:treasurer")
            .build();
        let decision = engine.authorize(&ok).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.chain, vec![GrantId::new("grant-1")]);
        assert_eq!(
            decision.required_capability.as_deref(),
            Some("STATE_TRANSITION:PURCHASE_ORDER:PROPOSE")
        );

        let other_type = engine
            .create_state_transition_commit("b-1", "BUDGET", ObjectState::Draft, ObjectState::Propose)
            .authority_ref("user:treasurer")
            .build();
        assert_eq!(
            engine.authorize(&other_type).unwrap().code(),
            Some(ReasonCode::AuthorityCapabilityMissing)
        );

        let stranger = engine
            .create_state_transition_commit("po-1", "PURCHASE_ORDER", ObjectState::Draft, ObjectState::Propose)
            .authority_ref("user:stranger")
            .build();
        assert_eq!(
            engine.authorize(&stranger).unwrap().code(),
            Some(ReasonCode::AuthorityNotDiscoverable)
        );
    }

    #[test]
    fn commit_needs_signature_before_authority() {
        let engine = engine_with_grant(&["STATE_TRANSITION:*:COMMIT"]);
        let unsigned = engine
            .create_state_transition_commit("po-1", "PURCHASE_ORDER", ObjectState::Propose, ObjectState::Commit)
            .authority_ref("user:treasurer")
            .evidence("quote-3")
            .build();
        assert_eq!(
            engine.authorize(&unsigned).unwrap().code(),
            Some(ReasonCode::MissingSignature)
        );

        let signed = engine
            .create_state_transition_commit("po-1", "PURCHASE_ORDER", ObjectState::Propose, ObjectState::Commit)
            .authority_ref("user:treasurer")
            .evidence("quote-3")
            .signature("sig-abc")
            .build();
        assert!(engine.authorize(&signed).unwrap().allowed);
    }

    fn state() -> impl Strategy<Value = ObjectState> {
        prop::sample::select(ObjectState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn check_agrees_with_edge_table(from in state(), to in state()) {
            let check = check_transition(from, to, Some("user:any"), &evidence(&["ev"]));
            prop_assert_eq!(check.allowed, get_next_states(from).contains(&to));
        }
    }
}

use civic_authority::AuthorityError;
use civic_commit::decode_commit;
use civic_transition::{TransitionDecision, TransitionEngine};
use civic_types::{Commit, CommitId, CommitType, ReasonCode, Rejection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Whether a commit may mutate state, and why not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryDecision {
    pub allowed: bool,
    pub commit_id: Option<CommitId>,
    pub commit_type: String,
    pub reason: Option<Rejection>,
    /// Set when the commit tried something the constitution forbids
    /// outright (dialogue attempting a mutation), as opposed to lacking
    /// authority or fields.
    pub constitutional_violation: bool,
    /// Transition engine decision, for STATE_TRANSITION commits that got
    /// that far
    pub transition: Option<TransitionDecision>,
}

impl BoundaryDecision {
    fn allowed(commit: &Commit) -> Self {
        Self {
            allowed: true,
            commit_id: Some(commit.commit_id().clone()),
            commit_type: commit.commit_type().to_string(),
            reason: None,
            constitutional_violation: false,
            transition: None,
        }
    }

    fn rejected(commit_id: Option<CommitId>, commit_type: &str, reason: Rejection) -> Self {
        Self {
            allowed: false,
            commit_id,
            commit_type: commit_type.to_string(),
            reason: Some(reason),
            constitutional_violation: false,
            transition: None,
        }
    }

    fn dialogue(commit_id: Option<CommitId>) -> Self {
        Self {
            constitutional_violation: true,
            ..Self::rejected(
                commit_id,
                "DIALOGUE",
                Rejection::new(
                    ReasonCode::DialogueCannotMutateState,
                    "dialogue commits can never change state",
                ),
            )
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// The single decision path for mutability.
///
/// - DIALOGUE: never allowed, whatever else the commit carries.
/// - STATE_TRANSITION: allowed iff the commit validates and the
///   transition engine authorizes it.
/// - Anything else: allowed iff it carries an authority ref and a
///   timestamp. A generic commit may not carry a reserved type tag.
pub struct CommitBoundary {
    engine: TransitionEngine,
}

impl CommitBoundary {
    pub fn new(engine: TransitionEngine) -> Self {
        Self { engine }
    }

    pub fn can_commit_change_state(
        &self,
        commit: &Commit,
    ) -> Result<BoundaryDecision, AuthorityError> {
        let decision = match commit {
            Commit::Dialogue(c) => {
                warn!(
                    commit = %c.commit_id,
                    context = %c.context_ref,
                    "Dialogue commit presented at the commit boundary"
                );
                BoundaryDecision::dialogue(Some(c.commit_id.clone()))
            }
            Commit::StateTransition(c) => {
                let transition = self.engine.authorize(c)?;
                BoundaryDecision {
                    allowed: transition.allowed,
                    reason: transition.reason.clone(),
                    transition: Some(transition),
                    ..BoundaryDecision::allowed(commit)
                }
            }
            Commit::Other(c) => match commit.commit_type() {
                CommitType::Other(_) => Self::check_generic(commit),
                CommitType::Dialogue => {
                    warn!(
                        commit = %c.commit_id,
                        "Generic commit tagged DIALOGUE presented at the commit boundary"
                    );
                    BoundaryDecision::dialogue(Some(c.commit_id.clone()))
                }
                reserved => BoundaryDecision::rejected(
                    Some(c.commit_id.clone()),
                    reserved.as_str(),
                    Rejection::new(
                        ReasonCode::InvalidType,
                        format!("{reserved} commits must use their dedicated schema"),
                    ),
                ),
            },
            _ => Self::check_generic(commit),
        };

        if let Some(ref reason) = decision.reason {
            debug!(
                commit = %commit.commit_id(),
                commit_type = %decision.commit_type,
                code = %reason.code,
                "Commit may not change state"
            );
        }
        Ok(decision)
    }

    /// Boundary check on an undecoded commit.
    ///
    /// A commit tagged DIALOGUE is refused as a constitutional violation
    /// before decoding, so a dialogue smuggling a mutation field is
    /// reported as such rather than as a schema error.
    pub fn can_commit_change_state_raw(
        &self,
        raw: &Value,
    ) -> Result<BoundaryDecision, AuthorityError> {
        let commit_id = raw
            .get("commit_id")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(CommitId::from);
        let commit_type = raw.get("type").and_then(Value::as_str).unwrap_or_default();

        if commit_type == "DIALOGUE" {
            warn!(
                commit = ?commit_id,
                "Dialogue commit presented at the commit boundary"
            );
            return Ok(BoundaryDecision::dialogue(commit_id));
        }

        match decode_commit(raw) {
            Ok(commit) => self.can_commit_change_state(&commit),
            Err(reason) => Ok(BoundaryDecision::rejected(commit_id, commit_type, reason)),
        }
    }

    fn check_generic(commit: &Commit) -> BoundaryDecision {
        let commit_type = commit.commit_type();
        let commit_id = Some(commit.commit_id().clone());
        if commit.authority_ref().is_none() {
            return BoundaryDecision::rejected(
                commit_id,
                commit_type.as_str(),
                Rejection::new(
                    ReasonCode::MissingAuthority,
                    format!("{commit_type} commits must carry an authority_ref"),
                ),
            );
        }
        if commit.timestamp_ms().is_none() {
            return BoundaryDecision::rejected(
                commit_id,
                commit_type.as_str(),
                Rejection::missing_field("timestamp_ms"),
            );
        }
        BoundaryDecision::allowed(commit)
    }
}

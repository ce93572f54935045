use std::sync::Arc;

use civic_types::{
    AuthorityGrantCommit, AuthorityRevokeCommit, CapabilityToken, Clock, Commit, DialogueCommit,
    DialoguePolicy, GovernancePolicy, GrantPolicy, ReasonCode, Rejection, ScopePath,
    retention_expiry_ms, StateTransitionCommit, ValidationResult,
};
use serde_json::Value;
use tracing::debug;

use crate::decode::decode_commit;

/// Validator bound to a policy and a clock.
///
/// The free functions in this module are the actual checks; this type only
/// supplies the configured limits and "now".
pub struct CommitValidator {
    policy: GovernancePolicy,
    clock: Arc<dyn Clock>,
}

impl CommitValidator {
    pub fn new(policy: GovernancePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    /// Dispatch on commit type.
    pub fn validate(&self, commit: &Commit) -> ValidationResult {
        let result: ValidationResult = match commit {
            Commit::Dialogue(c) => validate_dialogue(c, &self.policy.dialogue),
            Commit::StateTransition(c) => validate_state_transition(c),
            Commit::AuthorityGrant(c) => {
                validate_authority_grant(c, &self.policy.grants, self.clock.now_ms())
            }
            Commit::AuthorityRevoke(c) => validate_authority_revoke(c),
            Commit::Other(c) => require_present("commit_id", c.commit_id.as_str()).into(),
        };
        if let Some(ref reason) = result.reason {
            debug!(
                commit = %commit.commit_id(),
                commit_type = %commit.commit_type(),
                code = %reason.code,
                "Commit failed validation"
            );
        }
        result
    }

    /// Decode a raw commit, then validate it.
    pub fn validate_raw(&self, raw: &Value) -> ValidationResult {
        match decode_commit(raw) {
            Ok(commit) => self.validate(&commit),
            Err(rejection) => ValidationResult::reject(rejection),
        }
    }

    pub fn validate_authority_grant(&self, commit: &AuthorityGrantCommit) -> ValidationResult {
        validate_authority_grant(commit, &self.policy.grants, self.clock.now_ms())
    }

    pub fn validate_dialogue(&self, commit: &DialogueCommit) -> ValidationResult {
        validate_dialogue(commit, &self.policy.dialogue)
    }
}

/// DIALOGUE: content hash and context present, retention within bounds.
pub fn validate_dialogue(commit: &DialogueCommit, policy: &DialoguePolicy) -> ValidationResult {
    check_dialogue(commit, policy).into()
}

fn check_dialogue(commit: &DialogueCommit, policy: &DialoguePolicy) -> Result<(), Rejection> {
    require_present("commit_id", commit.commit_id.as_str())?;
    require_present("content_hash", &commit.content_hash)?;
    require_present("context_ref", &commit.context_ref)?;

    let hours = commit.retention_window_hours;
    if hours < policy.min_retention_hours {
        return Err(Rejection::new(
            ReasonCode::RetentionTooShort,
            format!(
                "retention window {hours}h is below the minimum of {}h",
                policy.min_retention_hours
            ),
        ));
    }
    if hours > policy.max_retention_hours {
        return Err(Rejection::new(
            ReasonCode::RetentionTooLong,
            format!(
                "retention window {hours}h exceeds the maximum of {}h",
                policy.max_retention_hours
            ),
        ));
    }

    let latest_expiry = retention_expiry_ms(commit.timestamp_ms, hours).ok_or_else(|| {
        Rejection::new(
            ReasonCode::RetentionTooLong,
            "retention window runs past the representable time range",
        )
    })?;
    if commit.expiry_timestamp_ms > latest_expiry {
        return Err(Rejection::new(
            ReasonCode::RetentionTooLong,
            "expiry lies beyond the declared retention window",
        ));
    }
    Ok(())
}

/// STATE_TRANSITION: declared edge, evidence into COMMIT, signature into
/// COMMIT or REVERT. Signature content is opaque here.
pub fn validate_state_transition(commit: &StateTransitionCommit) -> ValidationResult {
    check_state_transition(commit).into()
}

fn check_state_transition(commit: &StateTransitionCommit) -> Result<(), Rejection> {
    require_present("commit_id", commit.commit_id.as_str())?;
    require_present("object_id", commit.object_id.as_str())?;
    require_present("object_type", &commit.object_type)?;

    if CapabilityToken::state_transition(&commit.object_type, commit.to_state.as_str()).is_err() {
        return Err(Rejection::new(
            ReasonCode::InvalidCapability,
            format!(
                "object type {:?} cannot form a capability token",
                commit.object_type
            ),
        ));
    }

    if !commit.from_state.can_transition_to(commit.to_state) {
        return Err(Rejection::new(
            ReasonCode::InvalidTransition,
            format!(
                "{} -> {} is not a declared transition",
                commit.from_state, commit.to_state
            ),
        ));
    }

    if commit.to_state.requires_evidence() && !has_any(&commit.evidence_refs) {
        return Err(Rejection::new(
            ReasonCode::MissingEvidence,
            format!("transition into {} requires evidence", commit.to_state),
        ));
    }

    let signed = commit
        .signature
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    if commit.to_state.requires_signature() && !signed {
        return Err(Rejection::new(
            ReasonCode::MissingSignature,
            format!("transition into {} must be signed", commit.to_state),
        ));
    }
    Ok(())
}

/// AUTHORITY_GRANT: non-empty well-formed capabilities, parseable scope,
/// `effective_from_ms` no further ahead than the policy skew, and an
/// expiry strictly after the start when present.
pub fn validate_authority_grant(
    commit: &AuthorityGrantCommit,
    policy: &GrantPolicy,
    now_ms: i64,
) -> ValidationResult {
    check_authority_grant(commit, policy, now_ms).into()
}

fn check_authority_grant(
    commit: &AuthorityGrantCommit,
    policy: &GrantPolicy,
    now_ms: i64,
) -> Result<(), Rejection> {
    require_present("commit_id", commit.commit_id.as_str())?;
    require_present("grant_id", commit.grant_id.as_str())?;
    require_present("grantee_id", &commit.grantee_id)?;
    require_present("grantor_authority_ref", &commit.grantor_authority_ref)?;
    require_present("signature", &commit.signature)?;
    require_present("scope", &commit.scope)?;

    if commit.capabilities.is_empty() {
        return Err(Rejection::new(
            ReasonCode::EmptyCapabilities,
            "a grant must carry at least one capability",
        ));
    }
    for raw in &commit.capabilities {
        if let Err(e) = raw.parse::<CapabilityToken>() {
            return Err(Rejection::new(
                ReasonCode::InvalidCapability,
                format!("capability {raw:?}: {e}"),
            ));
        }
    }

    if let Err(e) = commit.scope.parse::<ScopePath>() {
        return Err(Rejection::new(ReasonCode::InvalidScope, e));
    }

    if commit.effective_from_ms > now_ms.saturating_add(policy.max_future_skew_ms) {
        return Err(Rejection::new(
            ReasonCode::EffectiveFromTooFar,
            format!(
                "effective_from_ms {} is more than {}ms ahead of now",
                commit.effective_from_ms, policy.max_future_skew_ms
            ),
        ));
    }

    if let Some(expires) = commit.expires_at_ms {
        if expires <= commit.effective_from_ms {
            return Err(Rejection::new(
                ReasonCode::InvalidExpiry,
                "expires_at_ms must be strictly after effective_from_ms",
            ));
        }
    }
    Ok(())
}

/// AUTHORITY_REVOKE: presence only.
pub fn validate_authority_revoke(commit: &AuthorityRevokeCommit) -> ValidationResult {
    check_authority_revoke(commit).into()
}

fn check_authority_revoke(commit: &AuthorityRevokeCommit) -> Result<(), Rejection> {
    require_present("commit_id", commit.commit_id.as_str())?;
    require_present("grant_commit_id", commit.grant_commit_id.as_str())?;
    require_present("reason", &commit.reason)?;
    require_present("revoked_by_authority_ref", &commit.revoked_by_authority_ref)?;
    require_present("signature", &commit.signature)?;
    Ok(())
}

fn require_present(field: &str, value: &str) -> Result<(), Rejection> {
    if value.trim().is_empty() {
        Err(Rejection::missing_field(field))
    } else {
        Ok(())
    }
}

fn has_any(refs: &[String]) -> bool {
    refs.iter().any(|r| !r.trim().is_empty())
}

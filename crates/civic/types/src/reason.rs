use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable rejection codes.
///
/// Audit logs and UIs branch on these values, so the serialized names are
/// part of the public contract and must never be renamed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MissingField,
    InvalidType,
    InvalidTransition,
    MissingEvidence,
    MissingSignature,
    MissingAuthority,
    AuthorityNotDiscoverable,
    AuthorityExpiredOrRevoked,
    AuthorityCapabilityMissing,
    AuthorityScopeMismatch,
    DialogueCannotMutateState,
    RetentionTooLong,
    RetentionTooShort,
    ForbiddenField,
    InvalidCapability,
    InvalidScope,
    EmptyCapabilities,
    EffectiveFromTooFar,
    InvalidExpiry,
    GrantNotFound,
    StaleFromState,
    ValueIndeterminate,
    ConfidenceBelowThreshold,
    ConflictingEvidence,
    NotDialogue,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingField => "MISSING_FIELD",
            ReasonCode::InvalidType => "INVALID_TYPE",
            ReasonCode::InvalidTransition => "INVALID_TRANSITION",
            ReasonCode::MissingEvidence => "MISSING_EVIDENCE",
            ReasonCode::MissingSignature => "MISSING_SIGNATURE",
            ReasonCode::MissingAuthority => "MISSING_AUTHORITY",
            ReasonCode::AuthorityNotDiscoverable => "AUTHORITY_NOT_DISCOVERABLE",
            ReasonCode::AuthorityExpiredOrRevoked => "AUTHORITY_EXPIRED_OR_REVOKED",
            ReasonCode::AuthorityCapabilityMissing => "AUTHORITY_CAPABILITY_MISSING",
            ReasonCode::AuthorityScopeMismatch => "AUTHORITY_SCOPE_MISMATCH",
            ReasonCode::DialogueCannotMutateState => "DIALOGUE_CANNOT_MUTATE_STATE",
            ReasonCode::RetentionTooLong => "RETENTION_TOO_LONG",
            ReasonCode::RetentionTooShort => "RETENTION_TOO_SHORT",
            ReasonCode::ForbiddenField => "FORBIDDEN_FIELD",
            ReasonCode::InvalidCapability => "INVALID_CAPABILITY",
            ReasonCode::InvalidScope => "INVALID_SCOPE",
            ReasonCode::EmptyCapabilities => "EMPTY_CAPABILITIES",
            ReasonCode::EffectiveFromTooFar => "EFFECTIVE_FROM_TOO_FAR",
            ReasonCode::InvalidExpiry => "INVALID_EXPIRY",
            ReasonCode::GrantNotFound => "GRANT_NOT_FOUND",
            ReasonCode::StaleFromState => "STALE_FROM_STATE",
            ReasonCode::ValueIndeterminate => "VALUE_INDETERMINATE",
            ReasonCode::ConfidenceBelowThreshold => "CONFIDENCE_BELOW_THRESHOLD",
            ReasonCode::ConflictingEvidence => "CONFLICTING_EVIDENCE",
            ReasonCode::NotDialogue => "NOT_DIALOGUE",
        }
    }

    /// Codes produced by the authority resolver rather than by validation.
    pub fn is_authority_failure(&self) -> bool {
        matches!(
            self,
            ReasonCode::MissingAuthority
                | ReasonCode::AuthorityNotDiscoverable
                | ReasonCode::AuthorityExpiredOrRevoked
                | ReasonCode::AuthorityCapabilityMissing
                | ReasonCode::AuthorityScopeMismatch
        )
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured rejection: a stable code plus a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: ReasonCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ReasonCode::MissingField,
            format!("required field `{field}` is missing"),
        )
    }

    pub fn invalid_type(field: &str, expected: &str) -> Self {
        Self::new(
            ReasonCode::InvalidType,
            format!("field `{field}` must be {expected}"),
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of a commit validator: `{valid, reason?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Rejection>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn reject(rejection: Rejection) -> Self {
        Self {
            valid: false,
            reason: Some(rejection),
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }

    /// Convert into a `Result` so validators can be chained with `?`.
    pub fn into_result(self) -> Result<(), Rejection> {
        match self.reason {
            Some(rejection) if !self.valid => Err(rejection),
            _ => Ok(()),
        }
    }
}

impl From<Result<(), Rejection>> for ValidationResult {
    fn from(result: Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(rejection) => Self::reject(rejection),
        }
    }
}

use civic_types::GrantId;
use thiserror::Error;

/// Errors from a grant store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("grant store lock poisoned")]
    LockPoisoned,

    #[error("grant store backend error: {0}")]
    Backend(String),
}

/// Errors from the authority resolver.
///
/// Business-rule failures (unknown authority, expired grant, missing
/// capability) are never errors; they come back as values with a
/// [`ReasonCode`](civic_types::ReasonCode).
#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("genesis authority already seeded as grant {0}")]
    GenesisAlreadySeeded(GrantId),

    #[error("invalid genesis custodian: {0}")]
    InvalidCustodian(String),
}

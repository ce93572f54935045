//! Core type definitions for the Civic governance core.
//!
//! This crate holds the shared vocabulary of every other civic crate:
//! commit records, authority references, capability tokens, scope paths,
//! object lifecycle states and the stable reason codes used in every
//! decision result. No decision logic lives here beyond parsing and the
//! static transition table.

#![deny(unsafe_code)]

pub mod authority;
pub mod capability;
pub mod clock;
pub mod commit;
pub mod config;
pub mod ids;
pub mod reason;
pub mod scope;
pub mod state;

pub use authority::{AuthorityRef, SELF_CAPABILITY};
pub use capability::{CapabilityToken, Segment, TokenError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commit::{
    AuthorityGrantCommit, AuthorityRevokeCommit, Commit, CommitType, DialogueCommit,
    GenericCommit, StateTransitionCommit, FORBIDDEN_DIALOGUE_FIELDS, HOUR_MS,
    retention_expiry_ms,
};
pub use config::{ConfidencePolicy, DialoguePolicy, GovernancePolicy, GrantPolicy};
pub use ids::{CommitId, GrantId, ObjectId};
pub use reason::{ReasonCode, Rejection, ValidationResult};
pub use scope::{ScopePath, ScopeSegment};
pub use state::ObjectState;

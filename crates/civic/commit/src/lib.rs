//! Commit decoding and validation.
//!
//! Commits arrive at the boundary as loosely typed JSON. [`decode_commit`]
//! turns them into the typed [`Commit`](civic_types::Commit) union,
//! reporting missing fields and wrong kinds with stable reason codes.
//! The validators then check the per-type invariants:
//!
//! - **DIALOGUE**: content hash and context present, retention within
//!   bounds, and never any mutation field (checked at decode time, since
//!   the typed record has nowhere to put one).
//! - **STATE_TRANSITION**: declared edge, evidence for COMMIT, signature
//!   for COMMIT and REVERT.
//! - **AUTHORITY_GRANT**: well-formed non-empty capabilities and scope,
//!   sane validity window.
//! - **AUTHORITY_REVOKE**: presence only; whether the grant exists is a
//!   resolution-layer question.
//!
//! Every validator is a pure function returning a
//! [`ValidationResult`](civic_types::ValidationResult); nothing panics or
//! returns an error for a business-rule failure.

#![deny(unsafe_code)]

pub mod decode;
pub mod validate;

pub use decode::{decode_commit, encode_commit};
pub use validate::{
    validate_authority_grant, validate_authority_revoke, validate_dialogue,
    validate_state_transition, CommitValidator,
};

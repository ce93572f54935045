//! State Transition Engine.
//!
//! Governed objects move through DRAFT, HOLD, PROPOSE, COMMIT and REVERT
//! along a fixed edge table (see [`ObjectState`](civic_types::ObjectState)).
//! [`check_transition`] is the pure edge/authority/evidence check;
//! [`TransitionEngine::authorize`] additionally resolves the commit's
//! authority to `STATE_TRANSITION:<object_type>:<to_state>`.
//!
//! DRAFT to HOLD is the one edge exempt from the discoverability check:
//! parking one's own draft is private. It still needs an authority ref.

#![deny(unsafe_code)]

pub mod builder;
pub mod engine;

pub use builder::{create_state_transition_commit, StateTransitionCommitBuilder};
pub use engine::{
    check_transition, check_transition_str, get_next_states, TransitionCheck, TransitionDecision,
    TransitionEngine,
};

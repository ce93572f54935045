//! Civic Gate: the Commit Boundary.
//!
//! Nothing mutates governed state unless [`CommitBoundary`] says so.
//! [`GovernanceKernel::submit`] is the only mutating entry point: it asks
//! the boundary first, then applies accepted commits to the object-state
//! registry or the authority resolver, and records every outcome
//! (accepted or rejected) in the append-only [`CommitLedger`].
//!
//! DIALOGUE commits never cross the boundary. They travel on the separate
//! [`DialogueChannel`], which in turn refuses everything that is not
//! dialogue.

#![deny(unsafe_code)]

pub mod boundary;
pub mod dialogue;
pub mod error;
pub mod kernel;
pub mod ledger;
pub mod registry;

pub use boundary::{BoundaryDecision, CommitBoundary};
pub use dialogue::DialogueChannel;
pub use error::{GateError, LedgerError};
pub use kernel::{GovernanceKernel, SubmissionOutcome, SubmissionStatus};
pub use ledger::{CommitLedger, EntryDecision, LedgerEntry, LedgerFilter};
pub use registry::{ObjectRecord, ObjectStateRegistry, TransitionRecord};

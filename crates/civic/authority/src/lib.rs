//! Authority resolution: the only place capabilities come from.
//!
//! No authority is implicit: apart from `self:<id>` (which may act on its
//! own private material and nothing else), every capability an actor holds
//! must be traceable to an active grant in the store. Resolution returns
//! the aggregated capability set together with the grant-id chain that
//! justifies it, so every authorized action can be replayed for audit.
//!
//! ## Components
//!
//! - [`matcher`]: wildcard-aware comparison of capability tokens and scopes
//! - [`GrantStore`]: injected append-only store of grants and revocations
//! - [`AuthorityResolver`]: grant/revoke registration, resolution and
//!   capability checks, plus the one-time genesis seeding
//!
//! ## Guarantees
//!
//! - Grants and revocations are never deleted; a revocation is effective
//!   from its registration time onward and is idempotent.
//! - A chain is only as durable as its weakest link: the resolved expiry is
//!   the earliest expiry among contributing grants.
//! - "No grants at all" and "grants exist but none active" are reported
//!   with distinct codes.

#![deny(unsafe_code)]

pub mod error;
pub mod grant;
pub mod matcher;
pub mod resolver;
pub mod store;

pub use error::{AuthorityError, StoreError};
pub use grant::{AuthorityGrant, GrantProvenance, RevocationRecord, GENESIS_GRANT_ID};
pub use matcher::{matches, matches_str, scope_matches, scope_matches_str};
pub use resolver::{AuthorityProvider, AuthorityResolver, AuthorizationCheck, Resolution};
pub use store::{GrantStore, InMemoryGrantStore, SubjectSnapshot};

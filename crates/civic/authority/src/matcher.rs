//! Capability and scope matching.
//!
//! Capability tokens: each of the three positions matches if it is equal
//! to the required one or the granted position is `*`. Matching is
//! case-sensitive and wildcards are whole-segment only.
//!
//! Scopes are hierarchical, so they match left to right. A wildcard in
//! the granted scope covers every remaining required segment. Without a
//! wildcard every required segment must be matched, and the granted scope
//! must have at least as many segments as the required one.

use civic_types::{CapabilityToken, ScopePath, ScopeSegment};

/// Does `granted` cover `required`?
pub fn matches(granted: &CapabilityToken, required: &CapabilityToken) -> bool {
    granted.action.covers(&required.action)
        && granted.object.covers(&required.object)
        && granted.operation.covers(&required.operation)
}

/// String form of [`matches`]. Malformed tokens never match.
pub fn matches_str(granted: &str, required: &str) -> bool {
    match (
        granted.parse::<CapabilityToken>(),
        required.parse::<CapabilityToken>(),
    ) {
        (Ok(g), Ok(r)) => matches(&g, &r),
        _ => false,
    }
}

/// Does the `granted` scope cover the `required` scope?
pub fn scope_matches(granted: &ScopePath, required: &ScopePath) -> bool {
    let granted_segments = granted.segments();
    for (i, req) in required.segments().iter().enumerate() {
        match granted_segments.get(i) {
            Some(ScopeSegment::Any) => return true,
            Some(g) if g == req => continue,
            // Mismatch, or granted ran out of segments (less specific).
            _ => return false,
        }
    }
    true
}

/// String form of [`scope_matches`]. Malformed scopes never match.
pub fn scope_matches_str(granted: &str, required: &str) -> bool {
    match (granted.parse::<ScopePath>(), required.parse::<ScopePath>()) {
        (Ok(g), Ok(r)) => scope_matches(&g, &r),
        _ => false,
    }
}

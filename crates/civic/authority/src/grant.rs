use std::collections::BTreeSet;

use civic_types::{
    AuthorityGrantCommit, AuthorityRef, AuthorityRevokeCommit, CapabilityToken, CommitId, GrantId,
    ReasonCode, Rejection, ScopePath,
};
use serde::{Deserialize, Serialize};

/// Grant id of the bootstrap root grant.
pub const GENESIS_GRANT_ID: &str = "genesis";

/// How a grant came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantProvenance {
    /// Registered from an AUTHORITY_GRANT commit.
    Commit,
    /// The one-time root grant seeded outside the commit pipeline.
    Genesis,
}

/// A registered authority grant.
///
/// Created once and never mutated or deleted; revocation is recorded
/// separately as a [`RevocationRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityGrant {
    pub grant_id: GrantId,
    pub commit_id: CommitId,
    /// Normalized subject key the grant is indexed under
    pub subject: String,
    /// Grantee exactly as written on the commit
    pub grantee_id: String,
    pub scope: ScopePath,
    pub capabilities: BTreeSet<CapabilityToken>,
    pub grantor_authority_ref: String,
    pub evidence_refs: Vec<String>,
    pub effective_from_ms: i64,
    pub expires_at_ms: Option<i64>,
    pub signature: String,
    pub provenance: GrantProvenance,
    pub registered_at_ms: i64,
}

impl AuthorityGrant {
    /// Build a grant from an already-validated grant commit.
    pub fn from_commit(
        commit: &AuthorityGrantCommit,
        registered_at_ms: i64,
    ) -> Result<Self, Rejection> {
        let capabilities = commit
            .capabilities
            .iter()
            .map(|raw| {
                raw.parse::<CapabilityToken>().map_err(|e| {
                    Rejection::new(ReasonCode::InvalidCapability, format!("{raw:?}: {e}"))
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        let scope = commit
            .scope
            .parse::<ScopePath>()
            .map_err(|e| Rejection::new(ReasonCode::InvalidScope, e))?;

        Ok(Self {
            grant_id: commit.grant_id.clone(),
            commit_id: commit.commit_id.clone(),
            subject: AuthorityRef::parse(&commit.grantee_id)
                .subject_key()
                .to_string(),
            grantee_id: commit.grantee_id.clone(),
            scope,
            capabilities,
            grantor_authority_ref: commit.grantor_authority_ref.clone(),
            evidence_refs: commit.evidence_refs.clone(),
            effective_from_ms: commit.effective_from_ms,
            expires_at_ms: commit.expires_at_ms,
            signature: commit.signature.clone(),
            provenance: GrantProvenance::Commit,
            registered_at_ms,
        })
    }

    /// The root grant: scope `*`, capability `*:*:*`, no expiry.
    pub fn genesis(custodian: &AuthorityRef, now_ms: i64) -> Self {
        Self {
            grant_id: GrantId::new(GENESIS_GRANT_ID),
            commit_id: CommitId::new(format!("{GENESIS_GRANT_ID}:{}", custodian.subject_key())),
            subject: custodian.subject_key().to_string(),
            grantee_id: custodian.to_string(),
            scope: ScopePath::root(),
            capabilities: BTreeSet::from([CapabilityToken::universal()]),
            grantor_authority_ref: GENESIS_GRANT_ID.to_string(),
            evidence_refs: Vec::new(),
            effective_from_ms: now_ms,
            expires_at_ms: None,
            signature: String::new(),
            provenance: GrantProvenance::Genesis,
            registered_at_ms: now_ms,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.provenance == GrantProvenance::Genesis
    }

    /// Is this grant within its validity window at `at_ms`, ignoring
    /// revocation?
    pub fn in_window(&self, at_ms: i64) -> bool {
        self.effective_from_ms <= at_ms && self.expires_at_ms.map_or(true, |exp| exp > at_ms)
    }

    /// Active at `at_ms`: in window and not revoked by then.
    pub fn is_active_at(&self, at_ms: i64, revocation: Option<&RevocationRecord>) -> bool {
        let revoked = revocation.is_some_and(|r| r.registered_at_ms <= at_ms);
        !revoked && self.in_window(at_ms)
    }
}

/// Record of a grant revocation. Append-only; the first record for a grant
/// is authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub grant_commit_id: CommitId,
    pub revoke_commit_id: CommitId,
    pub reason: String,
    pub revoked_by_authority_ref: String,
    pub signature: String,
    pub timestamp_ms: i64,
    /// Revocation takes effect from this instant onward
    pub registered_at_ms: i64,
}

impl RevocationRecord {
    pub fn from_commit(commit: &AuthorityRevokeCommit, registered_at_ms: i64) -> Self {
        Self {
            grant_commit_id: commit.grant_commit_id.clone(),
            revoke_commit_id: commit.commit_id.clone(),
            reason: commit.reason.clone(),
            revoked_by_authority_ref: commit.revoked_by_authority_ref.clone(),
            signature: commit.signature.clone(),
            timestamp_ms: commit.timestamp_ms,
            registered_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit() -> AuthorityGrantCommit {
        AuthorityGrantCommit {
            commit_id: CommitId::new("gc-1"),
            timestamp_ms: 100,
            grant_id: GrantId::new("grant-1"),
            scope: "site.a".into(),
            capabilities: vec![
                "STATE_TRANSITION:PURCHASE_ORDER:APPROVE".into(),
                "STATE_TRANSITION:PURCHASE_ORDER:APPROVE".into(),
            ],
            grantee_id: "user:bob".into(),
            grantor_authority_ref: "user:root".into(),
            evidence_refs: vec!["minutes-3".into()],
            effective_from_ms: 100,
            expires_at_ms: Some(200),
            signature: "sig".into(),
        }
    }

    #[test]
    fn from_commit_normalizes_subject_and_dedups() {
        let grant = AuthorityGrant::from_commit(&commit(), 150).unwrap();
        assert_eq!(grant.subject, "bob");
        assert_eq!(grant.grantee_id, "user:bob");
        assert_eq!(grant.capabilities.len(), 1);
        assert_eq!(grant.provenance, GrantProvenance::Commit);
    }

    #[test]
    fn window_is_half_open() {
        let grant = AuthorityGrant::from_commit(&commit(), 100).unwrap();
        assert!(!grant.in_window(99));
        assert!(grant.in_window(100));
        assert!(grant.in_window(199));
        assert!(!grant.in_window(200));
    }

    #[test]
    fn revocation_applies_from_registration() {
        let grant = AuthorityGrant::from_commit(&commit(), 100).unwrap();
        let record = RevocationRecord {
            grant_commit_id: grant.commit_id.clone(),
            revoke_commit_id: CommitId::new("rc-1"),
            reason: "rotated".into(),
            revoked_by_authority_ref: "user:root".into(),
            signature: "sig".into(),
            timestamp_ms: 150,
            registered_at_ms: 160,
        };
        assert!(grant.is_active_at(159, Some(&record)));
        assert!(!grant.is_active_at(160, Some(&record)));
    }

    #[test]
    fn genesis_is_universal_and_unbounded() {
        let grant = AuthorityGrant::genesis(&AuthorityRef::parse("user:custodian"), 5);
        assert!(grant.is_genesis());
        assert!(grant.scope.is_root());
        assert!(grant.capabilities.contains(&CapabilityToken::universal()));
        assert!(grant.expires_at_ms.is_none());
        assert!(grant.in_window(i64::MAX));
    }
}

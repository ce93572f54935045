use std::collections::BTreeSet;
use std::sync::Arc;

use civic_commit::{validate_authority_grant, validate_authority_revoke};
use civic_types::{
    AuthorityGrantCommit, AuthorityRef, AuthorityRevokeCommit, CapabilityToken, Clock, GrantId,
    GrantPolicy, ReasonCode, Rejection, ScopePath, ValidationResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AuthorityError;
use crate::grant::{AuthorityGrant, RevocationRecord};
use crate::matcher::{matches, scope_matches};
use crate::store::GrantStore;

/// Outcome of resolving an authority reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub valid: bool,
    pub authority_ref: String,
    /// Union of capabilities across active grants
    pub capabilities: BTreeSet<CapabilityToken>,
    /// Union of scopes across active grants
    pub scopes: BTreeSet<ScopePath>,
    /// Earliest expiry among contributing grants; `None` if none expire
    pub expires_at_ms: Option<i64>,
    /// Contributing grant ids, in registration order
    pub chain: Vec<GrantId>,
    pub reason: Option<Rejection>,
    pub resolved_at_ms: i64,
}

impl Resolution {
    fn invalid(authority_ref: &str, reason: Rejection, at_ms: i64) -> Self {
        Self {
            valid: false,
            authority_ref: authority_ref.to_string(),
            capabilities: BTreeSet::new(),
            scopes: BTreeSet::new(),
            expires_at_ms: None,
            chain: Vec::new(),
            reason: Some(reason),
            resolved_at_ms: at_ms,
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// Outcome of a capability check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCheck {
    pub authorized: bool,
    pub authority_ref: String,
    pub required: String,
    pub scope: Option<String>,
    /// The granted token that covered `required`
    pub matched_capability: Option<CapabilityToken>,
    pub chain: Vec<GrantId>,
    pub reason: Option<Rejection>,
}

impl AuthorizationCheck {
    fn denied(
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
        chain: Vec<GrantId>,
        reason: Rejection,
    ) -> Self {
        Self {
            authorized: false,
            authority_ref: authority_ref.to_string(),
            required: required.to_string(),
            scope: scope.map(str::to_string),
            matched_capability: None,
            chain,
            reason: Some(reason),
        }
    }

    fn authorized(
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
        matched: CapabilityToken,
        chain: Vec<GrantId>,
    ) -> Self {
        Self {
            authorized: true,
            authority_ref: authority_ref.to_string(),
            required: required.to_string(),
            scope: scope.map(str::to_string),
            matched_capability: Some(matched),
            chain,
            reason: None,
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// Read side of the resolver, as consumed by the transition engine.
pub trait AuthorityProvider: Send + Sync {
    fn resolve(&self, authority_ref: &str) -> Result<Resolution, AuthorityError>;

    fn has_capability(
        &self,
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
    ) -> Result<AuthorizationCheck, AuthorityError>;
}

/// Maintains grants and revocations and resolves authority references
/// against them.
pub struct AuthorityResolver {
    store: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
    policy: GrantPolicy,
}

impl AuthorityResolver {
    pub fn new(store: Arc<dyn GrantStore>, clock: Arc<dyn Clock>, policy: GrantPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn GrantStore> {
        &self.store
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Resolve `authority_ref` as of now.
    pub fn resolve(&self, authority_ref: &str) -> Result<Resolution, AuthorityError> {
        self.resolve_at(authority_ref, self.clock.now_ms())
    }

    /// Resolve `authority_ref` as of `at_ms`.
    ///
    /// A grant contributes if it is in its validity window at `at_ms` and
    /// had not been revoked by then.
    pub fn resolve_at(&self, authority_ref: &str, at_ms: i64) -> Result<Resolution, AuthorityError> {
        let raw = authority_ref.trim();
        if raw.is_empty() {
            return Ok(Resolution::invalid(
                authority_ref,
                Rejection::new(ReasonCode::MissingAuthority, "authority_ref is blank"),
                at_ms,
            ));
        }

        let parsed = AuthorityRef::parse(raw);
        if let AuthorityRef::SelfActor(id) = &parsed {
            if id.trim().is_empty() {
                return Ok(Resolution::invalid(
                    authority_ref,
                    Rejection::new(ReasonCode::MissingAuthority, "self reference has no id"),
                    at_ms,
                ));
            }
            return Ok(Resolution {
                valid: true,
                authority_ref: authority_ref.to_string(),
                capabilities: BTreeSet::from([CapabilityToken::self_actor()]),
                scopes: BTreeSet::new(),
                expires_at_ms: None,
                chain: Vec::new(),
                reason: None,
                resolved_at_ms: at_ms,
            });
        }

        let active = match self.active_grants(&parsed, at_ms)? {
            Ok(active) => active,
            Err(reason) => return Ok(Resolution::invalid(authority_ref, reason, at_ms)),
        };

        let mut resolution = Resolution {
            valid: true,
            authority_ref: authority_ref.to_string(),
            capabilities: BTreeSet::new(),
            scopes: BTreeSet::new(),
            expires_at_ms: None,
            chain: Vec::with_capacity(active.len()),
            reason: None,
            resolved_at_ms: at_ms,
        };
        for grant in &active {
            resolution
                .capabilities
                .extend(grant.capabilities.iter().cloned());
            resolution.scopes.insert(grant.scope.clone());
            resolution.expires_at_ms = match (resolution.expires_at_ms, grant.expires_at_ms) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            resolution.chain.push(grant.grant_id.clone());
        }

        debug!(
            subject = %parsed,
            capabilities = resolution.capabilities.len(),
            chain_len = resolution.chain.len(),
            "Authority resolved"
        );
        Ok(resolution)
    }

    /// Grants for the subject of `parsed` that are active at `at_ms`, in
    /// registration order. Fails with NOT_DISCOVERABLE when the subject has
    /// no grants and EXPIRED_OR_REVOKED when none are active.
    fn active_grants(
        &self,
        parsed: &AuthorityRef,
        at_ms: i64,
    ) -> Result<Result<Vec<AuthorityGrant>, Rejection>, AuthorityError> {
        let snapshot = self.store.subject_snapshot(parsed.subject_key())?;
        if snapshot.grants.is_empty() {
            debug!(subject = %parsed, "No grants registered for subject");
            return Ok(Err(Rejection::new(
                ReasonCode::AuthorityNotDiscoverable,
                format!("no grants registered for {parsed}"),
            )));
        }

        let total = snapshot.grants.len();
        let revocations = snapshot.revocations;
        let active: Vec<AuthorityGrant> = snapshot
            .grants
            .into_iter()
            .filter(|g| g.is_active_at(at_ms, revocations.get(&g.commit_id)))
            .collect();
        if active.is_empty() {
            debug!(
                subject = %parsed,
                grants = total,
                "All grants for subject expired or revoked"
            );
            return Ok(Err(Rejection::new(
                ReasonCode::AuthorityExpiredOrRevoked,
                format!("{total} grant(s) for {parsed}, none active at {at_ms}"),
            )));
        }
        Ok(Ok(active))
    }

    /// Does `authority_ref` hold `required` (optionally within `scope`) now?
    pub fn has_capability(
        &self,
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
    ) -> Result<AuthorizationCheck, AuthorityError> {
        self.has_capability_at(authority_ref, required, scope, self.clock.now_ms())
    }

    pub fn has_capability_at(
        &self,
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
        at_ms: i64,
    ) -> Result<AuthorizationCheck, AuthorityError> {
        let required_token = match required.parse::<CapabilityToken>() {
            Ok(t) => t,
            Err(e) => {
                return Ok(AuthorizationCheck::denied(
                    authority_ref,
                    required,
                    scope,
                    Vec::new(),
                    Rejection::new(ReasonCode::InvalidCapability, format!("{required:?}: {e}")),
                ))
            }
        };
        let required_scope = match scope.map(str::parse::<ScopePath>).transpose() {
            Ok(s) => s,
            Err(e) => {
                return Ok(AuthorizationCheck::denied(
                    authority_ref,
                    required,
                    scope,
                    Vec::new(),
                    Rejection::new(ReasonCode::InvalidScope, e),
                ))
            }
        };

        let denied = |chain: Vec<GrantId>, reason: Rejection| {
            AuthorizationCheck::denied(authority_ref, required, scope, chain, reason)
        };
        let missing = || {
            Rejection::new(
                ReasonCode::AuthorityCapabilityMissing,
                format!("{authority_ref} does not hold {required}"),
            )
        };
        let out_of_scope = |required_scope: &ScopePath| {
            Rejection::new(
                ReasonCode::AuthorityScopeMismatch,
                format!("{authority_ref} holds {required} but not within {required_scope}"),
            )
        };

        let parsed = AuthorityRef::parse(authority_ref.trim());
        if authority_ref.trim().is_empty() || parsed.is_self() {
            let resolution = self.resolve_at(authority_ref, at_ms)?;
            if let Some(reason) = resolution.reason {
                return Ok(denied(Vec::new(), reason));
            }
            let Some(matched) = resolution
                .capabilities
                .iter()
                .find(|granted| matches(granted, &required_token))
                .cloned()
            else {
                return Ok(denied(Vec::new(), missing()));
            };
            // Private actions carry no scope.
            if let Some(required_scope) = &required_scope {
                return Ok(denied(Vec::new(), out_of_scope(required_scope)));
            }
            return Ok(AuthorizationCheck::authorized(
                authority_ref,
                required,
                scope,
                matched,
                Vec::new(),
            ));
        }

        let active = match self.active_grants(&parsed, at_ms)? {
            Ok(active) => active,
            Err(reason) => return Ok(denied(Vec::new(), reason)),
        };

        // Capability and scope must both come from the same grant.
        let holders: Vec<(&AuthorityGrant, &CapabilityToken)> = active
            .iter()
            .filter_map(|g| {
                g.capabilities
                    .iter()
                    .find(|granted| matches(granted, &required_token))
                    .map(|cap| (g, cap))
            })
            .collect();
        if holders.is_empty() {
            let chain = active.iter().map(|g| g.grant_id.clone()).collect();
            return Ok(denied(chain, missing()));
        }

        let covering: Vec<(&AuthorityGrant, &CapabilityToken)> = holders
            .iter()
            .filter(|(g, _)| {
                required_scope
                    .as_ref()
                    .map_or(true, |rs| scope_matches(&g.scope, rs))
            })
            .copied()
            .collect();
        let Some(&(_, matched)) = covering.first() else {
            let chain = holders.iter().map(|(g, _)| g.grant_id.clone()).collect();
            let reason = match &required_scope {
                Some(rs) => out_of_scope(rs),
                None => missing(),
            };
            return Ok(denied(chain, reason));
        };

        Ok(AuthorizationCheck::authorized(
            authority_ref,
            required,
            scope,
            matched.clone(),
            covering.iter().map(|(g, _)| g.grant_id.clone()).collect(),
        ))
    }

    /// Validate and register a grant. Re-registering the same commit is a
    /// no-op that still reports valid.
    pub fn register_grant(
        &self,
        commit: &AuthorityGrantCommit,
    ) -> Result<ValidationResult, AuthorityError> {
        let now = self.clock.now_ms();
        let result = validate_authority_grant(commit, &self.policy, now);
        if !result.valid {
            return Ok(result);
        }

        let grant = match AuthorityGrant::from_commit(commit, now) {
            Ok(g) => g,
            Err(rejection) => return Ok(ValidationResult::reject(rejection)),
        };
        let subject = grant.subject.clone();
        let capabilities = grant.capabilities.len();

        if !self.store.append_grant(grant)? {
            debug!(
                commit = %commit.commit_id,
                grant = %commit.grant_id,
                "Grant already registered, ignoring replay"
            );
            return Ok(ValidationResult::ok());
        }

        info!(
            grant = %commit.grant_id,
            commit = %commit.commit_id,
            subject = %subject,
            grantor = %commit.grantor_authority_ref,
            scope = %commit.scope,
            capabilities,
            "Authority grant registered"
        );
        Ok(ValidationResult::ok())
    }

    /// Validate and register a revocation. The referenced grant must exist;
    /// revoking an already revoked grant is a no-op that reports valid.
    pub fn register_revoke(
        &self,
        commit: &AuthorityRevokeCommit,
    ) -> Result<ValidationResult, AuthorityError> {
        let result = validate_authority_revoke(commit);
        if !result.valid {
            return Ok(result);
        }

        if !self.store.contains_grant(&commit.grant_commit_id)? {
            return Ok(ValidationResult::reject(Rejection::new(
                ReasonCode::GrantNotFound,
                format!("no grant registered by commit {}", commit.grant_commit_id),
            )));
        }

        let record = RevocationRecord::from_commit(commit, self.clock.now_ms());
        if !self.store.append_revocation(record)? {
            debug!(
                grant_commit = %commit.grant_commit_id,
                commit = %commit.commit_id,
                "Grant already revoked, ignoring"
            );
            return Ok(ValidationResult::ok());
        }

        info!(
            grant_commit = %commit.grant_commit_id,
            commit = %commit.commit_id,
            revoked_by = %commit.revoked_by_authority_ref,
            reason = %commit.reason,
            "Authority grant revoked"
        );
        Ok(ValidationResult::ok())
    }

    /// Seed the root grant for the first custodian.
    ///
    /// This bypasses the grant pipeline and may happen once per store.
    pub fn seed_genesis(&self, custodian: &str) -> Result<AuthorityGrant, AuthorityError> {
        let custodian_ref = AuthorityRef::parse(custodian);
        if custodian.trim().is_empty() || custodian_ref.is_self() {
            return Err(AuthorityError::InvalidCustodian(custodian.to_string()));
        }
        if let Some(existing) = self.store.genesis()? {
            return Err(AuthorityError::GenesisAlreadySeeded(existing.grant_id));
        }

        let grant = AuthorityGrant::genesis(&custodian_ref, self.clock.now_ms());
        if !self.store.append_grant(grant.clone())? {
            let existing = self
                .store
                .genesis()?
                .map(|g| g.grant_id)
                .unwrap_or_else(|| grant.grant_id.clone());
            return Err(AuthorityError::GenesisAlreadySeeded(existing));
        }

        warn!(
            grant = %grant.grant_id,
            custodian = %custodian_ref,
            "Genesis authority seeded outside the grant pipeline"
        );
        Ok(grant)
    }

    pub fn revocation_history(&self) -> Result<Vec<RevocationRecord>, AuthorityError> {
        Ok(self.store.revocations()?)
    }
}

impl AuthorityProvider for AuthorityResolver {
    fn resolve(&self, authority_ref: &str) -> Result<Resolution, AuthorityError> {
        AuthorityResolver::resolve(self, authority_ref)
    }

    fn has_capability(
        &self,
        authority_ref: &str,
        required: &str,
        scope: Option<&str>,
    ) -> Result<AuthorizationCheck, AuthorityError> {
        AuthorityResolver::has_capability(self, authority_ref, required, scope)
    }
}

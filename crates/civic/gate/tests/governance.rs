//! End-to-end governance scenarios through the kernel.

use std::sync::Arc;

use civic_authority::InMemoryGrantStore;
use civic_gate::{GovernanceKernel, LedgerFilter, SubmissionStatus};
use civic_types::{
    Commit, CommitId, GenericCommit, GovernancePolicy, GrantId, ManualClock, ObjectId,
    ObjectState, ReasonCode,
};
use serde_json::{json, Map, Value};

const T0: i64 = 1_700_000_000_000;

fn kernel() -> (GovernanceKernel, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let kernel = GovernanceKernel::new(
        Arc::new(InMemoryGrantStore::new()),
        clock.clone(),
        &GovernancePolicy::default(),
    );
    (kernel, clock)
}

fn grant(commit_id: &str, grantee: &str, caps: &[&str], expires: Option<i64>) -> Value {
    let mut raw = json!({
        "type": "AUTHORITY_GRANT",
        "commit_id": commit_id,
        "timestamp_ms": T0,
        "grant_id": format!("grant-{commit_id}"),
        "scope": "site.a",
        "capabilities": caps,
        "grantee_id": grantee,
        "grantor_authority_ref": "user:founder",
        "evidence_refs": ["charter-1"],
        "effective_from_ms": T0,
        "signature": "sig-founder",
    });
    if let Some(exp) = expires {
        raw["expires_at_ms"] = json!(exp);
    }
    raw
}

fn transition(commit_id: &str, from: &str, to: &str, authority: &str) -> Value {
    json!({
        "type": "STATE_TRANSITION",
        "commit_id": commit_id,
        "timestamp_ms": T0,
        "object_id": "po-17",
        "object_type": "PURCHASE_ORDER",
        "from_state": from,
        "to_state": to,
        "authority_ref": authority,
        "evidence_refs": ["quote-a", "quote-b"],
        "reason": "office chairs",
        "signature": "sig-bob",
    })
}

#[test]
fn purchase_order_lifecycle() {
    let (mut kernel, _) = kernel();
    kernel.seed_genesis("user:founder").unwrap();

    let outcome = kernel
        .submit_raw(&grant(
            "g-bob",
            "user:bob",
            &[
                "STATE_TRANSITION:PURCHASE_ORDER:PROPOSE",
                "STATE_TRANSITION:PURCHASE_ORDER:COMMIT",
            ],
            None,
        ))
        .unwrap();
    assert!(outcome.is_applied());

    let steps = [
        ("st-1", "DRAFT", "HOLD", ObjectState::Hold),
        ("st-2", "HOLD", "PROPOSE", ObjectState::Propose),
        ("st-3", "PROPOSE", "COMMIT", ObjectState::Commit),
    ];
    for (id, from, to, expected) in steps {
        let outcome = kernel
            .submit_raw(&transition(id, from, to, "user:bob"))
            .unwrap();
        assert!(outcome.is_applied(), "{id}: {:?}", outcome.reason);
        assert_eq!(outcome.new_state, Some(expected));
    }

    let object = kernel.objects().get(&ObjectId::new("po-17")).unwrap();
    assert_eq!(object.state, ObjectState::Commit);
    assert_eq!(object.history.len(), 3);

    // Bob was never granted REVERT.
    let outcome = kernel
        .submit_raw(&transition("st-4", "COMMIT", "REVERT", "user:bob"))
        .unwrap();
    assert_eq!(outcome.code(), Some(ReasonCode::AuthorityCapabilityMissing));

    // The founder's genesis grant covers everything.
    let outcome = kernel
        .submit_raw(&transition("st-5", "COMMIT", "REVERT", "user:founder"))
        .unwrap();
    assert!(outcome.is_applied());
    assert_eq!(outcome.chain, vec![GrantId::new("genesis")]);
}

#[test]
fn bob_approve_and_reject_scenario() {
    let (mut kernel, _) = kernel();
    kernel
        .submit_raw(&grant(
            "g1",
            "user:bob",
            &["STATE_TRANSITION:PURCHASE_ORDER:APPROVE"],
            None,
        ))
        .unwrap();

    let resolver = kernel.resolver();
    let approve = resolver
        .has_capability("user:bob", "STATE_TRANSITION:PURCHASE_ORDER:APPROVE", None)
        .unwrap();
    assert!(approve.authorized);

    let reject = resolver
        .has_capability("user:bob", "STATE_TRANSITION:PURCHASE_ORDER:REJECT", None)
        .unwrap();
    assert!(!reject.authorized);
    assert_eq!(reject.code(), Some(ReasonCode::AuthorityCapabilityMissing));
}

#[test]
fn dialogue_never_mutates_state() {
    let (mut kernel, _) = kernel();
    kernel.seed_genesis("user:founder").unwrap();

    let outcome = kernel
        .submit_raw(&json!({
            "type": "DIALOGUE",
            "commit_id": "d-1",
            "timestamp_ms": T0,
            "content_hash": "9f2c",
            "participant_ids": ["founder"],
            "context_ref": "thread-3",
            "retention_window_hours": 12,
            "state_change": {"object_id": "po-17", "to_state": "COMMIT"},
        }))
        .unwrap();
    assert_eq!(outcome.status, SubmissionStatus::Rejected);
    assert!(outcome.constitutional_violation);
    assert_eq!(outcome.code(), Some(ReasonCode::DialogueCannotMutateState));
    assert!(kernel.objects().is_empty());

    let clean = kernel
        .submit_raw(&json!({
            "type": "DIALOGUE",
            "commit_id": "d-2",
            "timestamp_ms": T0,
            "content_hash": "9f2d",
            "context_ref": "thread-3",
            "retention_window_hours": 12,
        }))
        .unwrap();
    assert_eq!(clean.code(), Some(ReasonCode::DialogueCannotMutateState));

    let rejected = kernel.ledger().query(&LedgerFilter::new().rejected_only());
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].commit_id, CommitId::new("d-2"));
}

#[test]
fn expired_and_revoked_grants_stop_authorizing() {
    let (mut kernel, clock) = kernel();
    let expires = T0 + 60_000;
    kernel
        .submit_raw(&grant(
            "g-temp",
            "user:carol",
            &["STATE_TRANSITION:PURCHASE_ORDER:PROPOSE"],
            Some(expires),
        ))
        .unwrap();
    kernel
        .submit_raw(&grant(
            "g-dave",
            "user:dave",
            &["STATE_TRANSITION:PURCHASE_ORDER:*"],
            None,
        ))
        .unwrap();

    clock.set(expires + 1);
    let outcome = kernel
        .submit_raw(&transition("st-1", "DRAFT", "PROPOSE", "user:carol"))
        .unwrap();
    assert_eq!(outcome.code(), Some(ReasonCode::AuthorityExpiredOrRevoked));

    let revoke = json!({
        "type": "AUTHORITY_REVOKE",
        "commit_id": "r-1",
        "timestamp_ms": expires + 1,
        "grant_commit_id": "g-dave",
        "reason": "left the committee",
        "revoked_by_authority_ref": "user:founder",
        "signature": "sig-founder",
    });
    assert!(kernel.submit_raw(&revoke).unwrap().is_applied());

    let mut again = revoke.clone();
    again["commit_id"] = json!("r-2");
    assert!(kernel.submit_raw(&again).unwrap().is_applied());
    assert_eq!(kernel.resolver().revocation_history().unwrap().len(), 1);

    let outcome = kernel
        .submit_raw(&transition("st-2", "DRAFT", "PROPOSE", "user:dave"))
        .unwrap();
    assert_eq!(outcome.code(), Some(ReasonCode::AuthorityExpiredOrRevoked));

    let outcome = kernel
        .submit_raw(&transition("st-3", "DRAFT", "PROPOSE", "user:erin"))
        .unwrap();
    assert_eq!(outcome.code(), Some(ReasonCode::AuthorityNotDiscoverable));
}

#[test]
fn stale_from_state_is_rejected_after_authorization() {
    let (mut kernel, _) = kernel();
    kernel.seed_genesis("user:founder").unwrap();

    assert!(kernel
        .submit_raw(&transition("st-1", "DRAFT", "PROPOSE", "user:founder"))
        .unwrap()
        .is_applied());
    let outcome = kernel
        .submit_raw(&transition("st-2", "DRAFT", "PROPOSE", "user:founder"))
        .unwrap();
    assert_eq!(outcome.code(), Some(ReasonCode::StaleFromState));
}

#[test]
fn replayed_commit_ids_are_ignored() {
    let (mut kernel, _) = kernel();
    kernel.seed_genesis("user:founder").unwrap();

    let raw = transition("st-1", "DRAFT", "HOLD", "self:founder");
    assert!(kernel.submit_raw(&raw).unwrap().is_applied());
    let replay = kernel.submit_raw(&raw).unwrap();
    assert_eq!(replay.status, SubmissionStatus::Duplicate);
    assert_eq!(kernel.ledger().len(), 1);
    assert_eq!(
        kernel.objects().current_state(&ObjectId::new("po-17")),
        ObjectState::Hold
    );
}

#[test]
fn commit_without_evidence_or_signature_is_refused() {
    let (mut kernel, _) = kernel();
    kernel.seed_genesis("user:founder").unwrap();
    kernel
        .submit_raw(&transition("st-1", "DRAFT", "PROPOSE", "user:founder"))
        .unwrap();

    let mut no_evidence = transition("st-2", "PROPOSE", "COMMIT", "user:founder");
    no_evidence["evidence_refs"] = json!([]);
    assert_eq!(
        kernel.submit_raw(&no_evidence).unwrap().code(),
        Some(ReasonCode::MissingEvidence)
    );

    let mut unsigned = transition("st-3", "PROPOSE", "COMMIT", "user:founder");
    unsigned.as_object_mut().unwrap().remove("signature");
    assert_eq!(
        kernel.submit_raw(&unsigned).unwrap().code(),
        Some(ReasonCode::MissingSignature)
    );
}

#[test]
fn generic_commits_need_authority() {
    let (mut kernel, _) = kernel();
    let anonymous = json!({
        "type": "MEETING_NOTICE",
        "commit_id": "n-1",
        "timestamp_ms": T0,
        "agenda": "budget",
    });
    assert_eq!(
        kernel.submit_raw(&anonymous).unwrap().code(),
        Some(ReasonCode::MissingAuthority)
    );

    let signed = json!({
        "type": "MEETING_NOTICE",
        "commit_id": "n-2",
        "timestamp_ms": T0,
        "authority_ref": "user:clerk",
        "agenda": "budget",
    });
    assert!(kernel.submit_raw(&signed).unwrap().is_applied());
    assert_eq!(
        kernel.ledger().get(&CommitId::new("n-2")).unwrap().commit["agenda"],
        "budget"
    );
}

#[test]
fn typed_generic_commit_tagged_dialogue_is_refused() {
    let (mut kernel, _) = kernel();
    let outcome = kernel
        .submit(Commit::Other(GenericCommit {
            commit_id: CommitId::new("x-1"),
            commit_type: "DIALOGUE".into(),
            timestamp_ms: Some(T0),
            authority_ref: Some("user:mallory".into()),
            payload: Map::new(),
        }))
        .unwrap();
    assert_eq!(outcome.status, SubmissionStatus::Rejected);
    assert!(outcome.constitutional_violation);
    assert_eq!(outcome.code(), Some(ReasonCode::DialogueCannotMutateState));
    assert!(kernel.ledger().query(&LedgerFilter::new().accepted_only()).is_empty());
}

use civic_types::{
    AuthorityGrantCommit, AuthorityRevokeCommit, Commit, CommitId, CommitType, DialogueCommit,
    GenericCommit, GrantId, ObjectId, ObjectState, ReasonCode, Rejection, StateTransitionCommit,
    retention_expiry_ms, FORBIDDEN_DIALOGUE_FIELDS,
};
use serde_json::{Map, Value};

/// Decode a raw commit into the typed union.
///
/// Order of checks: the commit must be an object with a `type` tag, then
/// the fields of that type must be present with the right JSON kind. A
/// dialogue commit carrying any mutation field is rejected here with
/// `FORBIDDEN_FIELD`. Unknown but present tags decode to
/// [`Commit::Other`].
pub fn decode_commit(raw: &Value) -> Result<Commit, Rejection> {
    let obj = raw
        .as_object()
        .ok_or_else(|| Rejection::invalid_type("commit", "a JSON object"))?;

    let tag = match obj.get("type") {
        None | Some(Value::Null) => return Err(Rejection::missing_field("type")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(Rejection::missing_field("type"))
        }
        Some(Value::String(s)) => CommitType::parse(s),
        Some(_) => return Err(Rejection::invalid_type("type", "a string")),
    };

    match tag {
        CommitType::Dialogue => decode_dialogue(obj).map(Commit::Dialogue),
        CommitType::StateTransition => decode_state_transition(obj).map(Commit::StateTransition),
        CommitType::AuthorityGrant => decode_grant(obj).map(Commit::AuthorityGrant),
        CommitType::AuthorityRevoke => decode_revoke(obj).map(Commit::AuthorityRevoke),
        CommitType::Other(name) => decode_generic(obj, name).map(Commit::Other),
    }
}

/// Wire form of a commit.
pub fn encode_commit(commit: &Commit) -> Value {
    commit.to_json()
}

fn decode_dialogue(obj: &Map<String, Value>) -> Result<DialogueCommit, Rejection> {
    let commit_id = CommitId(req_str(obj, "commit_id")?);
    let content_hash = req_str(obj, "content_hash")?;
    let timestamp_ms = req_i64(obj, "timestamp_ms")?;
    let context_ref = req_str(obj, "context_ref")?;
    let retention_window_hours = retention_hours(obj)?;
    let participant_ids = opt_str_list(obj, "participant_ids")?;

    if let Some(field) = FORBIDDEN_DIALOGUE_FIELDS
        .iter()
        .find(|field| obj.contains_key(**field))
    {
        return Err(Rejection::new(
            ReasonCode::ForbiddenField,
            format!("dialogue commits cannot carry `{field}`"),
        ));
    }

    let expiry_timestamp_ms = match opt_i64(obj, "expiry_timestamp_ms")? {
        Some(expiry) => expiry,
        None => retention_expiry_ms(timestamp_ms, retention_window_hours).ok_or_else(|| {
            Rejection::new(
                ReasonCode::RetentionTooLong,
                "retention window runs past the representable time range",
            )
        })?,
    };

    Ok(DialogueCommit {
        commit_id,
        timestamp_ms,
        content_hash,
        participant_ids,
        context_ref,
        retention_window_hours,
        expiry_timestamp_ms,
    })
}

fn decode_state_transition(obj: &Map<String, Value>) -> Result<StateTransitionCommit, Rejection> {
    Ok(StateTransitionCommit {
        commit_id: CommitId(req_str(obj, "commit_id")?),
        timestamp_ms: req_i64(obj, "timestamp_ms")?,
        object_id: ObjectId(req_str(obj, "object_id")?),
        object_type: req_str(obj, "object_type")?,
        from_state: req_state(obj, "from_state")?,
        to_state: req_state(obj, "to_state")?,
        authority_ref: opt_str(obj, "authority_ref")?,
        evidence_refs: opt_str_list(obj, "evidence_refs")?,
        reason: opt_str(obj, "reason")?.unwrap_or_default(),
        signature: opt_str(obj, "signature")?,
    })
}

fn decode_grant(obj: &Map<String, Value>) -> Result<AuthorityGrantCommit, Rejection> {
    Ok(AuthorityGrantCommit {
        commit_id: CommitId(req_str(obj, "commit_id")?),
        timestamp_ms: req_i64(obj, "timestamp_ms")?,
        grant_id: GrantId(req_str(obj, "grant_id")?),
        scope: req_str(obj, "scope")?,
        capabilities: req_str_list(obj, "capabilities")?,
        grantee_id: req_str(obj, "grantee_id")?,
        grantor_authority_ref: req_str(obj, "grantor_authority_ref")?,
        evidence_refs: opt_str_list(obj, "evidence_refs")?,
        effective_from_ms: req_i64(obj, "effective_from_ms")?,
        expires_at_ms: opt_i64(obj, "expires_at_ms")?,
        signature: req_str(obj, "signature")?,
    })
}

fn decode_revoke(obj: &Map<String, Value>) -> Result<AuthorityRevokeCommit, Rejection> {
    Ok(AuthorityRevokeCommit {
        commit_id: CommitId(req_str(obj, "commit_id")?),
        timestamp_ms: req_i64(obj, "timestamp_ms")?,
        grant_commit_id: CommitId(req_str(obj, "grant_commit_id")?),
        reason: req_str(obj, "reason")?,
        revoked_by_authority_ref: req_str(obj, "revoked_by_authority_ref")?,
        signature: req_str(obj, "signature")?,
    })
}

fn decode_generic(obj: &Map<String, Value>, commit_type: String) -> Result<GenericCommit, Rejection> {
    let commit_id = CommitId(req_str(obj, "commit_id")?);
    let timestamp_ms = opt_i64(obj, "timestamp_ms")?;
    let authority_ref = opt_str(obj, "authority_ref")?;
    let payload = obj
        .iter()
        .filter(|(k, _)| {
            !matches!(
                k.as_str(),
                "type" | "commit_id" | "timestamp_ms" | "authority_ref"
            )
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(GenericCommit {
        commit_id,
        commit_type,
        timestamp_ms,
        authority_ref,
        payload,
    })
}

// ── field helpers ──────────────────────────────────────────────────

fn req_str(obj: &Map<String, Value>, field: &str) -> Result<String, Rejection> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(Rejection::missing_field(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(Rejection::missing_field(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Rejection::invalid_type(field, "a string")),
    }
}

fn opt_str(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, Rejection> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Rejection::invalid_type(field, "a string")),
    }
}

fn req_i64(obj: &Map<String, Value>, field: &str) -> Result<i64, Rejection> {
    opt_i64(obj, field)?.ok_or_else(|| Rejection::missing_field(field))
}

fn opt_i64(obj: &Map<String, Value>, field: &str) -> Result<Option<i64>, Rejection> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| Rejection::invalid_type(field, "an integer")),
    }
}

fn req_str_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, Rejection> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(Rejection::missing_field(field)),
        Some(_) => opt_str_list(obj, field),
    }
}

fn opt_str_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, Rejection> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Rejection::invalid_type(field, "an array of strings"))
            })
            .collect(),
        Some(_) => Err(Rejection::invalid_type(field, "an array of strings")),
    }
}

fn req_state(obj: &Map<String, Value>, field: &str) -> Result<ObjectState, Rejection> {
    let raw = req_str(obj, field)?;
    raw.parse()
        .map_err(|e: String| Rejection::new(ReasonCode::InvalidTransition, format!("{field}: {e}")))
}

fn retention_hours(obj: &Map<String, Value>) -> Result<u32, Rejection> {
    let hours = req_i64(obj, "retention_window_hours")?;
    if hours < 0 {
        return Err(Rejection::new(
            ReasonCode::RetentionTooShort,
            format!("retention window of {hours}h is negative"),
        ));
    }
    u32::try_from(hours).map_err(|_| {
        Rejection::new(
            ReasonCode::RetentionTooLong,
            format!("retention window of {hours}h is out of range"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_types::HOUR_MS;
    use serde_json::json;

    fn dialogue_json() -> Value {
        json!({
            "type": "DIALOGUE",
            "commit_id": "d-1",
            "timestamp_ms": 1_000,
            "content_hash": "abc123",
            "participant_ids": ["alice", "bob"],
            "context_ref": "thread-1",
            "retention_window_hours": 24
        })
    }

    #[test]
    fn decodes_dialogue_and_derives_expiry() {
        let commit = decode_commit(&dialogue_json()).unwrap();
        match commit {
            Commit::Dialogue(d) => {
                assert_eq!(d.participant_ids.len(), 2);
                assert_eq!(d.expiry_timestamp_ms, 1_000 + 24 * HOUR_MS);
            }
            other => panic!("expected dialogue, got {other:?}"),
        }
    }

    #[test]
    fn dialogue_expiry_overflow_is_rejected() {
        let mut raw = dialogue_json();
        raw["timestamp_ms"] = json!(i64::MAX);
        raw["retention_window_hours"] = json!(1);
        let err = decode_commit(&raw).unwrap_err();
        assert_eq!(err.code, ReasonCode::RetentionTooLong);
    }

    #[test]
    fn missing_type_is_missing_field() {
        let err = decode_commit(&json!({"commit_id": "x"})).unwrap_err();
        assert_eq!(err.code, ReasonCode::MissingField);
    }

    #[test]
    fn non_object_is_invalid_type() {
        let err = decode_commit(&json!(["DIALOGUE"])).unwrap_err();
        assert_eq!(err.code, ReasonCode::InvalidType);
    }

    #[test]
    fn dialogue_missing_context_is_missing_field() {
        let mut raw = dialogue_json();
        raw.as_object_mut().unwrap().remove("context_ref");
        let err = decode_commit(&raw).unwrap_err();
        assert_eq!(err.code, ReasonCode::MissingField);
        assert!(err.message.contains("context_ref"));
    }

    #[test]
    fn dialogue_with_mutation_field_is_forbidden() {
        for field in FORBIDDEN_DIALOGUE_FIELDS {
            let mut raw = dialogue_json();
            raw.as_object_mut()
                .unwrap()
                .insert(field.to_string(), json!({"anything": true}));
            let err = decode_commit(&raw).unwrap_err();
            assert_eq!(err.code, ReasonCode::ForbiddenField, "field {field}");
        }
    }

    #[test]
    fn wrong_kind_is_invalid_type() {
        let mut raw = dialogue_json();
        raw["timestamp_ms"] = json!("yesterday");
        assert_eq!(
            decode_commit(&raw).unwrap_err().code,
            ReasonCode::InvalidType
        );
    }

    #[test]
    fn negative_retention_is_too_short() {
        let mut raw = dialogue_json();
        raw["retention_window_hours"] = json!(-3);
        assert_eq!(
            decode_commit(&raw).unwrap_err().code,
            ReasonCode::RetentionTooShort
        );
    }

    #[test]
    fn unknown_state_is_invalid_transition() {
        let raw = json!({
            "type": "STATE_TRANSITION",
            "commit_id": "t-1",
            "timestamp_ms": 1,
            "object_id": "po-1",
            "object_type": "PURCHASE_ORDER",
            "from_state": "DRAFT",
            "to_state": "ARCHIVED"
        });
        assert_eq!(
            decode_commit(&raw).unwrap_err().code,
            ReasonCode::InvalidTransition
        );
    }

    #[test]
    fn grant_requires_capabilities_field() {
        let raw = json!({
            "type": "AUTHORITY_GRANT",
            "commit_id": "g-1",
            "timestamp_ms": 1,
            "grant_id": "grant-1",
            "scope": "site.a",
            "grantee_id": "user:bob",
            "grantor_authority_ref": "user:root",
            "effective_from_ms": 1,
            "signature": "sig"
        });
        let err = decode_commit(&raw).unwrap_err();
        assert_eq!(err.code, ReasonCode::MissingField);
        assert!(err.message.contains("capabilities"));
    }

    #[test]
    fn unknown_type_decodes_to_generic() {
        let raw = json!({
            "type": "BUDGET_UPDATE",
            "commit_id": "b-1",
            "timestamp_ms": 9,
            "authority_ref": "user:treasurer",
            "amount": 120
        });
        match decode_commit(&raw).unwrap() {
            Commit::Other(g) => {
                assert_eq!(g.commit_type, "BUDGET_UPDATE");
                assert_eq!(g.timestamp_ms, Some(9));
                assert_eq!(g.payload["amount"], 120);
                assert!(!g.payload.contains_key("type"));
            }
            other => panic!("expected generic, got {other:?}"),
        }
    }

    #[test]
    fn encode_then_decode_preserves_transition() {
        let raw = json!({
            "type": "STATE_TRANSITION",
            "commit_id": "t-2",
            "timestamp_ms": 77,
            "object_id": "po-1",
            "object_type": "PURCHASE_ORDER",
            "from_state": "PROPOSE",
            "to_state": "COMMIT",
            "authority_ref": "user:bob",
            "evidence_refs": ["ev1"],
            "reason": "approved at meeting",
            "signature": "sig"
        });
        let commit = decode_commit(&raw).unwrap();
        assert_eq!(decode_commit(&encode_commit(&commit)).unwrap(), commit);
    }

    proptest::proptest! {
        #[test]
        fn unknown_type_tags_decode_as_generic(tag in "[A-Z][A-Z_]{0,20}") {
            proptest::prop_assume!(
                !matches!(tag.as_str(), "DIALOGUE" | "STATE_TRANSITION" | "AUTHORITY_GRANT" | "AUTHORITY_REVOKE")
            );
            let commit = decode_commit(&json!({"type": tag, "commit_id": "c-1"})).unwrap();
            proptest::prop_assert!(matches!(commit, Commit::Other(_)));
        }
    }
}

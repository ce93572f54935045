//! Commit records.
//!
//! Commits are immutable and append-only. A later commit (e.g. a revoke)
//! may negate the effect of an earlier one but never edits it. Each commit
//! type is its own struct carrying only its own fields; [`Commit`] is the
//! tagged union over them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::ids::{CommitId, GrantId, ObjectId};
use crate::state::ObjectState;

pub const HOUR_MS: i64 = 60 * 60 * 1000;

/// Fields whose presence on a dialogue commit is an automatic failure.
pub const FORBIDDEN_DIALOGUE_FIELDS: [&str; 5] = [
    "state_change",
    "object_mutation",
    "value_set",
    "policy_change",
    "authority_grant",
];

/// The `type` tag of a commit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommitType {
    Dialogue,
    StateTransition,
    AuthorityGrant,
    AuthorityRevoke,
    Other(String),
}

impl CommitType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "DIALOGUE" => CommitType::Dialogue,
            "STATE_TRANSITION" => CommitType::StateTransition,
            "AUTHORITY_GRANT" => CommitType::AuthorityGrant,
            "AUTHORITY_REVOKE" => CommitType::AuthorityRevoke,
            other => CommitType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommitType::Dialogue => "DIALOGUE",
            CommitType::StateTransition => "STATE_TRANSITION",
            CommitType::AuthorityGrant => "AUTHORITY_GRANT",
            CommitType::AuthorityRevoke => "AUTHORITY_REVOKE",
            CommitType::Other(name) => name,
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End of a retention window, or `None` if it does not fit in an `i64`.
pub fn retention_expiry_ms(timestamp_ms: i64, retention_window_hours: u32) -> Option<i64> {
    i64::from(retention_window_hours)
        .checked_mul(HOUR_MS)
        .and_then(|window| timestamp_ms.checked_add(window))
}

/// Ephemeral coordination traffic. Stores a hash of the content, never the
/// content itself, and cannot carry a mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueCommit {
    pub commit_id: CommitId,
    pub timestamp_ms: i64,
    pub content_hash: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    pub context_ref: String,
    pub retention_window_hours: u32,
    pub expiry_timestamp_ms: i64,
}

impl DialogueCommit {
    /// Build a dialogue commit from raw content. Only the BLAKE3 hash of
    /// `content` is kept.
    pub fn from_content(
        commit_id: CommitId,
        content: &str,
        participant_ids: Vec<String>,
        context_ref: impl Into<String>,
        retention_window_hours: u32,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            commit_id,
            timestamp_ms,
            content_hash: blake3::hash(content.as_bytes()).to_hex().to_string(),
            participant_ids,
            context_ref: context_ref.into(),
            retention_window_hours,
            expiry_timestamp_ms: retention_expiry_ms(timestamp_ms, retention_window_hours)
                .unwrap_or(i64::MAX),
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expiry_timestamp_ms
    }
}

/// One edge traversal in an object's lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionCommit {
    pub commit_id: CommitId,
    pub timestamp_ms: i64,
    pub object_id: ObjectId,
    pub object_type: String,
    pub from_state: ObjectState,
    pub to_state: ObjectState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_ref: Option<String>,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Creates an authority grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityGrantCommit {
    pub commit_id: CommitId,
    pub timestamp_ms: i64,
    pub grant_id: GrantId,
    pub scope: String,
    pub capabilities: Vec<String>,
    pub grantee_id: String,
    pub grantor_authority_ref: String,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    pub effective_from_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    pub signature: String,
}

/// Permanently deactivates the grant created by `grant_commit_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRevokeCommit {
    pub commit_id: CommitId,
    pub timestamp_ms: i64,
    pub grant_commit_id: CommitId,
    pub reason: String,
    pub revoked_by_authority_ref: String,
    pub signature: String,
}

/// A commit of a type this core has no dedicated schema for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericCommit {
    pub commit_id: CommitId,
    pub commit_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_ref: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Tagged union over every commit type.
#[derive(Clone, Debug, PartialEq)]
pub enum Commit {
    Dialogue(DialogueCommit),
    StateTransition(StateTransitionCommit),
    AuthorityGrant(AuthorityGrantCommit),
    AuthorityRevoke(AuthorityRevokeCommit),
    Other(GenericCommit),
}

impl Commit {
    pub fn commit_type(&self) -> CommitType {
        match self {
            Commit::Dialogue(_) => CommitType::Dialogue,
            Commit::StateTransition(_) => CommitType::StateTransition,
            Commit::AuthorityGrant(_) => CommitType::AuthorityGrant,
            Commit::AuthorityRevoke(_) => CommitType::AuthorityRevoke,
            Commit::Other(c) => CommitType::parse(&c.commit_type),
        }
    }

    pub fn commit_id(&self) -> &CommitId {
        match self {
            Commit::Dialogue(c) => &c.commit_id,
            Commit::StateTransition(c) => &c.commit_id,
            Commit::AuthorityGrant(c) => &c.commit_id,
            Commit::AuthorityRevoke(c) => &c.commit_id,
            Commit::Other(c) => &c.commit_id,
        }
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            Commit::Dialogue(c) => Some(c.timestamp_ms),
            Commit::StateTransition(c) => Some(c.timestamp_ms),
            Commit::AuthorityGrant(c) => Some(c.timestamp_ms),
            Commit::AuthorityRevoke(c) => Some(c.timestamp_ms),
            Commit::Other(c) => c.timestamp_ms,
        }
    }

    /// The authority the commit acts under, if it names one.
    pub fn authority_ref(&self) -> Option<&str> {
        let raw = match self {
            Commit::Dialogue(_) => None,
            Commit::StateTransition(c) => c.authority_ref.as_deref(),
            Commit::AuthorityGrant(c) => Some(c.grantor_authority_ref.as_str()),
            Commit::AuthorityRevoke(c) => Some(c.revoked_by_authority_ref.as_str()),
            Commit::Other(c) => c.authority_ref.as_deref(),
        };
        raw.filter(|r| !r.trim().is_empty())
    }

    pub fn is_dialogue(&self) -> bool {
        matches!(self, Commit::Dialogue(_))
    }

    /// Wire form: the variant's fields plus a `type` tag.
    pub fn to_json(&self) -> Value {
        let (tag, body) = match self {
            Commit::Dialogue(c) => ("DIALOGUE", serde_json::to_value(c)),
            Commit::StateTransition(c) => ("STATE_TRANSITION", serde_json::to_value(c)),
            Commit::AuthorityGrant(c) => ("AUTHORITY_GRANT", serde_json::to_value(c)),
            Commit::AuthorityRevoke(c) => ("AUTHORITY_REVOKE", serde_json::to_value(c)),
            Commit::Other(c) => {
                let mut body = c.payload.clone();
                body.insert("commit_id".into(), Value::String(c.commit_id.0.clone()));
                if let Some(ts) = c.timestamp_ms {
                    body.insert("timestamp_ms".into(), Value::from(ts));
                }
                if let Some(ref authority) = c.authority_ref {
                    body.insert("authority_ref".into(), Value::String(authority.clone()));
                }
                (c.commit_type.as_str(), Ok(Value::Object(body)))
            }
        };
        // Plain structs of strings and integers always serialize.
        let mut body = match body {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("type".into(), Value::String(tag.to_string()));
        Value::Object(body)
    }
}

impl Serialize for Commit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue() -> DialogueCommit {
        DialogueCommit::from_content(
            CommitId::new("c-1"),
            "let's meet at noon",
            vec!["alice".into(), "bob".into()],
            "thread-7",
            24,
            1_000,
        )
    }

    #[test]
    fn dialogue_stores_only_hash() {
        let d = dialogue();
        assert_eq!(d.content_hash.len(), 64);
        assert_ne!(d.content_hash, "let's meet at noon");
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("noon"));
    }

    #[test]
    fn dialogue_expiry_follows_retention() {
        let d = dialogue();
        assert_eq!(d.expiry_timestamp_ms, 1_000 + 24 * HOUR_MS);
        assert!(!d.is_expired(1_000));
        assert!(d.is_expired(1_000 + 24 * HOUR_MS));
    }

    #[test]
    fn commit_type_parse_round_trips() {
        for raw in ["DIALOGUE", "STATE_TRANSITION", "AUTHORITY_GRANT", "AUTHORITY_REVOKE"] {
            assert_eq!(CommitType::parse(raw).as_str(), raw);
        }
        assert_eq!(
            CommitType::parse("BUDGET_UPDATE"),
            CommitType::Other("BUDGET_UPDATE".into())
        );
    }

    #[test]
    fn to_json_carries_type_tag() {
        let commit = Commit::Dialogue(dialogue());
        let json = commit.to_json();
        assert_eq!(json["type"], "DIALOGUE");
        assert_eq!(json["commit_id"], "c-1");
        assert_eq!(json["context_ref"], "thread-7");
    }

    #[test]
    fn blank_authority_ref_counts_as_absent() {
        let commit = Commit::Other(GenericCommit {
            commit_id: CommitId::new("g-1"),
            commit_type: "BUDGET_UPDATE".into(),
            timestamp_ms: Some(5),
            authority_ref: Some("  ".into()),
            payload: Map::new(),
        });
        assert!(commit.authority_ref().is_none());
        assert_eq!(commit.to_json()["type"], "BUDGET_UPDATE");
    }

    #[test]
    fn retention_expiry_overflow_is_none() {
        assert_eq!(retention_expiry_ms(1_000, 2), Some(1_000 + 2 * HOUR_MS));
        assert_eq!(retention_expiry_ms(i64::MAX, 1), None);
        assert_eq!(retention_expiry_ms(i64::MAX - HOUR_MS, 1), Some(i64::MAX));
    }
}

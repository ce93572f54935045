use std::collections::btree_map::{BTreeMap, Entry};
use std::sync::Arc;

use civic_commit::{decode_commit, validate_dialogue};
use civic_types::{
    Clock, Commit, CommitId, DialogueCommit, DialoguePolicy, ReasonCode, Rejection,
    ValidationResult,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Dialogue-only transport.
///
/// Holds validated DIALOGUE commits until they expire. Every other commit
/// type is refused with NOT_DIALOGUE, including well-formed
/// STATE_TRANSITIONs: coordination traffic and state change never share
/// a channel. A commit id is held once; a later copy under the same id
/// never replaces the first.
pub struct DialogueChannel {
    policy: DialoguePolicy,
    clock: Arc<dyn Clock>,
    messages: BTreeMap<CommitId, DialogueCommit>,
}

impl DialogueChannel {
    pub fn new(policy: DialoguePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            messages: BTreeMap::new(),
        }
    }

    pub fn accept(&mut self, commit: &Commit) -> ValidationResult {
        let Commit::Dialogue(dialogue) = commit else {
            warn!(
                commit = %commit.commit_id(),
                commit_type = %commit.commit_type(),
                "Non-dialogue commit refused by dialogue channel"
            );
            return ValidationResult::reject(Self::not_dialogue(commit.commit_type().as_str()));
        };

        let result = validate_dialogue(dialogue, &self.policy);
        if !result.valid {
            return result;
        }

        match self.messages.entry(dialogue.commit_id.clone()) {
            Entry::Occupied(_) => {
                debug!(commit = %dialogue.commit_id, "Dialogue already held, keeping first copy");
            }
            Entry::Vacant(slot) => {
                debug!(
                    commit = %dialogue.commit_id,
                    context = %dialogue.context_ref,
                    expires_at = dialogue.expiry_timestamp_ms,
                    "Dialogue accepted"
                );
                slot.insert(dialogue.clone());
            }
        }
        result
    }

    /// Decode and accept. The type tag is checked before decoding so a
    /// non-dialogue commit is refused as such even if it is malformed.
    pub fn accept_raw(&mut self, raw: &Value) -> ValidationResult {
        let commit_type = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        if commit_type != "DIALOGUE" {
            return ValidationResult::reject(Self::not_dialogue(commit_type));
        }
        match decode_commit(raw) {
            Ok(commit) => self.accept(&commit),
            Err(rejection) => ValidationResult::reject(rejection),
        }
    }

    /// Drop every message whose retention window has passed. Returns how
    /// many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.messages.len();
        self.messages.retain(|_, m| !m.is_expired(now));
        let purged = before - self.messages.len();
        if purged > 0 {
            debug!(purged, "Expired dialogue purged");
        }
        purged
    }

    /// Messages still within their retention window.
    pub fn active(&self) -> Vec<&DialogueCommit> {
        let now = self.clock.now_ms();
        self.messages.values().filter(|m| !m.is_expired(now)).collect()
    }

    pub fn get(&self, commit_id: &CommitId) -> Option<&DialogueCommit> {
        self.messages.get(commit_id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn not_dialogue(commit_type: &str) -> Rejection {
        Rejection::new(
            ReasonCode::NotDialogue,
            format!("dialogue channel only carries DIALOGUE commits, got {commit_type:?}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_types::{ManualClock, HOUR_MS};
    use serde_json::json;

    fn channel() -> (DialogueChannel, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        (
            DialogueChannel::new(DialoguePolicy::default(), clock.clone()),
            clock,
        )
    }

    fn message(id: &str, hours: u32) -> Commit {
        Commit::Dialogue(DialogueCommit::from_content(
            CommitId::new(id),
            "shall we table item 4?",
            vec!["alice".into(), "bob".into()],
            "meeting-12",
            hours,
            0,
        ))
    }

    #[test]
    fn accepts_dialogue_until_expiry() {
        let (mut channel, clock) = channel();
        assert!(channel.accept(&message("d-1", 1)).valid);
        assert!(channel.accept(&message("d-2", 48)).valid);
        assert_eq!(channel.active().len(), 2);

        clock.set(2 * HOUR_MS);
        assert_eq!(channel.active().len(), 1);
        assert_eq!(channel.purge_expired(), 1);
        assert!(channel.get(&CommitId::new("d-1")).is_none());
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn resubmitted_id_keeps_first_message() {
        let (mut channel, _) = channel();
        assert!(channel.accept(&message("d-1", 4)).valid);
        let first_hash = channel.get(&CommitId::new("d-1")).unwrap().content_hash.clone();

        let rewritten = Commit::Dialogue(DialogueCommit::from_content(
            CommitId::new("d-1"),
            "never mind, item 4 is approved",
            vec!["alice".into()],
            "meeting-12",
            4,
            0,
        ));
        assert!(channel.accept(&rewritten).valid);
        assert_eq!(channel.len(), 1);
        assert_eq!(channel.get(&CommitId::new("d-1")).unwrap().content_hash, first_hash);
    }

    #[test]
    fn rejects_out_of_range_retention() {
        let (mut channel, _) = channel();
        let result = channel.accept(&message("d-1", 169));
        assert_eq!(result.code(), Some(ReasonCode::RetentionTooLong));
        assert!(channel.is_empty());
    }

    #[test]
    fn refuses_well_formed_state_transition() {
        let (mut channel, _) = channel();
        let raw = json!({
            "type": "STATE_TRANSITION",
            "commit_id": "st-1",
            "timestamp_ms": 0,
            "object_id": "po-1",
            "object_type": "PURCHASE_ORDER",
            "from_state": "DRAFT",
            "to_state": "HOLD",
            "authority_ref": "self:alice",
        });
        assert_eq!(
            channel.accept_raw(&raw).code(),
            Some(ReasonCode::NotDialogue)
        );
        let decoded = decode_commit(&raw).unwrap();
        assert_eq!(channel.accept(&decoded).code(), Some(ReasonCode::NotDialogue));
        assert!(channel.is_empty());
    }

    #[test]
    fn raw_dialogue_with_mutation_field_is_refused() {
        let (mut channel, _) = channel();
        let raw = json!({
            "type": "DIALOGUE",
            "commit_id": "d-9",
            "timestamp_ms": 0,
            "content_hash": "ff00",
            "context_ref": "thread-1",
            "retention_window_hours": 4,
            "value_set": {"budget": 100},
        });
        assert_eq!(
            channel.accept_raw(&raw).code(),
            Some(ReasonCode::ForbiddenField)
        );
    }
}

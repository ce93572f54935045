use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability granted implicitly to every `self:<id>` reference.
pub const SELF_CAPABILITY: &str = "SELF:*:*";

/// An authority reference, as carried on commits.
///
/// `self:<id>` denotes an actor acting on its own private material and
/// never needs a grant. Anything else names a subject whose grants must be
/// discovered; a leading `<prefix>:` (e.g. `user:`) is a namespace hint and
/// is stripped to obtain the subject key, so `user:bob` and `bob` resolve to
/// the same grants.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AuthorityRef {
    SelfActor(String),
    Subject(String),
}

impl AuthorityRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some(("self", id)) => AuthorityRef::SelfActor(id.to_string()),
            Some((_, subject)) if !subject.is_empty() => {
                AuthorityRef::Subject(subject.to_string())
            }
            _ => AuthorityRef::Subject(raw.to_string()),
        }
    }

    /// Key under which grants for this reference are stored.
    pub fn subject_key(&self) -> &str {
        match self {
            AuthorityRef::SelfActor(id) | AuthorityRef::Subject(id) => id,
        }
    }

    pub fn is_self(&self) -> bool {
        matches!(self, AuthorityRef::SelfActor(_))
    }
}

impl fmt::Display for AuthorityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityRef::SelfActor(id) => write!(f, "self:{id}"),
            AuthorityRef::Subject(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_refs_are_recognised() {
        let r = AuthorityRef::parse("self:alice");
        assert!(r.is_self());
        assert_eq!(r.subject_key(), "alice");
        assert_eq!(r.to_string(), "self:alice");
    }

    #[test]
    fn subject_prefix_is_stripped() {
        assert_eq!(AuthorityRef::parse("user:bob").subject_key(), "bob");
        assert_eq!(AuthorityRef::parse("bob").subject_key(), "bob");
        assert_eq!(
            AuthorityRef::parse("user:bob"),
            AuthorityRef::parse("authority:bob")
        );
    }

    #[test]
    fn dangling_prefix_keeps_whole_ref() {
        assert_eq!(AuthorityRef::parse("user:").subject_key(), "user:");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of a governed object.
///
/// ```text
/// DRAFT   -> HOLD | PROPOSE
/// HOLD    -> PROPOSE | DRAFT
/// PROPOSE -> COMMIT | HOLD | DRAFT
/// COMMIT  -> REVERT
/// REVERT  -> (terminal)
/// ```
///
/// REVERT is terminal: a reverted object is never edited again, a new
/// object is created instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectState {
    Draft,
    Hold,
    Propose,
    Commit,
    Revert,
}

impl ObjectState {
    pub const ALL: [ObjectState; 5] = [
        ObjectState::Draft,
        ObjectState::Hold,
        ObjectState::Propose,
        ObjectState::Commit,
        ObjectState::Revert,
    ];

    /// Declared outgoing edges.
    pub fn next_states(&self) -> &'static [ObjectState] {
        match self {
            ObjectState::Draft => &[ObjectState::Hold, ObjectState::Propose],
            ObjectState::Hold => &[ObjectState::Propose, ObjectState::Draft],
            ObjectState::Propose => &[ObjectState::Commit, ObjectState::Hold, ObjectState::Draft],
            ObjectState::Commit => &[ObjectState::Revert],
            ObjectState::Revert => &[],
        }
    }

    pub fn can_transition_to(&self, to: ObjectState) -> bool {
        self.next_states().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    /// Entering this state requires a signature on the transition commit.
    pub fn requires_signature(&self) -> bool {
        matches!(self, ObjectState::Commit | ObjectState::Revert)
    }

    /// Entering this state requires at least one evidence reference.
    pub fn requires_evidence(&self) -> bool {
        matches!(self, ObjectState::Commit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectState::Draft => "DRAFT",
            ObjectState::Hold => "HOLD",
            ObjectState::Propose => "PROPOSE",
            ObjectState::Commit => "COMMIT",
            ObjectState::Revert => "REVERT",
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown object state {s:?}"))
    }
}

//! Capability tokens.
//!
//! A capability is a three-part `ACTION:OBJECT_TYPE:OPERATION` string at
//! the boundary. Internally it is parsed once into a [`CapabilityToken`]
//! whose positions are either a concrete name or the whole-segment
//! wildcard `*`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One position of a capability token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Any,
    Exact(String),
}

impl Segment {
    fn parse(raw: &str, position: &'static str) -> Result<Self, TokenError> {
        if raw == "*" {
            return Ok(Segment::Any);
        }
        if raw.is_empty() {
            return Err(TokenError::EmptySegment(position));
        }
        if let Some(c) = raw
            .chars()
            .find(|c| matches!(c, '*' | ':') || c.is_whitespace())
        {
            return Err(TokenError::InvalidCharacter {
                position,
                character: c,
            });
        }
        Ok(Segment::Exact(raw.to_string()))
    }

    /// Does this granted position cover the required position?
    pub fn covers(&self, required: &Segment) -> bool {
        match self {
            Segment::Any => true,
            Segment::Exact(_) => self == required,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Any)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Any => f.write_str("*"),
            Segment::Exact(s) => f.write_str(s),
        }
    }
}

/// Errors from parsing a capability token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("capability must have exactly 3 colon-separated parts, found {0}")]
    WrongArity(usize),

    #[error("capability {0} segment is empty")]
    EmptySegment(&'static str),

    #[error("capability {position} segment contains invalid character {character:?}")]
    InvalidCharacter {
        position: &'static str,
        character: char,
    },
}

/// A parsed `ACTION:OBJECT_TYPE:OPERATION` capability.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityToken {
    pub action: Segment,
    pub object: Segment,
    pub operation: Segment,
}

impl CapabilityToken {
    pub fn new(action: &str, object: &str, operation: &str) -> Result<Self, TokenError> {
        Ok(Self {
            action: Segment::parse(action, "action")?,
            object: Segment::parse(object, "object")?,
            operation: Segment::parse(operation, "operation")?,
        })
    }

    /// `*:*:*`, every capability.
    pub fn universal() -> Self {
        Self {
            action: Segment::Any,
            object: Segment::Any,
            operation: Segment::Any,
        }
    }

    /// `SELF:*:*`, held implicitly by every `self:<id>` reference.
    pub fn self_actor() -> Self {
        Self {
            action: Segment::Exact("SELF".to_string()),
            object: Segment::Any,
            operation: Segment::Any,
        }
    }

    /// The capability a state transition into `to_state` requires.
    pub fn state_transition(object_type: &str, to_state: &str) -> Result<Self, TokenError> {
        Self::new("STATE_TRANSITION", object_type, to_state)
    }

    /// Is `raw` a well-formed capability token?
    pub fn is_well_formed(raw: &str) -> bool {
        raw.parse::<CapabilityToken>().is_ok()
    }
}

impl FromStr for CapabilityToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(TokenError::WrongArity(parts.len()));
        }
        Self::new(parts[0], parts[1], parts[2])
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.action, self.object, self.operation)
    }
}

impl Serialize for CapabilityToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CapabilityToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_concrete_token() {
        let t: CapabilityToken = "STATE_TRANSITION:PURCHASE_ORDER:APPROVE".parse().unwrap();
        assert_eq!(t.action, Segment::Exact("STATE_TRANSITION".into()));
        assert_eq!(t.object, Segment::Exact("PURCHASE_ORDER".into()));
        assert_eq!(t.operation, Segment::Exact("APPROVE".into()));
        assert_eq!(t.to_string(), "STATE_TRANSITION:PURCHASE_ORDER:APPROVE");
    }

    #[test]
    fn parses_wildcards_per_position() {
        let t: CapabilityToken = "STATE_TRANSITION:*:COMMIT".parse().unwrap();
        assert!(t.object.is_wildcard());
        assert!(!t.action.is_wildcard());
        assert_eq!("*:*:*".parse::<CapabilityToken>().unwrap(), CapabilityToken::universal());
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(
            "A:B".parse::<CapabilityToken>(),
            Err(TokenError::WrongArity(2))
        );
        assert_eq!(
            "A:B:C:D".parse::<CapabilityToken>(),
            Err(TokenError::WrongArity(4))
        );
        assert_eq!(
            "A::C".parse::<CapabilityToken>(),
            Err(TokenError::EmptySegment("object"))
        );
        assert!("STATE*:B:C".parse::<CapabilityToken>().is_err());
        assert!("A:B C:D".parse::<CapabilityToken>().is_err());
    }

    #[test]
    fn separator_inside_a_segment_is_rejected() {
        assert_eq!(
            CapabilityToken::new("A:B", "C", "D"),
            Err(TokenError::InvalidCharacter {
                position: "action",
                character: ':',
            })
        );
        assert!(CapabilityToken::state_transition("PO", "COMMIT:EXTRA").is_err());
        let ok = CapabilityToken::new("A", "B", "C").unwrap();
        assert_eq!(ok.to_string().parse::<CapabilityToken>().unwrap(), ok);
    }

    #[test]
    fn serde_uses_string_form() {
        let t: CapabilityToken = "SELF:*:*".parse().unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"SELF:*:*\"");
        let back: CapabilityToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<CapabilityToken>("\"bad\"").is_err());
    }
}

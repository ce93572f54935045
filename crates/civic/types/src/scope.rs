//! Dotted hierarchical scope paths (`site.a.room1`, `site.*`, `*`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeSegment {
    Any,
    Exact(String),
}

impl fmt::Display for ScopeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSegment::Any => f.write_str("*"),
            ScopeSegment::Exact(s) => f.write_str(s),
        }
    }
}

/// A parsed scope path. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopePath {
    segments: Vec<ScopeSegment>,
}

impl ScopePath {
    /// The root scope `*`.
    pub fn root() -> Self {
        Self {
            segments: vec![ScopeSegment::Any],
        }
    }

    pub fn segments(&self) -> &[ScopeSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.segments.first() == Some(&ScopeSegment::Any)
    }
}

impl FromStr for ScopePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("scope is empty".into());
        }
        let segments = s
            .split('.')
            .map(|seg| match seg {
                "*" => Ok(ScopeSegment::Any),
                "" => Err(format!("scope {s:?} has an empty segment")),
                other if other.contains('*') || other.contains(char::is_whitespace) => {
                    Err(format!("scope segment {other:?} is not a valid name"))
                }
                other => Ok(ScopeSegment::Exact(other.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&joined)
    }
}

impl Serialize for ScopePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

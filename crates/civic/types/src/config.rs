//! Tunable governance policy.
//!
//! Defaults encode the platform's constitutional limits; deployments may
//! tighten them through configuration.

use serde::{Deserialize, Serialize};

/// Top-level policy shared by validators, the resolver and the calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernancePolicy {
    #[serde(default)]
    pub grants: GrantPolicy,

    #[serde(default)]
    pub dialogue: DialoguePolicy,

    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

/// Limits applied to authority grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantPolicy {
    /// How far in the future `effective_from_ms` may lie
    #[serde(default = "default_max_future_skew_ms")]
    pub max_future_skew_ms: i64,
}

impl Default for GrantPolicy {
    fn default() -> Self {
        Self {
            max_future_skew_ms: default_max_future_skew_ms(),
        }
    }
}

/// Retention bounds for dialogue commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialoguePolicy {
    #[serde(default = "default_min_retention_hours")]
    pub min_retention_hours: u32,

    #[serde(default = "default_max_retention_hours")]
    pub max_retention_hours: u32,
}

impl Default for DialoguePolicy {
    fn default() -> Self {
        Self {
            min_retention_hours: default_min_retention_hours(),
            max_retention_hours: default_max_retention_hours(),
        }
    }
}

/// Thresholds for the confidence / indeterminate calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    /// Minimum confidence for VERIFIED (with no missing inputs)
    #[serde(default = "default_verified_threshold")]
    pub verified_threshold: f64,

    /// Minimum confidence for DEGRADED
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: f64,

    /// Time constant of the exponential staleness decay
    #[serde(default = "default_staleness_horizon_hours")]
    pub staleness_horizon_hours: f64,

    /// Lowest multiplier staleness can push confidence to
    #[serde(default = "default_staleness_floor")]
    pub staleness_floor: f64,

    /// Multiplier applied when input validation failed
    #[serde(default = "default_validation_penalty")]
    pub validation_penalty: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            verified_threshold: default_verified_threshold(),
            degraded_threshold: default_degraded_threshold(),
            staleness_horizon_hours: default_staleness_horizon_hours(),
            staleness_floor: default_staleness_floor(),
            validation_penalty: default_validation_penalty(),
        }
    }
}

fn default_max_future_skew_ms() -> i64 {
    24 * 60 * 60 * 1000
}

fn default_min_retention_hours() -> u32 {
    1
}

fn default_max_retention_hours() -> u32 {
    168
}

fn default_verified_threshold() -> f64 {
    0.8
}

fn default_degraded_threshold() -> f64 {
    0.5
}

fn default_staleness_horizon_hours() -> f64 {
    168.0
}

fn default_staleness_floor() -> f64 {
    0.7
}

fn default_validation_penalty() -> f64 {
    0.5
}

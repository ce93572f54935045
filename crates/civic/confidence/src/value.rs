use std::collections::BTreeSet;
use std::fmt;

use civic_types::Rejection;
use serde::{Deserialize, Serialize};

/// How far a derived value can be trusted.
///
/// Ordered weakest first, so `min` over states is the weakest link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueState {
    Indeterminate,
    Degraded,
    Verified,
}

impl ValueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueState::Indeterminate => "INDETERMINATE",
            ValueState::Degraded => "DEGRADED",
            ValueState::Verified => "VERIFIED",
        }
    }
}

impl fmt::Display for ValueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to a confidence computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInputs {
    /// Names of the inputs the method needs
    pub required_inputs: Vec<String>,
    /// Names of the inputs actually available
    pub present_inputs: Vec<String>,
    /// Age of the freshest input, in hours
    pub data_age_hours: f64,
    /// Multiplier for how trustworthy the source is, `[0, 1]`
    pub source_reliability: f64,
    pub validation_passed: bool,
    pub conflicting_evidence: bool,
}

impl ConfidenceInputs {
    /// Fully present, fresh, reliable and validated.
    pub fn complete(required: &[&str]) -> Self {
        let names: Vec<String> = required.iter().map(|s| s.to_string()).collect();
        Self {
            required_inputs: names.clone(),
            present_inputs: names,
            data_age_hours: 0.0,
            source_reliability: 1.0,
            validation_passed: true,
            conflicting_evidence: false,
        }
    }

    /// Required inputs that are not present, in declaration order.
    pub fn missing_inputs(&self) -> Vec<String> {
        self.required_inputs
            .iter()
            .filter(|r| !self.present_inputs.contains(r))
            .cloned()
            .collect()
    }

    /// Fraction of required inputs that are present; 1.0 if none are
    /// required.
    pub fn completeness(&self) -> f64 {
        if self.required_inputs.is_empty() {
            return 1.0;
        }
        let present = self.required_inputs.len() - self.missing_inputs().len();
        present as f64 / self.required_inputs.len() as f64
    }
}

/// A derived value together with how much it can be trusted.
///
/// Always recomputable from its inputs; never authoritative on its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateAwareValue<T> {
    pub value: T,
    pub confidence: f64,
    pub state: ValueState,
    pub missing_inputs: Vec<String>,
    /// Indeterminate for lack of data rather than because of conflicts
    pub insufficient_data: bool,
    pub conflicting_evidence: bool,
    /// How the value was computed
    pub method: String,
    /// Policy under which it was computed
    pub policy_ref: String,
    pub computed_at_ms: i64,
}

impl<T> StateAwareValue<T> {
    pub fn is_verified(&self) -> bool {
        self.state == ValueState::Verified
    }

    pub fn is_indeterminate(&self) -> bool {
        self.state == ValueState::Indeterminate
    }
}

/// Result of asking whether a value may be acted upon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCheck {
    pub allowed: bool,
    pub reason: Option<Rejection>,
}

/// Weakest-link summary of several values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    pub state: ValueState,
    pub confidence: f64,
    pub missing_inputs: BTreeSet<String>,
    pub conflicting_evidence: bool,
    pub insufficient_data: bool,
    pub count: usize,
}

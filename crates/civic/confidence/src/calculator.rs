use std::collections::BTreeSet;
use std::sync::Arc;

use civic_types::{Clock, ConfidencePolicy, ReasonCode, Rejection, SystemClock};
use tracing::debug;

use crate::value::{ActionCheck, AggregateState, ConfidenceInputs, StateAwareValue, ValueState};

/// Confidence calculator bound to a policy and a clock.
///
/// The free functions in this module use [`ConfidencePolicy::default`].
pub struct ConfidenceCalculator {
    policy: ConfidencePolicy,
    clock: Arc<dyn Clock>,
}

impl ConfidenceCalculator {
    pub fn new(policy: ConfidencePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    /// Completeness x staleness x reliability, halved on failed
    /// validation, clamped to `[0, 1]`.
    pub fn calculate_confidence(&self, inputs: &ConfidenceInputs) -> f64 {
        let p = &self.policy;
        let age = if inputs.data_age_hours.is_finite() {
            inputs.data_age_hours.max(0.0)
        } else {
            f64::INFINITY
        };
        let decay = (-age / p.staleness_horizon_hours).exp();
        let staleness = p.staleness_floor + (1.0 - p.staleness_floor) * decay;
        let reliability = inputs.source_reliability.clamp(0.0, 1.0);
        let penalty = if inputs.validation_passed {
            1.0
        } else {
            p.validation_penalty
        };

        clamp_unit(inputs.completeness() * staleness * reliability * penalty)
    }

    /// Conflicts always mean INDETERMINATE. Otherwise VERIFIED needs the
    /// verified threshold and no missing inputs, DEGRADED needs the
    /// degraded threshold, and anything else is INDETERMINATE.
    pub fn determine_state(
        &self,
        confidence: f64,
        missing_inputs: &[String],
        conflicting_evidence: bool,
    ) -> ValueState {
        if conflicting_evidence {
            return ValueState::Indeterminate;
        }
        if confidence >= self.policy.verified_threshold && missing_inputs.is_empty() {
            ValueState::Verified
        } else if confidence >= self.policy.degraded_threshold {
            ValueState::Degraded
        } else {
            ValueState::Indeterminate
        }
    }

    pub fn create_state_aware_value<T>(
        &self,
        value: T,
        inputs: &ConfidenceInputs,
        method: impl Into<String>,
        policy_ref: impl Into<String>,
    ) -> StateAwareValue<T> {
        build_value(
            self,
            value,
            inputs,
            method.into(),
            policy_ref.into(),
            self.clock.now_ms(),
        )
    }

    pub fn can_use_for_action<T>(&self, value: &StateAwareValue<T>, min_confidence: f64) -> ActionCheck {
        can_use_for_action(value, min_confidence)
    }

    pub fn aggregate_states<T>(&self, values: &[StateAwareValue<T>]) -> AggregateState {
        aggregate_states(values)
    }
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self::new(ConfidencePolicy::default(), Arc::new(SystemClock))
    }
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

fn build_value<T>(
    calc: &ConfidenceCalculator,
    value: T,
    inputs: &ConfidenceInputs,
    method: String,
    policy_ref: String,
    computed_at_ms: i64,
) -> StateAwareValue<T> {
    let confidence = calc.calculate_confidence(inputs);
    let missing_inputs = inputs.missing_inputs();
    let state = calc.determine_state(confidence, &missing_inputs, inputs.conflicting_evidence);
    let insufficient_data = state == ValueState::Indeterminate && !inputs.conflicting_evidence;

    debug!(
        method = %method,
        confidence,
        state = %state,
        missing = missing_inputs.len(),
        "Derived value computed"
    );

    StateAwareValue {
        value,
        confidence,
        state,
        missing_inputs,
        insufficient_data,
        conflicting_evidence: inputs.conflicting_evidence,
        method,
        policy_ref,
        computed_at_ms,
    }
}

/// [`ConfidenceCalculator::calculate_confidence`] under the default policy.
pub fn calculate_confidence(inputs: &ConfidenceInputs) -> f64 {
    ConfidenceCalculator::default().calculate_confidence(inputs)
}

/// [`ConfidenceCalculator::determine_state`] under the default policy.
pub fn determine_state(
    confidence: f64,
    missing_inputs: &[String],
    conflicting_evidence: bool,
) -> ValueState {
    ConfidenceCalculator::default().determine_state(confidence, missing_inputs, conflicting_evidence)
}

/// Wrap `value` under the default policy, stamped `computed_at_ms`.
pub fn create_state_aware_value<T>(
    value: T,
    inputs: &ConfidenceInputs,
    method: impl Into<String>,
    policy_ref: impl Into<String>,
    computed_at_ms: i64,
) -> StateAwareValue<T> {
    build_value(
        &ConfidenceCalculator::default(),
        value,
        inputs,
        method.into(),
        policy_ref.into(),
        computed_at_ms,
    )
}

/// May `value` be acted upon?
///
/// Three independent vetoes: an INDETERMINATE state, confidence below
/// `min_confidence`, and conflicting evidence.
pub fn can_use_for_action<T>(value: &StateAwareValue<T>, min_confidence: f64) -> ActionCheck {
    let veto = if value.state == ValueState::Indeterminate {
        Some(Rejection::new(
            ReasonCode::ValueIndeterminate,
            format!("value from {} is indeterminate", value.method),
        ))
    } else if value.confidence.is_nan() || value.confidence < min_confidence {
        Some(Rejection::new(
            ReasonCode::ConfidenceBelowThreshold,
            format!(
                "confidence {:.3} is below the required {min_confidence:.3}",
                value.confidence
            ),
        ))
    } else if value.conflicting_evidence {
        Some(Rejection::new(
            ReasonCode::ConflictingEvidence,
            format!("value from {} rests on conflicting evidence", value.method),
        ))
    } else {
        None
    };

    ActionCheck {
        allowed: veto.is_none(),
        reason: veto,
    }
}

/// Weakest state, minimum confidence, union of missing inputs.
/// Zero values aggregate to INDETERMINATE at confidence 0.
pub fn aggregate_states<T>(values: &[StateAwareValue<T>]) -> AggregateState {
    if values.is_empty() {
        return AggregateState {
            state: ValueState::Indeterminate,
            confidence: 0.0,
            missing_inputs: BTreeSet::new(),
            conflicting_evidence: false,
            insufficient_data: true,
            count: 0,
        };
    }

    let mut aggregate = AggregateState {
        state: ValueState::Verified,
        confidence: 1.0,
        missing_inputs: BTreeSet::new(),
        conflicting_evidence: false,
        insufficient_data: false,
        count: values.len(),
    };
    for v in values {
        aggregate.state = aggregate.state.min(v.state);
        aggregate.confidence = aggregate.confidence.min(clamp_unit(v.confidence));
        aggregate.missing_inputs.extend(v.missing_inputs.iter().cloned());
        aggregate.conflicting_evidence |= v.conflicting_evidence;
        aggregate.insufficient_data |= v.insufficient_data;
    }
    aggregate
}

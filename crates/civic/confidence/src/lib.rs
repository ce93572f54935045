//! Confidence / Indeterminate Calculator.
//!
//! Derived values are wrapped in a [`StateAwareValue`] recording how much
//! they can be trusted: a confidence in `[0, 1]`, a [`ValueState`], the
//! inputs that were missing, and whether evidence conflicted. Consumers
//! ask [`can_use_for_action`] before acting; an INDETERMINATE value always
//! blocks, and nothing substitutes a default for it.
//!
//! Aggregation is weakest-link: one poisoned input poisons the aggregate.

#![deny(unsafe_code)]

pub mod calculator;
pub mod value;

pub use calculator::{
    aggregate_states, calculate_confidence, can_use_for_action, create_state_aware_value,
    determine_state, ConfidenceCalculator,
};
pub use value::{ActionCheck, AggregateState, ConfidenceInputs, StateAwareValue, ValueState};

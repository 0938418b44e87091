//! Stream alert conditions and their background evaluation
//!
//! A condition is built from a kind tag and a parameter map, evaluated
//! against the [`Searches`](crate::search::Searches) port, and scheduled by
//! the [`AlertChecker`], which applies the grace period and forwards
//! surfaced alerts over a channel.

pub mod checker;
pub mod condition;
pub mod factory;
pub mod field_value;
pub mod grace;
pub mod message_count;
pub mod params;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{
    Alert, AlertChecker, AlertState, CheckerConfig, CheckerError, ConditionStatus, Evaluation,
};
pub use condition::{
    format_decimal, AlertCondition, CheckError, CheckResult, ConditionBase, ConditionError,
    ConditionType,
};
pub use factory::{create_condition, ConditionSpec};
pub use field_value::{CheckType, FieldValueCondition, MatchType};
pub use grace::in_grace;
pub use message_count::{MessageCountCondition, ThresholdType};
pub use params::{ParameterError, Parameters};

//! Construction of conditions from their persisted form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::condition::{AlertCondition, ConditionError, ConditionType};
use super::field_value::FieldValueCondition;
use super::message_count::MessageCountCondition;
use super::params::Parameters;

/// Stored or operator-supplied definition of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub stream_id: String,
    #[serde(default = "default_creator")]
    pub creator_user_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub parameters: Parameters,
}

fn default_creator() -> String {
    "admin".to_string()
}

impl ConditionType {
    /// Instantiate a condition of this kind, validating its parameters
    pub fn build(
        &self,
        stream_id: impl Into<String>,
        id: Option<String>,
        created_at: DateTime<Utc>,
        creator_user_id: impl Into<String>,
        parameters: Parameters,
    ) -> Result<Box<dyn AlertCondition>, ConditionError> {
        Ok(match self {
            ConditionType::FieldValue => Box::new(FieldValueCondition::new(
                stream_id,
                id,
                created_at,
                creator_user_id,
                parameters,
            )?),
            ConditionType::MessageCount => Box::new(MessageCountCondition::new(
                stream_id,
                id,
                created_at,
                creator_user_id,
                parameters,
            )?),
        })
    }
}

/// Build a condition from its definition. Unknown kinds are rejected.
pub fn create_condition(spec: ConditionSpec) -> Result<Box<dyn AlertCondition>, ConditionError> {
    let condition_type: ConditionType = spec.condition_type.parse()?;
    condition_type.build(
        spec.stream_id,
        spec.id,
        spec.created_at,
        spec.creator_user_id,
        spec.parameters,
    )
}

//! Typed access to a condition's parameter map

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generic string-keyed condition parameters, as configured by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, serde_json::Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&serde_json::Value, ParameterError> {
        match self.0.get(key) {
            Some(serde_json::Value::Null) | None => Err(ParameterError::Missing(key.to_string())),
            Some(value) => Ok(value),
        }
    }

    /// Integer parameter. Integral floats (`5.0`) are accepted.
    pub fn require_int(&self, key: &str) -> Result<i64, ParameterError> {
        as_int(key, self.require(key)?)
    }

    pub fn optional_int(&self, key: &str, default: i64) -> Result<i64, ParameterError> {
        match self.0.get(key) {
            Some(serde_json::Value::Null) | None => Ok(default),
            Some(value) => as_int(key, value),
        }
    }

    pub fn require_number(&self, key: &str) -> Result<f64, ParameterError> {
        let value = self.require(key)?;
        value
            .as_f64()
            .ok_or_else(|| ParameterError::invalid(key, "a number", value))
    }

    /// Non-empty string parameter
    pub fn require_str(&self, key: &str) -> Result<&str, ParameterError> {
        let value = self.require(key)?;
        match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(ParameterError::invalid(key, "a non-empty string", value)),
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn as_int(key: &str, value: &serde_json::Value) -> Result<i64, ParameterError> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(ParameterError::invalid(key, "an integer", value)),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("Missing required parameter '{0}'")]
    Missing(String),

    #[error("Parameter '{key}' must be {expected}, got {actual}")]
    Invalid {
        key: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Parameter '{key}' has unknown value '{value}'")]
    UnknownVariant { key: String, value: String },
}

impl ParameterError {
    fn invalid(key: &str, expected: &'static str, actual: &serde_json::Value) -> Self {
        ParameterError::Invalid {
            key: key.to_string(),
            expected,
            actual: actual.to_string(),
        }
    }
}

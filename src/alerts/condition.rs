//! Shared condition model: identity, grace/backlog settings, check results

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::params::{ParameterError, Parameters};
use crate::data::MessageSummary;
use crate::search::{RangeError, SearchError, Searches};

/// A literal stream id, safe to embed in a `streams:<id>` filter
static STREAM_ID: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$"));

fn validate_stream_id(stream_id: &str) -> Result<(), ConditionError> {
    match STREAM_ID.as_ref() {
        Ok(re) if re.is_match(stream_id) => Ok(()),
        _ => Err(ConditionError::InvalidStreamId(stream_id.to_string())),
    }
}

/// Kind of alert condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Threshold on an aggregate statistic of a numeric field
    FieldValue,
    /// Threshold on the number of messages in a stream
    MessageCount,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::FieldValue => "field_value",
            ConditionType::MessageCount => "message_count",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "field_value" => Ok(ConditionType::FieldValue),
            "message_count" => Ok(ConditionType::MessageCount),
            _ => Err(ConditionError::UnknownType(s.to_string())),
        }
    }
}

/// Identity and settings common to every condition kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionBase {
    /// Unset until the condition is persisted
    pub id: Option<String>,
    pub stream_id: String,
    pub condition_type: ConditionType,
    pub created_at: DateTime<Utc>,
    pub creator_user_id: String,
    pub parameters: Parameters,
    /// Minutes after a surfaced alert during which new triggers are suppressed
    pub grace: i64,
    /// Number of contributing messages to capture when triggered
    pub backlog: usize,
}

impl ConditionBase {
    pub fn new(
        stream_id: impl Into<String>,
        id: Option<String>,
        condition_type: ConditionType,
        created_at: DateTime<Utc>,
        creator_user_id: impl Into<String>,
        parameters: Parameters,
    ) -> Result<Self, ConditionError> {
        let stream_id = stream_id.into();
        validate_stream_id(&stream_id)?;
        let grace = non_negative("grace", parameters.optional_int("grace", 0)?)?;
        let backlog = non_negative("backlog", parameters.optional_int("backlog", 0)?)?;

        Ok(Self {
            id,
            stream_id,
            condition_type,
            created_at,
            creator_user_id: creator_user_id.into(),
            parameters,
            grace,
            backlog: usize::try_from(backlog).unwrap_or(usize::MAX),
        })
    }

    /// Stream filter scoping queries to this condition's stream
    pub fn stream_filter(&self) -> String {
        format!("streams:{}", self.stream_id)
    }

    /// Identifier for logs; unpersisted conditions log as `<new>`
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<new>")
    }
}

/// Trailing windows must cover at least one minute
pub(crate) fn positive(key: &str, value: i64) -> Result<i64, ConditionError> {
    if value <= 0 {
        return Err(ConditionError::NotPositive {
            key: key.to_string(),
            value,
        });
    }
    Ok(value)
}

fn non_negative(key: &str, value: i64) -> Result<i64, ConditionError> {
    if value < 0 {
        return Err(ConditionError::Negative {
            key: key.to_string(),
            value,
        });
    }
    Ok(value)
}

/// A configured monitor evaluated periodically against its stream.
///
/// Implementations are immutable after construction; each
/// [`run_check`](AlertCondition::run_check) returns a fresh [`CheckResult`]
/// carrying any captured backlog, so one instance may be shared between
/// threads.
pub trait AlertCondition: Send + Sync + fmt::Debug {
    fn base(&self) -> &ConditionBase;

    /// One-line summary of the configuration
    fn description(&self) -> String;

    /// Run one evaluation against the query backend.
    ///
    /// Data problems (no matches, unusable statistics, wrong field type)
    /// yield a not-triggered result; only range and backend failures are
    /// returned as errors.
    fn run_check(&self, searches: &dyn Searches) -> Result<CheckResult, CheckError>;

    fn id(&self) -> Option<&str> {
        self.base().id.as_deref()
    }

    fn stream_id(&self) -> &str {
        &self.base().stream_id
    }

    fn condition_type(&self) -> ConditionType {
        self.base().condition_type
    }

    fn grace(&self) -> i64 {
        self.base().grace
    }

    fn backlog(&self) -> usize {
        self.base().backlog
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub triggered: bool,
    pub condition_id: Option<String>,
    pub stream_id: String,
    /// Present only when triggered
    pub description: Option<String>,
    pub checked_at: DateTime<Utc>,
    /// Captured backlog, empty unless triggered with a positive backlog
    pub summaries: Vec<MessageSummary>,
}

impl CheckResult {
    pub fn not_triggered(base: &ConditionBase) -> Self {
        Self {
            triggered: false,
            condition_id: base.id.clone(),
            stream_id: base.stream_id.clone(),
            description: None,
            checked_at: Utc::now(),
            summaries: Vec::new(),
        }
    }

    pub fn triggered(
        base: &ConditionBase,
        description: String,
        summaries: Vec<MessageSummary>,
    ) -> Self {
        Self {
            triggered: true,
            condition_id: base.id.clone(),
            stream_id: base.stream_id.clone(),
            description: Some(description),
            checked_at: Utc::now(),
            summaries,
        }
    }
}

/// Format a number with at most three decimals, dropping trailing zeros
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let formatted = format!("{:.3}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Construction-time failures; the condition is never instantiated
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("Unknown condition type '{0}'")]
    UnknownType(String),

    #[error("Parameter '{key}' must not be negative, got {value}")]
    Negative { key: String, value: i64 },

    #[error("Parameter '{key}' must be positive, got {value}")]
    NotPositive { key: String, value: i64 },

    #[error("Invalid stream id '{0}'")]
    InvalidStreamId(String),
}

/// Classify a failed query: range format problems are range errors, the
/// rest are backend failures
pub(crate) fn search_failure(condition_id: &str, e: SearchError) -> CheckError {
    match e {
        SearchError::InvalidRangeFormat(e) => {
            tracing::error!(condition_id = %condition_id, error = %e, "Invalid time range format");
            CheckError::Range(e)
        }
        e => CheckError::Search(e),
    }
}

/// Per-evaluation failures that cannot be expressed as "not triggered"
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Invalid time range: {0}")]
    Range(#[from] RangeError),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
}

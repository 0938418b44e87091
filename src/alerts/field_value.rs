//! Field value condition
//!
//! Triggers when an aggregate statistic of a numeric field over the trailing
//! window crosses a threshold. The check kind picks the statistic and the
//! match kind the direction of the comparison.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::condition::{
    format_decimal, positive, search_failure, AlertCondition, CheckError, CheckResult,
    ConditionBase, ConditionError, ConditionType,
};
use super::params::{ParameterError, Parameters};
use crate::data::MessageSummary;
use crate::search::{FieldStatsResult, SearchError, Searches, TimeRange};

/// Which statistic of the field is examined.
///
/// The names are historical identifiers only; every kind compares a numeric
/// statistic and none of them involves case handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckType {
    /// Mean
    Compare,
    /// Minimum
    CompareIgnoreCase,
    /// Maximum
    Match,
    /// Sum
    MatchIgnoreCase,
    /// Standard deviation
    StdDev,
}

impl CheckType {
    pub const ALL: [CheckType; 5] = [
        CheckType::Compare,
        CheckType::CompareIgnoreCase,
        CheckType::Match,
        CheckType::MatchIgnoreCase,
        CheckType::StdDev,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Compare => "COMPARE",
            CheckType::CompareIgnoreCase => "COMPARE_IGNORE_CASE",
            CheckType::Match => "MATCH",
            CheckType::MatchIgnoreCase => "MATCH_IGNORE_CASE",
            CheckType::StdDev => "STDDEV",
        }
    }

    /// The statistic this check examines, or `None` when the result does
    /// not carry it (a backend without extended stats cannot serve STDDEV)
    pub fn select(&self, stats: &FieldStatsResult) -> Option<f64> {
        match self {
            CheckType::Compare => Some(stats.mean),
            CheckType::CompareIgnoreCase => Some(stats.min),
            CheckType::Match => Some(stats.max),
            CheckType::MatchIgnoreCase => Some(stats.sum),
            CheckType::StdDev => stats.std_deviation(),
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMPARE" => Ok(CheckType::Compare),
            "COMPARE_IGNORE_CASE" => Ok(CheckType::CompareIgnoreCase),
            "MATCH" => Ok(CheckType::Match),
            "MATCH_IGNORE_CASE" => Ok(CheckType::MatchIgnoreCase),
            "STDDEV" => Ok(CheckType::StdDev),
            _ => Err(ParameterError::UnknownVariant {
                key: "type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Direction of the threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// Trigger when the statistic is strictly above the threshold
    Match,
    /// Trigger when the statistic is strictly below the threshold
    NotMatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Match => "MATCH",
            MatchType::NotMatch => "NOT_MATCH",
        }
    }

    /// Strict comparison; equality never triggers
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            MatchType::Match => value > threshold,
            MatchType::NotMatch => value < threshold,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MATCH" => Ok(MatchType::Match),
            "NOT_MATCH" => Ok(MatchType::NotMatch),
            _ => Err(ParameterError::UnknownVariant {
                key: "match_type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldValueCondition {
    base: ConditionBase,
    /// Trailing window in minutes
    time: i64,
    field: String,
    check_type: CheckType,
    match_type: MatchType,
    threshold: f64,
}

impl FieldValueCondition {
    pub fn new(
        stream_id: impl Into<String>,
        id: Option<String>,
        created_at: DateTime<Utc>,
        creator_user_id: impl Into<String>,
        parameters: Parameters,
    ) -> Result<Self, ConditionError> {
        let time = positive("time", parameters.require_int("time")?)?;
        let match_type: MatchType = parameters.require_str("match_type")?.parse()?;
        let threshold = parameters.require_number("match")?;
        let check_type: CheckType = parameters.require_str("type")?.parse()?;
        let field = parameters.require_str("field")?.to_string();

        let base = ConditionBase::new(
            stream_id,
            id,
            ConditionType::FieldValue,
            created_at,
            creator_user_id,
            parameters,
        )?;

        Ok(Self {
            base,
            time,
            field,
            check_type,
            match_type,
            threshold,
        })
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn trigger_description(&self, value: f64) -> String {
        format!(
            "Field {} had a {} of {} in the last {} minutes with trigger condition {} than {}. (Current grace time: {} minutes)",
            self.field,
            self.check_type,
            format_decimal(value),
            self.time,
            self.match_type,
            format_decimal(self.threshold),
            self.base.grace
        )
    }

    /// Decide on a statistics result. Backlog is only materialized after a
    /// positive decision and never feeds back into it.
    fn decide(&self, stats: FieldStatsResult) -> CheckResult {
        let id = self.base.display_id();

        if stats.count == 0 {
            tracing::debug!(
                condition_id = %id,
                check_type = %self.check_type,
                "Alert check did not match any messages. Returning not triggered."
            );
            return CheckResult::not_triggered(&self.base);
        }

        let Some(value) = self.check_type.select(&stats) else {
            tracing::error!(
                condition_id = %id,
                check_type = %self.check_type,
                "Check type is not supported by the statistics result. Returning not triggered."
            );
            return CheckResult::not_triggered(&self.base);
        };

        tracing::debug!(condition_id = %id, result = value, "Alert check result");

        if !value.is_finite() {
            tracing::debug!(
                condition_id = %id,
                result = value,
                "Statistic is not a finite value. Returning not triggered."
            );
            return CheckResult::not_triggered(&self.base);
        }

        if !self.match_type.compare(value, self.threshold) {
            return CheckResult::not_triggered(&self.base);
        }

        let summaries: Vec<MessageSummary> = stats
            .search_hits
            .into_iter()
            .take(self.base.backlog)
            .map(MessageSummary::from)
            .collect();

        CheckResult::triggered(&self.base, self.trigger_description(value), summaries)
    }
}

impl AlertCondition for FieldValueCondition {
    fn base(&self) -> &ConditionBase {
        &self.base
    }

    fn description(&self) -> String {
        format!(
            "time: {}, field: {}, check type: {}, match_type: {}, match: {}, grace: {}",
            self.time,
            self.field,
            self.check_type.as_str().to_lowercase(),
            self.match_type.as_str().to_lowercase(),
            format_decimal(self.threshold),
            self.base.grace
        )
    }

    fn run_check(&self, searches: &dyn Searches) -> Result<CheckResult, CheckError> {
        let range = TimeRange::trailing_minutes(self.time).map_err(|e| {
            tracing::error!(
                condition_id = %self.base.display_id(),
                error = %e,
                "Invalid time range"
            );
            CheckError::Range(e)
        })?;

        let filter = self.base.stream_filter();
        let stats = match searches.field_stats(
            &self.field,
            "*",
            Some(&filter),
            &range,
            self.base.backlog,
        ) {
            Ok(stats) => stats,
            Err(SearchError::FieldType { field }) => {
                tracing::debug!(
                    condition_id = %self.base.display_id(),
                    field = %field,
                    "Field seems not to have a numerical type or doesn't even exist at all. Returning not triggered."
                );
                return Ok(CheckResult::not_triggered(&self.base));
            }
            Err(e) => return Err(search_failure(self.base.display_id(), e)),
        };

        Ok(self.decide(stats))
    }
}

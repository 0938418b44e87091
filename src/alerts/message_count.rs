//! Message count condition: triggers on too many or too few stream messages

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::condition::{
    positive, search_failure, AlertCondition, CheckError, CheckResult, ConditionBase,
    ConditionError, ConditionType,
};
use super::params::{ParameterError, Parameters};
use crate::data::MessageSummary;
use crate::search::{Searches, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdType {
    More,
    Less,
}

impl ThresholdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdType::More => "MORE",
            ThresholdType::Less => "LESS",
        }
    }

    /// Strict comparison; a count equal to the threshold never triggers
    pub fn exceeded(&self, count: u64, threshold: u64) -> bool {
        match self {
            ThresholdType::More => count > threshold,
            ThresholdType::Less => count < threshold,
        }
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MORE" => Ok(ThresholdType::More),
            "LESS" => Ok(ThresholdType::Less),
            _ => Err(ParameterError::UnknownVariant {
                key: "threshold_type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageCountCondition {
    base: ConditionBase,
    time: i64,
    threshold_type: ThresholdType,
    threshold: u64,
}

impl MessageCountCondition {
    pub fn new(
        stream_id: impl Into<String>,
        id: Option<String>,
        created_at: DateTime<Utc>,
        creator_user_id: impl Into<String>,
        parameters: Parameters,
    ) -> Result<Self, ConditionError> {
        let time = positive("time", parameters.require_int("time")?)?;
        let threshold_type: ThresholdType = parameters.require_str("threshold_type")?.parse()?;
        let threshold = parameters.require_int("threshold")?;
        let threshold = u64::try_from(threshold).map_err(|_| ConditionError::Negative {
            key: "threshold".to_string(),
            value: threshold,
        })?;

        let base = ConditionBase::new(
            stream_id,
            id,
            ConditionType::MessageCount,
            created_at,
            creator_user_id,
            parameters,
        )?;

        Ok(Self {
            base,
            time,
            threshold_type,
            threshold,
        })
    }

    pub fn threshold_type(&self) -> ThresholdType {
        self.threshold_type
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl AlertCondition for MessageCountCondition {
    fn base(&self) -> &ConditionBase {
        &self.base
    }

    fn description(&self) -> String {
        format!(
            "time: {}, threshold_type: {}, threshold: {}, grace: {}",
            self.time,
            self.threshold_type.as_str().to_lowercase(),
            self.threshold,
            self.base.grace
        )
    }

    fn run_check(&self, searches: &dyn Searches) -> Result<CheckResult, CheckError> {
        let id = self.base.display_id();
        let range = TimeRange::trailing_minutes(self.time).map_err(|e| {
            tracing::error!(condition_id = %id, error = %e, "Invalid time range");
            CheckError::Range(e)
        })?;
        let filter = self.base.stream_filter();

        let count = searches
            .count("*", Some(&filter), &range)
            .map_err(|e| search_failure(id, e))?
            .count;

        tracing::debug!(condition_id = %id, count, "Alert check result");

        if !self.threshold_type.exceeded(count, self.threshold) {
            return Ok(CheckResult::not_triggered(&self.base));
        }

        let summaries: Vec<MessageSummary> = if self.base.backlog > 0 {
            searches
                .search("*", Some(&filter), &range, self.base.backlog)
                .map_err(|e| search_failure(id, e))?
                .hits
                .into_iter()
                .map(MessageSummary::from)
                .collect()
        } else {
            Vec::new()
        };

        let description = format!(
            "Stream had {} messages in the last {} minutes with trigger condition {} than {} messages. (Current grace time: {} minutes)",
            count,
            self.time,
            self.threshold_type.as_str().to_lowercase(),
            self.threshold,
            self.base.grace
        );

        Ok(CheckResult::triggered(&self.base, description, summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::StubSearches;
    use crate::data::Message;
    use crate::search::{RangeError, ResultMessage, SearchError};

    fn condition(threshold_type: &str, threshold: i64, backlog: i64) -> MessageCountCondition {
        let params = Parameters::new()
            .with("time", 10)
            .with("threshold_type", threshold_type)
            .with("threshold", threshold)
            .with("grace", 1)
            .with("backlog", backlog);
        MessageCountCondition::new("stream-1", Some("mc".into()), Utc::now(), "admin", params)
            .unwrap()
    }

    fn hits(n: usize) -> Vec<ResultMessage> {
        (0..n)
            .map(|i| ResultMessage {
                index: "tripwire_1".into(),
                message: Message::new(format!("m{i}"), Utc::now()),
            })
            .collect()
    }

    #[test]
    fn test_more_than_threshold() {
        let cond = condition("more", 5, 0);

        let result = cond.run_check(&StubSearches::with_count(6, hits(6))).unwrap();
        assert!(result.triggered);
        assert_eq!(
            result.description.as_deref(),
            Some("Stream had 6 messages in the last 10 minutes with trigger condition more than 5 messages. (Current grace time: 1 minutes)")
        );
        assert!(result.summaries.is_empty());

        assert!(!cond.run_check(&StubSearches::with_count(5, hits(5))).unwrap().triggered);
    }

    #[test]
    fn test_less_than_threshold() {
        let cond = condition("LESS", 5, 0);
        assert!(cond.run_check(&StubSearches::with_count(0, vec![])).unwrap().triggered);
        assert!(!cond.run_check(&StubSearches::with_count(5, hits(5))).unwrap().triggered);
    }

    #[test]
    fn test_backlog_is_bounded() {
        let cond = condition("more", 1, 2);
        let result = cond.run_check(&StubSearches::with_count(4, hits(4))).unwrap();
        assert!(result.triggered);
        assert_eq!(result.summaries.len(), 2);
        assert_eq!(result.summaries[0].index, "tripwire_1");
    }

    #[test]
    fn test_invalid_parameters() {
        let params = Parameters::new()
            .with("time", 10)
            .with("threshold_type", "SOMETIMES")
            .with("threshold", 1);
        assert!(MessageCountCondition::new("s", None, Utc::now(), "admin", params).is_err());

        let params = Parameters::new()
            .with("time", 10)
            .with("threshold_type", "MORE")
            .with("threshold", -1);
        assert!(matches!(
            MessageCountCondition::new("s", None, Utc::now(), "admin", params),
            Err(ConditionError::Negative { .. })
        ));
    }

    #[test]
    fn test_window_must_be_positive() {
        for time in [0, -5] {
            let params = Parameters::new()
                .with("time", time)
                .with("threshold_type", "MORE")
                .with("threshold", 1);
            assert!(matches!(
                MessageCountCondition::new("s", None, Utc::now(), "admin", params),
                Err(ConditionError::NotPositive { .. })
            ));
        }
    }

    #[test]
    fn test_backlog_range_failure_is_a_range_error() {
        let cond = condition("more", 1, 2);
        let searches = StubSearches::with_count(4, hits(4)).failing_search(|| {
            SearchError::InvalidRangeFormat(RangeError::InvalidFormat("bad".into()))
        });
        assert!(matches!(cond.run_check(&searches), Err(CheckError::Range(_))));

        let searches = StubSearches::with_count(4, hits(4))
            .failing_search(|| SearchError::Backend("unavailable".into()));
        assert!(matches!(cond.run_check(&searches), Err(CheckError::Search(_))));
    }

    #[test]
    fn test_description() {
        assert_eq!(
            condition("more", 5, 0).description(),
            "time: 10, threshold_type: more, threshold: 5, grace: 1"
        );
    }
}

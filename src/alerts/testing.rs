//! Stub query backend for condition and checker tests

use parking_lot::Mutex;
use std::time::Duration;

use super::field_value::CheckType;
use crate::search::{
    CountResult, ExtendedStats, FieldStatsResult, HistogramResult, Interval, ResultMessage,
    SearchError, SearchResult, Searches, TermsResult, TermsStatsOrder, TermsStatsResult,
    TimeRange,
};

/// Stats with one matched message where only the statistic examined by
/// `check_type` is set; every other statistic is NaN and can never trigger.
pub fn stats_with(check_type: CheckType, value: f64) -> FieldStatsResult {
    let mut stats = FieldStatsResult {
        count: 1,
        min: f64::NAN,
        max: f64::NAN,
        mean: f64::NAN,
        sum: f64::NAN,
        extended: Some(ExtendedStats {
            sum_of_squares: f64::NAN,
            variance: f64::NAN,
            std_deviation: f64::NAN,
        }),
        search_hits: Vec::new(),
        took_ms: 0,
    };
    match check_type {
        CheckType::Compare => stats.mean = value,
        CheckType::CompareIgnoreCase => stats.min = value,
        CheckType::Match => stats.max = value,
        CheckType::MatchIgnoreCase => stats.sum = value,
        CheckType::StdDev => {
            stats.extended = Some(ExtendedStats {
                sum_of_squares: f64::NAN,
                variance: f64::NAN,
                std_deviation: value,
            })
        }
    }
    stats
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldStatsCall {
    pub field: String,
    pub query: String,
    pub filter: Option<String>,
    pub range: TimeRange,
    pub hits_limit: usize,
}

type ErrorFactory = Box<dyn Fn() -> SearchError + Send + Sync>;

#[derive(Default)]
pub struct StubSearches {
    stats: Mutex<Option<FieldStatsResult>>,
    count: Mutex<u64>,
    hits: Mutex<Vec<ResultMessage>>,
    error: Option<ErrorFactory>,
    search_error: Option<ErrorFactory>,
    delay: Option<Duration>,
    calls: Mutex<Vec<FieldStatsCall>>,
}

impl StubSearches {
    pub fn with_stats(stats: FieldStatsResult) -> Self {
        Self {
            stats: Mutex::new(Some(stats)),
            ..Default::default()
        }
    }

    pub fn with_count(count: u64, hits: Vec<ResultMessage>) -> Self {
        Self {
            count: Mutex::new(count),
            hits: Mutex::new(hits),
            ..Default::default()
        }
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> SearchError + Send + Sync + 'static,
    {
        Self {
            error: Some(Box::new(error)),
            ..Default::default()
        }
    }

    /// Fail only plain searches, leaving counts and stats intact
    pub fn failing_search<F>(mut self, error: F) -> Self
    where
        F: Fn() -> SearchError + Send + Sync + 'static,
    {
        self.search_error = Some(Box::new(error));
        self
    }

    /// Block every query for `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_stats(&self, stats: FieldStatsResult) {
        *self.stats.lock() = Some(stats);
    }

    pub fn calls(&self) -> Vec<FieldStatsCall> {
        self.calls.lock().clone()
    }

    fn before_query(&self) -> Result<(), SearchError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.error {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    fn unsupported() -> SearchError {
        SearchError::Backend("not supported by stub".into())
    }
}

impl Searches for StubSearches {
    fn field_stats(
        &self,
        field: &str,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        hits_limit: usize,
    ) -> Result<FieldStatsResult, SearchError> {
        self.calls.lock().push(FieldStatsCall {
            field: field.to_string(),
            query: query.to_string(),
            filter: filter.map(String::from),
            range: *range,
            hits_limit,
        });
        self.before_query()?;
        self.stats
            .lock()
            .clone()
            .ok_or_else(Self::unsupported)
    }

    fn count(
        &self,
        _query: &str,
        _filter: Option<&str>,
        _range: &TimeRange,
    ) -> Result<CountResult, SearchError> {
        self.before_query()?;
        Ok(CountResult {
            count: *self.count.lock(),
            took_ms: 0,
        })
    }

    fn search(
        &self,
        _query: &str,
        _filter: Option<&str>,
        _range: &TimeRange,
        limit: usize,
    ) -> Result<SearchResult, SearchError> {
        self.before_query()?;
        if let Some(error) = &self.search_error {
            return Err(error());
        }
        let hits = self.hits.lock();
        Ok(SearchResult {
            total: hits.len() as u64,
            hits: hits.iter().take(limit).cloned().collect(),
            took_ms: 0,
        })
    }

    fn terms(
        &self,
        _field: &str,
        _size: usize,
        _query: &str,
        _filter: Option<&str>,
        _range: &TimeRange,
    ) -> Result<TermsResult, SearchError> {
        Err(Self::unsupported())
    }

    fn terms_stats(
        &self,
        _value_field: &str,
        _key_field: &str,
        _order: TermsStatsOrder,
        _size: usize,
        _query: &str,
        _filter: Option<&str>,
        _range: &TimeRange,
    ) -> Result<TermsStatsResult, SearchError> {
        Err(Self::unsupported())
    }

    fn histogram(
        &self,
        _query: &str,
        _filter: Option<&str>,
        _interval: Interval,
        _range: &TimeRange,
    ) -> Result<HistogramResult, SearchError> {
        Err(Self::unsupported())
    }

    fn field_histogram(
        &self,
        _query: &str,
        _field: &str,
        _filter: Option<&str>,
        _interval: Interval,
        _range: &TimeRange,
    ) -> Result<HistogramResult, SearchError> {
        Err(Self::unsupported())
    }
}

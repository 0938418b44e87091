//! Result types returned by [`super::Searches`] backends

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::timerange::TimeRange;
use crate::data::{Message, MessageSummary};

/// A message hit together with the partition it was read from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMessage {
    pub index: String,
    pub message: Message,
}

impl From<ResultMessage> for MessageSummary {
    fn from(hit: ResultMessage) -> Self {
        MessageSummary::new(hit.index, hit.message)
    }
}

/// Statistics only computed by backends supporting extended stats
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtendedStats {
    pub sum_of_squares: f64,
    pub variance: f64,
    pub std_deviation: f64,
}

/// Aggregate statistics of one numeric field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStatsResult {
    /// Number of matched messages carrying a numeric value for the field
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
    pub extended: Option<ExtendedStats>,
    /// Matched messages, bounded by the requested hit limit
    pub search_hits: Vec<ResultMessage>,
    pub took_ms: u64,
}

impl FieldStatsResult {
    /// Stats over zero values: min/max are infinite and derived values NaN
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: f64::NAN,
            sum: 0.0,
            extended: Some(ExtendedStats {
                sum_of_squares: 0.0,
                variance: f64::NAN,
                std_deviation: f64::NAN,
            }),
            search_hits: Vec::new(),
            took_ms: 0,
        }
    }

    pub fn sum_of_squares(&self) -> Option<f64> {
        self.extended.map(|e| e.sum_of_squares)
    }

    pub fn variance(&self) -> Option<f64> {
        self.extended.map(|e| e.variance)
    }

    pub fn std_deviation(&self) -> Option<f64> {
        self.extended.map(|e| e.std_deviation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountResult {
    pub count: u64,
    pub took_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Total matches, which may exceed `hits.len()`
    pub total: u64,
    pub hits: Vec<ResultMessage>,
    pub took_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsResult {
    /// Number of matched messages
    pub total: u64,
    /// Matched messages without the field
    pub missing: u64,
    pub terms: BTreeMap<String, u64>,
    pub took_ms: u64,
}

/// Statistics of a value field for one key term
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsStatsEntry {
    pub key_field: String,
    /// Messages carrying the key term
    pub count: u64,
    /// Messages carrying both the key term and a numeric value
    pub total_count: u64,
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsStatsResult {
    pub results: Vec<TermsStatsEntry>,
    pub took_ms: u64,
}

/// Per-bucket values of a histogram; `total`/`mean` only for field histograms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    pub total_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramResult {
    pub interval: Interval,
    pub boundaries: TimeRange,
    /// Bucket start (epoch seconds) to bucket values
    pub results: BTreeMap<i64, HistogramBucket>,
    pub took_ms: u64,
}

/// Bucket width of a date histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Week,
}

impl Interval {
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Minute => 60,
            Interval::Hour => 3_600,
            Interval::Day => 86_400,
            Interval::Week => 604_800,
        }
    }

    /// Start of the bucket containing `ts`, in epoch seconds
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> i64 {
        let secs = self.seconds();
        ts.timestamp().div_euclid(secs) * secs
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MINUTE" => Ok(Interval::Minute),
            "HOUR" => Ok(Interval::Hour),
            "DAY" => Ok(Interval::Day),
            "WEEK" => Ok(Interval::Week),
            _ => Err(format!("unknown histogram interval: {s}")),
        }
    }
}

/// Ordering of terms-stats entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TermsStatsOrder {
    Count,
    ReverseCount,
    Total,
    ReverseTotal,
    Min,
    ReverseMin,
    Max,
    ReverseMax,
    Mean,
    ReverseMean,
}

impl TermsStatsOrder {
    /// Sort key and whether the order is ascending
    pub(crate) fn key(&self, entry: &TermsStatsEntry) -> (f64, bool) {
        match self {
            TermsStatsOrder::Count => (entry.count as f64, false),
            TermsStatsOrder::ReverseCount => (entry.count as f64, true),
            TermsStatsOrder::Total => (entry.total, false),
            TermsStatsOrder::ReverseTotal => (entry.total, true),
            TermsStatsOrder::Min => (entry.min, false),
            TermsStatsOrder::ReverseMin => (entry.min, true),
            TermsStatsOrder::Max => (entry.max, false),
            TermsStatsOrder::ReverseMax => (entry.max, true),
            TermsStatsOrder::Mean => (entry.mean, false),
            TermsStatsOrder::ReverseMean => (entry.mean, true),
        }
    }
}

impl FromStr for TermsStatsOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Ok(Self::Count),
            "REVERSE_COUNT" => Ok(Self::ReverseCount),
            "TOTAL" => Ok(Self::Total),
            "REVERSE_TOTAL" => Ok(Self::ReverseTotal),
            "MIN" => Ok(Self::Min),
            "REVERSE_MIN" => Ok(Self::ReverseMin),
            "MAX" => Ok(Self::Max),
            "REVERSE_MAX" => Ok(Self::ReverseMax),
            "MEAN" => Ok(Self::Mean),
            "REVERSE_MEAN" => Ok(Self::ReverseMean),
            _ => Err(format!("unknown terms stats order: {s}")),
        }
    }
}

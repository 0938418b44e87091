//! Statistics query port
//!
//! Alert conditions never touch message storage directly; they go through
//! the [`Searches`] trait. [`MemorySearches`] is the in-process backend used
//! by the server binary and the tests.

pub mod filter;
pub mod memory;
pub mod results;
pub mod stats;
pub mod timerange;

pub use filter::QueryFilter;
pub use memory::{IndexConfig, MemorySearches};
pub use results::{
    CountResult, ExtendedStats, FieldStatsResult, HistogramBucket, HistogramResult, Interval,
    ResultMessage, SearchResult, TermsResult, TermsStatsEntry, TermsStatsOrder,
    TermsStatsResult,
};
pub use stats::StatsAccumulator;
pub use timerange::{RangeError, TimeRange};

/// Query backend for messages and aggregate statistics.
///
/// `query` uses the [`QueryFilter`] syntax; `filter` narrows it further,
/// typically to a stream (`streams:<id>`). Every call resolves relative
/// ranges against the backend's clock at the time of the call.
pub trait Searches: Send + Sync {
    /// Aggregate statistics of a numeric field.
    ///
    /// Returns up to `hits_limit` matched messages in `search_hits`.
    /// Fails with [`SearchError::FieldType`] when the field holds
    /// non-numeric data or does not exist at all.
    fn field_stats(
        &self,
        field: &str,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        hits_limit: usize,
    ) -> Result<FieldStatsResult, SearchError>;

    fn count(
        &self,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<CountResult, SearchError>;

    /// Newest-first matched messages, at most `limit`
    fn search(
        &self,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        limit: usize,
    ) -> Result<SearchResult, SearchError>;

    fn terms(
        &self,
        field: &str,
        size: usize,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<TermsResult, SearchError>;

    #[allow(clippy::too_many_arguments)]
    fn terms_stats(
        &self,
        value_field: &str,
        key_field: &str,
        order: TermsStatsOrder,
        size: usize,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<TermsStatsResult, SearchError>;

    fn histogram(
        &self,
        query: &str,
        filter: Option<&str>,
        interval: Interval,
        range: &TimeRange,
    ) -> Result<HistogramResult, SearchError>;

    fn field_histogram(
        &self,
        query: &str,
        field: &str,
        filter: Option<&str>,
        interval: Interval,
        range: &TimeRange,
    ) -> Result<HistogramResult, SearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid range format: {0}")]
    InvalidRangeFormat(#[from] RangeError),

    #[error("Field '{field}' is not numeric or does not exist")]
    FieldType { field: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Search backend error: {0}")]
    Backend(String),
}

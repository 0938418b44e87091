//! In-memory [`Searches`] backend
//!
//! Messages are partitioned into time-bounded indices (one per
//! `index_duration`), named `<prefix>_<n>`. Queries prune indices by time
//! range before scanning, and field statistics are aggregated per index and
//! merged.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::filter::QueryFilter;
use super::results::{
    CountResult, FieldStatsResult, HistogramBucket, HistogramResult, Interval, ResultMessage,
    SearchResult, TermsResult, TermsStatsEntry, TermsStatsOrder, TermsStatsResult,
};
use super::stats::StatsAccumulator;
use super::timerange::TimeRange;
use super::{SearchError, Searches};
use crate::data::{Message, Value};

/// Partitioning of the in-memory store
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Index name prefix
    pub prefix: String,
    /// Width of each index in seconds (default: 1 hour)
    pub index_duration_secs: i64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            prefix: "tripwire".to_string(),
            index_duration_secs: 3600,
        }
    }
}

impl IndexConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_index_duration(mut self, secs: i64) -> Self {
        self.index_duration_secs = secs.max(1);
        self
    }
}

/// How a field has been seen across an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Numeric,
    Text,
}

impl FieldKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int64(_) | Value::Float64(_) => Some(FieldKind::Numeric),
            Value::Bool(_) | Value::String(_) => Some(FieldKind::Text),
        }
    }

    /// A field mixing numbers and text is treated as text
    fn merge(self, other: FieldKind) -> FieldKind {
        if self == other {
            self
        } else {
            FieldKind::Text
        }
    }
}

/// Time-bounded partition of messages
#[derive(Debug)]
struct Index {
    name: String,
    /// Start timestamp (inclusive), epoch seconds
    start: i64,
    /// End timestamp (exclusive), epoch seconds
    end: i64,
    messages: RwLock<Vec<Message>>,
    schema: RwLock<HashMap<String, FieldKind>>,
}

impl Index {
    fn new(name: String, start: i64, end: i64) -> Self {
        Self {
            name,
            start,
            end,
            messages: RwLock::new(Vec::new()),
            schema: RwLock::new(HashMap::new()),
        }
    }

    fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.start <= to.timestamp() && self.end > from.timestamp()
    }

    fn insert(&self, message: Message) {
        {
            let mut schema = self.schema.write();
            for (name, value) in &message.fields {
                if let Some(kind) = FieldKind::of(value) {
                    schema
                        .entry(name.clone())
                        .and_modify(|k| *k = k.merge(kind))
                        .or_insert(kind);
                }
            }
        }
        self.messages.write().push(message);
    }
}

/// In-memory message store implementing the statistics query port
pub struct MemorySearches {
    indices: DashMap<i64, Arc<Index>>,
    config: IndexConfig,
    next_id: AtomicU64,
}

impl MemorySearches {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            indices: DashMap::new(),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a message, assigning an ID when it has none. Returns the ID.
    pub fn insert(&self, mut message: Message) -> String {
        if message.id.is_empty() {
            let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
            message.id = format!("{:016x}", seq);
        }
        let id = message.id.clone();

        let secs = self.config.index_duration_secs;
        let partition = message.timestamp.timestamp().div_euclid(secs);
        let index = self
            .indices
            .entry(partition)
            .or_insert_with(|| {
                Arc::new(Index::new(
                    format!("{}_{}", self.config.prefix, partition),
                    partition * secs,
                    (partition + 1) * secs,
                ))
            })
            .clone();

        index.insert(message);
        id
    }

    pub fn insert_batch(&self, messages: impl IntoIterator<Item = Message>) -> usize {
        messages.into_iter().map(|m| self.insert(m)).count()
    }

    /// Names of all indices, oldest first
    pub fn index_names(&self) -> Vec<String> {
        self.sorted_indices().iter().map(|i| i.name.clone()).collect()
    }

    pub fn message_count(&self) -> usize {
        self.indices.iter().map(|e| e.value().messages.read().len()).sum()
    }

    fn sorted_indices(&self) -> Vec<Arc<Index>> {
        let mut indices: Vec<(i64, Arc<Index>)> = self
            .indices
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        indices.sort_by_key(|(k, _)| *k);
        indices.into_iter().map(|(_, i)| i).collect()
    }

    /// Visit every message matching the filter inside the range, per index
    fn scan<F>(
        &self,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        mut visit: F,
    ) -> Result<(), SearchError>
    where
        F: FnMut(&Index, &Message),
    {
        let matcher = QueryFilter::combined(query, filter)?;
        let (from, to) = range.bounds(Utc::now())?;

        for index in self.sorted_indices() {
            if !index.overlaps(from, to) {
                continue;
            }
            let messages = index.messages.read();
            for message in messages.iter() {
                if message.timestamp >= from
                    && message.timestamp <= to
                    && matcher.matches(message)
                {
                    visit(index.as_ref(), message);
                }
            }
        }
        Ok(())
    }

    /// Fail unless the field is known and purely numeric in the indices the
    /// range covers. Falls back to every index when none of those has seen
    /// the field, so an empty window still aggregates to zero.
    fn ensure_numeric(&self, field: &str, range: &TimeRange) -> Result<(), SearchError> {
        let (from, to) = range.bounds(Utc::now())?;
        let kind = |window_only: bool| {
            self.indices
                .iter()
                .filter(|e| !window_only || e.value().overlaps(from, to))
                .filter_map(|e| e.value().schema.read().get(field).copied())
                .reduce(FieldKind::merge)
        };

        match kind(true).or_else(|| kind(false)) {
            Some(FieldKind::Numeric) => Ok(()),
            Some(FieldKind::Text) | None => Err(SearchError::FieldType {
                field: field.to_string(),
            }),
        }
    }
}

impl Default for MemorySearches {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn hit(index: &Index, message: &Message) -> ResultMessage {
    ResultMessage {
        index: index.name.clone(),
        message: message.clone(),
    }
}

impl Searches for MemorySearches {
    fn field_stats(
        &self,
        field: &str,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        hits_limit: usize,
    ) -> Result<FieldStatsResult, SearchError> {
        let start = Instant::now();
        self.ensure_numeric(field, range)?;

        let mut per_index: BTreeMap<String, StatsAccumulator> = BTreeMap::new();
        let mut hits = Vec::new();

        self.scan(query, filter, range, |index, message| {
            if let Some(value) = message.field(field) {
                per_index
                    .entry(index.name.clone())
                    .or_default()
                    .accumulate(value);
            }
            if hits_limit > 0 {
                hits.push(hit(index, message));
            }
        })?;
        hits.sort_by(|a, b| b.message.timestamp.cmp(&a.message.timestamp));
        hits.truncate(hits_limit);

        let mut total = StatsAccumulator::new();
        for acc in per_index.values() {
            total.merge(acc);
        }

        let mut result = total.into_field_stats();
        result.search_hits = hits;
        result.took_ms = elapsed_ms(start);
        Ok(result)
    }

    fn count(
        &self,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<CountResult, SearchError> {
        let start = Instant::now();
        let mut count = 0u64;
        self.scan(query, filter, range, |_, _| count += 1)?;

        Ok(CountResult {
            count,
            took_ms: elapsed_ms(start),
        })
    }

    fn search(
        &self,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
        limit: usize,
    ) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        let mut hits = Vec::new();
        self.scan(query, filter, range, |index, message| {
            hits.push(hit(index, message));
        })?;

        let total = hits.len() as u64;
        hits.sort_by(|a, b| b.message.timestamp.cmp(&a.message.timestamp));
        hits.truncate(limit);

        Ok(SearchResult {
            total,
            hits,
            took_ms: elapsed_ms(start),
        })
    }

    fn terms(
        &self,
        field: &str,
        size: usize,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<TermsResult, SearchError> {
        let start = Instant::now();
        let mut total = 0u64;
        let mut missing = 0u64;
        let mut counts: HashMap<String, u64> = HashMap::new();

        self.scan(query, filter, range, |_, message| {
            total += 1;
            match message.field(field) {
                Some(value) if !value.is_null() => {
                    *counts.entry(value.to_string()).or_insert(0) += 1;
                }
                _ => missing += 1,
            }
        })?;

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(size);

        Ok(TermsResult {
            total,
            missing,
            terms: ranked.into_iter().collect(),
            took_ms: elapsed_ms(start),
        })
    }

    fn terms_stats(
        &self,
        value_field: &str,
        key_field: &str,
        order: TermsStatsOrder,
        size: usize,
        query: &str,
        filter: Option<&str>,
        range: &TimeRange,
    ) -> Result<TermsStatsResult, SearchError> {
        let start = Instant::now();
        self.ensure_numeric(value_field, range)?;

        let mut groups: HashMap<String, (u64, StatsAccumulator)> = HashMap::new();
        self.scan(query, filter, range, |_, message| {
            let key = match message.field(key_field) {
                Some(value) if !value.is_null() => value.to_string(),
                _ => return,
            };
            let (count, acc) = groups.entry(key).or_default();
            *count += 1;
            if let Some(value) = message.field(value_field) {
                acc.accumulate(value);
            }
        })?;

        let mut results: Vec<TermsStatsEntry> = groups
            .into_iter()
            .map(|(key, (count, acc))| TermsStatsEntry {
                key_field: key,
                count,
                total_count: acc.count(),
                min: acc.min(),
                max: acc.max(),
                total: acc.sum(),
                mean: acc.mean(),
            })
            .collect();

        results.sort_by(|a, b| {
            let (ka, ascending) = order.key(a);
            let (kb, _) = order.key(b);
            let ord = ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal);
            let ord = if ascending { ord } else { ord.reverse() };
            ord.then_with(|| a.key_field.cmp(&b.key_field))
        });
        results.truncate(size);

        Ok(TermsStatsResult {
            results,
            took_ms: elapsed_ms(start),
        })
    }

    fn histogram(
        &self,
        query: &str,
        filter: Option<&str>,
        interval: Interval,
        range: &TimeRange,
    ) -> Result<HistogramResult, SearchError> {
        let start = Instant::now();
        let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();

        self.scan(query, filter, range, |_, message| {
            *buckets.entry(interval.bucket_start(message.timestamp)).or_insert(0) += 1;
        })?;

        Ok(HistogramResult {
            interval,
            boundaries: *range,
            results: buckets
                .into_iter()
                .map(|(ts, total_count)| {
                    (
                        ts,
                        HistogramBucket {
                            total_count,
                            total: None,
                            mean: None,
                        },
                    )
                })
                .collect(),
            took_ms: elapsed_ms(start),
        })
    }

    fn field_histogram(
        &self,
        query: &str,
        field: &str,
        filter: Option<&str>,
        interval: Interval,
        range: &TimeRange,
    ) -> Result<HistogramResult, SearchError> {
        let start = Instant::now();
        self.ensure_numeric(field, range)?;

        let mut buckets: BTreeMap<i64, (u64, StatsAccumulator)> = BTreeMap::new();
        self.scan(query, filter, range, |_, message| {
            let (count, acc) = buckets
                .entry(interval.bucket_start(message.timestamp))
                .or_default();
            *count += 1;
            if let Some(value) = message.field(field) {
                acc.accumulate(value);
            }
        })?;

        Ok(HistogramResult {
            interval,
            boundaries: *range,
            results: buckets
                .into_iter()
                .map(|(ts, (total_count, acc))| {
                    let mean = (acc.count() > 0).then(|| acc.mean());
                    (
                        ts,
                        HistogramBucket {
                            total_count,
                            total: Some(acc.sum()),
                            mean,
                        },
                    )
                })
                .collect(),
            took_ms: elapsed_ms(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, 1, 0, minute, second).unwrap()
    }

    fn day_range() -> TimeRange {
        TimeRange::absolute(at(0, 0), Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).unwrap()).unwrap()
    }

    /// Ten messages over five minutes; two of them lack `n`
    fn sample() -> MemorySearches {
        let searches = MemorySearches::new();
        let rows: [(u32, u32, Option<i64>, &str); 10] = [
            (1, 0, None, "ha"),
            (1, 30, None, "ha"),
            (2, 0, Some(2), "hi"),
            (2, 30, Some(2), "hi"),
            (3, 0, Some(1), "ho"),
            (3, 30, Some(1), "ho"),
            (4, 0, Some(3), "ho"),
            (4, 30, Some(3), "ho"),
            (5, 0, Some(3), "hi"),
            (5, 30, Some(4), "hi"),
        ];
        for (minute, second, n, text) in rows {
            let mut msg = Message::new("", at(minute, second))
                .with_stream("s1")
                .with_field("message", Value::String(text.to_string()));
            if let Some(n) = n {
                msg = msg.with_field("n", Value::Int64(n));
            }
            searches.insert(msg);
        }
        searches
    }

    #[test]
    fn test_insert_partitions_by_time() {
        let searches = MemorySearches::with_config(
            IndexConfig::new("graylog").with_index_duration(120),
        );
        for minute in 1..=5 {
            searches.insert(Message::new("", at(minute, 0)));
        }

        assert_eq!(searches.message_count(), 5);
        let names = searches.index_names();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.starts_with("graylog_")));
    }

    #[test]
    fn test_insert_assigns_missing_ids() {
        let searches = MemorySearches::new();
        let generated = searches.insert(Message::new("", at(1, 0)));
        let kept = searches.insert(Message::new("given", at(1, 0)));

        assert!(!generated.is_empty());
        assert_eq!(kept, "given");
    }

    #[test]
    fn test_count() {
        let result = sample().count("*", None, &day_range()).unwrap();
        assert_eq!(result.count, 10);

        let result = sample().count("message:ho", Some("streams:s1"), &day_range()).unwrap();
        assert_eq!(result.count, 4);

        let result = sample().count("*", Some("streams:s2"), &day_range()).unwrap();
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_field_stats() {
        let result = sample()
            .field_stats("n", "*", None, &day_range(), 100)
            .unwrap();

        assert_eq!(result.search_hits.len(), 10);
        assert_eq!(result.count, 8);
        assert_eq!(result.min, 1.0);
        assert_eq!(result.max, 4.0);
        assert_eq!(result.mean, 2.375);
        assert_eq!(result.sum, 19.0);
        assert_eq!(result.sum_of_squares(), Some(53.0));
        assert_eq!(result.variance(), Some(0.984375));
        assert_eq!(result.std_deviation(), Some(0.9921567416492215));
    }

    #[test]
    fn test_field_stats_hits_are_bounded() {
        let result = sample().field_stats("n", "*", None, &day_range(), 3).unwrap();
        assert_eq!(result.search_hits.len(), 3);
        assert_eq!(result.count, 8);

        let result = sample().field_stats("n", "*", None, &day_range(), 0).unwrap();
        assert!(result.search_hits.is_empty());
    }

    #[test]
    fn test_field_stats_type_errors() {
        let searches = sample();
        assert!(matches!(
            searches.field_stats("message", "*", None, &day_range(), 0),
            Err(SearchError::FieldType { .. })
        ));
        assert!(matches!(
            searches.field_stats("does_not_exist", "*", None, &day_range(), 0),
            Err(SearchError::FieldType { .. })
        ));
    }

    #[test]
    fn test_field_stats_hits_are_newest_first() {
        let result = sample().field_stats("n", "*", None, &day_range(), 2).unwrap();
        assert_eq!(result.search_hits.len(), 2);
        assert_eq!(result.search_hits[0].message.timestamp, at(5, 30));
        assert_eq!(result.search_hits[1].message.timestamp, at(5, 0));
    }

    #[test]
    fn test_field_type_is_judged_within_the_window() {
        let searches = sample();
        let later = |hour| Utc.with_ymd_and_hms(2015, 1, 3, hour, 0, 0).unwrap();
        searches.insert(Message::new("", later(10)).with_field("n", Value::Int64(5)));
        searches.insert(
            Message::new("", later(12)).with_field("n", Value::String("n/a".to_string())),
        );

        let recent = TimeRange::absolute(later(9), later(11)).unwrap();
        let result = searches.field_stats("n", "*", None, &recent, 0).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.max, 5.0);

        let with_text = TimeRange::absolute(later(9), later(13)).unwrap();
        assert!(matches!(
            searches.field_stats("n", "*", None, &with_text, 0),
            Err(SearchError::FieldType { .. })
        ));
        assert!(matches!(
            searches.terms_stats("n", "message", TermsStatsOrder::Count, 5, "*", None, &with_text),
            Err(SearchError::FieldType { .. })
        ));
    }

    #[test]
    fn test_field_stats_empty_window() {
        let range = TimeRange::absolute(
            Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let result = sample().field_stats("n", "*", None, &range, 10).unwrap();
        assert_eq!(result.count, 0);
        assert!(result.min.is_infinite());
    }

    #[test]
    fn test_relative_range_uses_current_time() {
        let searches = MemorySearches::new();
        let now = Utc::now();
        searches.insert(
            Message::new("", now - chrono::Duration::seconds(30)).with_field("n", Value::Int64(7)),
        );
        searches.insert(
            Message::new("", now - chrono::Duration::minutes(30)).with_field("n", Value::Int64(9)),
        );

        let range = TimeRange::trailing_minutes(5).unwrap();
        let result = searches.field_stats("n", "*", None, &range, 0).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.max, 7.0);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let range = TimeRange::Absolute {
            from: at(5, 0),
            to: at(1, 0),
        };
        assert!(matches!(
            sample().count("*", None, &range),
            Err(SearchError::InvalidRangeFormat(_))
        ));
    }

    #[test]
    fn test_search_newest_first() {
        let result = sample().search("_exists_:n", None, &day_range(), 2).unwrap();
        assert_eq!(result.total, 8);
        assert_eq!(result.hits.len(), 2);
        assert_eq!(result.hits[0].message.timestamp, at(5, 30));
        assert_eq!(result.hits[1].message.timestamp, at(5, 0));
    }

    #[test]
    fn test_terms() {
        let result = sample().terms("n", 25, "*", None, &day_range()).unwrap();

        assert_eq!(result.total, 10);
        assert_eq!(result.missing, 2);
        assert_eq!(result.terms.len(), 4);
        assert_eq!(result.terms.get("1"), Some(&2));
        assert_eq!(result.terms.get("2"), Some(&2));
        assert_eq!(result.terms.get("3"), Some(&3));
        assert_eq!(result.terms.get("4"), Some(&1));

        let top = sample().terms("n", 1, "*", None, &day_range()).unwrap();
        assert_eq!(top.terms.len(), 1);
        assert_eq!(top.terms.get("3"), Some(&3));
    }

    #[test]
    fn test_terms_stats() {
        let result = sample()
            .terms_stats("n", "message", TermsStatsOrder::Count, 25, "*", None, &day_range())
            .unwrap();

        assert_eq!(result.results.len(), 3);
        let first = &result.results[0];
        assert_eq!(first.key_field, "hi");
        assert_eq!(first.count, 4);
        assert_eq!(first.total, 11.0);
        assert_eq!(first.max, 4.0);

        let result = sample()
            .terms_stats("n", "message", TermsStatsOrder::ReverseCount, 25, "*", None, &day_range())
            .unwrap();
        let first = &result.results[0];
        assert_eq!(first.key_field, "ha");
        assert_eq!(first.total_count, 0);
    }

    #[test]
    fn test_histogram() {
        let range = day_range();
        let h = sample().histogram("*", None, Interval::Minute, &range).unwrap();

        assert_eq!(h.interval, Interval::Minute);
        assert_eq!(h.boundaries, range);
        assert_eq!(h.results.len(), 5);
        for minute in 1..=5 {
            let bucket = &h.results[&at(minute, 0).timestamp()];
            assert_eq!(bucket.total_count, 2);
            assert!(bucket.total.is_none());
        }
    }

    #[test]
    fn test_field_histogram() {
        let range = day_range();
        let h = sample()
            .field_histogram("*", "n", None, Interval::Minute, &range)
            .unwrap();

        assert_eq!(h.interval, Interval::Minute);
        assert_eq!(h.boundaries, range);
        assert_eq!(h.results.len(), 5);

        let first = &h.results[&at(1, 0).timestamp()];
        assert_eq!(first.total_count, 2);
        assert_eq!(first.total, Some(0.0));
        assert_eq!(first.mean, None);

        let second = &h.results[&at(2, 0).timestamp()];
        assert_eq!(second.total_count, 2);
        assert_eq!(second.total, Some(4.0));
        assert_eq!(second.mean, Some(2.0));
    }
}

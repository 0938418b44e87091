//! Process configuration and file loaders
//!
//! Environment variables:
//! - TRIPWIRE_CHECK_INTERVAL_SECS: Seconds between evaluation rounds (default: 60)
//! - TRIPWIRE_QUERY_TIMEOUT_SECS: Per-evaluation timeout (default: 30)
//! - TRIPWIRE_ALERT_BUFFER: Surfaced alert channel capacity (default: 256)
//! - TRIPWIRE_CONDITIONS_FILE: JSON array of condition definitions
//! - TRIPWIRE_RECORDS_FILE: Newline-delimited JSON records to index at startup
//! - TRIPWIRE_INDEX_PREFIX: Index name prefix (default: tripwire)
//! - TRIPWIRE_INDEX_HOURS: Width of each index in hours (default: 1)

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alerts::{create_condition, AlertCondition, CheckerConfig, ConditionError, ConditionSpec};
use crate::data::{Message, MessageError};
use crate::search::{IndexConfig, MemorySearches};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub check_interval_secs: u64,
    pub query_timeout_secs: u64,
    pub alert_buffer: usize,
    pub conditions_file: Option<PathBuf>,
    pub records_file: Option<PathBuf>,
    pub index_prefix: String,
    pub index_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            query_timeout_secs: 30,
            alert_buffer: 256,
            conditions_file: None,
            records_file: None,
            index_prefix: "tripwire".to_string(),
            index_hours: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            check_interval_secs: parsed("TRIPWIRE_CHECK_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.check_interval_secs),
            query_timeout_secs: parsed("TRIPWIRE_QUERY_TIMEOUT_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(defaults.query_timeout_secs),
            alert_buffer: parsed("TRIPWIRE_ALERT_BUFFER")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.alert_buffer),
            conditions_file: lookup("TRIPWIRE_CONDITIONS_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            records_file: lookup("TRIPWIRE_RECORDS_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            index_prefix: lookup("TRIPWIRE_INDEX_PREFIX")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.index_prefix),
            index_hours: parsed("TRIPWIRE_INDEX_HOURS")
                .and_then(|h| i64::try_from(h).ok())
                .filter(|h| *h > 0)
                .unwrap_or(defaults.index_hours),
        }
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            check_interval: Duration::from_secs(self.check_interval_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            alert_buffer: self.alert_buffer,
        }
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.index_prefix.clone())
            .with_index_duration(self.index_hours.saturating_mul(3600))
    }
}

/// Read condition definitions from a JSON array file. Any invalid entry
/// fails the whole load.
pub fn load_conditions(path: &Path) -> Result<Vec<Box<dyn AlertCondition>>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let specs: Vec<ConditionSpec> = serde_json::from_str(&contents)?;

    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            create_condition(spec).map_err(|source| ConfigError::Condition { index, source })
        })
        .collect()
}

/// Index newline-delimited JSON records, returning how many were stored.
/// Blank lines are skipped.
pub fn load_records(path: &Path, searches: &MemorySearches) -> Result<usize, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut messages = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let json: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(line).map_err(|e| ConfigError::Record {
                line: i + 1,
                reason: e.to_string(),
            })?;
        let message = Message::from_json(&json).map_err(|e: MessageError| ConfigError::Record {
            line: i + 1,
            reason: e.to_string(),
        })?;
        messages.push(message);
    }

    let stored = searches.insert_batch(messages);
    tracing::info!(path = %path.display(), records = stored, "Loaded records");
    Ok(stored)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid condition at index {index}: {source}")]
    Condition {
        index: usize,
        source: ConditionError,
    },

    #[error("Invalid record on line {line}: {reason}")]
    Record { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ConditionType;
    use crate::search::{Searches, TimeRange};
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_and_overrides() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());

        let vars: HashMap<&str, &str> = [
            ("TRIPWIRE_CHECK_INTERVAL_SECS", "15"),
            ("TRIPWIRE_QUERY_TIMEOUT_SECS", "not-a-number"),
            ("TRIPWIRE_ALERT_BUFFER", "0"),
            ("TRIPWIRE_CONDITIONS_FILE", "/etc/tripwire/conditions.json"),
            ("TRIPWIRE_INDEX_HOURS", "6"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.check_interval_secs, 15);
        assert_eq!(config.query_timeout_secs, 30);
        assert_eq!(config.alert_buffer, 256);
        assert_eq!(
            config.conditions_file,
            Some(PathBuf::from("/etc/tripwire/conditions.json"))
        );
        assert_eq!(config.records_file, None);
        assert_eq!(config.index_config().index_duration_secs, 6 * 3600);
        assert_eq!(config.checker_config().check_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_load_conditions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "slow", "stream_id": "web", "type": "field_value",
                  "parameters": {{"time": 5, "field": "took_ms", "type": "MATCH",
                                  "match_type": "MATCH", "match": 500}}}},
                {{"id": "quiet", "stream_id": "web", "type": "message_count",
                  "parameters": {{"time": 10, "threshold": 1, "threshold_type": "LESS"}}}}
            ]"#
        )
        .unwrap();

        let conditions = load_conditions(file.path()).unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].condition_type(), ConditionType::FieldValue);
        assert_eq!(conditions[1].id(), Some("quiet"));
    }

    #[test]
    fn test_load_conditions_rejects_invalid_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"stream_id": "web", "type": "field_value", "parameters": {{"time": 5}}}}]"#
        )
        .unwrap();

        assert!(matches!(
            load_conditions(file.path()),
            Err(ConfigError::Condition { index: 0, .. })
        ));
        assert!(matches!(
            load_conditions(Path::new("/nonexistent/conditions.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_load_records() {
        let now = chrono::Utc::now().timestamp_millis();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp": {now}, "streams": ["web"], "message": "GET /", "http": {{"took_ms": 12}}}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"timestamp": {now}, "streams": ["web"], "message": "GET /a", "http": {{"took_ms": 30}}}}"#
        )
        .unwrap();

        let searches = MemorySearches::new();
        assert_eq!(load_records(file.path(), &searches).unwrap(), 2);

        let range = TimeRange::trailing_minutes(5).unwrap();
        let stats = searches
            .field_stats("http.took_ms", "*", Some("streams:web"), &range, 0)
            .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, 30.0);
    }

    #[test]
    fn test_load_records_reports_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"message": "no timestamp"}}"#).unwrap();

        let searches = MemorySearches::new();
        assert!(matches!(
            load_records(file.path(), &searches),
            Err(ConfigError::Record { line: 1, .. })
        ));
        assert_eq!(searches.message_count(), 0);
    }
}

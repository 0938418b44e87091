//! Tripwire: Threshold Alerting over Log Streams
//!
//! Periodically evaluates alert conditions against the records of a stream
//! and surfaces an alert when an aggregate crosses its threshold.
//!
//! # Features
//!
//! - **Field Value Conditions**: Mean, min, max, sum or standard deviation of a numeric field
//! - **Message Count Conditions**: Too many or too few records in a window
//! - **Grace Periods**: Suppress repeat alerts after one surfaces
//! - **Backlog Capture**: Attach the contributing records to a triggered check
//! - **Pluggable Search Port**: Statistics, counts, terms and histograms
//! - **In-Memory Backend**: Time-partitioned indices for local runs and tests
//!
//! # Example
//!
//! ```no_run
//! use tripwire::alerts::{create_condition, ConditionSpec, Parameters};
//! use tripwire::data::{Message, Value};
//! use tripwire::search::MemorySearches;
//!
//! let searches = MemorySearches::new();
//! searches.insert(
//!     Message::new("", chrono::Utc::now())
//!         .with_stream("web")
//!         .with_field("took_ms", Value::Int64(820)),
//! );
//!
//! let condition = create_condition(ConditionSpec {
//!     id: Some("slow-requests".into()),
//!     stream_id: "web".into(),
//!     creator_user_id: "admin".into(),
//!     created_at: chrono::Utc::now(),
//!     condition_type: "field_value".into(),
//!     parameters: Parameters::new()
//!         .with("time", 5)
//!         .with("field", "took_ms")
//!         .with("type", "MATCH")
//!         .with("match_type", "MATCH")
//!         .with("match", 500),
//! })
//! .unwrap();
//!
//! let result = condition.run_check(&searches).unwrap();
//! println!("Triggered: {}", result.triggered);
//! ```

pub mod alerts;
pub mod config;
pub mod data;
pub mod search;

// Re-export commonly used types
pub use alerts::{
    create_condition, Alert, AlertChecker, AlertCondition, CheckResult, ConditionSpec,
};
pub use data::{Message, Value};
pub use search::{MemorySearches, Searches, TimeRange};

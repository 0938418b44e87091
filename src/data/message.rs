use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::value::{flatten_json, Value};

/// Field holding the human-readable payload of a message
pub const MESSAGE_FIELD: &str = "message";

/// A timestamped log record routed into one or more streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// IDs of the streams this message was routed into
    #[serde(default)]
    pub streams: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl Message {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            streams: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.streams.push(stream_id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The message payload, empty when the record carries none
    pub fn message(&self) -> &str {
        self.fields
            .get(MESSAGE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn in_stream(&self, stream_id: &str) -> bool {
        self.streams.iter().any(|s| s == stream_id)
    }

    /// Build a message from a JSON record.
    ///
    /// `_id`, `timestamp` (RFC 3339 string or epoch milliseconds) and `streams`
    /// are reserved; every other key is flattened into the field map.
    pub fn from_json(
        json: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, MessageError> {
        let timestamp = match json.get("timestamp") {
            Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| MessageError::InvalidTimestamp(s.clone()))?,
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| MessageError::InvalidTimestamp(n.to_string()))?,
            Some(other) => return Err(MessageError::InvalidTimestamp(other.to_string())),
            None => return Err(MessageError::MissingTimestamp),
        };

        let id = json
            .get("_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let streams = match json.get("streams") {
            Some(serde_json::Value::Array(ids)) => ids
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Some(serde_json::Value::String(id)) => vec![id.clone()],
            _ => Vec::new(),
        };

        let mut payload = json.clone();
        payload.remove("_id");
        payload.remove("timestamp");
        payload.remove("streams");

        Ok(Self {
            id,
            timestamp,
            streams,
            fields: flatten_json(&payload),
        })
    }
}

/// Lightweight reference to a message that contributed to a triggered check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Partition the message was read from
    pub index: String,
    pub message: Message,
}

impl MessageSummary {
    pub fn new(index: impl Into<String>, message: Message) -> Self {
        Self {
            index: index.into(),
            message,
        }
    }

    pub fn id(&self) -> &str {
        &self.message.id
    }

    pub fn payload(&self) -> &str {
        self.message.message()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Record has no timestamp")]
    MissingTimestamp,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

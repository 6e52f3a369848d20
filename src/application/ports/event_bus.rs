use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{EventKind, JobId, StreamName};

pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Server-assigned, monotonically increasing id of a stream entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat message envelope shared by every stream.
///
/// On the wire every field is a string: strings travel as-is, booleans as
/// `true`/`false`, numbers in decimal, arrays and objects as JSON text, and
/// nulls are omitted. Decoding reverses that, except numbers which stay
/// strings until a typed accessor asks for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMessage {
    fields: BTreeMap<String, Value>,
}

impl StreamMessage {
    pub fn new(kind: EventKind, job_id: JobId) -> Self {
        Self::default()
            .with("event", kind.as_str())
            .with("job_id", job_id.as_uuid().to_string())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.fields.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn event_type(&self) -> Option<String> {
        self.get_str("event")
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Encodes the envelope, stamping `timestamp` when the producer did not.
    pub fn to_wire(&self) -> Vec<(String, String)> {
        let mut wire: Vec<(String, String)> = self
            .fields
            .iter()
            .filter_map(|(key, value)| encode_value(value).map(|v| (key.clone(), v)))
            .collect();
        if !self.fields.contains_key(TIMESTAMP_FIELD) {
            wire.push((
                TIMESTAMP_FIELD.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ));
        }
        wire
    }

    pub fn from_wire<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let fields = pairs
            .into_iter()
            .map(|(key, raw)| (key.into(), decode_value(raw.as_ref())))
            .collect();
        Self { fields }
    }
}

fn encode_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn decode_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        s if s.starts_with('{') || s.starts_with('[') => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
        }
        s => Value::String(s.to_string()),
    }
}

/// A message handed to one consumer of a group.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: MessageId,
    pub message: StreamMessage,
    /// How many times the group has handed this entry out, this one included.
    pub delivery_count: u64,
}

/// Snapshot of a group's pending-entry list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSummary {
    pub count: u64,
    pub oldest_id: Option<MessageId>,
    pub consumers: Vec<(String, u64)>,
}

/// Ordered, persistent message log with consumer groups.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(
        &self,
        stream: StreamName,
        message: &StreamMessage,
    ) -> Result<MessageId, EventBusError>;

    /// Creates the group at the start of the log. Existing groups are left alone.
    async fn ensure_group(&self, stream: StreamName, group: &str) -> Result<(), EventBusError>;

    /// Long-polls for up to `count` never-delivered entries, waiting at most `block`.
    async fn read_group(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, EventBusError>;

    async fn ack(
        &self,
        stream: StreamName,
        group: &str,
        id: &MessageId,
    ) -> Result<(), EventBusError>;

    /// Moves entries pending for at least `min_idle` to `consumer`.
    async fn claim_stale(
        &self,
        stream: StreamName,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, EventBusError>;

    async fn pending(&self, stream: StreamName, group: &str)
    -> Result<PendingSummary, EventBusError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("malformed entry: {0}")]
    Decode(String),
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form per-job options. Only a handful of keys influence the pipeline;
/// everything else is carried through to the workers untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSettings(Map<String, Value>);

impl JobSettings {
    pub const GLOSSARY_ID: &'static str = "glossary_id";
    pub const HUMAN_REVIEW: &'static str = "human_review";
    pub const DELIVERY_FORMATS: &'static str = "delivery_formats";
    pub const PRIVACY: &'static str = "privacy";

    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn glossary_id(&self) -> Option<Uuid> {
        self.0
            .get(Self::GLOSSARY_ID)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn human_review(&self) -> bool {
        match self.0.get(Self::HUMAN_REVIEW) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn delivery_formats(&self) -> Vec<String> {
        self.0
            .get(Self::DELIVERY_FORMATS)
            .and_then(Value::as_array)
            .map(|formats| {
                formats
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn privacy(&self) -> &str {
        self.0
            .get(Self::PRIVACY)
            .and_then(Value::as_str)
            .unwrap_or("allow_cloud")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Value> for JobSettings {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

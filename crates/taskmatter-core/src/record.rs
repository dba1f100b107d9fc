use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TITLE_KEY: &str = "title";
pub const IDENTIFIER_KEY: &str = "identifier";
pub const DONE_KEY: &str = "done";
pub const PLANNED_KEY: &str = "planned";
pub const DUE_KEY: &str = "due";
pub const PATH_KEY: &str = "path";

/// One task, as an open set of properties.
///
/// `title` and `identifier` are expected to be present; callers filter out
/// anything that lacks them before rendering. Missing values read back as
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(title: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::default()
            .with(TITLE_KEY, title.into())
            .with(IDENTIFIER_KEY, identifier.into())
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn title(&self) -> &str {
        self.get(TITLE_KEY).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        self.get(IDENTIFIER_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn path(&self) -> Option<&str> {
        self.get(PATH_KEY).and_then(Value::as_str)
    }

    pub fn is_done(&self) -> bool {
        self.get(DONE_KEY).is_some_and(is_truthy)
    }

    pub fn planned(&self) -> Option<String> {
        self.text_field(PLANNED_KEY)
    }

    pub fn due(&self) -> Option<String> {
        self.text_field(DUE_KEY)
    }

    /// `planned` when present, otherwise `due`.
    pub fn date_text(&self) -> Option<String> {
        self.planned().or_else(|| self.due())
    }

    fn text_field(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(num) => Some(num.to_string()),
            _ => None,
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

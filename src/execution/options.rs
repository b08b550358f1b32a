//! Per-call segment options.

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for each kind a call wants to enter, in the order they were given.
///
/// This is a list rather than a map, so naming the same kind twice is
/// possible and is rejected when the frame is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextOptions {
    entries: Vec<(String, Value)>,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add options for `kind`.
    pub fn with(mut self, kind: impl Into<String>, options: Value) -> Self {
        self.push(kind, options);
        self
    }

    /// Enter `kind` with empty options: a fresh child of whatever is active.
    pub fn enter(self, kind: impl Into<String>) -> Self {
        self.with(kind, Value::Object(Map::new()))
    }

    pub fn push(&mut self, kind: impl Into<String>, options: Value) {
        self.entries.push((kind.into(), options));
    }

    /// Build from a JSON object of `{ kind: options }`.
    pub fn from_json(value: &Value) -> Result<Self, ContextError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(map
                .iter()
                .map(|(kind, options)| (kind.clone(), options.clone()))
                .collect()),
            other => Err(ContextError::InvalidOptions {
                kind: "*".to_string(),
                reason: format!("expected an object keyed by kind, found {}", other),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == kind).map(|(_, v)| v)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for ContextOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

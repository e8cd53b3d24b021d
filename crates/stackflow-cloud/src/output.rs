//! Stack outputs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value exported by a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub value: serde_json::Value,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secret: bool,
}

impl std::fmt::Display for OutputValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.secret {
            return write!(f, "[secret]");
        }
        match &self.value {
            serde_json::Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Outputs of a stack, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs {
    values: BTreeMap<String, OutputValue>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OutputValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.values.get(name)
    }

    /// String output, or `None` when missing or not a string
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|o| o.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OutputValue)> {
        self.values.iter()
    }

    /// Plain JSON object of the outputs, with secrets masked
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values
            .iter()
            .map(|(k, v)| {
                let value = if v.secret {
                    serde_json::json!("[secret]")
                } else {
                    v.value.clone()
                };
                (k.clone(), value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

//! Stack configuration
//!
//! Configuration keys are namespaced (`"aws:region"`). The namespace selects
//! the provider that receives the value when the stack is refreshed or
//! updated; a key without a namespace belongs to the project itself.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secret: bool,
}

impl ConfigValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.secret {
            write!(f, "[secret]")
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Full configuration of a stack, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous value for the key
    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    /// Namespaces referenced by the configured keys
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self
            .entries
            .keys()
            .filter_map(|k| k.split_once(':').map(|(ns, _)| ns))
            .collect();
        namespaces.dedup();
        namespaces
    }

    /// View of the entries belonging to one namespace
    pub fn provider_config(&self, namespace: &str) -> ProviderConfig {
        let prefix = format!("{}:", namespace);
        let values = self
            .entries
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .map(|short| (short.to_string(), v.value.clone()))
            })
            .collect();

        ProviderConfig {
            namespace: namespace.to_string(),
            values,
        }
    }
}

impl std::fmt::Display for ConfigMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Qualify a configuration key with the project namespace when it has none
pub fn qualify_key(project: &str, key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(CloudError::InvalidConfig(
            "configuration key must not be empty".to_string(),
        ));
    }

    match key.split_once(':') {
        Some((ns, name)) if ns.is_empty() || name.is_empty() => Err(CloudError::InvalidConfig(
            format!("malformed configuration key: {}", key),
        )),
        Some(_) => Ok(key.to_string()),
        None => Ok(format!("{}:{}", project, key)),
    }
}

/// Parse a `KEY=VALUE` assignment
pub fn parse_assignment(s: &str) -> Result<(String, String)> {
    let (key, value) = s.split_once('=').ok_or_else(|| {
        CloudError::InvalidConfig(format!("expected KEY=VALUE, got: {}", s))
    })?;
    Ok((key.trim().to_string(), value.to_string()))
}

/// Configuration for a single provider namespace, with the prefix stripped
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub namespace: String,
    values: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "missing required configuration {}:{}",
                self.namespace, key
            ))
        })
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => parse_bool(v).map(Some).ok_or_else(|| {
                CloudError::InvalidConfig(format!(
                    "{}:{} must be true or false, got: {}",
                    self.namespace, key, v
                ))
            }),
        }
    }

    /// Deserialize a JSON-encoded value
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_str(v).map(Some).map_err(|e| {
                CloudError::InvalidConfig(format!("{}:{} is not valid JSON: {}", self.namespace, key, e))
            }),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

//! Project settings file (`stackflow.yaml`)
//!
//! ```yaml
//! name: bucket-daemon
//! backend: .stackflow
//! stacks:
//!   dev:
//!     config:
//!       aws:region: us-east-1
//!       aws:secretKey:
//!         value: test
//!         secret: true
//!       aws:endpoints:
//!         - s3: http://localhost:4566
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use stackflow_cloud::{qualify_key, ConfigMap, ConfigValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROJECT: &str = "bucket-daemon";
pub const DEFAULT_STACK: &str = "dev";
pub const DEFAULT_BACKEND_DIR: &str = ".stackflow";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// State directory, relative to the project file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<PathBuf>,

    #[serde(default)]
    pub stacks: BTreeMap<String, StackSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSettings {
    #[serde(default)]
    pub config: BTreeMap<String, SettingValue>,
}

/// A configuration entry as written in the project file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Secret {
        value: String,
        #[serde(default)]
        secret: bool,
    },
    Text(String),
    Bool(bool),
    Number(serde_yaml::Number),
    /// Lists and maps are passed on as JSON
    Structured(serde_yaml::Value),
}

impl SettingValue {
    pub fn to_config_value(&self, key: &str) -> Result<ConfigValue> {
        Ok(match self {
            SettingValue::Secret { value, secret } => ConfigValue {
                value: value.clone(),
                secret: *secret,
            },
            SettingValue::Text(s) => ConfigValue::plain(s.clone()),
            SettingValue::Bool(b) => ConfigValue::plain(b.to_string()),
            SettingValue::Number(n) => ConfigValue::plain(n.to_string()),
            SettingValue::Structured(v) => {
                let json = serde_json::to_string(v).map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                ConfigValue::plain(json)
            }
        })
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl Default for ProjectSettings {
    /// Local S3 emulator settings used when no project file exists
    fn default() -> Self {
        let config: BTreeMap<String, SettingValue> = [
            ("aws:region", "us-east-1"),
            ("aws:accessKey", "test"),
            ("aws:secretKey", "test"),
            ("aws:s3_force_path_style", "true"),
            ("aws:skipCredentialsValidation", "true"),
            ("aws:skipRequestingAccountId", "true"),
            ("aws:endpoints", r#"[{"s3": "http://localhost:4566"}]"#),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), SettingValue::from(v)))
        .collect();

        Self {
            name: DEFAULT_PROJECT.to_string(),
            description: Some("S3 bucket against a local emulator".to_string()),
            backend: None,
            stacks: BTreeMap::from([(DEFAULT_STACK.to_string(), StackSettings { config })]),
        }
    }
}

impl ProjectSettings {
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        let settings: ProjectSettings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "name".to_string(),
                reason: "project name must not be empty".to_string(),
            });
        }
        for (stack, settings) in &self.stacks {
            for key in settings.config.keys() {
                qualify_key(&self.name, key).map_err(|e| ConfigError::InvalidValue {
                    key: format!("stacks.{}.config.{}", stack, key),
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Configuration declared for `stack`, with keys qualified by the project name
    ///
    /// Stacks not mentioned in the file get an empty configuration.
    pub fn stack_config(&self, stack: &str) -> Result<ConfigMap> {
        let mut config = ConfigMap::new();
        if let Some(settings) = self.stacks.get(stack) {
            for (key, value) in &settings.config {
                let key = qualify_key(&self.name, key)?;
                let value = value.to_config_value(&key)?;
                config.set(key, value);
            }
        }
        Ok(config)
    }

    /// Backend directory declared by the file, resolved against `base`
    pub fn backend_dir(&self, base: &Path) -> Option<PathBuf> {
        self.backend.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                base.join(dir)
            }
        })
    }
}

//! Declarative resource definitions
//!
//! A [`Program`] describes the desired resources of a stack and the values it
//! exports. The engine runs it on every update and preview; the program never
//! talks to a provider itself.

use crate::config::ConfigMap;
use crate::error::{CloudError, Result};
use crate::output::{OutputValue, Outputs};
use crate::provider::{ResourceConfig, ResourceSet};
use crate::state::StackState;
use std::collections::BTreeMap;
use std::sync::Arc;

type ProgramFn = dyn Fn(&mut Context<'_>) -> Result<()> + Send + Sync;

/// Resource definition callback
#[derive(Clone)]
pub struct Program {
    run: Arc<ProgramFn>,
}

impl Program {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self { run: Arc::new(f) }
    }

    /// Evaluate the program against the current stack configuration
    pub fn evaluate(&self, project: &str, stack: &str, config: &ConfigMap) -> Result<ProgramResult> {
        let mut ctx = Context {
            project,
            stack,
            config,
            resources: ResourceSet::new(),
            exports: BTreeMap::new(),
        };
        (self.run)(&mut ctx)?;

        Ok(ProgramResult {
            resources: ctx.resources,
            exports: ctx.exports,
        })
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program").finish_non_exhaustive()
    }
}

/// Evaluation context handed to a program
pub struct Context<'a> {
    project: &'a str,
    stack: &'a str,
    config: &'a ConfigMap,
    resources: ResourceSet,
    exports: BTreeMap<String, Export>,
}

impl Context<'_> {
    pub fn project(&self) -> &str {
        self.project
    }

    pub fn stack(&self) -> &str {
        self.stack
    }

    /// Configuration value by key; keys without namespace refer to the project
    pub fn config(&self, key: &str) -> Option<&str> {
        let qualified = if key.contains(':') {
            key.to_string()
        } else {
            format!("{}:{}", self.project, key)
        };
        self.config.get(&qualified).map(|v| v.value.as_str())
    }

    /// Declare a resource
    pub fn register(&mut self, resource: ResourceConfig) -> Result<ResourceRef> {
        let reference = ResourceRef {
            state_key: resource.state_key(),
        };
        let key = resource.key();
        if !self.resources.add(resource) {
            return Err(CloudError::ProgramError(format!(
                "resource {} declared twice",
                key
            )));
        }
        Ok(reference)
    }

    /// Export a named value
    pub fn export(&mut self, name: impl Into<String>, value: impl Into<Export>) {
        self.exports.insert(name.into(), value.into());
    }
}

/// Handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    state_key: String,
}

impl ResourceRef {
    /// An attribute of the resource, known once it has been created
    pub fn attribute(&self, name: impl Into<String>) -> Export {
        Export::Attribute {
            resource: self.state_key.clone(),
            attribute: name.into(),
        }
    }
}

/// Value of an exported output
#[derive(Debug, Clone, PartialEq)]
pub enum Export {
    Value(serde_json::Value),
    Secret(serde_json::Value),
    Attribute { resource: String, attribute: String },
}

impl From<&str> for Export {
    fn from(s: &str) -> Self {
        Export::Value(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Export {
    fn from(s: String) -> Self {
        Export::Value(serde_json::Value::String(s))
    }
}

impl From<serde_json::Value> for Export {
    fn from(v: serde_json::Value) -> Self {
        Export::Value(v)
    }
}

/// Desired resources and exports produced by a program run
#[derive(Debug, Clone, Default)]
pub struct ProgramResult {
    pub resources: ResourceSet,
    pub exports: BTreeMap<String, Export>,
}

impl ProgramResult {
    /// Resolve exports against the recorded resource state
    pub fn resolve_outputs(&self, state: &StackState) -> Result<Outputs> {
        let mut outputs = Outputs::new();
        for (name, export) in &self.exports {
            let value = match export {
                Export::Value(v) => OutputValue {
                    value: v.clone(),
                    secret: false,
                },
                Export::Secret(v) => OutputValue {
                    value: v.clone(),
                    secret: true,
                },
                Export::Attribute {
                    resource,
                    attribute,
                } => {
                    let value = state
                        .get_resource(resource)
                        .and_then(|r| r.attributes.get(attribute))
                        .cloned()
                        .ok_or_else(|| {
                            CloudError::ProgramError(format!(
                                "output {} refers to {}.{}, which is not known",
                                name, resource, attribute
                            ))
                        })?;
                    OutputValue {
                        value,
                        secret: false,
                    }
                }
            };
            outputs.insert(name.clone(), value);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::state::{ResourceState, StackId};
    use serde_json::json;

    fn bucket_program() -> Program {
        Program::new(|ctx| {
            let bucket = ctx.register(ResourceConfig::new("s3-bucket", "demo", "aws", json!({})))?;
            ctx.export("bucketName", bucket.attribute("bucket"));
            let stack = ctx.stack().to_string();
            ctx.export("stack", stack);
            Ok(())
        })
    }

    #[test]
    fn test_evaluate_collects_resources_and_exports() {
        let result = bucket_program()
            .evaluate("bucket-daemon", "dev", &ConfigMap::new())
            .unwrap();

        assert_eq!(result.resources.len(), 1);
        assert!(result.resources.get("s3-bucket", "demo").is_some());
        assert_eq!(
            result.exports.get("bucketName"),
            Some(&Export::Attribute {
                resource: "aws:s3-bucket:demo".to_string(),
                attribute: "bucket".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let program = Program::new(|ctx| {
            ctx.register(ResourceConfig::new("s3-bucket", "demo", "aws", json!({})))?;
            ctx.register(ResourceConfig::new("s3-bucket", "demo", "aws", json!({})))?;
            Ok(())
        });
        let err = program.evaluate("p", "dev", &ConfigMap::new()).unwrap_err();
        assert!(matches!(err, CloudError::ProgramError(_)));
    }

    #[test]
    fn test_context_config_lookup() {
        let mut config = ConfigMap::new();
        config.set("p:prefix", ConfigValue::plain("logs"));
        config.set("aws:region", ConfigValue::plain("us-east-1"));

        let program = Program::new(|ctx| {
            assert_eq!(ctx.config("prefix"), Some("logs"));
            assert_eq!(ctx.config("aws:region"), Some("us-east-1"));
            assert_eq!(ctx.config("missing"), None);
            Ok(())
        });
        program.evaluate("p", "dev", &config).unwrap();
    }

    #[test]
    fn test_resolve_outputs() {
        let result = bucket_program()
            .evaluate("bucket-daemon", "dev", &ConfigMap::new())
            .unwrap();
        let id = StackId::new("bucket-daemon", "dev").unwrap();
        let mut state = StackState::new(&id);

        assert!(result.resolve_outputs(&state).is_err());

        state.set_resource(
            "aws:s3-bucket:demo".to_string(),
            ResourceState::new("demo-1a2b3c4", "s3-bucket")
                .with_attribute("bucket", json!("demo-1a2b3c4")),
        );
        let outputs = result.resolve_outputs(&state).unwrap();
        assert_eq!(outputs.get_string("bucketName"), Some("demo-1a2b3c4"));
        assert_eq!(outputs.get_string("stack"), Some("dev"));
    }
}

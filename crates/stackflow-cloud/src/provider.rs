//! Cloud provider trait definition

use crate::action::Plan;
use crate::config::{ConfigMap, ProviderConfig};
use crate::error::{CloudError, Result};
use crate::state::{ProviderState, ResourceState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cloud provider abstraction trait
///
/// A provider owns the resources of one configuration namespace (e.g. `aws`)
/// and performs the create/read/update/delete calls for them. Diffing is
/// shared through [`CloudProvider::plan`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name, which is also its configuration namespace
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Read the live state of a recorded resource
    ///
    /// Returns `Ok(None)` when the resource no longer exists.
    async fn read(&self, current: &ResourceState) -> Result<Option<ResourceState>>;

    /// Create a resource
    async fn create(&self, desired: &ResourceConfig) -> Result<ResourceState>;

    /// Bring an existing resource in line with its desired configuration
    async fn update(&self, desired: &ResourceConfig, current: &ResourceState)
    -> Result<ResourceState>;

    /// Delete a resource
    async fn delete(&self, current: &ResourceState) -> Result<()>;

    /// Calculate the diff between desired and current state
    fn plan(&self, desired: &ResourceSet, current: &ProviderState) -> Plan {
        Plan::diff(self.name(), desired, current)
    }
}

/// Builds a configured provider from its namespace of the stack configuration
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Configuration namespace served by the providers this factory builds
    fn namespace(&self) -> &str;

    async fn configure(&self, config: ProviderConfig) -> Result<Arc<dyn CloudProvider>>;
}

/// Provider factories indexed by namespace
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.namespace().to_string(), factory);
    }

    pub fn with(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the provider for `namespace` from the current stack configuration
    ///
    /// The provider must report itself authenticated before it is handed out.
    pub async fn provider(
        &self,
        namespace: &str,
        config: &ConfigMap,
    ) -> Result<Arc<dyn CloudProvider>> {
        let factory = self
            .factories
            .get(namespace)
            .ok_or_else(|| CloudError::ProviderNotFound(namespace.to_string()))?;

        tracing::debug!("Configuring provider {}", namespace);
        let provider = factory.configure(config.provider_config(namespace)).await?;

        let auth = provider.check_auth().await?;
        if !auth.authenticated {
            return Err(CloudError::AuthenticationFailed(format!(
                "{}: {}",
                provider.display_name(),
                auth.error.unwrap_or_else(|| "not authenticated".to_string())
            )));
        }
        if let Some(account) = &auth.account_info {
            tracing::debug!("{} authenticated as {}", provider.display_name(), account);
        }
        Ok(provider)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Set of resources to be managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Resources indexed by type and ID
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource; returns false if one with the same key was already present
    pub fn add(&mut self, resource: ResourceConfig) -> bool {
        self.resources.insert(resource.key(), resource).is_none()
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&ResourceConfig> {
        let key = format!("{}:{}", resource_type, id);
        self.resources.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn by_provider(&self, provider: &str) -> ResourceSet {
        ResourceSet {
            resources: self
                .resources
                .iter()
                .filter(|(_, r)| r.provider == provider)
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect(),
        }
    }

    /// Providers referenced by the set, sorted
    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.resources.values().map(|r| r.provider.as_str()).collect();
        providers.sort_unstable();
        providers.dedup();
        providers
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "s3-bucket")
    pub resource_type: String,

    /// Logical resource identifier, unique per type within a stack
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
        }
    }

    /// Get the resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get the key under which the stack state records this resource
    pub fn state_key(&self) -> String {
        format!("{}:{}", self.provider, self.key())
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

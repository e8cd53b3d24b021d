//! In-memory provider for tests
//!
//! [`MemoryCloud`] stands in for real infrastructure: buckets created through
//! [`MemoryProvider`] live in a shared map that tests can inspect and tamper
//! with to simulate out-of-band changes.

use crate::config::ProviderConfig;
use crate::error::{CloudError, Result};
use crate::program::Program;
use crate::provider::{AuthStatus, CloudProvider, ProviderFactory, ResourceConfig};
use crate::state::{ResourceState, ResourceStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Call counters of a [`MemoryCloud`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub creates: usize,
    pub reads: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
struct CloudInner {
    buckets: HashMap<String, HashMap<String, serde_json::Value>>,
    stats: CallStats,
    next_suffix: u32,
    fail_reads: bool,
    fail_creates: bool,
}

/// Shared fake infrastructure
#[derive(Debug, Clone, Default)]
pub struct MemoryCloud {
    inner: Arc<Mutex<CloudInner>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut CloudInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut inner)
    }

    pub fn stats(&self) -> CallStats {
        self.with(|c| c.stats)
    }

    pub fn len(&self) -> usize {
        self.with(|c| c.buckets.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.with(|c| c.buckets.contains_key(name))
    }

    /// Delete a bucket behind the engine's back
    pub fn remove(&self, name: &str) {
        self.with(|c| c.buckets.remove(name));
    }

    /// Change a bucket attribute behind the engine's back
    pub fn set_attribute(&self, name: &str, key: &str, value: serde_json::Value) {
        self.with(|c| {
            if let Some(bucket) = c.buckets.get_mut(name) {
                bucket.insert(key.to_string(), value);
            }
        });
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with(|c| c.fail_reads = fail);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.with(|c| c.fail_creates = fail);
    }
}

/// Builds [`MemoryProvider`]s sharing one [`MemoryCloud`]
#[derive(Debug, Clone)]
pub struct MemoryProviderFactory {
    namespace: String,
    cloud: MemoryCloud,
}

impl MemoryProviderFactory {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_cloud(namespace, MemoryCloud::new())
    }

    pub fn with_cloud(namespace: impl Into<String>, cloud: MemoryCloud) -> Self {
        Self {
            namespace: namespace.into(),
            cloud,
        }
    }
}

#[async_trait]
impl ProviderFactory for MemoryProviderFactory {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn configure(&self, config: ProviderConfig) -> Result<Arc<dyn CloudProvider>> {
        let region = config.get("region").unwrap_or("us-east-1").to_string();
        Ok(Arc::new(MemoryProvider {
            name: self.namespace.clone(),
            region,
            cloud: self.cloud.clone(),
        }))
    }
}

/// Provider storing buckets in a [`MemoryCloud`]
#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    region: String,
    cloud: MemoryCloud,
}

impl MemoryProvider {
    fn to_state(&self, name: &str, resource_type: &str, attributes: &HashMap<String, serde_json::Value>) -> ResourceState {
        let mut state = ResourceState::new(name, resource_type).with_status(ResourceStatus::Ready);
        state.attributes = attributes.clone();
        state
    }
}

#[async_trait]
impl CloudProvider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        "In-memory"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok("memory"))
    }

    async fn read(&self, current: &ResourceState) -> Result<Option<ResourceState>> {
        self.cloud.with(|c| {
            c.stats.reads += 1;
            if c.fail_reads {
                return Err(CloudError::ApiError("read failed".to_string()));
            }
            Ok(c.buckets
                .get(&current.id)
                .map(|attrs| self.to_state(&current.id, &current.resource_type, attrs)))
        })
    }

    async fn create(&self, desired: &ResourceConfig) -> Result<ResourceState> {
        self.cloud.with(|c| {
            c.stats.creates += 1;
            if c.fail_creates {
                return Err(CloudError::ApiError("create failed".to_string()));
            }
            c.next_suffix += 1;
            let name = desired
                .get_config::<String>("bucket")
                .unwrap_or_else(|| format!("{}-{:07x}", desired.id, c.next_suffix));
            let attrs: HashMap<String, serde_json::Value> = [
                ("bucket".to_string(), serde_json::json!(name)),
                ("region".to_string(), serde_json::json!(self.region)),
            ]
            .into_iter()
            .collect();
            let state = self.to_state(&name, &desired.resource_type, &attrs);
            c.buckets.insert(name, attrs);
            Ok(state)
        })
    }

    async fn update(&self, desired: &ResourceConfig, current: &ResourceState) -> Result<ResourceState> {
        self.cloud.with(|c| {
            c.stats.updates += 1;
            let attrs = c
                .buckets
                .get(&current.id)
                .cloned()
                .ok_or_else(|| CloudError::ResourceNotFound(current.id.clone()))?;
            Ok(self.to_state(&current.id, &desired.resource_type, &attrs))
        })
    }

    async fn delete(&self, current: &ResourceState) -> Result<()> {
        self.cloud.with(|c| {
            c.stats.deletes += 1;
            c.buckets.remove(&current.id);
        });
        Ok(())
    }
}

/// Program declaring one bucket and exporting its name as `bucketName`
pub fn bucket_program() -> Program {
    Program::new(|ctx| {
        let bucket = ctx.register(ResourceConfig::new(
            "s3-bucket",
            "demo",
            "aws",
            serde_json::json!({}),
        ))?;
        ctx.export("bucketName", bucket.attribute("bucket"));
        Ok(())
    })
}

//! State management for stacks
//!
//! Each stack is persisted as one JSON document holding its configuration,
//! the recorded state of its resources and the outputs of the last update.
//! The file backend keeps them under `<root>/stacks/<project>/<stack>.json`.

use crate::config::ConfigMap;
use crate::error::{CloudError, Result};
use crate::output::Outputs;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STACKS_DIR: &str = "stacks";
const STATE_EXT: &str = "json";
const BACKUP_EXT: &str = "json.backup";
const LOCK_EXT: &str = "lock";
const STALE_LOCK_HOURS: i64 = 1;
const MAX_STACK_NAME_LEN: usize = 100;

/// Identifies a stack within a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId {
    pub project: String,
    pub stack: String,
}

impl StackId {
    /// Build a stack identifier, validating both names
    ///
    /// Names end up as path components of the file backend, so they are
    /// limited to ASCII alphanumerics, `-`, `_` and `.`.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Result<Self> {
        let id = Self {
            project: project.into(),
            stack: stack.into(),
        };
        validate_name("project", &id.project)?;
        validate_name("stack", &id.stack)?;
        Ok(id)
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.stack)
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_STACK_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CloudError::InvalidStackName(format!(
            "{} name '{}' must be 1-{} characters of [A-Za-z0-9._-] and not start with '.'",
            kind, name, MAX_STACK_NAME_LEN
        )))
    }
}

/// Kind of operation recorded in a stack's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Refresh,
    Update,
    Destroy,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Refresh => write!(f, "refresh"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// Summary of a completed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub kind: OperationKind,

    pub started_at: DateTime<Utc>,

    pub ended_at: DateTime<Utc>,

    /// Number of resources per change kind ("create", "same", "deleted", ...)
    pub resource_changes: BTreeMap<String, usize>,
}

impl UpdateSummary {
    pub fn new(kind: OperationKind, started_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            started_at,
            ended_at: Utc::now(),
            resource_changes: BTreeMap::new(),
        }
    }

    pub fn with_change(mut self, change: &str, count: usize) -> Self {
        if count > 0 {
            self.resource_changes.insert(change.to_string(), count);
        }
        self
    }

    pub fn change_count(&self, change: &str) -> usize {
        self.resource_changes.get(change).copied().unwrap_or(0)
    }
}

/// Persisted state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    pub project: String,

    pub stack: String,

    pub created_at: DateTime<Utc>,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub config: ConfigMap,

    /// Resources indexed by provider:type:id
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,

    #[serde(default)]
    pub outputs: Outputs,

    #[serde(default)]
    pub last_operation: Option<UpdateSummary>,
}

impl StackState {
    pub fn new(id: &StackId) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            project: id.project.clone(),
            stack: id.stack.clone(),
            created_at: now,
            updated_at: now,
            config: ConfigMap::new(),
            resources: BTreeMap::new(),
            outputs: Outputs::new(),
            last_operation: None,
        }
    }

    pub fn id(&self) -> StackId {
        StackId {
            project: self.project.clone(),
            stack: self.stack.clone(),
        }
    }

    /// Resources of one provider, keyed by type:id
    pub fn provider_state(&self, provider: &str) -> ProviderState {
        let prefix = format!("{}:", provider);
        let mut state = ProviderState::new();
        for (key, resource) in &self.resources {
            if let Some(short) = key.strip_prefix(&prefix) {
                state.add(short.to_string(), resource.clone());
            }
        }
        state
    }

    /// Providers owning at least one recorded resource, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = self
            .resources
            .keys()
            .filter_map(|k| k.split_once(':').map(|(p, _)| p.to_string()))
            .collect();
        providers.dedup();
        providers
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.touch();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.touch();
        }
        result
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// State for a single provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderState {
    /// Resources managed by this provider
    pub resources: HashMap<String, ResourceState>,
}

impl ProviderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: String, state: ResourceState) {
        self.resources.insert(id, state);
    }

    pub fn get(&self, id: &str) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ResourceState> {
        self.resources.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources.iter()
    }
}

/// State of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Desired configuration the resource was last created or updated with
    #[serde(default)]
    pub inputs: serde_json::Value,

    /// Resource attributes (name, ARN, URL, etc.)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            inputs: serde_json::Value::Null,
            attributes: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether the observable parts of two states differ
    pub fn drifted_from(&self, other: &ResourceState) -> bool {
        self.id != other.id || self.status != other.status || self.attributes != other.attributes
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource exists and is usable
    Ready,
    /// Resource is being deleted
    Deleting,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Storage for stack state
///
/// `load` fails with [`CloudError::StackNotFound`] for unknown stacks and
/// `create` fails with [`CloudError::StackAlreadyExists`] when the stack is
/// already present; creation must be atomic with respect to other writers.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Human readable location of the backend
    fn describe(&self) -> String;

    async fn load(&self, id: &StackId) -> Result<StackState>;

    async fn create(&self, state: &StackState) -> Result<()>;

    async fn save(&self, state: &StackState) -> Result<()>;

    async fn remove(&self, id: &StackId) -> Result<()>;

    /// Stack names of a project, sorted
    async fn list(&self, project: &str) -> Result<Vec<String>>;

    /// Acquire exclusive access to a stack
    async fn lock(&self, id: &StackId) -> Result<StateLock>;
}

/// File based state backend
pub struct StateManager {
    /// Backend root directory
    root: PathBuf,
}

impl StateManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the directory holding a project's stacks
    fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(STACKS_DIR).join(project)
    }

    /// Get the state file path
    fn state_path(&self, id: &StackId) -> PathBuf {
        self.project_dir(&id.project)
            .join(format!("{}.{}", id.stack, STATE_EXT))
    }

    /// Get the backup file path
    fn backup_path(&self, id: &StackId) -> PathBuf {
        self.project_dir(&id.project)
            .join(format!("{}.{}", id.stack, BACKUP_EXT))
    }

    /// Get the lock file path
    fn lock_path(&self, id: &StackId) -> PathBuf {
        self.project_dir(&id.project)
            .join(format!("{}.{}", id.stack, LOCK_EXT))
    }

    /// Ensure the project directory exists
    async fn ensure_project_dir(&self, project: &str) -> Result<()> {
        let dir = self.project_dir(project);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    async fn try_create_lock(&self, lock_path: &Path) -> Result<bool> {
        let lock_info = LockInfo {
            holder: lock_holder(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
            .await
        {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(content.as_bytes()).await?;
                file.flush().await?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StateBackend for StateManager {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    /// Load the current state
    async fn load(&self, id: &StackId) -> Result<StackState> {
        let path = self.state_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CloudError::StackNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let state: StackState = serde_json::from_str(&content)?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state of {} with {} resources", id, state.resources.len());
        Ok(state)
    }

    /// Publish a new stack file
    ///
    /// The document is written to a private temp file and then hard linked
    /// into place, so the stack file either does not exist or is complete.
    async fn create(&self, state: &StackState) -> Result<()> {
        let id = state.id();
        self.ensure_project_dir(&id.project).await?;

        let path = self.state_path(&id);
        let tmp = path.with_extension(format!("{}.{}.tmp", STATE_EXT, uuid::Uuid::new_v4().simple()));

        let content = serde_json::to_string_pretty(state)?;
        let published = match fs::write(&tmp, content).await {
            Ok(()) => fs::hard_link(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = fs::remove_file(&tmp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", tmp.display(), e);
            }
        }

        match published {
            Ok(()) => {
                tracing::debug!("Created stack state for {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CloudError::StackAlreadyExists(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save the state
    async fn save(&self, state: &StackState) -> Result<()> {
        let id = state.id();
        self.ensure_project_dir(&id.project).await?;

        let path = self.state_path(&id);
        let backup = self.backup_path(&id);
        let tmp = path.with_extension("json.tmp");

        // Keep the previous version around
        if path.exists() {
            fs::copy(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved state of {} with {} resources", id, state.resources.len());
        Ok(())
    }

    async fn remove(&self, id: &StackId) -> Result<()> {
        match fs::remove_file(self.state_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CloudError::StackNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let backup = self.backup_path(id);
        if backup.exists() {
            fs::remove_file(&backup).await?;
        }

        tracing::debug!("Removed stack state for {}", id);
        Ok(())
    }

    async fn list(&self, project: &str) -> Result<Vec<String>> {
        let dir = self.project_dir(project);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{}", STATE_EXT);
        let mut stacks = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(stack) = name.to_str().and_then(|n| n.strip_suffix(&suffix)) {
                stacks.push(stack.to_string());
            }
        }
        stacks.sort();
        Ok(stacks)
    }

    /// Acquire a lock for exclusive access
    async fn lock(&self, id: &StackId) -> Result<StateLock> {
        self.ensure_project_dir(&id.project).await?;

        let lock_path = self.lock_path(id);

        if !self.try_create_lock(&lock_path).await? {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Check if lock is stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "Stack {} is locked by {} since {}",
                    id, lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
            fs::remove_file(&lock_path).await?;

            if !self.try_create_lock(&lock_path).await? {
                return Err(CloudError::LockError(format!(
                    "Stack {} was locked by another process while removing a stale lock",
                    id
                )));
            }
        }

        tracing::debug!("Acquired state lock for {}", id);
        Ok(StateLock::new(move || {
            if lock_path.exists() {
                let _ = std::fs::remove_file(&lock_path);
                tracing::debug!("Released state lock");
            }
        }))
    }
}

fn lock_holder() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{} (pid {})", host, std::process::id())
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for a stack lock
pub struct StateLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StateLock {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the lock
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for StateLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// In-memory state backend
///
/// State lives as long as the backend (and its clones) do.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    stacks: Arc<Mutex<HashMap<StackId, StackState>>>,
    locks: Arc<Mutex<HashSet<StackId>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn stacks(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StackId, StackState>>> {
        self.stacks
            .lock()
            .map_err(|_| CloudError::StateError("memory backend poisoned".to_string()))
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn load(&self, id: &StackId) -> Result<StackState> {
        self.stacks()?
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::StackNotFound(id.to_string()))
    }

    async fn create(&self, state: &StackState) -> Result<()> {
        let mut stacks = self.stacks()?;
        let id = state.id();
        if stacks.contains_key(&id) {
            return Err(CloudError::StackAlreadyExists(id.to_string()));
        }
        stacks.insert(id, state.clone());
        Ok(())
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        self.stacks()?.insert(state.id(), state.clone());
        Ok(())
    }

    async fn remove(&self, id: &StackId) -> Result<()> {
        self.stacks()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CloudError::StackNotFound(id.to_string()))
    }

    async fn list(&self, project: &str) -> Result<Vec<String>> {
        let mut stacks: Vec<String> = self
            .stacks()?
            .keys()
            .filter(|id| id.project == project)
            .map(|id| id.stack.clone())
            .collect();
        stacks.sort();
        Ok(stacks)
    }

    async fn lock(&self, id: &StackId) -> Result<StateLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| CloudError::StateError("memory backend poisoned".to_string()))?;
        if !locks.insert(id.clone()) {
            return Err(CloudError::LockError(format!("Stack {} is locked", id)));
        }

        let locks = Arc::clone(&self.locks);
        let id = id.clone();
        Ok(StateLock::new(move || {
            if let Ok(mut locks) = locks.lock() {
                locks.remove(&id);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use tempfile::tempdir;

    fn dev() -> StackId {
        StackId::new("bucket-daemon", "dev").unwrap()
    }

    #[test]
    fn test_stack_id_validation() {
        assert!(StackId::new("p", "dev").is_ok());
        assert!(StackId::new("p", "feature_1.2-x").is_ok());
        assert!(StackId::new("p", "").is_err());
        assert!(StackId::new("p", "../etc").is_err());
        assert!(StackId::new("p", ".hidden").is_err());
        assert!(StackId::new("p/q", "dev").is_err());
        assert!(StackId::new("p", "a".repeat(101)).is_err());
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = StackState::new(&dev());
        state.config.set("aws:region", ConfigValue::plain("us-east-1"));
        state.set_resource(
            "aws:s3-bucket:demo".to_string(),
            ResourceState::new("demo-1a2b3c4", "s3-bucket")
                .with_status(ResourceStatus::Ready)
                .with_attribute("bucket", serde_json::json!("demo-1a2b3c4")),
        );

        manager.create(&state).await.unwrap();
        manager.save(&state).await.unwrap();

        let loaded = manager.load(&dev()).await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert!(loaded.resources.contains_key("aws:s3-bucket:demo"));
        assert_eq!(loaded.config.get("aws:region").unwrap().value, "us-east-1");
        assert_eq!(loaded.provider_state("aws").resources.len(), 1);
        assert!(loaded.provider_state("aws").get("s3-bucket:demo").is_some());
        assert_eq!(loaded.providers(), vec!["aws".to_string()]);
        assert!(temp_dir
            .path()
            .join("stacks/bucket-daemon/dev.json.backup")
            .exists());
    }

    #[tokio::test]
    async fn test_missing_stack_is_not_found() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let err = manager.load(&dev()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(manager.remove(&dev()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.create(&StackState::new(&dev())).await.unwrap();
        let err = manager.create(&StackState::new(&dev())).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_publishes_complete_file() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let dir = temp_dir.path().join("stacks/bucket-daemon");

        let mut state = StackState::new(&dev());
        state.config.set("aws:region", ConfigValue::plain("us-east-1"));
        manager.create(&state).await.unwrap();

        let mut losing = StackState::new(&dev());
        losing.config.set("aws:region", ConfigValue::plain("eu-west-1"));
        assert!(manager.create(&losing).await.unwrap_err().is_conflict());

        // The winner's document is intact and no temp files are left over
        let loaded = manager.load(&dev()).await.unwrap();
        assert_eq!(loaded.config.get("aws:region").unwrap().value, "us-east-1");
        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["dev.json".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let temp_dir = tempdir().unwrap();
        let manager = Arc::new(StateManager::new(temp_dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.create(&StackState::new(&dev())).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => created += 1,
                Err(e) => assert!(e.is_conflict(), "unexpected error: {}", e),
            }
        }
        assert_eq!(created, 1);
        assert!(manager.load(&dev()).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        for name in ["prod", "dev"] {
            let id = StackId::new("bucket-daemon", name).unwrap();
            manager.create(&StackState::new(&id)).await.unwrap();
        }
        manager.save(&StackState::new(&dev())).await.unwrap();

        assert_eq!(manager.list("bucket-daemon").await.unwrap(), vec!["dev", "prod"]);
        assert!(manager.list("other").await.unwrap().is_empty());

        manager.remove(&dev()).await.unwrap();
        assert_eq!(manager.list("bucket-daemon").await.unwrap(), vec!["prod"]);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.lock(&dev()).await.unwrap();
        let err = manager.lock(&dev()).await.unwrap_err();
        assert!(matches!(err, CloudError::LockError(_)));

        lock.release();
        let again = manager.lock(&dev()).await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join("stacks/bucket-daemon/dev.lock").exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let dir = temp_dir.path().join("stacks/bucket-daemon");
        std::fs::create_dir_all(&dir).unwrap();

        let stale = LockInfo {
            holder: "old-host".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(dir.join("dev.lock"), serde_json::to_string(&stale).unwrap()).unwrap();

        assert!(manager.lock(&dev()).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = MemoryBackend::new();
        assert!(backend.load(&dev()).await.unwrap_err().is_not_found());

        backend.create(&StackState::new(&dev())).await.unwrap();
        assert!(backend.create(&StackState::new(&dev())).await.unwrap_err().is_conflict());
        assert_eq!(backend.list("bucket-daemon").await.unwrap(), vec!["dev"]);

        let lock = backend.lock(&dev()).await.unwrap();
        assert!(backend.lock(&dev()).await.is_err());
        drop(lock);
        assert!(backend.lock(&dev()).await.is_ok());
    }

    #[test]
    fn test_update_summary_counts() {
        let summary = UpdateSummary::new(OperationKind::Update, Utc::now())
            .with_change("create", 1)
            .with_change("update", 0);
        assert_eq!(summary.change_count("create"), 1);
        assert_eq!(summary.change_count("update"), 0);
        assert!(!summary.resource_changes.contains_key("update"));
    }
}

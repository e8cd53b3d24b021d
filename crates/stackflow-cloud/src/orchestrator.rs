//! Stack lifecycle orchestration
//!
//! [`deploy`] runs one complete pass over a stack:
//!
//! ```text
//! select-or-create ─▶ configure ─▶ read config ─▶ refresh ─▶ update ─▶ outputs
//! ```
//!
//! Each step finishes before the next one starts and the first failure ends
//! the run. Nothing is retried and nothing is rolled back.

use crate::config::{qualify_key, ConfigMap, ConfigValue};
use crate::error::CloudError;
use crate::program::Program;
use crate::progress::ProgressSink;
use crate::stack::{RefreshResult, UpResult};
use crate::workspace::{AcquireError, Acquisition, Workspace};
use thiserror::Error;

/// Exit status for a successful run
pub const EXIT_OK: i32 = 0;
/// Exit status when refresh or update fails, or the run is cancelled
pub const EXIT_OPERATION_FAILED: i32 = 1;
/// Exit status when the stack could not be acquired
pub const EXIT_ACQUISITION_FAILED: i32 = 2;

/// What to deploy
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub stack: String,

    /// Configuration applied before refresh, in order
    pub config: Vec<(String, ConfigValue)>,

    /// Fallback values, written only for keys the stack does not have yet
    pub defaults: Vec<(String, ConfigValue)>,
}

impl DeployRequest {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            config: Vec::new(),
            defaults: Vec::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.config.push((key.into(), value));
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.defaults.push((key.into(), value));
        self
    }
}

/// How the stack was acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredVia {
    Selected,
    Created,
}

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub acquired: AcquiredVia,
    /// Configuration as read back after configuring; `None` if it could not be read
    pub config: Option<ConfigMap>,
    pub refresh: RefreshResult,
    pub update: UpResult,
}

/// Classified failure of a run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Error selecting stack: {0}")]
    Selection(CloudError),

    #[error("Error creating stack: {0}")]
    Creation(CloudError),

    #[error("Stack was created by another process: {0}")]
    RaceLost(CloudError),

    #[error("Failed to refresh stack: {0}")]
    Refresh(CloudError),

    #[error("Failed to update stack: {0}")]
    Update(CloudError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DeployError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::Selection(_) | DeployError::Creation(_) | DeployError::RaceLost(_) => {
                EXIT_ACQUISITION_FAILED
            }
            DeployError::Refresh(_) | DeployError::Update(_) | DeployError::Cancelled => {
                EXIT_OPERATION_FAILED
            }
        }
    }
}

impl From<AcquireError> for DeployError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Selection(e) => DeployError::Selection(e),
            AcquireError::Creation(e) => DeployError::Creation(e),
        }
    }
}

/// Acquire, configure, refresh and update a stack
///
/// Step diagnostics and the update's progress go to `progress`.
pub async fn deploy(
    workspace: &Workspace,
    request: &DeployRequest,
    program: Program,
    progress: &mut dyn ProgressSink,
) -> Result<DeployReport, DeployError> {
    let (mut stack, acquired) = match workspace.select_or_create(&request.stack, program).await? {
        Acquisition::Selected(stack) => (stack, AcquiredVia::Selected),
        Acquisition::Created(stack) => {
            progress.emit(&format!("Created stack {:?}", request.stack));
            (stack, AcquiredVia::Created)
        }
        Acquisition::RaceLost(e) => return Err(DeployError::RaceLost(e)),
    };
    progress.emit(&format!("Selected stack {:?}", request.stack));

    let mut entries = Vec::new();
    if !request.defaults.is_empty() {
        match stack.get_all_config().await {
            Ok(current) => entries.extend(
                request
                    .defaults
                    .iter()
                    .filter(|(key, _)| {
                        qualify_key(stack.project(), key)
                            .map(|key| current.get(&key).is_none())
                            .unwrap_or(true)
                    })
                    .cloned(),
            ),
            Err(e) => {
                tracing::warn!("Failed to read configuration of {}: {}", stack.id(), e);
                progress.emit(&format!("Failed to read config: {}", e));
            }
        }
    }
    entries.extend(request.config.iter().cloned());

    if !entries.is_empty() {
        match stack.set_all_config(entries).await {
            Ok(rejected) => {
                for (key, e) in rejected {
                    tracing::warn!("Skipped config {:?} on {}: {}", key, stack.id(), e);
                    progress.emit(&format!("Failed to set config {}: {}", key, e));
                }
            }
            Err(e) => {
                tracing::warn!("Failed to apply configuration to {}: {}", stack.id(), e);
                progress.emit(&format!("Failed to set config: {}", e));
            }
        }
    }

    let config = match stack.get_all_config().await {
        Ok(config) => {
            progress.emit(&format!("Config: {}", config));
            Some(config)
        }
        Err(e) => {
            tracing::warn!("Failed to read configuration of {}: {}", stack.id(), e);
            progress.emit(&format!("Failed to read config: {}", e));
            None
        }
    };
    progress.emit("Stack configured");

    progress.emit("Starting refresh");
    let refresh = stack.refresh(progress).await.map_err(DeployError::Refresh)?;
    progress.emit("Refresh succeeded!");

    progress.emit("Starting update");
    let update = stack.up(progress).await.map_err(DeployError::Update)?;
    progress.emit("Update succeeded!");

    Ok(DeployReport {
        acquired,
        config,
        refresh,
        update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{BufferSink, NullSink};
    use crate::provider::ProviderRegistry;
    use crate::state::{MemoryBackend, StackId, StackState, StateBackend, StateLock, StateManager};
    use crate::testing::{bucket_program, MemoryCloud, MemoryProviderFactory};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn localstack_request() -> DeployRequest {
        DeployRequest::new("dev")
            .with_config("aws:region", ConfigValue::plain("us-east-1"))
            .with_config("aws:accessKey", ConfigValue::plain("test"))
            .with_config("aws:secretKey", ConfigValue::plain("test"))
    }

    fn workspace(backend: Arc<dyn StateBackend>, cloud: &MemoryCloud) -> Workspace {
        Workspace::new(
            "bucket-daemon",
            backend,
            ProviderRegistry::new().with(Arc::new(MemoryProviderFactory::with_cloud("aws", cloud.clone()))),
        )
    }

    /// Backend where selection never finds the stack and creation always
    /// loses the race
    #[derive(Default)]
    struct RacingBackend {
        inner: MemoryBackend,
        create_attempts: AtomicUsize,
    }

    #[async_trait]
    impl StateBackend for RacingBackend {
        fn describe(&self) -> String {
            "racing://".to_string()
        }

        async fn load(&self, id: &StackId) -> crate::Result<StackState> {
            Err(CloudError::StackNotFound(id.to_string()))
        }

        async fn create(&self, state: &StackState) -> crate::Result<()> {
            self.create_attempts.fetch_add(1, Ordering::SeqCst);
            Err(CloudError::StackAlreadyExists(state.id().to_string()))
        }

        async fn save(&self, state: &StackState) -> crate::Result<()> {
            self.inner.save(state).await
        }

        async fn remove(&self, id: &StackId) -> crate::Result<()> {
            self.inner.remove(id).await
        }

        async fn list(&self, project: &str) -> crate::Result<Vec<String>> {
            self.inner.list(project).await
        }

        async fn lock(&self, id: &StackId) -> crate::Result<StateLock> {
            self.inner.lock(id).await
        }
    }

    #[tokio::test]
    async fn test_first_run_creates_and_deploys() {
        let temp_dir = tempdir().unwrap();
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(StateManager::new(temp_dir.path())), &cloud);

        let sink = BufferSink::new();
        let mut progress = sink.clone();
        let report = deploy(&ws, &localstack_request(), bucket_program(), &mut progress)
            .await
            .unwrap();

        assert_eq!(report.acquired, AcquiredVia::Created);
        assert_eq!(report.config.unwrap().get("aws:region").unwrap().value, "us-east-1");
        assert!(!report.update.outputs.get_string("bucketName").unwrap().is_empty());

        let lines = sink.lines();
        let position = |needle: &str| lines.iter().position(|l| l.contains(needle)).unwrap();
        assert!(position("Selected stack") < position("Stack configured"));
        assert!(position("Stack configured") < position("Starting refresh"));
        assert!(position("Refresh succeeded!") < position("Starting update"));
        assert!(position("Starting update") < position("Update succeeded!"));
    }

    #[tokio::test]
    async fn test_second_run_selects_and_is_a_no_op() {
        let temp_dir = tempdir().unwrap();
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(StateManager::new(temp_dir.path())), &cloud);

        let first = deploy(&ws, &localstack_request(), bucket_program(), &mut NullSink)
            .await
            .unwrap();
        let second = deploy(&ws, &localstack_request(), bucket_program(), &mut NullSink)
            .await
            .unwrap();

        assert_eq!(second.acquired, AcquiredVia::Selected);
        assert_eq!(first.update.outputs, second.update.outputs);
        assert_eq!(second.update.changes.create, 0);
        assert_eq!(second.update.changes.update, 0);
        assert_eq!(second.update.changes.delete, 0);
        assert_eq!(second.update.changes.no_change, 1);
        assert_eq!(second.refresh.summary.change_count("same"), 1);
        assert_eq!(cloud.stats().creates, 1);
        assert_eq!(cloud.len(), 1);
    }

    #[tokio::test]
    async fn test_lost_race_is_terminal_without_retry() {
        let cloud = MemoryCloud::new();
        let backend = Arc::new(RacingBackend::default());
        let ws = workspace(backend.clone(), &cloud);

        let err = deploy(&ws, &localstack_request(), bucket_program(), &mut NullSink)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::RaceLost(ref e) if e.is_conflict()));
        assert_eq!(err.exit_code(), EXIT_ACQUISITION_FAILED);
        assert_eq!(backend.create_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(cloud.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_refresh_failure_skips_update() {
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(MemoryBackend::new()), &cloud);
        deploy(&ws, &localstack_request(), bucket_program(), &mut NullSink)
            .await
            .unwrap();
        let before = cloud.stats();

        cloud.fail_reads(true);
        let sink = BufferSink::new();
        let mut progress = sink.clone();
        let err = deploy(&ws, &localstack_request(), bucket_program(), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Refresh(_)));
        assert_eq!(err.exit_code(), EXIT_OPERATION_FAILED);
        let after = cloud.stats();
        assert_eq!(after.creates, before.creates);
        assert_eq!(after.updates, before.updates);
        assert_eq!(after.deletes, before.deletes);
        assert!(!sink.contains("Starting update"));
    }

    #[tokio::test]
    async fn test_update_failure_exit_code() {
        let cloud = MemoryCloud::new();
        cloud.fail_creates(true);
        let ws = workspace(Arc::new(MemoryBackend::new()), &cloud);

        let err = deploy(&ws, &localstack_request(), bucket_program(), &mut NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Update(_)));
        assert_eq!(err.exit_code(), EXIT_OPERATION_FAILED);
    }

    #[tokio::test]
    async fn test_config_failure_is_not_fatal() {
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(MemoryBackend::new()), &cloud);
        let request = DeployRequest::new("dev").with_config("aws:", ConfigValue::plain("x"));

        let sink = BufferSink::new();
        let mut progress = sink.clone();
        let report = deploy(&ws, &request, bucket_program(), &mut progress).await.unwrap();

        assert!(sink.contains("Failed to set config"));
        assert!(report.config.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_keeps_the_rest_of_the_request() {
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(MemoryBackend::new()), &cloud);
        let request = localstack_request()
            .with_config("aws:endpoints", ConfigValue::plain(r#"[{"s3": "http://localhost:4566"}]"#))
            .with_config("aws:", ConfigValue::plain("x"));

        let sink = BufferSink::new();
        let mut progress = sink.clone();
        let report = deploy(&ws, &request, bucket_program(), &mut progress).await.unwrap();

        assert!(sink.contains("Failed to set config aws:"));
        let config = report.config.unwrap();
        assert_eq!(config.len(), 4);
        assert_eq!(config.get("aws:region").unwrap().value, "us-east-1");
        assert!(config.get("aws:endpoints").is_some());
    }

    #[tokio::test]
    async fn test_defaults_do_not_override_stored_config() {
        let cloud = MemoryCloud::new();
        let ws = workspace(Arc::new(MemoryBackend::new()), &cloud);

        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        stack
            .set_config("aws:region", ConfigValue::plain("eu-west-1"))
            .await
            .unwrap();

        let request = DeployRequest::new("dev")
            .with_default("aws:region", ConfigValue::plain("us-east-1"))
            .with_default("aws:accessKey", ConfigValue::plain("test"));
        let report = deploy(&ws, &request, bucket_program(), &mut NullSink).await.unwrap();

        let config = report.config.unwrap();
        assert_eq!(config.get("aws:region").unwrap().value, "eu-west-1");
        assert_eq!(config.get("aws:accessKey").unwrap().value, "test");
    }

    #[test]
    fn test_exit_codes() {
        let e = || CloudError::ApiError("boom".into());
        assert_eq!(DeployError::Selection(e()).exit_code(), EXIT_ACQUISITION_FAILED);
        assert_eq!(DeployError::Creation(e()).exit_code(), EXIT_ACQUISITION_FAILED);
        assert_eq!(DeployError::Update(e()).exit_code(), EXIT_OPERATION_FAILED);
        assert_eq!(DeployError::Cancelled.exit_code(), EXIT_OPERATION_FAILED);
        assert_ne!(EXIT_OK, EXIT_OPERATION_FAILED);
    }
}

//! Stack handle
//!
//! A [`Stack`] is bound to one stack of a backend together with the program
//! that defines its resources. Every mutating call holds the stack lock for
//! its whole duration and persists the state before returning.

use crate::action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
use crate::config::{qualify_key, ConfigMap, ConfigValue};
use crate::error::{CloudError, Result};
use crate::output::Outputs;
use crate::program::{Program, ProgramResult};
use crate::progress::ProgressSink;
use crate::provider::{CloudProvider, ProviderRegistry};
use crate::state::{
    OperationKind, ResourceStatus, StackId, StackState, StateBackend, UpdateSummary,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Lifecycle phase of a stack handle within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPhase {
    /// Bound to a stack that already existed
    Selected,
    /// Bound to a stack created by this run
    Created,
    /// Configuration was written at least once
    Configured,
    Refreshed,
    /// The run is complete; acquire the stack again to start over
    Updated,
}

impl std::fmt::Display for StackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackPhase::Selected => write!(f, "selected"),
            StackPhase::Created => write!(f, "created"),
            StackPhase::Configured => write!(f, "configured"),
            StackPhase::Refreshed => write!(f, "refreshed"),
            StackPhase::Updated => write!(f, "updated"),
        }
    }
}

/// Result of a refresh
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub summary: UpdateSummary,
}

/// Result of a preview
#[derive(Debug, Clone)]
pub struct PreviewResult {
    pub plan: Plan,
}

impl PreviewResult {
    pub fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }
}

/// Result of an update
#[derive(Debug, Clone)]
pub struct UpResult {
    pub outputs: Outputs,
    pub summary: UpdateSummary,
    pub changes: PlanSummary,
    pub apply: ApplyResult,
}

/// Result of a destroy
#[derive(Debug, Clone)]
pub struct DestroyResult {
    pub summary: UpdateSummary,
    pub apply: ApplyResult,
}

/// Handle to a selected or created stack
pub struct Stack {
    id: StackId,
    program: Program,
    backend: Arc<dyn StateBackend>,
    providers: Arc<ProviderRegistry>,
    phase: StackPhase,
}

impl Stack {
    pub(crate) fn new(
        id: StackId,
        program: Program,
        backend: Arc<dyn StateBackend>,
        providers: Arc<ProviderRegistry>,
        phase: StackPhase,
    ) -> Self {
        Self {
            id,
            program,
            backend,
            providers,
            phase,
        }
    }

    pub fn id(&self) -> &StackId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.stack
    }

    pub fn project(&self) -> &str {
        &self.id.project
    }

    pub fn phase(&self) -> StackPhase {
        self.phase
    }

    fn ensure_not_finished(&self, operation: &str) -> Result<()> {
        if self.phase == StackPhase::Updated {
            return Err(CloudError::InvalidState(format!(
                "cannot {} stack {} after its update completed; select the stack again",
                operation, self.id
            )));
        }
        Ok(())
    }

    /// Set one configuration value, overwriting any previous value
    pub async fn set_config(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        let key = qualify_key(self.project(), key)?;
        self.set_all_config([(key, value)]).await?;
        Ok(())
    }

    /// Set several configuration values in one write
    ///
    /// Each entry stands on its own: an entry with a malformed key is left
    /// out and returned with the reason, the others are stored.
    pub async fn set_all_config<I>(&mut self, entries: I) -> Result<Vec<(String, CloudError)>>
    where
        I: IntoIterator<Item = (String, ConfigValue)>,
    {
        self.ensure_not_finished("configure")?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (key, value) in entries {
            match qualify_key(self.project(), &key) {
                Ok(qualified) => accepted.push((qualified, value)),
                Err(e) => {
                    tracing::debug!("Skipping config {:?} on {}: {}", key, self.id, e);
                    rejected.push((key, e));
                }
            }
        }
        if accepted.is_empty() {
            return Ok(rejected);
        }

        let _lock = self.backend.lock(&self.id).await?;
        let mut state = self.backend.load(&self.id).await?;
        for (key, value) in accepted {
            tracing::debug!("Setting config {} on {}", key, self.id);
            state.config.set(key, value);
        }
        state.touch();
        self.backend.save(&state).await?;

        self.phase = StackPhase::Configured;
        Ok(rejected)
    }

    /// Remove a configuration value; returns whether it was set
    pub async fn remove_config(&mut self, key: &str) -> Result<bool> {
        self.ensure_not_finished("configure")?;
        let key = qualify_key(self.project(), key)?;

        let _lock = self.backend.lock(&self.id).await?;
        let mut state = self.backend.load(&self.id).await?;
        let removed = state.config.remove(&key).is_some();
        if removed {
            state.touch();
            self.backend.save(&state).await?;
            self.phase = StackPhase::Configured;
        }
        Ok(removed)
    }

    pub async fn get_config(&self, key: &str) -> Result<Option<ConfigValue>> {
        let key = qualify_key(self.project(), key)?;
        let state = self.backend.load(&self.id).await?;
        Ok(state.config.get(&key).cloned())
    }

    pub async fn get_all_config(&self) -> Result<ConfigMap> {
        Ok(self.backend.load(&self.id).await?.config)
    }

    /// Outputs recorded by the last successful update
    pub async fn outputs(&self) -> Result<Outputs> {
        Ok(self.backend.load(&self.id).await?.outputs)
    }

    /// Summary of the last completed operation
    pub async fn last_operation(&self) -> Result<Option<UpdateSummary>> {
        Ok(self.backend.load(&self.id).await?.last_operation)
    }

    /// Reconcile recorded state with the live resources
    ///
    /// Infrastructure is never changed. Resources that disappeared are
    /// dropped from the state, drifted attributes are recorded.
    pub async fn refresh(&mut self, progress: &mut dyn ProgressSink) -> Result<RefreshResult> {
        self.ensure_not_finished("refresh")?;
        let started_at = Utc::now();

        let _lock = self.backend.lock(&self.id).await?;
        let mut state = self.backend.load(&self.id).await?;
        progress.emit(&format!("Refreshing ({})", self.name()));

        let (mut same, mut drifted, mut deleted) = (0, 0, 0);
        for provider_name in state.providers() {
            let provider = self.providers.provider(&provider_name, &state.config).await?;

            let mut recorded: Vec<_> = state.provider_state(&provider_name).resources.into_iter().collect();
            recorded.sort_by(|a, b| a.0.cmp(&b.0));

            for (key, current) in recorded {
                let state_key = format!("{}:{}", provider_name, key);
                tracing::info!("Reading {}", state_key);

                match provider.read(&current).await? {
                    None => {
                        progress.emit(&format!("- {} no longer exists", key));
                        state.remove_resource(&state_key);
                        deleted += 1;
                    }
                    Some(mut live) => {
                        if live.drifted_from(&current) {
                            progress.emit(&format!("~ {} refreshed", key));
                            live.inputs = current.inputs.clone();
                            live.created_at = current.created_at;
                            state.set_resource(state_key, live);
                            drifted += 1;
                        } else {
                            same += 1;
                        }
                    }
                }
            }
        }

        let summary = UpdateSummary::new(OperationKind::Refresh, started_at)
            .with_change("same", same)
            .with_change("update", drifted)
            .with_change("delete", deleted);
        state.last_operation = Some(summary.clone());
        state.touch();
        self.backend.save(&state).await?;

        progress.emit(&format!(
            "Refresh complete: {} unchanged, {} drifted, {} gone",
            same, drifted, deleted
        ));
        self.phase = StackPhase::Refreshed;
        Ok(RefreshResult { summary })
    }

    /// Compute the plan an update would apply, without applying it
    pub async fn preview(&self) -> Result<PreviewResult> {
        let state = self.backend.load(&self.id).await?;
        let desired = self.evaluate(&state)?;
        let providers = self.configure_providers(&state, &desired).await?;
        Ok(PreviewResult {
            plan: plan_all(&providers, &desired, &state),
        })
    }

    /// Converge the infrastructure to the program and return its outputs
    pub async fn up(&mut self, progress: &mut dyn ProgressSink) -> Result<UpResult> {
        self.ensure_not_finished("update")?;
        let started_at = Utc::now();

        let _lock = self.backend.lock(&self.id).await?;
        let mut state = self.backend.load(&self.id).await?;
        progress.emit(&format!("Updating ({})", self.name()));

        let desired = self.evaluate(&state)?;
        let providers = self.configure_providers(&state, &desired).await?;
        let plan = plan_all(&providers, &desired, &state);
        let changes = plan.summary();
        tracing::info!("Update plan for {}: {}", self.id, changes);

        let mut apply = ApplyResult::new();
        let timer = std::time::Instant::now();
        for action in &plan.actions {
            let provider = providers.get(&action.provider).ok_or_else(|| {
                CloudError::ProviderNotFound(action.provider.clone())
            })?;

            if let Err(e) = apply_action(provider.as_ref(), action, &desired, &mut state, progress).await {
                apply.add_failure(action.id.clone(), e.to_string());
                progress.emit(&format!("error: {}: {}", action.description, e));
                state.touch();
                self.backend.save(&state).await?;
                return Err(e);
            }
            if action.action_type != ActionType::NoOp {
                apply.add_success(action.id.clone(), action.description.clone());
                self.backend.save(&state).await?;
            }
        }
        apply.duration_ms = timer.elapsed().as_millis() as u64;

        let outputs = desired.resolve_outputs(&state)?;
        let summary = UpdateSummary::new(OperationKind::Update, started_at)
            .with_change("create", changes.create)
            .with_change("update", changes.update)
            .with_change("delete", changes.delete)
            .with_change("same", changes.no_change);

        state.outputs = outputs.clone();
        state.last_operation = Some(summary.clone());
        state.touch();
        self.backend.save(&state).await?;

        if !outputs.is_empty() {
            progress.emit("Outputs:");
            for (name, value) in outputs.iter() {
                progress.emit(&format!("    {}: {}", name, value));
            }
        }
        progress.emit(&format!("Resources: {}", changes));

        self.phase = StackPhase::Updated;
        Ok(UpResult {
            outputs,
            summary,
            changes,
            apply,
        })
    }

    /// Delete every recorded resource of the stack
    pub async fn destroy(&mut self, progress: &mut dyn ProgressSink) -> Result<DestroyResult> {
        let started_at = Utc::now();

        let _lock = self.backend.lock(&self.id).await?;
        let mut state = self.backend.load(&self.id).await?;
        progress.emit(&format!("Destroying ({})", self.name()));

        let mut apply = ApplyResult::new();
        let timer = std::time::Instant::now();
        let mut deleted = 0;
        for provider_name in state.providers() {
            let provider = self.providers.provider(&provider_name, &state.config).await?;

            let mut recorded: Vec<_> = state.provider_state(&provider_name).resources.into_iter().collect();
            recorded.sort_by(|a, b| a.0.cmp(&b.0));

            for (key, current) in recorded {
                let action_id = format!("delete-{}", key);
                tracing::info!("Deleting {}", key);
                if let Err(e) = provider.delete(&current).await {
                    apply.add_failure(action_id, e.to_string());
                    progress.emit(&format!("error: delete {}: {}", key, e));
                    self.backend.save(&state).await?;
                    return Err(e);
                }
                state.remove_resource(&format!("{}:{}", provider_name, key));
                self.backend.save(&state).await?;
                progress.emit(&format!("- {} deleted", key));
                apply.add_success(action_id, format!("deleted {}", key));
                deleted += 1;
            }
        }
        apply.duration_ms = timer.elapsed().as_millis() as u64;

        let summary = UpdateSummary::new(OperationKind::Destroy, started_at).with_change("delete", deleted);
        state.outputs = Outputs::new();
        state.last_operation = Some(summary.clone());
        state.touch();
        self.backend.save(&state).await?;

        progress.emit(&format!("Resources: {} deleted", deleted));
        Ok(DestroyResult { summary, apply })
    }

    fn evaluate(&self, state: &StackState) -> Result<ProgramResult> {
        self.program
            .evaluate(self.project(), self.name(), &state.config)
    }

    /// Build every provider referenced by the program or the recorded state
    async fn configure_providers(
        &self,
        state: &StackState,
        desired: &ProgramResult,
    ) -> Result<BTreeMap<String, Arc<dyn CloudProvider>>> {
        let names: BTreeSet<String> = desired
            .resources
            .providers()
            .into_iter()
            .map(str::to_string)
            .chain(state.providers())
            .collect();

        let mut providers = BTreeMap::new();
        for name in names {
            let provider = self.providers.provider(&name, &state.config).await?;
            providers.insert(name, provider);
        }
        Ok(providers)
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("backend", &self.backend.describe())
            .finish_non_exhaustive()
    }
}

fn plan_all(
    providers: &BTreeMap<String, Arc<dyn CloudProvider>>,
    desired: &ProgramResult,
    state: &StackState,
) -> Plan {
    let mut plan = Plan::empty();
    for (name, provider) in providers {
        plan.extend(provider.plan(&desired.resources, &state.provider_state(name)));
    }
    plan
}

async fn apply_action(
    provider: &dyn CloudProvider,
    action: &Action,
    desired: &ProgramResult,
    state: &mut StackState,
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    let state_key = action.state_key();
    let desired_resource = || {
        desired
            .resources
            .resources
            .get(&action.resource_key())
            .ok_or_else(|| CloudError::StateError(format!("{} is not declared", state_key)))
    };
    let recorded = |state: &StackState| {
        state
            .get_resource(&state_key)
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound(state_key.clone()))
    };

    match action.action_type {
        ActionType::Create => {
            let resource = desired_resource()?;
            progress.emit(&format!("+ {} {} creating", action.resource_type, action.resource_id));
            let created = provider
                .create(resource)
                .await?
                .with_inputs(resource.config.clone())
                .with_status(ResourceStatus::Ready);
            state.set_resource(state_key.clone(), created);
            progress.emit(&format!("+ {} {} created", action.resource_type, action.resource_id));
        }
        ActionType::Update => {
            let resource = desired_resource()?;
            let current = recorded(&*state)?;
            progress.emit(&format!("~ {} {} updating", action.resource_type, action.resource_id));
            let mut updated = provider
                .update(resource, &current)
                .await?
                .with_inputs(resource.config.clone())
                .with_status(ResourceStatus::Ready);
            updated.updated_at = Utc::now();
            state.set_resource(state_key.clone(), updated);
            progress.emit(&format!("~ {} {} updated", action.resource_type, action.resource_id));
        }
        ActionType::Delete => {
            let current = recorded(&*state)?;
            progress.emit(&format!("- {} {} deleting", action.resource_type, action.resource_id));
            provider.delete(&current).await?;
            state.remove_resource(&state_key);
            progress.emit(&format!("- {} {} deleted", action.resource_type, action.resource_id));
        }
        ActionType::NoOp => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{BufferSink, NullSink};
    use crate::provider::ResourceConfig;
    use crate::state::MemoryBackend;
    use crate::testing::{bucket_program, MemoryCloud, MemoryProviderFactory};
    use crate::workspace::Workspace;
    use serde_json::json;

    fn workspace(cloud: &MemoryCloud) -> Workspace {
        Workspace::new(
            "bucket-daemon",
            Arc::new(MemoryBackend::new()),
            ProviderRegistry::new().with(Arc::new(MemoryProviderFactory::with_cloud("aws", cloud.clone()))),
        )
    }

    #[tokio::test]
    async fn test_config_overwrite() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        stack
            .set_all_config([
                ("aws:region".to_string(), ConfigValue::plain("us-east-1")),
                ("aws:accessKey".to_string(), ConfigValue::plain("test")),
            ])
            .await
            .unwrap();
        assert_eq!(stack.phase(), StackPhase::Configured);

        let config = stack.get_all_config().await.unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("aws:region").unwrap().value, "us-east-1");
        assert_eq!(config.get("aws:accessKey").unwrap().value, "test");

        stack
            .set_config("aws:region", ConfigValue::plain("us-west-2"))
            .await
            .unwrap();
        let config = stack.get_all_config().await.unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("aws:region").unwrap().value, "us-west-2");
    }

    #[tokio::test]
    async fn test_malformed_key_does_not_drop_other_entries() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        let rejected = stack
            .set_all_config([
                ("aws:region".to_string(), ConfigValue::plain("us-east-1")),
                ("aws:".to_string(), ConfigValue::plain("x")),
                ("aws:accessKey".to_string(), ConfigValue::plain("test")),
            ])
            .await
            .unwrap();

        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "aws:");
        assert!(matches!(rejected[0].1, CloudError::InvalidConfig(_)));

        let config = stack.get_all_config().await.unwrap();
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("aws:region").unwrap().value, "us-east-1");
        assert!(stack.set_config("aws:", ConfigValue::plain("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_unqualified_key_belongs_to_project() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        stack.set_config("prefix", ConfigValue::plain("logs")).await.unwrap();
        assert!(stack.get_all_config().await.unwrap().get("bucket-daemon:prefix").is_some());
        assert_eq!(stack.get_config("prefix").await.unwrap().unwrap().value, "logs");

        assert!(stack.remove_config("prefix").await.unwrap());
        assert!(!stack.remove_config("prefix").await.unwrap());
        assert!(stack.get_config("prefix").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_up_exports_bucket_name() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        let sink = BufferSink::new();
        let mut progress = sink.clone();
        let result = stack.up(&mut progress).await.unwrap();

        assert_eq!(result.outputs.len(), 1);
        let name = result.outputs.get_string("bucketName").unwrap();
        assert!(!name.is_empty());
        assert!(name.starts_with("demo-"));
        assert_eq!(result.changes.create, 1);
        assert!(result.apply.is_success());
        assert_eq!(stack.phase(), StackPhase::Updated);
        assert!(cloud.contains(name));
        assert!(sink.contains("Updating (dev)"));
        assert!(sink.contains("bucketName"));

        assert_eq!(stack.outputs().await.unwrap(), result.outputs);
    }

    #[tokio::test]
    async fn test_no_going_back_after_update() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        stack.up(&mut NullSink).await.unwrap();

        let err = stack.refresh(&mut NullSink).await.unwrap_err();
        assert!(matches!(err, CloudError::InvalidState(_)));
        let err = stack
            .set_config("aws:region", ConfigValue::plain("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidState(_)));
        assert!(stack.up(&mut NullSink).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_detects_deleted_resource() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        let name = stack
            .up(&mut NullSink)
            .await
            .unwrap()
            .outputs
            .get_string("bucketName")
            .unwrap()
            .to_string();

        cloud.remove(&name);

        let mut stack = ws.select_stack("dev", bucket_program()).await.unwrap();
        let refresh = stack.refresh(&mut NullSink).await.unwrap();
        assert_eq!(refresh.summary.change_count("delete"), 1);

        // the next update recreates the bucket under a new name
        let result = stack.up(&mut NullSink).await.unwrap();
        assert_eq!(result.changes.create, 1);
        assert_ne!(result.outputs.get_string("bucketName").unwrap(), name);
    }

    #[tokio::test]
    async fn test_refresh_records_drift() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        let name = stack.up(&mut NullSink).await.unwrap().outputs.get_string("bucketName").unwrap().to_string();

        cloud.set_attribute(&name, "region", json!("eu-central-1"));

        let mut stack = ws.select_stack("dev", bucket_program()).await.unwrap();
        let refresh = stack.refresh(&mut NullSink).await.unwrap();
        assert_eq!(refresh.summary.change_count("update"), 1);
        assert_eq!(refresh.summary.change_count("same"), 0);
    }

    #[tokio::test]
    async fn test_changed_inputs_update_in_place() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        stack.up(&mut NullSink).await.unwrap();

        let tagged = Program::new(|ctx| {
            let bucket = ctx.register(ResourceConfig::new(
                "s3-bucket",
                "demo",
                "aws",
                json!({"tags": {"env": "dev"}}),
            ))?;
            ctx.export("bucketName", bucket.attribute("bucket"));
            Ok(())
        });
        let stack = ws.select_stack("dev", tagged).await.unwrap();
        let preview = stack.preview().await.unwrap();
        assert_eq!(preview.summary().update, 1);

        let mut stack = stack;
        let result = stack.up(&mut NullSink).await.unwrap();
        assert_eq!(result.changes.update, 1);
        assert_eq!(cloud.stats().updates, 1);
    }

    #[tokio::test]
    async fn test_removed_resource_is_deleted() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        let name = stack.up(&mut NullSink).await.unwrap().outputs.get_string("bucketName").unwrap().to_string();

        let empty = Program::new(|_ctx| Ok(()));
        let mut stack = ws.select_stack("dev", empty).await.unwrap();
        let result = stack.up(&mut NullSink).await.unwrap();
        assert_eq!(result.changes.delete, 1);
        assert!(result.outputs.is_empty());
        assert!(!cloud.contains(&name));
    }

    #[tokio::test]
    async fn test_failed_create_aborts_update() {
        let cloud = MemoryCloud::new();
        cloud.fail_creates(true);
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        let sink = BufferSink::new();
        let mut progress = sink.clone();
        assert!(stack.up(&mut progress).await.is_err());
        assert!(sink.contains("error:"));
        assert!(stack.outputs().await.unwrap().is_empty());
        assert_ne!(stack.phase(), StackPhase::Updated);
    }

    #[tokio::test]
    async fn test_destroy_clears_resources_and_outputs() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let mut stack = ws.create_stack("dev", bucket_program()).await.unwrap();
        stack.up(&mut NullSink).await.unwrap();
        assert_eq!(cloud.len(), 1);

        let mut stack = ws.select_stack("dev", bucket_program()).await.unwrap();
        let result = stack.destroy(&mut NullSink).await.unwrap();
        assert_eq!(result.summary.change_count("delete"), 1);
        assert_eq!(cloud.len(), 0);
        assert!(stack.outputs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_does_not_touch_infrastructure() {
        let cloud = MemoryCloud::new();
        let ws = workspace(&cloud);
        let stack = ws.create_stack("dev", bucket_program()).await.unwrap();

        let preview = stack.preview().await.unwrap();
        assert_eq!(preview.summary().create, 1);
        assert_eq!(cloud.len(), 0);
        assert_eq!(cloud.stats().creates, 0);
    }
}

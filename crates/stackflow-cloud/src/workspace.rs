//! Workspace: the stacks of one project in one backend

use crate::error::{CloudError, Result};
use crate::program::Program;
use crate::provider::ProviderRegistry;
use crate::stack::{Stack, StackPhase};
use crate::state::{StackId, StackState, StateBackend};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of [`Workspace::select_or_create`]
#[derive(Debug)]
pub enum Acquisition {
    /// The stack already existed
    Selected(Stack),
    /// The stack did not exist and was created
    Created(Stack),
    /// Selection found nothing, but another writer created the stack first
    RaceLost(CloudError),
}

/// Failures of [`Workspace::select_or_create`] other than a lost race
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Error selecting stack: {0}")]
    Selection(CloudError),

    #[error("Error creating stack: {0}")]
    Creation(CloudError),
}

/// Entry point for working with the stacks of a project
#[derive(Clone)]
pub struct Workspace {
    project: String,
    backend: Arc<dyn StateBackend>,
    providers: Arc<ProviderRegistry>,
}

impl Workspace {
    pub fn new(
        project: impl Into<String>,
        backend: Arc<dyn StateBackend>,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            project: project.into(),
            backend,
            providers: Arc::new(providers),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }

    pub fn stack_id(&self, stack: &str) -> Result<StackId> {
        StackId::new(self.project.clone(), stack)
    }

    fn bind(&self, id: StackId, program: Program, phase: StackPhase) -> Stack {
        Stack::new(
            id,
            program,
            Arc::clone(&self.backend),
            Arc::clone(&self.providers),
            phase,
        )
    }

    /// Select an existing stack; fails with [`CloudError::StackNotFound`] otherwise
    pub async fn select_stack(&self, stack: &str, program: Program) -> Result<Stack> {
        let id = self.stack_id(stack)?;
        self.backend.load(&id).await?;
        tracing::debug!("Selected stack {}", id);
        Ok(self.bind(id, program, StackPhase::Selected))
    }

    /// Create a new stack; fails with [`CloudError::StackAlreadyExists`] if present
    pub async fn create_stack(&self, stack: &str, program: Program) -> Result<Stack> {
        let id = self.stack_id(stack)?;
        self.backend.create(&StackState::new(&id)).await?;
        tracing::info!("Created stack {} in {}", id, self.backend.describe());
        Ok(self.bind(id, program, StackPhase::Created))
    }

    /// Select the stack, creating it when it does not exist yet
    ///
    /// Exactly one creation attempt is made. When it reports that the stack
    /// already exists the race is reported as [`Acquisition::RaceLost`] and
    /// nothing is retried.
    pub async fn select_or_create(
        &self,
        stack: &str,
        program: Program,
    ) -> std::result::Result<Acquisition, AcquireError> {
        match self.select_stack(stack, program.clone()).await {
            Ok(handle) => Ok(Acquisition::Selected(handle)),
            Err(e) if e.is_not_found() => {
                tracing::info!("Stack not found, trying to create it: {}", e);
                match self.create_stack(stack, program).await {
                    Ok(handle) => Ok(Acquisition::Created(handle)),
                    Err(e) if e.is_conflict() => {
                        tracing::warn!("Stack was created concurrently: {}", e);
                        Ok(Acquisition::RaceLost(e))
                    }
                    Err(e) => Err(AcquireError::Creation(e)),
                }
            }
            Err(e) => Err(AcquireError::Selection(e)),
        }
    }

    /// Stack names of the project, sorted
    pub async fn list_stacks(&self) -> Result<Vec<String>> {
        self.backend.list(&self.project).await
    }

    /// Remove a stack's state
    ///
    /// Refuses to forget a stack that still records resources unless `force`.
    pub async fn remove_stack(&self, stack: &str, force: bool) -> Result<()> {
        let id = self.stack_id(stack)?;
        let _lock = self.backend.lock(&id).await?;
        let state = self.backend.load(&id).await?;

        if !state.resources.is_empty() && !force {
            return Err(CloudError::InvalidState(format!(
                "stack {} still manages {} resource(s); destroy it first or force removal",
                id,
                state.resources.len()
            )));
        }

        self.backend.remove(&id).await?;
        tracing::info!("Removed stack {}", id);
        Ok(())
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("project", &self.project)
            .field("backend", &self.backend.describe())
            .field("providers", &self.providers)
            .finish()
    }
}

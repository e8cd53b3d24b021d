//! Project, backend and stack resolution shared by all commands

use crate::program;
use anyhow::Context as _;
use colored::Colorize;
use stackflow_cloud::{
    Acquisition, ConfigMap, ProviderRegistry, Stack, StateManager, Workspace,
};
use stackflow_cloud_aws::AwsProviderFactory;
use stackflow_config::{DEFAULT_STACK, LoadedProject};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct CliContext {
    pub project: LoadedProject,
    pub backend_dir: PathBuf,
    pub stack: String,
}

/// Providers available to stackflow programs
pub fn provider_registry() -> ProviderRegistry {
    ProviderRegistry::new().with(Arc::new(AwsProviderFactory::new()))
}

impl CliContext {
    pub fn load(backend: Option<&Path>, stack: Option<String>) -> anyhow::Result<Self> {
        let project = stackflow_config::load_project().context("Failed to load project settings")?;
        let backend_dir = project.backend_dir(backend);
        let stack = stack
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STACK.to_string());

        Ok(Self {
            project,
            backend_dir,
            stack,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project.settings.name
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(
            self.project_name(),
            Arc::new(StateManager::new(&self.backend_dir)),
            provider_registry(),
        )
    }

    /// Configuration the project file declares for the current stack
    pub fn stack_config(&self) -> anyhow::Result<ConfigMap> {
        self.project
            .settings
            .stack_config(&self.stack)
            .with_context(|| format!("Invalid configuration for stack '{}'", self.stack))
    }

    /// Select the current stack, which must already exist
    pub async fn select(&self) -> anyhow::Result<Stack> {
        let workspace = self.workspace();
        match workspace.select_stack(&self.stack, program::bucket_program()).await {
            Ok(stack) => Ok(stack),
            Err(e) if e.is_not_found() => Err(anyhow::anyhow!(
                "Stack '{}' does not exist. Run `stackflow up --stack {}` to create it",
                self.stack,
                self.stack
            )),
            Err(e) => Err(e).context("Failed to select stack"),
        }
    }

    /// Select the current stack, creating it when missing
    pub async fn select_or_create(&self) -> anyhow::Result<Stack> {
        let workspace = self.workspace();
        let acquired = workspace
            .select_or_create(&self.stack, program::bucket_program())
            .await?;
        match acquired {
            Acquisition::Selected(stack) => Ok(stack),
            Acquisition::Created(stack) => {
                println!("{} {}", "Created stack".green(), self.stack.cyan());
                Ok(stack)
            }
            Acquisition::RaceLost(e) => {
                Err(anyhow::anyhow!("Stack was created by another process: {}", e))
            }
        }
    }

    pub fn print_header(&self) {
        match &self.project.path {
            Some(path) => println!("Project file: {}", path.display().to_string().cyan()),
            None => println!("Project file: {}", "(built-in defaults)".dimmed()),
        }
        println!(
            "Project: {}  Stack: {}  Backend: {}",
            self.project_name().cyan(),
            self.stack.cyan(),
            self.backend_dir.display()
        );
    }
}

pub mod error;
pub mod project;

pub use error::*;
pub use project::{
    DEFAULT_BACKEND_DIR, DEFAULT_PROJECT, DEFAULT_STACK, ProjectSettings, SettingValue,
    StackSettings,
};

use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a project file
pub const PROJECT_PATH_ENV: &str = "STACKFLOW_PROJECT_PATH";

const CANDIDATES: [&str; 2] = ["stackflow.local.yaml", "stackflow.yaml"];

/// Find the project file
///
/// Search order:
/// 1. `STACKFLOW_PROJECT_PATH` (direct path)
/// 2. Current directory: stackflow.local.yaml, stackflow.yaml
/// 3. `./.stackflow/` directory, same order
/// 4. `~/.config/stackflow/stackflow.yaml` (global settings)
pub fn find_project_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(PROJECT_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", PROJECT_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let state_dir = current_dir.join(DEFAULT_BACKEND_DIR);
    if state_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = state_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stackflow.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ProjectFileNotFound)
}

/// Project settings together with where they came from
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub settings: ProjectSettings,
    /// `None` when the built-in defaults are in use
    pub path: Option<PathBuf>,
}

impl LoadedProject {
    /// Directory relative paths in the project file are resolved against
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Backend directory: explicit override, else the project file's, else `./.stackflow`
    pub fn backend_dir(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir.to_path_buf();
        }
        self.settings
            .backend_dir(&self.base_dir())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKEND_DIR))
    }
}

/// Load the project file, falling back to the built-in defaults when none exists
pub fn load_project() -> Result<LoadedProject> {
    match find_project_file() {
        Ok(path) => {
            tracing::debug!("Loading project file {}", path.display());
            let settings = ProjectSettings::load(&path)?;
            Ok(LoadedProject {
                settings,
                path: Some(path),
            })
        }
        Err(ConfigError::ProjectFileNotFound) => {
            tracing::debug!("No project file found, using built-in defaults");
            Ok(LoadedProject {
                settings: ProjectSettings::default(),
                path: None,
            })
        }
        Err(e) => Err(e),
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Project file not found. Looked in:\n\
        - current directory: stackflow.local.yaml, stackflow.yaml\n\
        - ./.stackflow/ directory\n\
        - ~/.config/stackflow/stackflow.yaml\n\
        Set STACKFLOW_PROJECT_PATH to point at a file directly"
    )]
    ProjectFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid configuration key: {0}")]
    InvalidKey(#[from] stackflow_cloud::CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

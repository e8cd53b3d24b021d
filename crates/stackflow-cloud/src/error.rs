//! Stack engine error types

use thiserror::Error;

/// Stack engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Stack already exists: {0}")]
    StackAlreadyExists(String),

    #[error("Invalid stack name: {0}")]
    InvalidStackName(String),

    #[error("Invalid stack state: {0}")]
    InvalidState(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Program error: {0}")]
    ProgramError(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Selecting a stack failed because no such stack exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::StackNotFound(_))
    }

    /// Creating a stack failed because it already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::StackAlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

//! AWS provider error types

use stackflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Invalid AWS configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid bucket name '{name}': {reason}")]
    InvalidBucketName { name: String, reason: String },

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Bucket creation failed: {0}")]
    CreationFailed(String),

    #[error("Bucket deletion failed: {0}")]
    DeletionFailed(String),

    #[error("S3 request failed: {0}")]
    Request(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, AwsError>;

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::CloudError(inner) => inner,
            AwsError::InvalidConfig(_) | AwsError::InvalidBucketName { .. } => {
                CloudError::InvalidConfig(err.to_string())
            }
            AwsError::BucketNotFound(name) => CloudError::ResourceNotFound(name),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

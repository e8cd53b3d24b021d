//! AWS provider for stackflow
//!
//! Serves the `aws` configuration namespace and manages `s3-bucket`
//! resources through the official AWS SDK. Endpoint and credential settings
//! come from the stack configuration, so the same program deploys to AWS or
//! to a local S3 emulator.

pub mod error;
pub mod provider;
pub mod settings;

pub use error::{AwsError, Result};
pub use provider::{AwsProviderFactory, NAMESPACE, S3_BUCKET, S3Provider};
pub use settings::{AwsSettings, DEFAULT_REGION};

//! S3 bucket provider implementation

use crate::error::{AwsError, Result};
use crate::settings::AwsSettings;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Tag, Tagging};
use stackflow_cloud::{
    AuthStatus, CloudProvider, ProviderConfig, ProviderFactory, ResourceConfig, ResourceState,
    ResourceStatus,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Configuration namespace served by this provider
pub const NAMESPACE: &str = "aws";

/// Resource type of an S3 bucket
pub const S3_BUCKET: &str = "s3-bucket";

const SUFFIX_LEN: usize = 7;

/// Builds [`S3Provider`]s from `aws:*` configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsProviderFactory;

impl AwsProviderFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderFactory for AwsProviderFactory {
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    async fn configure(
        &self,
        config: ProviderConfig,
    ) -> stackflow_cloud::Result<Arc<dyn CloudProvider>> {
        let settings = AwsSettings::from_config(&config)?;
        Ok(Arc::new(S3Provider::new(settings).await))
    }
}

/// AWS provider managing S3 buckets
pub struct S3Provider {
    client: Client,
    settings: AwsSettings,
}

impl S3Provider {
    pub async fn new(settings: AwsSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()));
        if let Some((access_key, secret_key)) = settings.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "stackflow-config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.s3_endpoint {
            tracing::debug!("Using S3 endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            settings,
        }
    }

    pub fn settings(&self) -> &AwsSettings {
        &self.settings
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// State recorded for a bucket; create and read produce the same attributes
    fn bucket_state(&self, name: &str, region: &str, inputs: serde_json::Value) -> ResourceState {
        ResourceState::new(name, S3_BUCKET)
            .with_status(ResourceStatus::Ready)
            .with_inputs(inputs)
            .with_attribute("bucket", serde_json::json!(name))
            .with_attribute("arn", serde_json::json!(format!("arn:aws:s3:::{}", name)))
            .with_attribute("region", serde_json::json!(region))
            .with_attribute(
                "bucketDomainName",
                serde_json::json!(format!("{}.s3.amazonaws.com", name)),
            )
    }

    /// Region the bucket lives in, falling back to the recorded one when the
    /// location cannot be read
    async fn bucket_region(&self, current: &ResourceState) -> String {
        match self.client.get_bucket_location().bucket(&current.id).send().await {
            Ok(output) => region_from_constraint(output.location_constraint()),
            Err(e) => {
                tracing::debug!(
                    "GetBucketLocation {} failed, keeping recorded region: {}",
                    current.id,
                    DisplayErrorContext(&e)
                );
                self.recorded_region(current)
            }
        }
    }

    fn recorded_region(&self, current: &ResourceState) -> String {
        current
            .get_attribute::<String>("region")
            .unwrap_or_else(|| self.settings.region.clone())
    }

    async fn put_tags(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        if tags.is_empty() {
            self.client
                .delete_bucket_tagging()
                .bucket(name)
                .send()
                .await
                .map_err(|e| request_error("DeleteBucketTagging", name, e))?;
            return Ok(());
        }

        let tag_set = tags
            .iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| AwsError::InvalidConfig(format!("tag {}: {}", key, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| AwsError::InvalidConfig(e.to_string()))?;

        self.client
            .put_bucket_tagging()
            .bucket(name)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| request_error("PutBucketTagging", name, e))?;
        Ok(())
    }

    /// Delete every object so the bucket itself can be deleted
    async fn empty_bucket(&self, name: &str) -> Result<usize> {
        let mut deleted = 0;
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(name)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| request_error("ListObjectsV2", name, e))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    self.client
                        .delete_object()
                        .bucket(name)
                        .key(key)
                        .send()
                        .await
                        .map_err(|e| request_error("DeleteObject", name, e))?;
                    deleted += 1;
                }
            }

            if page.is_truncated() == Some(true) {
                token = page.next_continuation_token().map(str::to_string);
            }
            if token.is_none() {
                break;
            }
        }
        Ok(deleted)
    }

    async fn create_bucket(&self, name: &str, desired: &BucketInputs) -> Result<()> {
        tracing::info!("Creating S3 bucket {} in {}", name, self.settings.region);

        let mut request = self.client.create_bucket().bucket(name);
        // us-east-1 rejects an explicit location constraint
        if self.settings.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(
                        self.settings.region.as_str(),
                    ))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| AwsError::CreationFailed(format!("{}: {}", name, DisplayErrorContext(&e))))?;

        if !desired.tags.is_empty() {
            self.put_tags(name, &desired.tags).await?;
        }
        Ok(())
    }

    async fn delete_bucket(&self, name: &str, force_destroy: bool) -> Result<()> {
        if force_destroy {
            let deleted = self.empty_bucket(name).await?;
            if deleted > 0 {
                tracing::info!("Deleted {} object(s) from {}", deleted, name);
            }
        }

        tracing::info!("Deleting S3 bucket {}", name);
        match self.client.delete_bucket().bucket(name).send().await {
            Ok(_) => Ok(()),
            Err(e) if error_code(&e) == Some("NoSuchBucket") => {
                tracing::debug!("Bucket {} already gone", name);
                Ok(())
            }
            Err(e) => Err(AwsError::DeletionFailed(format!(
                "{}: {}",
                name,
                DisplayErrorContext(&e)
            ))),
        }
    }
}

#[async_trait]
impl CloudProvider for S3Provider {
    fn name(&self) -> &str {
        NAMESPACE
    }

    fn display_name(&self) -> &str {
        "AWS"
    }

    async fn check_auth(&self) -> stackflow_cloud::Result<AuthStatus> {
        if self.settings.skip_credentials_validation {
            return Ok(AuthStatus::ok(format!(
                "credentials not validated ({})",
                self.settings.region
            )));
        }

        match self.client.list_buckets().send().await {
            Ok(_) if self.settings.skip_requesting_account_id => {
                Ok(AuthStatus::ok(self.settings.region.clone()))
            }
            Ok(output) => Ok(AuthStatus::ok(
                output
                    .owner()
                    .and_then(|o| o.id())
                    .unwrap_or(self.settings.region.as_str())
                    .to_string(),
            )),
            Err(e) => Ok(AuthStatus::failed(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn read(&self, current: &ResourceState) -> stackflow_cloud::Result<Option<ResourceState>> {
        tracing::debug!("Reading S3 bucket {}", current.id);
        match self.client.head_bucket().bucket(&current.id).send().await {
            Ok(_) => {
                let region = self.bucket_region(current).await;
                Ok(Some(self.bucket_state(&current.id, &region, current.inputs.clone())))
            }
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(request_error("HeadBucket", &current.id, e).into()),
        }
    }

    async fn create(&self, desired: &ResourceConfig) -> stackflow_cloud::Result<ResourceState> {
        let inputs = BucketInputs::from_resource(desired)?;
        let name = match &inputs.bucket {
            Some(name) => name.clone(),
            None => generated_name(&desired.id),
        };
        validate_bucket_name(&name)?;

        self.create_bucket(&name, &inputs).await?;
        Ok(self.bucket_state(&name, &self.settings.region, desired.config.clone()))
    }

    async fn update(
        &self,
        desired: &ResourceConfig,
        current: &ResourceState,
    ) -> stackflow_cloud::Result<ResourceState> {
        let inputs = BucketInputs::from_resource(desired)?;

        // Bucket names are immutable: a new explicit name replaces the bucket
        if let Some(name) = inputs.bucket.as_deref().filter(|n| *n != current.id) {
            validate_bucket_name(name)?;
            self.create_bucket(name, &inputs).await?;
            let previous = BucketInputs::from_state(current)?;
            self.delete_bucket(&current.id, previous.force_destroy).await?;
            return Ok(self.bucket_state(name, &self.settings.region, desired.config.clone()));
        }

        let previous = BucketInputs::from_state(current)?;
        if previous.tags != inputs.tags {
            tracing::info!("Updating tags of S3 bucket {}", current.id);
            self.put_tags(&current.id, &inputs.tags).await?;
        }
        let region = self.recorded_region(current);
        Ok(self.bucket_state(&current.id, &region, desired.config.clone()))
    }

    async fn delete(&self, current: &ResourceState) -> stackflow_cloud::Result<()> {
        let inputs = BucketInputs::from_state(current)?;
        self.delete_bucket(&current.id, inputs.force_destroy).await?;
        Ok(())
    }
}

/// Inputs accepted by an `s3-bucket` resource
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketInputs {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    force_destroy: bool,
}

impl BucketInputs {
    fn from_value(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    fn from_resource(resource: &ResourceConfig) -> Result<Self> {
        if resource.resource_type != S3_BUCKET {
            return Err(AwsError::InvalidConfig(format!(
                "unsupported resource type: {}",
                resource.resource_type
            )));
        }
        Self::from_value(&resource.config)
    }

    fn from_state(state: &ResourceState) -> Result<Self> {
        Self::from_value(&state.inputs)
    }
}

/// `<logical-id>-<7 hex chars>`, lowercased to satisfy S3 naming rules
fn generated_name(id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", id.to_ascii_lowercase(), &suffix[..SUFFIX_LEN])
}

fn validate_bucket_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| AwsError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "only lowercase letters, digits, '-' and '.' are allowed",
        ));
    }
    let first = name.chars().next().unwrap_or('-');
    let last = name.chars().last().unwrap_or('-');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid("must begin and end with a letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain consecutive periods"));
    }
    Ok(())
}

/// GetBucketLocation reports us-east-1 as an empty constraint and the
/// legacy `EU` value for eu-west-1
fn region_from_constraint(constraint: Option<&BucketLocationConstraint>) -> String {
    match constraint.map(BucketLocationConstraint::as_str) {
        None | Some("") => "us-east-1".to_string(),
        Some("EU") => "eu-west-1".to_string(),
        Some(region) => region.to_string(),
    }
}

fn error_code<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> Option<&str> {
    err.as_service_error().and_then(|e| e.code())
}

fn is_missing<R>(err: &SdkError<aws_sdk_s3::operation::head_bucket::HeadBucketError, R>) -> bool
where
    R: std::fmt::Debug,
{
    if err.as_service_error().is_some_and(|e| e.is_not_found()) {
        return true;
    }
    matches!(error_code(err), Some("NoSuchBucket" | "NotFound"))
}

fn request_error<E, R>(operation: &str, bucket: &str, err: SdkError<E, R>) -> AwsError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    AwsError::Request(format!(
        "{} {}: {}",
        operation,
        bucket,
        DisplayErrorContext(&err)
    ))
}

//! `aws:*` stack configuration

use crate::error::{AwsError, Result};
use serde::Deserialize;
use stackflow_cloud::ProviderConfig;
use std::collections::BTreeMap;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Provider settings read from the `aws` configuration namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
    pub skip_credentials_validation: bool,
    pub skip_requesting_account_id: bool,
    /// Endpoint override for the S3 service
    pub s3_endpoint: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key: None,
            secret_key: None,
            force_path_style: false,
            skip_credentials_validation: false,
            skip_requesting_account_id: false,
            s3_endpoint: None,
        }
    }
}

/// `aws:endpoints` accepts a list of `{service: url}` objects or a single object
#[derive(Deserialize)]
#[serde(untagged)]
enum Endpoints {
    List(Vec<BTreeMap<String, String>>),
    Single(BTreeMap<String, String>),
}

impl Endpoints {
    fn find(self, service: &str) -> Option<String> {
        match self {
            Endpoints::List(entries) => entries
                .into_iter()
                .find_map(|mut entry| entry.remove(service)),
            Endpoints::Single(mut entry) => entry.remove(service),
        }
    }
}

impl AwsSettings {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let region = config
            .get("region")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string();

        let access_key = config.get("accessKey").map(str::to_string);
        let secret_key = config.get("secretKey").map(str::to_string);
        if access_key.is_some() != secret_key.is_some() {
            return Err(AwsError::InvalidConfig(
                "aws:accessKey and aws:secretKey must be set together".to_string(),
            ));
        }

        let path_style_key = ["s3ForcePathStyle", "s3_force_path_style"]
            .into_iter()
            .find(|key| config.get(key).is_some());
        let force_path_style = match path_style_key {
            Some(key) => config.get_bool(key)?.unwrap_or(false),
            None => false,
        };

        let endpoints: Option<Endpoints> = config.get_json("endpoints")?;
        let s3_endpoint = endpoints.and_then(|e| e.find("s3"));
        if let Some(url) = &s3_endpoint {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AwsError::InvalidConfig(format!(
                    "S3 endpoint must be an http(s) URL, got: {}",
                    url
                )));
            }
        }

        Ok(Self {
            region,
            access_key,
            secret_key,
            force_path_style,
            skip_credentials_validation: config
                .get_bool("skipCredentialsValidation")?
                .unwrap_or(false),
            skip_requesting_account_id: config
                .get_bool("skipRequestingAccountId")?
                .unwrap_or(false),
            s3_endpoint,
        })
    }

    /// Static credentials, when both keys are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(ak), Some(sk)) => Some((ak.as_str(), sk.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ProviderConfig {
        ProviderConfig::new("aws")
            .with("region", "us-east-1")
            .with("accessKey", "test")
            .with("secretKey", "test")
            .with("s3_force_path_style", "true")
            .with("skipCredentialsValidation", "true")
            .with("skipRequestingAccountId", "true")
            .with("endpoints", r#"[{"s3": "http://localhost:4566"}]"#)
    }

    #[test]
    fn test_defaults() {
        let settings = AwsSettings::from_config(&ProviderConfig::new("aws")).unwrap();
        assert_eq!(settings, AwsSettings::default());
        assert_eq!(settings.region, "us-east-1");
        assert!(settings.static_credentials().is_none());
    }

    #[test]
    fn test_local_emulator_config() {
        let settings = AwsSettings::from_config(&local_config()).unwrap();
        assert_eq!(settings.static_credentials(), Some(("test", "test")));
        assert!(settings.force_path_style);
        assert!(settings.skip_credentials_validation);
        assert!(settings.skip_requesting_account_id);
        assert_eq!(settings.s3_endpoint.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    fn test_camel_case_path_style() {
        let config = ProviderConfig::new("aws").with("s3ForcePathStyle", "true");
        assert!(AwsSettings::from_config(&config).unwrap().force_path_style);
    }

    #[test]
    fn test_single_endpoint_object() {
        let config = ProviderConfig::new("aws")
            .with("endpoints", r#"{"s3": "https://s3.example.test", "sqs": "http://q"}"#);
        let settings = AwsSettings::from_config(&config).unwrap();
        assert_eq!(settings.s3_endpoint.as_deref(), Some("https://s3.example.test"));
    }

    #[test]
    fn test_endpoints_without_s3() {
        let config = ProviderConfig::new("aws").with("endpoints", r#"[{"dynamodb": "http://localhost:4566"}]"#);
        assert!(AwsSettings::from_config(&config).unwrap().s3_endpoint.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let config = ProviderConfig::new("aws").with("accessKey", "only-half");
        assert!(matches!(
            AwsSettings::from_config(&config),
            Err(AwsError::InvalidConfig(_))
        ));

        let config = ProviderConfig::new("aws").with("skipCredentialsValidation", "maybe");
        assert!(matches!(
            AwsSettings::from_config(&config),
            Err(AwsError::CloudError(_))
        ));

        let config = ProviderConfig::new("aws").with("endpoints", "not json");
        assert!(AwsSettings::from_config(&config).is_err());

        let config = ProviderConfig::new("aws").with("endpoints", r#"[{"s3": "localhost:4566"}]"#);
        assert!(AwsSettings::from_config(&config).is_err());
    }
}

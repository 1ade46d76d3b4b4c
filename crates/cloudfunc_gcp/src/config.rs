use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml_ng::Value;

use crate::error::{DeployError, Result};

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub project: String,
    pub region: String,
    /// Overrides `{project}-staging`. A configured bucket is trusted to exist.
    pub staging_bucket: Option<String>,
    /// Delay between long-running operation polls.
    pub poll_interval: Duration,
}

impl DeployConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: DEFAULT_REGION.to_string(),
            staging_bucket: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_staging_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.staging_bucket = Some(bucket.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(DeployError::config("project not specified"));
        }
        if self.region.trim().is_empty() {
            return Err(DeployError::config("region not specified"));
        }
        if matches!(&self.staging_bucket, Some(bucket) if bucket.trim().is_empty()) {
            return Err(DeployError::config("staging bucket name is empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(DeployError::config("poll interval must be positive"));
        }
        Ok(())
    }

    pub fn default_staging_bucket(&self) -> String {
        format!("{}-staging", self.project)
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    env_variables: BTreeMap<String, Value>,
}

/// Read the `env_variables` mapping of an application-config YAML file.
pub fn load_app_config(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path)?;
    parse_app_config(&text)
}

/// Scalar values are stringified; nested values are rejected.
pub fn parse_app_config(text: &str) -> Result<BTreeMap<String, String>> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let config: AppConfig = serde_yaml_ng::from_str(text)?;
    config
        .env_variables
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => {
                    return Err(DeployError::config(format!(
                        "env_variables.{key} must be a scalar"
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

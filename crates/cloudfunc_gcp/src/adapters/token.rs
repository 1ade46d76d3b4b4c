//! Access tokens for the REST adapters. Acquiring credentials is left to the
//! platform tooling; these providers only pick up an existing token.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::ApiError;

pub const ACCESS_TOKEN_ENV: &str = "CLOUDFUNC_ACCESS_TOKEN";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// A token handed over by the caller.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Self)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Asks `gcloud auth print-access-token` once per provider.
#[derive(Debug, Default)]
pub struct GcloudToken {
    cached: OnceCell<String>,
}

impl GcloudToken {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        self.cached
            .get_or_try_init(|| async {
                let output = Command::new("gcloud")
                    .args(["auth", "print-access-token"])
                    .output()
                    .await
                    .map_err(|error| {
                        ApiError::Credentials(format!("failed to run gcloud: {error}"))
                    })?;
                if !output.status.success() {
                    return Err(ApiError::Credentials(
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    ));
                }
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if token.is_empty() {
                    return Err(ApiError::Credentials(
                        "gcloud returned an empty access token".to_string(),
                    ));
                }
                Ok(token)
            })
            .await
            .cloned()
    }
}

/// `CLOUDFUNC_ACCESS_TOKEN` when set, otherwise gcloud.
pub fn default_provider() -> Arc<dyn TokenProvider> {
    match StaticToken::from_env() {
        Some(token) => Arc::new(token),
        None => Arc::new(GcloudToken::new()),
    }
}

//! Deploy session: configuration, the remote seams and the staging bucket
//! resolved for this session.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::rest::GcpRestClient;
use crate::adapters::{FunctionsApi, StagingStore, TokenProvider};
use crate::config::DeployConfig;
use crate::error::{DeployError, Result};

/// Storage class of a bucket this tool creates.
pub const STAGING_STORAGE_CLASS: &str = "REGIONAL";

pub struct DeployClient<F, S> {
    config: DeployConfig,
    functions: F,
    storage: S,
    staging: OnceCell<String>,
}

impl<F: FunctionsApi, S: StagingStore> DeployClient<F, S> {
    pub fn new(config: DeployConfig, functions: F, storage: S) -> Result<Self> {
        config.validate()?;
        let staging = OnceCell::new_with(config.staging_bucket.clone());
        Ok(Self {
            config,
            functions,
            storage,
            staging,
        })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn project(&self) -> &str {
        &self.config.project
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn functions(&self) -> &F {
        &self.functions
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn location(&self) -> String {
        format!("projects/{}/locations/{}", self.project(), self.region())
    }

    pub fn function_id(&self, name: &str) -> String {
        format!("{}/functions/{name}", self.location())
    }

    /// The staging bucket, looked up (and created if missing) on first use.
    /// Later calls on the same client reuse the result.
    pub async fn staging_bucket(&self, cancel: &CancellationToken) -> Result<String> {
        self.staging
            .get_or_try_init(|| self.resolve_staging_bucket(cancel))
            .await
            .cloned()
    }

    async fn resolve_staging_bucket(&self, cancel: &CancellationToken) -> Result<String> {
        let bucket = self.config.default_staging_bucket();
        let created = match cancellable(cancel, self.storage.get_bucket(&bucket)).await? {
            Ok(()) => false,
            Err(error) if error.is_not_found() => {
                cancellable(
                    cancel,
                    self.storage.create_bucket(
                        self.project(),
                        &bucket,
                        STAGING_STORAGE_CLASS,
                        self.region(),
                    ),
                )
                .await?
                .map_err(|source| DeployError::Storage {
                    context: format!("create bucket {bucket}"),
                    source,
                })?;
                true
            }
            Err(source) => {
                return Err(DeployError::Storage {
                    context: format!("look up bucket {bucket}"),
                    source,
                })
            }
        };
        info!(bucket = %bucket, created, "staging_bucket_resolved");
        Ok(bucket)
    }
}

impl DeployClient<GcpRestClient, GcpRestClient> {
    pub fn connect(config: DeployConfig, token: Arc<dyn TokenProvider>) -> Result<Self> {
        let rest = GcpRestClient::new(token).map_err(|source| DeployError::Rpc {
            context: "create HTTP client".to_string(),
            source,
        })?;
        Self::new(config, rest.clone(), rest)
    }
}

/// Race `future` against `cancel`. A token that is already cancelled wins.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DeployError::Cancelled),
        value = future => Ok(value),
    }
}

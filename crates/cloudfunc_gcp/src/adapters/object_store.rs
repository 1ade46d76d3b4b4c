use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::ApiError;

/// Object contents, streamed to the store.
pub type ObjectBody = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Object storage used to hand the archive to the functions API.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Bucket metadata lookup. A missing bucket is `ApiError::NotFound`.
    async fn get_bucket(&self, bucket: &str) -> Result<(), ApiError>;

    async fn create_bucket(
        &self,
        project: &str,
        bucket: &str,
        storage_class: &str,
        location: &str,
    ) -> Result<(), ApiError>;

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<(), ApiError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ApiError>;
}

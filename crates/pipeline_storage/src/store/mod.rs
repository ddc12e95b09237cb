use std::{future::Future, path::Path, sync::Arc};

pub mod fs;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Durable object storage addressed by `(bucket, key)`.
pub trait ObjectStore {
    /// Returns whether the object exists without fetching its contents.
    fn exists(&self, bucket: &str, key: &str)
        -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Downloads the object to `dest`, overwriting any file already there.
    /// Fails with [`StoreError::NotFound`] when the object is absent.
    fn get_to_path(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Uploads `src` under `key`, replacing any previous object.
    fn put_from_path(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists every key under `prefix`. Keys ending in `/` are directory
    /// markers and carry no content.
    fn list(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

impl<T: ObjectStore + Send + Sync> ObjectStore for &T {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        (**self).exists(bucket, key).await
    }

    async fn get_to_path(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StoreError> {
        (**self).get_to_path(bucket, key, dest).await
    }

    async fn put_from_path(&self, bucket: &str, key: &str, src: &Path) -> Result<(), StoreError> {
        (**self).put_from_path(bucket, key, src).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(bucket, prefix).await
    }
}

impl<T: ObjectStore + Send + Sync> ObjectStore for Arc<T> {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        (**self).exists(bucket, key).await
    }

    async fn get_to_path(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StoreError> {
        (**self).get_to_path(bucket, key, dest).await
    }

    async fn put_from_path(&self, bucket: &str, key: &str, src: &Path) -> Result<(), StoreError> {
        (**self).put_from_path(bucket, key, src).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(bucket, prefix).await
    }
}

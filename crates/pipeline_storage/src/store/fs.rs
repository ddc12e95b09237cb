use std::path::{Component, Path, PathBuf};

use itertools::Itertools;

use crate::store::{ObjectStore, StoreError};

/// Object store backed by a local directory tree: `<root>/<bucket>/<key>`.
///
/// Uploads are staged under `<root>/.uploads` and renamed into place, so a
/// reader never observes a half-written object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    const UPLOADS_DIR: &str = ".uploads";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.starts_with('.') || bucket.contains(['/', '\\']) {
            return Err(StoreError::InvalidKey(format!("bucket '{bucket}'")));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let bucket_path = self.bucket_path(bucket)?;
        let relative = Path::new(key);

        let is_plain = !key.is_empty()
            && !key.ends_with('/')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(bucket_path.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_to_path(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if !self.exists(bucket, key).await? {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&path, dest).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn put_from_path(&self, bucket: &str, key: &str, src: &Path) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        let uploads = self.root.join(Self::UPLOADS_DIR);
        tokio::fs::create_dir_all(&uploads).await?;

        let staged = uploads.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::copy(src, &staged).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::rename(&staged, &path).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let bucket_path = self.bucket_path(bucket)?;
        if !tokio::fs::try_exists(&bucket_path).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![bucket_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&bucket_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        Ok(keys.into_iter().sorted().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(path: &Path, contents: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, contents).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        let src = dir.path().join("standup.txt");
        write(&src, "hello").await;
        store.put_from_path("transcripts", "standup.txt", &src).await.unwrap();

        assert!(store.exists("transcripts", "standup.txt").await.unwrap());

        let dest = dir.path().join("scratch/standup.txt");
        store.get_to_path("transcripts", "standup.txt", &dest).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&dest).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("objects"));

        let src = dir.path().join("a.txt");
        write(&src, "first").await;
        store.put_from_path("b", "a.txt", &src).await.unwrap();
        write(&src, "second").await;
        store.put_from_path("b", "a.txt", &src).await.unwrap();

        let keys = store.list("b", "").await.unwrap();
        assert_eq!(keys, vec!["a.txt".to_string()]);

        let dest = dir.path().join("out.txt");
        store.get_to_path("b", "a.txt", &dest).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&dest).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = store
            .get_to_path("videos", "missing.mp4", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err:?}");
        assert!(!store.exists("videos", "missing.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        write(&dir.path().join("models/summarizer/config.json"), "{}").await;
        write(&dir.path().join("models/summarizer/nested/spiece.model"), "x").await;
        write(&dir.path().join("models/other/config.json"), "{}").await;

        let keys = store.list("models", "summarizer/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "summarizer/config.json".to_string(),
                "summarizer/nested/spiece.model".to_string()
            ]
        );
        assert!(store.list("absent", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_keys_escaping_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        for key in ["../etc/passwd", "/abs", "", "dir/"] {
            let err = store.exists("videos", key).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "key {key:?}");
        }
        assert!(store.exists(".uploads", "x").await.is_err());
    }
}

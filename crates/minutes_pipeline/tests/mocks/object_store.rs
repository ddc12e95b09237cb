use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex},
};

use pipeline_storage::{ObjectStore, StoreError};

type Objects = BTreeMap<(String, String), Vec<u8>>;

#[derive(Clone, Default)]
pub struct MockObjectStore {
    pub objects: Arc<Mutex<Objects>>,
    pub list_calls: Arc<Mutex<Vec<(String, String)>>>,
    pub get_calls: Arc<Mutex<Vec<(String, String)>>>,
    pub put_calls: Arc<Mutex<Vec<(String, String)>>>,
    /// `(bucket, n)`: gets from `bucket` fail once `n` of them succeeded
    pub fail_gets_after: Option<(String, usize)>,
    pub fail_puts_with: Option<String>,
    /// keys whose gets fail with a transient error
    pub flaky_keys: Vec<String>,
}

impl MockObjectStore {
    pub fn with_object(self, bucket: &str, key: &str, contents: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), contents.to_vec());
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn injected(msg: &str) -> StoreError {
        StoreError::Io(std::io::Error::other(msg.to_string()))
    }
}

impl ObjectStore for MockObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.object(bucket, key).is_some())
    }

    async fn get_to_path(&self, bucket: &str, key: &str, dest: &Path) -> Result<(), StoreError> {
        let successful_gets = {
            let mut calls = self.get_calls.lock().unwrap();
            let previous = calls.iter().filter(|(b, _)| b == bucket).count();
            calls.push((bucket.to_string(), key.to_string()));
            previous
        };
        if let Some((ref fail_bucket, after)) = self.fail_gets_after {
            if fail_bucket == bucket && successful_gets >= after {
                return Err(Self::injected("connection reset while fetching object"));
            }
        }

        if self.flaky_keys.iter().any(|k| k == key) {
            return Err(Self::injected("read timed out"));
        }

        let contents = self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, contents)?;
        Ok(())
    }

    async fn put_from_path(&self, bucket: &str, key: &str, src: &Path) -> Result<(), StoreError> {
        self.put_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if let Some(ref msg) = self.fail_puts_with {
            return Err(Self::injected(msg));
        }

        let contents = std::fs::read(src)?;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), contents);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), prefix.to_string()));

        Ok(self
            .keys_in(bucket)
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

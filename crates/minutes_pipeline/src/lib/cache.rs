//! # Local Model Cache
//!
//! Materializes model/runtime bundles from the object store onto local
//! ephemeral storage and reuses them across invocations of the same warm
//! process.
//!
//! A bundle is ready only when every file of its manifest is present under
//! its local root. Fetches are staged in a sibling `.partial` directory and
//! swapped into place once complete, so an interrupted fetch can never be
//! mistaken for a ready bundle.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex},
};

use pipeline_storage::ObjectStore;

use crate::error::PipelineError;

/// Describes where a bundle lives remotely and what it must contain locally.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub logical_name: String,
    pub bucket: String,
    pub prefix: String,
    pub local_root: PathBuf,
    /// Files, relative to `local_root`, that must all exist before use.
    pub manifest: Vec<PathBuf>,
    /// Bundle-relative paths of binaries that need execute permission after
    /// download. Implicitly part of the manifest.
    pub executables: Vec<PathBuf>,
}

impl BundleSpec {
    fn required_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.manifest.iter().chain(self.executables.iter())
    }

    /// Required files not present as regular files under `root`.
    pub async fn missing_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        for relative in self.required_files() {
            let is_file = tokio::fs::metadata(root.join(relative))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                missing.push(relative.clone());
            }
        }
        missing
    }

    pub async fn is_ready(&self) -> bool {
        self.missing_files(&self.local_root).await.is_empty()
    }

    fn staging_root(&self) -> PathBuf {
        let mut name = self
            .local_root
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        self.local_root.with_file_name(name)
    }

    pub(crate) fn handle(&self) -> ReadyHandle {
        let executables = self
            .executables
            .iter()
            .filter_map(|relative| {
                let name = relative.file_name()?.to_str()?.to_string();
                Some((name, self.local_root.join(relative)))
            })
            .collect();

        ReadyHandle {
            logical_name: self.logical_name.clone(),
            root: self.local_root.clone(),
            executables,
        }
    }
}

/// Proof that a bundle passed its manifest check, plus the execution
/// environment the transform needs. Binaries are addressed by explicit path
/// rather than through `PATH`.
#[derive(Debug, Clone)]
pub struct ReadyHandle {
    logical_name: String,
    root: PathBuf,
    executables: HashMap<String, PathBuf>,
}

impl ReadyHandle {
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Absolute path of a bundled executable, by file name.
    pub fn executable(&self, name: &str) -> Option<&Path> {
        self.executables.get(name).map(PathBuf::as_path)
    }
}

/// Process-wide owner of local model bundles.
///
/// Holds one async guard per logical bundle so two invocations in the same
/// process never fetch the same bundle concurrently; the second caller waits
/// and then observes the first caller's result through the manifest check.
#[derive(Debug, Default)]
pub struct ModelCacheManager {
    guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ModelCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard_for(&self, logical_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        guards
            .entry(logical_name.to_string())
            .or_default()
            .clone()
    }

    /// Makes sure `bundle` is fully present locally, fetching it when the
    /// manifest check fails. A ready bundle is returned without any store
    /// call.
    #[tracing::instrument(skip_all, fields(bundle = %bundle.logical_name))]
    pub async fn ensure_ready<S>(
        &self,
        store: &S,
        bundle: &BundleSpec,
    ) -> Result<ReadyHandle, PipelineError>
    where
        S: ObjectStore + Sync,
    {
        let guard = self.guard_for(&bundle.logical_name);
        let _held = guard.lock().await;

        let missing = bundle.missing_files(&bundle.local_root).await;
        if missing.is_empty() {
            tracing::info!(root = ?bundle.local_root, "Model files already present, skipping download");
            return Ok(bundle.handle());
        }

        tracing::info!(missing = missing.len(), "Model files not found locally, downloading");
        let staging = bundle.staging_root();

        if let Err(e) = self.fetch(store, bundle, &staging).await {
            if let Err(cleanup) = remove_dir_if_exists(&staging).await {
                tracing::warn!(error = ?cleanup, path = ?staging, "Failed to clean up partial bundle");
            }
            return Err(e);
        }

        Ok(bundle.handle())
    }

    async fn fetch<S>(&self, store: &S, bundle: &BundleSpec, staging: &Path) -> Result<(), PipelineError>
    where
        S: ObjectStore + Sync,
    {
        let name = bundle.logical_name.as_str();
        let io_err = |e: std::io::Error| PipelineError::dependency(name, e);

        remove_dir_if_exists(staging).await.map_err(io_err)?;
        tokio::fs::create_dir_all(staging).await.map_err(io_err)?;

        tracing::info!(
            bucket = %bundle.bucket,
            prefix = %bundle.prefix,
            destination = ?bundle.local_root,
            "Downloading all model files"
        );
        let keys = store
            .list(&bundle.bucket, &bundle.prefix)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to list bundle objects"))
            .map_err(|e| PipelineError::dependency(name, e))?;

        let mut downloaded = Vec::new();
        for key in &keys {
            let Some(relative) = bundle_relative_path(&bundle.prefix, key)? else {
                continue;
            };

            let dest = staging.join(&relative);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            store
                .get_to_path(&bundle.bucket, key, &dest)
                .await
                .inspect_err(|e| tracing::error!(error = ?e, key, "Failed to download bundle object"))
                .map_err(|e| PipelineError::dependency(name, e))?;
            downloaded.push(relative);
        }

        // object storage does not keep permission bits
        for relative in downloaded
            .iter()
            .filter(|r| bundle.executables.iter().any(|e| e == *r))
        {
            tracing::info!(executable = ?relative, "Making bundled binary executable");
            mark_executable(&staging.join(relative)).await.map_err(io_err)?;
        }

        let missing = bundle.missing_files(staging).await;
        if !missing.is_empty() {
            tracing::error!(?missing, "Bundle download is incomplete");
            return Err(PipelineError::dependency(
                name,
                format!("bundle is missing expected files: {missing:?}"),
            ));
        }

        remove_dir_if_exists(&bundle.local_root).await.map_err(io_err)?;
        tokio::fs::rename(staging, &bundle.local_root)
            .await
            .map_err(io_err)?;

        tracing::info!(files = downloaded.len(), root = ?bundle.local_root, "Bundle ready");
        Ok(())
    }
}

/// Maps a remote key to its path inside the bundle. Directory markers and the
/// prefix itself map to `None`.
fn bundle_relative_path(prefix: &str, key: &str) -> Result<Option<PathBuf>, PipelineError> {
    if key.ends_with('/') {
        return Ok(None);
    }
    let Some(relative) = key.strip_prefix(prefix) else {
        tracing::warn!(key, prefix, "Listed key outside of bundle prefix, skipping");
        return Ok(None);
    };
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return Ok(None);
    }

    let path = PathBuf::from(relative);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(PipelineError::dependency(
            prefix,
            format!("refusing to materialize unsafe key '{key}'"),
        ));
    }
    Ok(Some(path))
}

async fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    tokio::fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

mod mocks;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use minutes_pipeline::{BundleSpec, ErrorKind, ModelCacheManager};
use mocks::object_store::MockObjectStore;

const MODEL_BUCKET: &str = "models";
const PREFIX: &str = "summarizer-model/";
const MANIFEST: [&str; 3] = ["config.json", "spiece.model", "model.safetensors"];

fn bundle(scratch: &Path) -> BundleSpec {
    BundleSpec {
        logical_name: "summarizer-model".into(),
        bucket: MODEL_BUCKET.into(),
        prefix: PREFIX.into(),
        local_root: scratch.join("summarizer-model"),
        manifest: MANIFEST.iter().map(PathBuf::from).collect(),
        executables: vec![PathBuf::from("bin/generate")],
    }
}

fn store_with_bundle() -> MockObjectStore {
    let mut store = MockObjectStore::default()
        .with_object(MODEL_BUCKET, PREFIX, b"")
        .with_object(MODEL_BUCKET, "summarizer-model/bin/", b"")
        .with_object(MODEL_BUCKET, "summarizer-model/bin/generate", b"#!/bin/sh\n");
    for file in MANIFEST {
        store = store.with_object(MODEL_BUCKET, &format!("{PREFIX}{file}"), file.as_bytes());
    }
    store
}

fn populate(root: &Path, files: &[&str]) {
    for file in files {
        let path = root.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"cached").unwrap();
    }
}

// ─── Readiness ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fully_cached_bundle_makes_no_store_calls() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    populate(&bundle.local_root, &MANIFEST);
    populate(&bundle.local_root, &["bin/generate"]);

    // an empty store would fail any fetch
    let store = MockObjectStore::default();
    let list_calls = store.list_calls.clone();
    let get_calls = store.get_calls.clone();

    let handle = ModelCacheManager::new()
        .ensure_ready(&store, &bundle)
        .await
        .expect("cached bundle should be ready");

    assert_eq!(handle.root(), bundle.local_root.as_path());
    assert!(list_calls.lock().unwrap().is_empty(), "no listing expected");
    assert!(get_calls.lock().unwrap().is_empty(), "no download expected");
}

#[tokio::test]
async fn test_missing_one_file_triggers_full_fetch() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    populate(&bundle.local_root, &["config.json", "spiece.model", "bin/generate"]);
    assert!(!bundle.is_ready().await);

    let store = store_with_bundle();
    let list_calls = store.list_calls.clone();

    ModelCacheManager::new()
        .ensure_ready(&store, &bundle)
        .await
        .expect("fetch should succeed");

    assert_eq!(
        *list_calls.lock().unwrap(),
        vec![(MODEL_BUCKET.to_string(), PREFIX.to_string())]
    );
    assert!(bundle.is_ready().await);

    // re-fetched, not resumed: previously cached files are replaced
    let config = std::fs::read_to_string(bundle.local_root.join("config.json")).unwrap();
    assert_eq!(config, "config.json");
}

#[tokio::test]
async fn test_warm_context_does_not_refetch() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = store_with_bundle();
    let list_calls = store.list_calls.clone();

    let manager = ModelCacheManager::new();
    manager.ensure_ready(&store, &bundle).await.unwrap();
    manager.ensure_ready(&store, &bundle).await.unwrap();

    assert_eq!(list_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fresh_context_refetches_after_local_storage_is_wiped() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = store_with_bundle();
    let list_calls = store.list_calls.clone();

    ModelCacheManager::new().ensure_ready(&store, &bundle).await.unwrap();
    std::fs::remove_dir_all(&bundle.local_root).unwrap();
    ModelCacheManager::new().ensure_ready(&store, &bundle).await.unwrap();

    assert_eq!(list_calls.lock().unwrap().len(), 2);
}

// ─── Fetch details ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_mirrors_layout_and_skips_directory_markers() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = store_with_bundle();
    let get_calls = store.get_calls.clone();

    let handle = ModelCacheManager::new()
        .ensure_ready(&store, &bundle)
        .await
        .unwrap();

    let fetched = get_calls.lock().unwrap();
    assert_eq!(fetched.len(), MANIFEST.len() + 1, "markers must not be downloaded");
    assert!(fetched.iter().all(|(_, key)| !key.ends_with('/')));

    let generate = handle.executable("generate").expect("runner should be exposed");
    assert_eq!(generate, bundle.local_root.join("bin/generate").as_path());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(generate).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "bundled runner should be executable");
    }
}

#[tokio::test]
async fn test_incomplete_remote_bundle_is_a_dependency_error() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = MockObjectStore::default()
        .with_object(MODEL_BUCKET, "summarizer-model/config.json", b"{}")
        .with_object(MODEL_BUCKET, "summarizer-model/bin/generate", b"");

    let err = ModelCacheManager::new()
        .ensure_ready(&store, &bundle)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyFetchError);
    assert!(err.is_retryable());
    assert!(!bundle.local_root.exists());
}

// ─── Failure injection ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_failure_mid_list_leaves_cache_not_ready() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = MockObjectStore {
        fail_gets_after: Some((MODEL_BUCKET.to_string(), 2)),
        ..store_with_bundle()
    };

    let err = ModelCacheManager::new()
        .ensure_ready(&store, &bundle)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyFetchError);
    assert!(!bundle.is_ready().await, "partial bundle must not be ready");
    assert!(!bundle.local_root.exists());
    assert!(!scratch.path().join("summarizer-model.partial").exists());
}

#[tokio::test]
async fn test_failed_fetch_is_retried_on_next_call() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let manager = ModelCacheManager::new();

    let flaky = MockObjectStore {
        fail_gets_after: Some((MODEL_BUCKET.to_string(), 1)),
        ..store_with_bundle()
    };
    assert!(manager.ensure_ready(&flaky, &bundle).await.is_err());

    let healthy = store_with_bundle();
    manager
        .ensure_ready(&healthy, &bundle)
        .await
        .expect("retry should fetch the whole bundle");
    assert!(bundle.is_ready().await);
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
    let scratch = tempfile::tempdir().unwrap();
    let bundle = bundle(scratch.path());
    let store = store_with_bundle();
    let list_calls = store.list_calls.clone();
    let manager = Arc::new(ModelCacheManager::new());

    let (first, second) = tokio::join!(
        manager.ensure_ready(&store, &bundle),
        manager.ensure_ready(&store, &bundle)
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(list_calls.lock().unwrap().len(), 1);
}

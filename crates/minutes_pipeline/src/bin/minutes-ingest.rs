use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use pipeline_storage::{FsObjectStore, FsQueue};

use minutes_pipeline::{
    config::{IngestionConfig, StorageArgs},
    ingress,
    tracing::init_tracing_subscriber,
    StageWorkerBuilder,
};

#[derive(Parser)]
#[command(name = "minutes-ingest", about = "HTTP ingress for uploaded meeting videos")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    config: IngestionConfig,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let worker = StageWorkerBuilder::new()
        .store(FsObjectStore::new(&cli.storage.object_store_root))
        .queue(FsQueue::new(
            &cli.storage.queue_root,
            cli.storage.visibility_timeout(),
        ))
        .build_ingestion(cli.config);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    tracing::info!(addr = %cli.bind, "Ingestion server listening");

    axum::serve(listener, ingress::router(Arc::new(worker)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Ingestion server failed")?;

    Ok(())
}

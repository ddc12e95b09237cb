use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pipeline_storage::{FsObjectStore, FsQueue};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use minutes_pipeline::{
    config::{IngestionConfig, StorageArgs, SummarizationConfig, TranscriptionConfig},
    event::{HttpEvent, StageResponse},
    handle_queue_event,
    tracing::init_tracing_subscriber,
    PipelineError, QueuePoller, StageWorkerBuilder,
};

#[derive(Parser)]
#[command(name = "minutes-pipeline", about = "Video transcription and meeting minutes workers")]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PollingArgs {
    /// Maximum records delivered per batch
    #[arg(long, env = "BATCH_SIZE", default_value = "10")]
    batch_size: usize,

    /// Seconds to wait after an empty receive
    #[arg(long, env = "IDLE_WAIT_SECS", default_value = "5")]
    idle_wait_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Consume "process this object" messages
    Transcribe {
        /// Queue to consume
        #[arg(long, env = "TRANSCRIPTION_QUEUE")]
        queue: String,

        #[command(flatten)]
        config: TranscriptionConfig,

        #[command(flatten)]
        polling: PollingArgs,
    },
    /// Consume "summarize this transcript" messages
    Summarize {
        /// Queue to consume
        #[arg(long, env = "SUMMARIZATION_QUEUE")]
        queue: String,

        #[command(flatten)]
        config: SummarizationConfig,

        #[command(flatten)]
        polling: PollingArgs,
    },
    /// Handle one event read from stdin and print the response
    Invoke {
        #[command(subcommand)]
        stage: Stage,
    },
}

#[derive(Subcommand)]
enum Stage {
    Ingest {
        #[command(flatten)]
        config: IngestionConfig,
    },
    Transcribe {
        #[command(flatten)]
        config: TranscriptionConfig,
    },
    Summarize {
        #[command(flatten)]
        config: SummarizationConfig,
    },
}

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown requested, finishing current batch...");
        trigger.cancel();
    });
    token
}

async fn read_event() -> anyhow::Result<serde_json::Value> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read event from stdin")?;
    serde_json::from_str(&raw).context("Event is not valid JSON")
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

    let store = Arc::new(FsObjectStore::new(&cli.storage.object_store_root));
    let queue = Arc::new(FsQueue::new(
        &cli.storage.queue_root,
        cli.storage.visibility_timeout(),
    ));
    let builder = StageWorkerBuilder::new()
        .store(store)
        .queue(queue.clone());

    match cli.command {
        Command::Transcribe {
            queue: queue_name,
            config,
            polling,
        } => {
            let worker = builder
                .transcriber(config.transcriber())
                .build_transcription(config);
            QueuePoller::new(queue, queue_name)
                .batch_size(polling.batch_size)
                .idle_wait(Duration::from_secs(polling.idle_wait_secs))
                .run(&worker, shutdown_token())
                .await?;
        }
        Command::Summarize {
            queue: queue_name,
            config,
            polling,
        } => {
            let worker = builder
                .summarizer(config.summarizer())
                .build_summarization(config);
            QueuePoller::new(queue, queue_name)
                .batch_size(polling.batch_size)
                .idle_wait(Duration::from_secs(polling.idle_wait_secs))
                .run(&worker, shutdown_token())
                .await?;
        }
        Command::Invoke { stage } => {
            let event = read_event().await?;
            let response = match stage {
                Stage::Ingest { config } => {
                    let worker = builder.build_ingestion(config);
                    match serde_json::from_value::<HttpEvent>(event) {
                        Ok(event) => worker.handle(event).await,
                        Err(e) => StageResponse::from_error(500, &PipelineError::from(e)),
                    }
                }
                Stage::Transcribe { config } => {
                    let worker = builder
                        .transcriber(config.transcriber())
                        .build_transcription(config);
                    handle_queue_event(&worker, event).await
                }
                Stage::Summarize { config } => {
                    let worker = builder
                        .summarizer(config.summarizer())
                        .build_summarization(config);
                    handle_queue_event(&worker, event).await
                }
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

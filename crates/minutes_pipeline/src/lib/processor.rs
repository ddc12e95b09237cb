//! Stage worker execution harness.
//!
//! Each stage turns one unit of work into a `Result`; the harness is the only
//! place where errors become structured responses, after being logged with
//! full context.

pub mod builder;
mod ingestion;
mod summarization;
mod transcription;

use std::{future::Future, path::PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;

use crate::{
    error::PipelineError,
    event::{QueueBatch, QueueRecord, StageResponse},
};

pub use ingestion::IngestionWorker;
pub use summarization::{MinutesWritten, SummarizationWorker};
pub use transcription::TranscriptionWorker;

/// A queue-triggered stage that handles one record at a time.
pub trait RecordProcessor {
    const STAGE: &'static str;

    type Output: Serialize;

    fn process(
        &self,
        record: &QueueRecord,
    ) -> impl Future<Output = Result<Self::Output, PipelineError>> + Send;
}

/// Processes every record of `batch` independently.
///
/// Records that failed with a retryable error are listed under
/// `batchItemFailures` so only they get redelivered. Records whose input can
/// never succeed are listed under `rejectedItems` with their error kind and
/// must not be redelivered. Records that succeeded are never rolled back.
pub async fn handle_batch<P>(processor: &P, batch: QueueBatch) -> StageResponse
where
    P: RecordProcessor + Sync,
{
    tracing::info!(stage = P::STAGE, records = batch.records.len(), "Stage triggered");

    let mut results = Vec::new();
    let mut failures = Vec::new();
    let mut rejected = Vec::new();
    let mut first_error = None;

    for record in &batch.records {
        let span = tracing::info_span!("record", stage = P::STAGE, message_id = %record.message_id);
        match processor.process(record).instrument(span).await {
            Ok(output) => {
                results.push(serde_json::to_value(output).unwrap_or(Value::Null));
            }
            Err(e) => {
                log_failure(P::STAGE, Some(&record.message_id), &e);
                if e.is_retryable() {
                    failures.push(json!({ "itemIdentifier": record.message_id }));
                } else {
                    rejected.push(json!({ "itemIdentifier": record.message_id, "kind": e.kind() }));
                }
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => StageResponse::ok(json!({
            "message": format!("{} complete", P::STAGE),
            "results": results,
        })),
        Some(err) => {
            let mut response = StageResponse::from_error(500, &err);
            response.body["results"] = Value::Array(results);
            response.body["batchItemFailures"] = Value::Array(failures);
            response.body["rejectedItems"] = Value::Array(rejected);
            response
        }
    }
}

/// Entry point for a raw queue-trigger event.
pub async fn handle_queue_event<P>(processor: &P, event: Value) -> StageResponse
where
    P: RecordProcessor + Sync,
{
    match QueueBatch::from_value(event) {
        Ok(batch) => handle_batch(processor, batch).await,
        Err(e) => {
            log_failure(P::STAGE, None, &e);
            StageResponse::from_error(500, &e)
        }
    }
}

pub(crate) fn log_failure(stage: &str, message_id: Option<&str>, err: &PipelineError) {
    tracing::error!(
        stage,
        message_id,
        kind = %err.kind(),
        retryable = err.is_retryable(),
        error = ?err,
        "Error during stage execution: {err}"
    );
}

/// Scratch files of one unit of work, removed when it finishes.
struct ScratchFiles(Vec<PathBuf>);

impl ScratchFiles {
    fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self(paths.into_iter().collect())
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = ?path, "Cleaned up scratch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(error = ?e, path = ?path, "Failed to clean up scratch file"),
            }
        }
    }
}

async fn prepare_parent(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => tokio::fs::create_dir_all(parent).await,
        None => Ok(()),
    }
}

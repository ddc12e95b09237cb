use std::sync::Arc;

use pipeline_storage::ObjectStore;
use serde::Serialize;

use crate::{
    cache::{BundleSpec, ModelCacheManager},
    config::SummarizationConfig,
    error::PipelineError,
    event::QueueRecord,
    message::{minutes_key_for, scratch_file_name, PipelineMessage, TranscriptReference},
    processor::{prepare_parent, RecordProcessor, ScratchFiles},
    Summarizer,
};

/// Informational result of one summarized transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinutesWritten {
    pub output_bucket: String,
    pub output_key: String,
}

/// Turns a transcript into meeting minutes in the output store. Last stage:
/// nothing is enqueued downstream.
#[derive(Debug)]
pub struct SummarizationWorker<S, M>
where
    S: ObjectStore + Send + Sync + 'static,
    M: Summarizer + Send + Sync + 'static,
{
    pub(crate) store: S,
    pub(crate) summarizer: M,
    pub(crate) cache: Arc<ModelCacheManager>,
    pub(crate) bundle: BundleSpec,
    pub(crate) config: SummarizationConfig,
}

impl<S, M> RecordProcessor for SummarizationWorker<S, M>
where
    S: ObjectStore + Send + Sync + 'static,
    M: Summarizer + Send + Sync + 'static,
{
    const STAGE: &'static str = "Summarization";

    type Output = MinutesWritten;

    async fn process(&self, record: &QueueRecord) -> Result<MinutesWritten, PipelineError> {
        let reference = TranscriptReference::from_body(&record.body)?;
        let source_bucket = reference.bucket_or(&self.config.intermediate_bucket);
        let output_key = minutes_key_for(&reference.transcript_key)?;
        tracing::info!(transcript_key = %reference.transcript_key, "Processing transcript");

        let scratch = &self.config.scratch_dir;
        let transcript_path = scratch
            .join("input")
            .join(scratch_file_name(&reference.transcript_key)?);
        let minutes_path = scratch
            .join("output")
            .join(scratch_file_name(&output_key)?);
        let _scratch_files = ScratchFiles::new([transcript_path.clone(), minutes_path.clone()]);

        self.store
            .get_to_path(source_bucket, &reference.transcript_key, &transcript_path)
            .await
            .map_err(|e| PipelineError::input_fetch(source_bucket, &reference.transcript_key, e))?;

        let model = self.cache.ensure_ready(&self.store, &self.bundle).await?;

        let transcript = tokio::fs::read(&transcript_path)
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|e| PipelineError::InputFetch {
                bucket: source_bucket.to_string(),
                key: reference.transcript_key.clone(),
                reason: e.to_string(),
            })?;

        let response = self
            .summarizer
            .summarize(&transcript, &model)
            .await
            .map_err(PipelineError::transformation)?;
        if response.summary.trim().is_empty() {
            return Err(PipelineError::transformation("summarizer produced no output"));
        }

        let persist = |e: std::io::Error| {
            PipelineError::persistence("failed to write minutes locally", e)
        };
        prepare_parent(&minutes_path).await.map_err(persist)?;
        tokio::fs::write(&minutes_path, response.summary.as_bytes())
            .await
            .map_err(persist)?;

        let output_bucket = &self.config.output_bucket;
        self.store
            .put_from_path(output_bucket, &output_key, &minutes_path)
            .await
            .map_err(|e| PipelineError::persistence("failed to upload minutes", e))?;
        tracing::info!(%output_bucket, %output_key, "Summarization complete");

        Ok(MinutesWritten {
            output_bucket: output_bucket.clone(),
            output_key,
        })
    }
}

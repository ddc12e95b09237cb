use std::sync::Arc;

use pipeline_storage::{MessageQueue, ObjectStore};

use crate::{
    cache::{BundleSpec, ModelCacheManager},
    config::TranscriptionConfig,
    error::PipelineError,
    event::QueueRecord,
    message::{scratch_file_name, transcript_key_for, PipelineMessage, TranscriptReference, WorkReference},
    processor::{prepare_parent, RecordProcessor, ScratchFiles},
    Transcriber,
};

/// Turns an uploaded video into a transcript in the intermediate store and
/// hands it to the summarizer queue.
#[derive(Debug)]
pub struct TranscriptionWorker<S, Q, T>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
{
    pub(crate) store: S,
    pub(crate) queue: Q,
    pub(crate) transcriber: T,
    pub(crate) cache: Arc<ModelCacheManager>,
    pub(crate) bundle: BundleSpec,
    pub(crate) config: TranscriptionConfig,
}

impl<S, Q, T> RecordProcessor for TranscriptionWorker<S, Q, T>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
{
    const STAGE: &'static str = "Transcription";

    type Output = TranscriptReference;

    async fn process(&self, record: &QueueRecord) -> Result<TranscriptReference, PipelineError> {
        let reference = WorkReference::from_body(&record.body)?;
        let transcript_key = transcript_key_for(&reference.key)?;

        let scratch = &self.config.scratch_dir;
        let media_path = scratch
            .join("input")
            .join(scratch_file_name(&reference.key)?);
        let transcript_path = scratch.join("output").join(&transcript_key);
        let _scratch_files = ScratchFiles::new([media_path.clone(), transcript_path.clone()]);

        tracing::info!(bucket = %reference.bucket, key = %reference.key, path = ?media_path, "Downloading media");
        self.store
            .get_to_path(&reference.bucket, &reference.key, &media_path)
            .await
            .map_err(|e| PipelineError::input_fetch(&reference.bucket, &reference.key, e))?;

        let model = self.cache.ensure_ready(&self.store, &self.bundle).await?;

        let response = self
            .transcriber
            .transcribe(&media_path, &model)
            .await
            .map_err(PipelineError::transformation)?;
        let transcript = response.text();
        if transcript.is_empty() {
            tracing::warn!(key = %reference.key, "Transcription produced no speech segments");
        }

        let persist = |e: std::io::Error| {
            PipelineError::persistence("failed to write transcript locally", e)
        };
        prepare_parent(&transcript_path).await.map_err(persist)?;
        tokio::fs::write(&transcript_path, transcript.as_bytes())
            .await
            .map_err(persist)?;

        let bucket = &self.config.intermediate_bucket;
        tracing::info!(%bucket, key = %transcript_key, "Uploading transcript");
        self.store
            .put_from_path(bucket, &transcript_key, &transcript_path)
            .await
            .map_err(|e| PipelineError::persistence("failed to upload transcript", e))?;

        let message = TranscriptReference::new(transcript_key, bucket.as_str());
        let message_id = self
            .queue
            .send(&self.config.summarizer_queue, &message.to_body()?)
            .await?;
        tracing::info!(%message_id, ?message, "Successfully sent transcript info to summarizer queue");

        Ok(message)
    }
}

use pipeline_storage::{MessageQueue, ObjectStore};
use serde_json::json;

use crate::{
    config::IngestionConfig,
    error::PipelineError,
    event::{HttpEvent, StageResponse},
    message::{PipelineMessage, WorkReference},
    processor::log_failure,
};

/// Verifies an uploaded object exists and queues it for transcription.
#[derive(Debug)]
pub struct IngestionWorker<S, Q>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
{
    pub(crate) store: S,
    pub(crate) queue: Q,
    pub(crate) config: IngestionConfig,
}

impl<S, Q> IngestionWorker<S, Q>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
{
    const STAGE: &str = "Ingestion";

    /// `200 {message, bucket, key}` once the work reference is queued,
    /// `404` when the object does not exist, `500` otherwise.
    pub async fn handle(&self, event: HttpEvent) -> StageResponse {
        // headers only; bodies are never logged
        tracing::info!(headers = %event.headers, "Ingestion triggered");

        match self.ingest(&event).await {
            Ok(reference) => StageResponse::ok(json!({
                "message": "File exists. Notification sent to processing queue.",
                "bucket": reference.bucket,
                "key": reference.key,
            })),
            Err(e) => {
                log_failure(Self::STAGE, None, &e);
                let status = match e {
                    PipelineError::InputNotFound { .. } => 404,
                    _ => 500,
                };
                StageResponse::from_error(status, &e)
            }
        }
    }

    #[tracing::instrument(skip_all)]
    async fn ingest(&self, event: &HttpEvent) -> Result<WorkReference, PipelineError> {
        let reference = serde_json::from_value::<WorkReference>(event.json_body()?)?;
        reference.validate()?;
        tracing::info!(bucket = %reference.bucket, key = %reference.key, "Received upload reference");

        let exists = self
            .store
            .exists(&reference.bucket, &reference.key)
            .await
            .map_err(|e| PipelineError::input_fetch(&reference.bucket, &reference.key, e))?;
        if !exists {
            return Err(PipelineError::InputNotFound {
                bucket: reference.bucket,
                key: reference.key,
            });
        }

        let message_id = self
            .queue
            .send(&self.config.transcription_queue, &reference.to_body()?)
            .await?;
        tracing::info!(%message_id, queue = %self.config.transcription_queue, "Message sent to processing queue");

        Ok(reference)
    }
}

use std::{collections::HashSet, time::Duration};

use pipeline_storage::{MessageQueue, QueueError};
use tokio_util::sync::CancellationToken;

use crate::{
    event::{QueueBatch, QueueRecord},
    processor::{handle_batch, RecordProcessor},
};

/// Delivers queue batches to a stage, standing in for the host's event
/// source. Messages are deleted once their record succeeded or was rejected
/// as non-retryable; retryable failures become visible again after the
/// queue's visibility timeout.
#[derive(Debug)]
pub struct QueuePoller<Q: MessageQueue> {
    queue: Q,
    queue_name: String,
    batch_size: usize,
    idle_wait: Duration,
}

impl<Q> QueuePoller<Q>
where
    Q: MessageQueue + Send + Sync,
{
    pub fn new(queue: Q, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            batch_size: 10,
            idle_wait: Duration::from_secs(5),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Receives and handles one batch. Returns the number of records
    /// delivered.
    #[tracing::instrument(skip_all, fields(queue = %self.queue_name))]
    pub async fn poll_once<P>(&self, processor: &P) -> Result<usize, QueueError>
    where
        P: RecordProcessor + Sync,
    {
        let messages = self.queue.receive(&self.queue_name, self.batch_size).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let batch = QueueBatch {
            records: messages
                .iter()
                .map(|m| QueueRecord {
                    message_id: m.message_id.clone(),
                    receipt_handle: Some(m.receipt_handle.clone()),
                    body: m.body.clone(),
                })
                .collect(),
        };

        let response = handle_batch(processor, batch).await;
        let failed = response.failed_item_ids().into_iter().collect::<HashSet<_>>();
        let rejected = response.rejected_item_ids().into_iter().collect::<HashSet<_>>();

        for message in &messages {
            if failed.contains(&message.message_id) {
                tracing::warn!(message_id = %message.message_id, "Leaving failed record for redelivery");
                continue;
            }
            if rejected.contains(&message.message_id) {
                tracing::error!(message_id = %message.message_id, "Dropping record that cannot succeed on redelivery");
            }
            self.queue
                .delete(&self.queue_name, &message.receipt_handle)
                .await?;
        }

        Ok(messages.len())
    }

    /// Polls until `shutdown` fires. A batch in progress always runs to
    /// completion before the loop exits.
    pub async fn run<P>(&self, processor: &P, shutdown: CancellationToken) -> Result<(), QueueError>
    where
        P: RecordProcessor + Sync,
    {
        tracing::info!(queue = %self.queue_name, stage = P::STAGE, "Polling queue");

        while !shutdown.is_cancelled() {
            let delivered = match self.poll_once(processor).await {
                Ok(delivered) => delivered,
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to poll queue");
                    0
                }
            };

            if delivered == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.idle_wait) => {}
                }
            }
        }

        tracing::info!(queue = %self.queue_name, "Poller stopped");
        Ok(())
    }
}

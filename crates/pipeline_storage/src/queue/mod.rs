use std::{future::Future, sync::Arc};

pub mod fs;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid queue identifier: {0}")]
    InvalidQueue(String),
    #[error("invalid receipt handle: {0}")]
    InvalidReceipt(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A message handed out by [`MessageQueue::receive`].
///
/// The message stays invisible to other receivers until its visibility
/// timeout lapses or it is deleted with its `receipt_handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// At-least-once message queue.
pub trait MessageQueue {
    /// Enqueues `body` and returns the new message id.
    fn send(&self, queue: &str, body: &str)
        -> impl Future<Output = Result<String, QueueError>> + Send;

    /// Receives up to `max_messages` visible messages.
    fn receive(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> impl Future<Output = Result<Vec<QueueMessage>, QueueError>> + Send;

    /// Acknowledges a received message so it is never redelivered.
    fn delete(
        &self,
        queue: &str,
        receipt_handle: &str,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;
}

impl<T: MessageQueue + Send + Sync> MessageQueue for &T {
    async fn send(&self, queue: &str, body: &str) -> Result<String, QueueError> {
        (**self).send(queue, body).await
    }

    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(queue, max_messages).await
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).delete(queue, receipt_handle).await
    }
}

impl<T: MessageQueue + Send + Sync> MessageQueue for Arc<T> {
    async fn send(&self, queue: &str, body: &str) -> Result<String, QueueError> {
        (**self).send(queue, body).await
    }

    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(queue, max_messages).await
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).delete(queue, receipt_handle).await
    }
}

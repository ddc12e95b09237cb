use std::sync::{Arc, Mutex};

use pipeline_storage::{MessageQueue, QueueError, QueueMessage};

#[derive(Clone, Default)]
pub struct MockQueue {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub fail_with: Option<String>,
}

impl MockQueue {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn bodies_for(&self, queue: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

impl MessageQueue for MockQueue {
    async fn send(&self, queue: &str, body: &str) -> Result<String, QueueError> {
        if let Some(ref msg) = self.fail_with {
            return Err(QueueError::Io(std::io::Error::other(msg.clone())));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((queue.to_string(), body.to_string()));
        Ok(format!("mock-{}", sent.len()))
    }

    async fn receive(&self, _queue: &str, _max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _queue: &str, _receipt_handle: &str) -> Result<(), QueueError> {
        Ok(())
    }
}

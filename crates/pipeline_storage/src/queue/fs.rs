use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use itertools::Itertools;

use crate::queue::{MessageQueue, QueueError, QueueMessage};

/// Spool-directory queue.
///
/// Each queue is a directory with a `ready/` and an `inflight/` spool.
/// Ready files are named `<enqueued_ms>-<message_id>`; receiving renames a
/// file into `inflight/` prefixed with its visibility deadline, and that
/// in-flight file name is the receipt handle. Expired in-flight messages move
/// back to `ready/` on the next receive.
#[derive(Debug, Clone)]
pub struct FsQueue {
    root: PathBuf,
    visibility_timeout: Duration,
}

impl FsQueue {
    const READY_DIR: &str = "ready";
    const INFLIGHT_DIR: &str = "inflight";
    const DEADLINE_SEPARATOR: &str = "__";

    pub fn new(root: impl Into<PathBuf>, visibility_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            visibility_timeout,
        }
    }

    fn queue_dirs(&self, queue: &str) -> Result<(PathBuf, PathBuf), QueueError> {
        if queue.is_empty() || queue.starts_with('.') || queue.contains(['/', '\\']) {
            return Err(QueueError::InvalidQueue(queue.to_string()));
        }
        let base = self.root.join(queue);
        Ok((base.join(Self::READY_DIR), base.join(Self::INFLIGHT_DIR)))
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    async fn file_names(dir: &Path) -> Result<Vec<String>, QueueError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names.into_iter().sorted().collect())
    }

    /// Moves in-flight messages whose deadline has passed back to `ready/`.
    async fn requeue_expired(&self, ready: &Path, inflight: &Path) -> Result<(), QueueError> {
        let now = Self::now_millis();
        for handle in Self::file_names(inflight).await? {
            let Some((deadline, original)) = handle.split_once(Self::DEADLINE_SEPARATOR) else {
                continue;
            };
            let Ok(deadline) = deadline.parse::<i64>() else {
                continue;
            };
            if deadline > now {
                continue;
            }

            match tokio::fs::rename(inflight.join(&handle), ready.join(original)).await {
                Ok(()) => tracing::debug!(spool_entry = original, "Visibility timeout lapsed, requeued"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl MessageQueue for FsQueue {
    #[tracing::instrument(skip(self, body))]
    async fn send(&self, queue: &str, body: &str) -> Result<String, QueueError> {
        let (ready, _) = self.queue_dirs(queue)?;
        tokio::fs::create_dir_all(&ready).await?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let name = format!("{:013}-{message_id}", Self::now_millis());

        // write then rename so receivers never read a partial body
        let staging = ready.with_file_name(format!(".{name}"));
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, ready.join(&name)).await?;

        Ok(message_id)
    }

    async fn receive(&self, queue: &str, max_messages: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let (ready, inflight) = self.queue_dirs(queue)?;
        tokio::fs::create_dir_all(&ready).await?;
        tokio::fs::create_dir_all(&inflight).await?;

        self.requeue_expired(&ready, &inflight).await?;

        let deadline = Self::now_millis() + self.visibility_timeout.as_millis() as i64;
        let mut messages = Vec::new();

        for name in Self::file_names(&ready).await? {
            if messages.len() >= max_messages {
                break;
            }
            let Some((_, message_id)) = name.split_once('-') else {
                continue;
            };

            let receipt_handle = format!("{deadline}{}{name}", Self::DEADLINE_SEPARATOR);
            let claimed = inflight.join(&receipt_handle);
            match tokio::fs::rename(ready.join(&name), &claimed).await {
                Ok(()) => {}
                // claimed by a concurrent receiver
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let body = tokio::fs::read_to_string(&claimed).await?;
            messages.push(QueueMessage {
                message_id: message_id.to_string(),
                receipt_handle,
                body,
            });
        }

        Ok(messages)
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), QueueError> {
        let (_, inflight) = self.queue_dirs(queue)?;
        if receipt_handle.is_empty() || receipt_handle.contains(['/', '\\']) {
            return Err(QueueError::InvalidReceipt(receipt_handle.to_string()));
        }

        match tokio::fs::remove_file(inflight.join(receipt_handle)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(receipt_handle, "Receipt handle expired before delete");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

//! # Pipeline Storage
//!
//! Collaborator interfaces the pipeline stages talk to: a durable object
//! store (get / put / head-exists / list) and an at-least-once message queue
//! with a visibility timeout.
//!
//! Both are exposed as traits so the stage workers can be driven by fakes in
//! tests. Filesystem-backed implementations are provided for local runs.

mod queue;
mod store;

pub use queue::fs::FsQueue;
pub use queue::{MessageQueue, QueueError, QueueMessage};
pub use store::fs::FsObjectStore;
pub use store::{ObjectStore, StoreError};

use std::{error::Error as StdError, fmt};

use pipeline_storage::{QueueError, StoreError};
use serde::Serialize;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a single unit of work inside a stage worker.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("input s3://{bucket}/{key} not found")]
    InputNotFound { bucket: String, key: String },
    #[error("failed to fetch input s3://{bucket}/{key}: {reason}")]
    InputFetch {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("failed to fetch dependency bundle '{bundle}': {reason}")]
    DependencyFetch { bundle: String, reason: String },
    #[error("transformation failed: {source}")]
    Transformation {
        #[source]
        source: BoxError,
    },
    #[error("failed to persist output: {context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    MalformedRequest,
    InputNotFound,
    InputFetchError,
    DependencyFetchError,
    TransformationError,
    PersistenceError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ErrorKind {
    /// Whether redelivering the same input may succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::MalformedRequest | ErrorKind::InputNotFound)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            PipelineError::InputNotFound { .. } => ErrorKind::InputNotFound,
            PipelineError::InputFetch { .. } => ErrorKind::InputFetchError,
            PipelineError::DependencyFetch { .. } => ErrorKind::DependencyFetchError,
            PipelineError::Transformation { .. } => ErrorKind::TransformationError,
            PipelineError::Persistence { .. } => ErrorKind::PersistenceError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Maps a store failure while fetching a stage input.
    pub(crate) fn input_fetch(bucket: &str, key: &str, err: StoreError) -> Self {
        if err.is_not_found() {
            PipelineError::InputNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        } else {
            PipelineError::InputFetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub(crate) fn transformation(source: impl Into<BoxError>) -> Self {
        PipelineError::Transformation {
            source: source.into(),
        }
    }

    pub(crate) fn persistence(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        PipelineError::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn dependency(bundle: &str, reason: impl fmt::Display) -> Self {
        PipelineError::DependencyFetch {
            bundle: bundle.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        PipelineError::persistence("failed to enqueue downstream message", err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(err: &dyn StdError) -> Vec<String> {
        std::iter::successors(Some(err), |&e| e.source())
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_persistence_keeps_queue_failure_chain() {
        let io = std::io::Error::other("disk full");
        let err = PipelineError::from(QueueError::Io(io));

        assert_eq!(err.kind(), ErrorKind::PersistenceError);
        let chain = chain(&err);
        assert_eq!(chain.len(), 3, "unexpected chain: {chain:?}");
        assert_eq!(chain.last().map(String::as_str), Some("disk full"));
    }

    #[test]
    fn test_transformation_keeps_runner_error_as_source() {
        let err = PipelineError::transformation(std::io::Error::other("runner crashed"));

        assert!(err.is_retryable());
        let source = err.source().expect("source should be kept");
        assert_eq!(source.to_string(), "runner crashed");
        assert!(format!("{err:?}").contains("runner crashed"));
    }

    #[test]
    fn test_transformation_from_message_has_no_further_source() {
        let err = PipelineError::transformation("summarizer produced no output");
        assert_eq!(err.to_string(), "transformation failed: summarizer produced no output");
        assert_eq!(chain(&err).len(), 2);
    }
}

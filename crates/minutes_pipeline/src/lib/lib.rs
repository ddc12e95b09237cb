mod cache;
pub mod config;
mod error;
pub mod event;
pub mod ingress;
mod llm;
pub mod message;
mod poller;
mod processor;
pub mod tracing;

pub use cache::{BundleSpec, ModelCacheManager, ReadyHandle};
pub use error::{BoxError, ErrorKind, PipelineError};
pub use llm::{
    seq2seq::Seq2SeqRunner,
    summarizer::{build_prompt, GenerationConfig, Summarizer, SummaryResponse, GENERATION_CONFIG},
    transcriber::{TranscribeResponse, TranscribeSegment, Transcriber},
    whisper::WhisperRunner,
    RunnerError,
};
pub use poller::QueuePoller;
pub use processor::{
    builder::StageWorkerBuilder, handle_batch, handle_queue_event, IngestionWorker, MinutesWritten,
    RecordProcessor, SummarizationWorker, TranscriptionWorker,
};

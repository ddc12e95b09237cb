//! Process configuration, read once at startup from flags or the
//! environment. Missing required values abort startup.

use std::{path::PathBuf, time::Duration};

use clap::Args;

use crate::{cache::BundleSpec, Seq2SeqRunner, WhisperRunner};

#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// Root directory of the filesystem object store
    #[arg(long, env = "OBJECT_STORE_ROOT", default_value = "/var/lib/minutes-pipeline/objects")]
    pub object_store_root: PathBuf,

    /// Root directory of the filesystem queue spool
    #[arg(long, env = "QUEUE_ROOT", default_value = "/var/lib/minutes-pipeline/queues")]
    pub queue_root: PathBuf,

    /// Seconds a received message stays invisible before redelivery
    #[arg(long, env = "QUEUE_VISIBILITY_TIMEOUT_SECS", default_value = "900")]
    pub visibility_timeout_secs: u64,
}

impl StorageArgs {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct IngestionConfig {
    /// Queue receiving "process this object" messages
    #[arg(long, env = "SQS_QUEUE_URL")]
    pub transcription_queue: String,
}

#[derive(Debug, Clone, Args)]
pub struct TranscriptionConfig {
    /// Bucket holding the transcriber model bundle
    #[arg(long, env = "MODEL_BUCKET")]
    pub model_bucket: String,

    /// Key prefix of the transcriber model bundle
    #[arg(long, env = "MODEL_PREFIX", default_value = "video-transcriber-models/")]
    pub model_prefix: String,

    /// Bucket receiving transcripts
    #[arg(long, env = "INTERMEDIATE_BUCKET")]
    pub intermediate_bucket: String,

    /// Queue receiving "summarize this transcript" messages
    #[arg(long, env = "SQS_SUMMARIZER_QUEUE_URL")]
    pub summarizer_queue: String,

    /// Scratch root for inputs, outputs and the model cache
    #[arg(long, env = "SCRATCH_DIR", default_value = "/tmp")]
    pub scratch_dir: PathBuf,

    /// Model weights inside the bundle, relative to its root
    #[arg(long, env = "TRANSCRIBER_MODEL_FILE", default_value = "model.bin")]
    pub model_file: PathBuf,

    /// Additional bundle files that must be present before transcribing
    #[arg(long, env = "TRANSCRIBER_MODEL_MANIFEST", value_delimiter = ',')]
    pub manifest: Vec<PathBuf>,

    /// Bundled media decoder
    #[arg(long, env = "TRANSCRIBER_DECODER", default_value = "ffmpeg")]
    pub decoder: String,

    /// Bundled speech-to-text runner
    #[arg(long, env = "TRANSCRIBER_RUNNER", default_value = "whisper-cli")]
    pub runner: String,
}

impl TranscriptionConfig {
    pub const CACHE_DIR: &str = "video-transcriber-models";

    pub fn bundle(&self) -> BundleSpec {
        BundleSpec {
            logical_name: Self::CACHE_DIR.to_string(),
            bucket: self.model_bucket.clone(),
            prefix: self.model_prefix.clone(),
            local_root: self.scratch_dir.join(Self::CACHE_DIR),
            manifest: std::iter::once(self.model_file.clone())
                .chain(self.manifest.iter().cloned())
                .collect(),
            executables: vec![PathBuf::from(&self.decoder), PathBuf::from(&self.runner)],
        }
    }

    pub fn transcriber(&self) -> WhisperRunner {
        WhisperRunner::new(&self.runner, &self.decoder, &self.model_file)
    }
}

#[derive(Debug, Clone, Args)]
pub struct SummarizationConfig {
    /// Bucket holding the summarizer model bundle
    #[arg(long, env = "MODEL_BUCKET")]
    pub model_bucket: String,

    /// Key prefix of the summarizer model bundle
    #[arg(long, env = "MODEL_PREFIX")]
    pub model_prefix: String,

    /// Bucket transcripts are read from when a message does not name one
    #[arg(long, env = "INTERMEDIATE_BUCKET")]
    pub intermediate_bucket: String,

    /// Bucket receiving the final minutes
    #[arg(long, env = "OUTPUT_BUCKET")]
    pub output_bucket: String,

    /// Scratch root for inputs, outputs and the model cache
    #[arg(long, env = "SCRATCH_DIR", default_value = "/tmp")]
    pub scratch_dir: PathBuf,

    /// Bundle files that must be present before summarizing
    #[arg(
        long,
        env = "SUMMARIZER_MODEL_MANIFEST",
        value_delimiter = ',',
        default_value = "config.json,generation_config.json,model.safetensors,special_tokens_map.json,spiece.model,tokenizer_config.json,tokenizer.json"
    )]
    pub manifest: Vec<PathBuf>,

    /// Bundled text-generation runner
    #[arg(long, env = "SUMMARIZER_RUNNER", default_value = "generate")]
    pub runner: String,
}

impl SummarizationConfig {
    pub const CACHE_DIR: &str = "summarizer-model";

    pub fn bundle(&self) -> BundleSpec {
        BundleSpec {
            logical_name: Self::CACHE_DIR.to_string(),
            bucket: self.model_bucket.clone(),
            prefix: self.model_prefix.clone(),
            local_root: self.scratch_dir.join(Self::CACHE_DIR),
            manifest: self.manifest.clone(),
            executables: vec![PathBuf::from(&self.runner)],
        }
    }

    pub fn summarizer(&self) -> Seq2SeqRunner {
        Seq2SeqRunner::new(&self.runner)
    }
}

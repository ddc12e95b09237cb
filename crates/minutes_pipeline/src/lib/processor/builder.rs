use std::sync::Arc;

use pipeline_storage::{MessageQueue, ObjectStore};

use crate::{
    cache::ModelCacheManager,
    config::{IngestionConfig, SummarizationConfig, TranscriptionConfig},
    IngestionWorker, SummarizationWorker, Summarizer, Transcriber, TranscriptionWorker,
};

/// Assembles stage workers from their collaborators.
///
/// Workers built from the same builder share one [`ModelCacheManager`], so
/// stages hosted in the same process never race on a bundle.
pub struct StageWorkerBuilder<S = (), Q = (), T = (), M = ()> {
    store: S,
    queue: Q,
    transcriber: T,
    summarizer: M,
    model_cache: Arc<ModelCacheManager>,
}

impl Default for StageWorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StageWorkerBuilder {
    pub fn new() -> Self {
        Self {
            store: (),
            queue: (),
            transcriber: (),
            summarizer: (),
            model_cache: Arc::new(ModelCacheManager::new()),
        }
    }
}

impl<S, Q, T, M> StageWorkerBuilder<S, Q, T, M> {
    pub fn store<S2: ObjectStore + Send + Sync + 'static>(
        self,
        store: S2,
    ) -> StageWorkerBuilder<S2, Q, T, M> {
        StageWorkerBuilder {
            store,
            queue: self.queue,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
            model_cache: self.model_cache,
        }
    }

    pub fn queue<Q2: MessageQueue + Send + Sync + 'static>(
        self,
        queue: Q2,
    ) -> StageWorkerBuilder<S, Q2, T, M> {
        StageWorkerBuilder {
            store: self.store,
            queue,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
            model_cache: self.model_cache,
        }
    }

    pub fn transcriber<T2: Transcriber + Send + Sync + 'static>(
        self,
        transcriber: T2,
    ) -> StageWorkerBuilder<S, Q, T2, M> {
        StageWorkerBuilder {
            store: self.store,
            queue: self.queue,
            transcriber,
            summarizer: self.summarizer,
            model_cache: self.model_cache,
        }
    }

    pub fn summarizer<M2: Summarizer + Send + Sync + 'static>(
        self,
        summarizer: M2,
    ) -> StageWorkerBuilder<S, Q, T, M2> {
        StageWorkerBuilder {
            store: self.store,
            queue: self.queue,
            transcriber: self.transcriber,
            summarizer,
            model_cache: self.model_cache,
        }
    }

    pub fn model_cache(mut self, model_cache: Arc<ModelCacheManager>) -> Self {
        self.model_cache = model_cache;
        self
    }
}

impl<S, Q, T, M> StageWorkerBuilder<S, Q, T, M>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
{
    pub fn build_ingestion(self, config: IngestionConfig) -> IngestionWorker<S, Q> {
        IngestionWorker {
            store: self.store,
            queue: self.queue,
            config,
        }
    }
}

impl<S, Q, T, M> StageWorkerBuilder<S, Q, T, M>
where
    S: ObjectStore + Send + Sync + 'static,
    Q: MessageQueue + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
{
    pub fn build_transcription(self, config: TranscriptionConfig) -> TranscriptionWorker<S, Q, T> {
        TranscriptionWorker {
            store: self.store,
            queue: self.queue,
            transcriber: self.transcriber,
            cache: self.model_cache,
            bundle: config.bundle(),
            config,
        }
    }
}

impl<S, Q, T, M> StageWorkerBuilder<S, Q, T, M>
where
    S: ObjectStore + Send + Sync + 'static,
    M: Summarizer + Send + Sync + 'static,
{
    pub fn build_summarization(self, config: SummarizationConfig) -> SummarizationWorker<S, M> {
        SummarizationWorker {
            store: self.store,
            summarizer: self.summarizer,
            cache: self.model_cache,
            bundle: config.bundle(),
            config,
        }
    }
}

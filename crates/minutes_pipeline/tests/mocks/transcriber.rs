use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use minutes_pipeline::{ReadyHandle, TranscribeResponse, Transcriber};

#[derive(Clone)]
pub struct MockTranscriber {
    pub segments: Vec<String>,
    /// `(media path, media contents, model root)` per call
    pub calls: Arc<Mutex<Vec<(PathBuf, Vec<u8>, PathBuf)>>>,
    pub fail_with: Option<String>,
}

impl MockTranscriber {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new(&[])
        }
    }
}

impl Transcriber for MockTranscriber {
    const TRANSCRIBER_MODEL: &'static str = "mock-whisper";
    type Error = anyhow::Error;

    async fn transcribe(
        &self,
        media_path: &Path,
        model: &ReadyHandle,
    ) -> Result<TranscribeResponse, Self::Error> {
        let contents = std::fs::read(media_path)?;
        self.calls
            .lock()
            .unwrap()
            .push((media_path.to_path_buf(), contents, model.root().to_path_buf()));
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(TranscribeResponse::from_lines(self.segments.clone()))
    }
}

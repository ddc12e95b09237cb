use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::{
    cache::ReadyHandle,
    llm::{stdout_of, RunnerError},
    TranscribeResponse, Transcriber,
};

/// Runs the speech-to-text binary shipped in the transcriber bundle.
///
/// Media is first decoded to 16 kHz mono PCM with the bundled `ffmpeg`; the
/// runner then prints one transcript segment per line.
#[derive(Debug, Clone)]
pub struct WhisperRunner {
    runner: String,
    decoder: String,
    model_file: PathBuf,
}

impl Default for WhisperRunner {
    fn default() -> Self {
        Self::new("whisper-cli", "ffmpeg", "model.bin")
    }
}

impl WhisperRunner {
    pub fn new(
        runner: impl Into<String>,
        decoder: impl Into<String>,
        model_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner: runner.into(),
            decoder: decoder.into(),
            model_file: model_file.into(),
        }
    }

    fn executable<'a>(&self, model: &'a ReadyHandle, name: &str) -> Result<&'a Path, RunnerError> {
        model
            .executable(name)
            .ok_or_else(|| RunnerError::MissingExecutable(name.to_string()))
    }

    #[tracing::instrument(skip(self, decoder))]
    async fn decode(&self, decoder: &Path, media_path: &Path, wav_path: &Path) -> Result<(), RunnerError> {
        let output = Command::new(decoder)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(media_path)
            .args(["-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le"])
            .arg(wav_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        stdout_of(decoder, output).map(|_| ())
    }

    async fn recognize(&self, runner: &Path, model: &ReadyHandle, wav_path: &Path) -> Result<String, RunnerError> {
        tracing::info!(model = %model.logical_name(), "Running transcription with Whisper...");
        let output = Command::new(runner)
            .arg("-m")
            .arg(model.path(&self.model_file))
            .arg("-f")
            .arg(wav_path)
            .args(["-nt", "-np"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        stdout_of(runner, output)
    }
}

impl Transcriber for WhisperRunner {
    const TRANSCRIBER_MODEL: &'static str = "whisper";

    type Error = RunnerError;

    async fn transcribe(
        &self,
        media_path: &Path,
        model: &ReadyHandle,
    ) -> Result<TranscribeResponse, Self::Error> {
        let decoder = self.executable(model, &self.decoder)?;
        let runner = self.executable(model, &self.runner)?;

        let wav_path = media_path.with_extension("decoded.wav");
        let result = match self.decode(decoder, media_path, &wav_path).await {
            Ok(()) => self.recognize(runner, model, &wav_path).await,
            Err(e) => Err(e),
        };

        // a failed decode may still leave a partial file behind
        match tokio::fs::remove_file(&wav_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!(error = ?e, path = ?wav_path, "Failed to clean up decoded audio");
            }
            _ => {}
        }

        let stdout = result?;
        let response = TranscribeResponse::from_lines(
            stdout.lines().map(str::trim).filter(|l| !l.is_empty()),
        );
        tracing::info!(segments = response.segments.len(), "Transcription complete.");

        Ok(response)
    }
}

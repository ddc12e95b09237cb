use std::process::Stdio;

use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    cache::ReadyHandle,
    llm::{
        stdout_of,
        summarizer::{build_prompt, GENERATION_CONFIG},
        RunnerError,
    },
    Summarizer, SummaryResponse,
};

/// Runs the text-generation binary shipped in the summarizer bundle.
///
/// The prompt goes in on stdin, the fixed generation bounds as flags, and the
/// decoded summary comes back on stdout.
#[derive(Debug, Clone)]
pub struct Seq2SeqRunner {
    runner: String,
}

impl Default for Seq2SeqRunner {
    fn default() -> Self {
        Self::new("generate")
    }
}

impl Seq2SeqRunner {
    pub fn new(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
        }
    }

    fn generation_args() -> Vec<String> {
        let config = GENERATION_CONFIG;
        let mut args = vec![
            "--max-input-tokens".to_string(),
            config.max_input_tokens.to_string(),
            "--max-new-tokens".to_string(),
            config.max_new_tokens.to_string(),
            "--num-beams".to_string(),
            config.num_beams.to_string(),
            "--no-repeat-ngram-size".to_string(),
            config.no_repeat_ngram_size.to_string(),
        ];
        if config.early_stopping {
            args.push("--early-stopping".to_string());
        }
        args
    }
}

impl Summarizer for Seq2SeqRunner {
    const SUMMARIZER_MODEL: &'static str = "flan-t5-base";

    type Error = RunnerError;

    async fn summarize(
        &self,
        transcript: &str,
        model: &ReadyHandle,
    ) -> Result<SummaryResponse, Self::Error> {
        let runner = model
            .executable(&self.runner)
            .ok_or_else(|| RunnerError::MissingExecutable(self.runner.clone()))?;

        tracing::info!(model = Self::SUMMARIZER_MODEL, "Generating summary...");
        let mut child = Command::new(runner)
            .arg("--model-dir")
            .arg(model.root())
            .args(Self::generation_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let prompt = build_prompt(transcript);
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("runner stdin unavailable"))?;

        let write_prompt = async move {
            let written = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write_prompt, child.wait_with_output());
        // a runner that failed early closes stdin; report its exit first
        let stdout = stdout_of(runner, output?)?;
        written?;

        let summary = stdout.trim().to_string();
        if summary.is_empty() {
            return Err(RunnerError::EmptyOutput(runner.display().to_string()));
        }

        Ok(SummaryResponse { summary })
    }
}

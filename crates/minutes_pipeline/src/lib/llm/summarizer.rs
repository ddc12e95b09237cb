use std::future::Future;

use crate::{cache::ReadyHandle, error::BoxError};

/// Fixed generation bounds. Part of the output contract: the same transcript
/// and model must yield the same minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationConfig {
    pub max_input_tokens: usize,
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub no_repeat_ngram_size: usize,
    pub early_stopping: bool,
}

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    max_input_tokens: 512,
    max_new_tokens: 300,
    num_beams: 4,
    no_repeat_ngram_size: 3,
    early_stopping: true,
};

const PROMPT_TEMPLATE: &str = include_str!("./prompts/minutes.txt");

/// Wraps a transcript in the meeting-minutes instruction template.
pub fn build_prompt(transcript: &str) -> String {
    format!("{PROMPT_TEMPLATE}{transcript}")
}

pub trait Summarizer {
    const SUMMARIZER_MODEL: &'static str;

    type Error: Into<BoxError>;

    fn summarize(
        &self,
        transcript: &str,
        model: &ReadyHandle,
    ) -> impl Future<Output = Result<SummaryResponse, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryResponse {
    pub summary: String,
}

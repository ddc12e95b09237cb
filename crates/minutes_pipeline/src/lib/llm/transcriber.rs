use std::{future::Future, path::Path};

use crate::{cache::ReadyHandle, error::BoxError};

/// Speech-to-text over a local media file using a ready model bundle.
pub trait Transcriber {
    const TRANSCRIBER_MODEL: &'static str;

    type Error: Into<BoxError>;

    fn transcribe(
        &self,
        media_path: &Path,
        model: &ReadyHandle,
    ) -> impl Future<Output = Result<TranscribeResponse, Self::Error>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeResponse {
    pub segments: Vec<TranscribeSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeSegment {
    pub text: String,
}

impl TranscribeResponse {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: lines
                .into_iter()
                .map(|text| TranscribeSegment { text: text.into() })
                .collect(),
        }
    }

    /// Flat transcript: segment texts in order, newline separated.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//! Pipeline message contracts exchanged between stages, and the key
//! derivation rules each stage uses to name its output.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::PipelineError;

/// A queue payload that carries everything the receiving stage needs to
/// locate its input.
pub trait PipelineMessage: Serialize + DeserializeOwned + Sized {
    /// Checks required fields after deserialization.
    fn validate(&self) -> Result<(), PipelineError>;

    fn from_body(body: &str) -> Result<Self, PipelineError> {
        let message = serde_json::from_str::<Self>(body)?;
        message.validate()?;
        Ok(message)
    }

    fn to_body(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::persistence("failed to encode message", e))
    }
}

/// Identifies an uploaded media object. Produced by ingestion, consumed by
/// transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkReference {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub key: String,
}

impl WorkReference {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl PipelineMessage for WorkReference {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.bucket.trim().is_empty() || self.key.trim().is_empty() {
            return Err(PipelineError::MalformedRequest(
                "Both 'bucket' and 'key' must be provided in the request body.".into(),
            ));
        }
        Ok(())
    }
}

/// Identifies a transcript in the intermediate store. Produced by
/// transcription, consumed by summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptReference {
    #[serde(default)]
    pub transcript_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_bucket: Option<String>,
}

impl TranscriptReference {
    pub fn new(transcript_key: impl Into<String>, intermediate_bucket: impl Into<String>) -> Self {
        Self {
            transcript_key: transcript_key.into(),
            intermediate_bucket: Some(intermediate_bucket.into()),
        }
    }

    /// The bucket named in the message, or `fallback` when the producer
    /// omitted it.
    pub fn bucket_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.intermediate_bucket
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(fallback)
    }
}

impl PipelineMessage for TranscriptReference {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.transcript_key.trim().is_empty() {
            return Err(PipelineError::MalformedRequest(
                "'transcript_key' must be provided in the message body.".into(),
            ));
        }
        Ok(())
    }
}

/// Splits `key` into `(directory_prefix, stem, extension)`. The prefix keeps
/// its trailing `/`; the extension excludes the dot.
fn split_key(key: &str) -> Result<(&str, &str, Option<&str>), PipelineError> {
    let (prefix, base_name) = match key.rfind('/') {
        Some(idx) => key.split_at(idx + 1),
        None => ("", key),
    };

    let (stem, extension) = match base_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base_name, None),
    };
    if stem.is_empty() {
        return Err(PipelineError::MalformedRequest(format!(
            "key '{key}' has an empty base name"
        )));
    }
    Ok((prefix, stem, extension))
}

/// `videos/clip.mp4` -> `clip.txt`
pub fn transcript_key_for(media_key: &str) -> Result<String, PipelineError> {
    let (_, stem, _) = split_key(media_key)?;
    Ok(format!("{stem}.txt"))
}

/// `meeting.txt` -> `meeting_minutes.txt`, keeping any directory prefix.
pub fn minutes_key_for(transcript_key: &str) -> Result<String, PipelineError> {
    let (prefix, stem, extension) = split_key(transcript_key)?;
    Ok(match extension {
        Some(ext) => format!("{prefix}{stem}_minutes.{ext}"),
        None => format!("{prefix}{stem}_minutes"),
    })
}

/// Final path segment of an object key, used to name scratch files.
pub(crate) fn scratch_file_name(key: &str) -> Result<&str, PipelineError> {
    match key.rsplit('/').next() {
        Some(name) if !matches!(name, "" | "." | "..") => Ok(name),
        _ => Err(PipelineError::MalformedRequest(format!(
            "key '{key}' does not name a file"
        ))),
    }
}

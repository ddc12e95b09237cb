pub mod object_store;
pub mod queue;
pub mod summarizer;
pub mod transcriber;

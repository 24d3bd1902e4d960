//! Chat-model extraction of EC elements from job descriptions

pub mod extractor;
pub mod prompts;

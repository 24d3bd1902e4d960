//! Error handling for the relativity search tool

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelativityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error("File format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Element extraction error: {0}")]
    Extraction(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Embedding dimensions don't match: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Non-finite score: {0}")]
    NonFiniteScore(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid penalty: {0}")]
    InvalidPenalty(String),

    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Output formatting error: {0}")]
    OutputFormatting(String),
}

pub type Result<T> = std::result::Result<T, RelativityError>;

/// Model2Vec surfaces its failures through anyhow
impl From<anyhow::Error> for RelativityError {
    fn from(err: anyhow::Error) -> Self {
        RelativityError::EmbeddingService(err.to_string())
    }
}

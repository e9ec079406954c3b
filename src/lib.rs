use thiserror::Error;

pub type Result<T> = std::result::Result<T, PolicyError>;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Invalid metadata filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Generation error: {0}")]
    Generation(#[from] generation::GenerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for PolicyError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod indexer;
pub mod retrieval;
pub mod session;

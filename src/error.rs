//! Error types for the panelforge generation pipeline.

use thiserror::Error;

/// Failures of the story stage. All of them end the current generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoryError {
    #[error("Prompt must not be empty")]
    InvalidPrompt,

    #[error("No valid story could be produced for this prompt; try a different prompt")]
    EmptyStory,

    #[error("Story service error: {0}")]
    Service(String),
}

/// Failures of a single image request. Any of them halts the image sequence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image request failed: {0}")]
    RequestFailed(String),

    #[error("Image service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed image response: {0}")]
    Malformed(String),

    #[error("Image response did not contain an imageUrl")]
    MissingImageUrl,
}

impl ImageError {
    /// Transport-level failures that a retry might clear.
    pub fn is_transient(&self) -> bool {
        match self {
            ImageError::RequestFailed(_) => true,
            ImageError::Status { status, .. } => *status == 429 || *status >= 500,
            ImageError::Malformed(_) | ImageError::MissingImageUrl => false,
        }
    }
}

impl StoryError {
    /// Transport-level failures that a retry might clear. An empty story is a
    /// definitive answer from the service and is never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoryError::Service(_))
    }
}

/// Crate-level errors for configuration, logging and client construction.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP client error: {0}")]
    ClientError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation task failed: {0}")]
    TaskFailed(String),

    #[error("Story generation failed: {0}")]
    Story(#[from] StoryError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

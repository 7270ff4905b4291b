//! Error types for chaptercast-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the chaptercast player
#[derive(Error, Debug)]
pub enum Error {
    /// External generator call failed or returned unusable data
    #[error("Generation error: {0}")]
    Generation(String),

    /// Speech synthesis succeeded but produced no audio
    #[error("Generation error: no audio returned for track {index}")]
    MissingAudio { index: usize },

    /// Malformed raw audio bytes
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Operation requested in an invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] chaptercast_common::Error),

}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Generation(err.to_string())
    }
}

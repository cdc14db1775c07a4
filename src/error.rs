//! Error types for setup and configuration
//!
//! Ordinary refused moves (empty cell, lone tile, busy board, finished game)
//! are not errors and never surface here.

use thiserror::Error;

/// Errors raised while building or configuring a game
#[derive(Debug, Error)]
pub enum GameError {
    /// Bad configuration value or request (non-positive counts and sizes)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A component was used before its setup step ran
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    /// Settings file could not be parsed or serialized
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GameError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GameError::InvalidArgument(message.into())
    }
}

impl From<toml::de::Error> for GameError {
    fn from(err: toml::de::Error) -> Self {
        GameError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GameError {
    fn from(err: toml::ser::Error) -> Self {
        GameError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GameError>;

/// Failure reported by a renderer while playing a transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The renderer could not animate a tile
    #[error("render failed: {0}")]
    Failed(String),

    /// A per-tile animation task panicked or was cancelled
    #[error("animation task failed: {0}")]
    Task(String),
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Expected, user-facing refusals. None of these abort a session; the host
/// surfaces them as disabled actions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("Not enough energy to tap")]
    InsufficientEnergy,

    #[error("No boosters remaining today")]
    NoBoostsRemaining,

    #[error("A booster is already active")]
    BoosterAlreadyActive,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EngineError {
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

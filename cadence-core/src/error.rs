use thiserror::Error;

/// All errors produced by cadence-core.
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("engine is not running")]
    NotRunning,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenceError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CadenceError::Configuration(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        CadenceError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;

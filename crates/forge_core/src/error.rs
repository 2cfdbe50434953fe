//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the audio engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio devices found")]
    NoDevicesFound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to play audio stream: {0}")]
    StreamPlayError(String),

    #[error("Failed to pause audio stream: {0}")]
    StreamPauseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Engine already running")]
    AlreadyRunning,

    #[error("Signal chain full: at most {capacity} {kind}s")]
    ChainFull { kind: &'static str, capacity: usize },

    #[error("Chain command queue full - audio thread has not drained it")]
    QueueFull,

    #[error("DSP error: {0}")]
    Dsp(#[from] forge_dsp::DspError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

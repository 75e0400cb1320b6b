//! Error types for Synheart Focus

use thiserror::Error;

/// Errors that can occur while running a focus session
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to load landmark models: {0}")]
    ModelLoad(String),

    #[error("Media access failed: {0}")]
    MediaAccess(String),

    #[error("No active session")]
    SessionNotActive,

    #[error("A session is already active")]
    SessionAlreadyActive,

    #[error("An analysis request is already in flight")]
    AnalysisInProgress,

    #[error("Analysis request failed: {0}")]
    AnalysisFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Landmark detector error: {0}")]
    Detector(String),

    #[error("Audio source error: {0}")]
    AudioSource(String),
}

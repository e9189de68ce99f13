// src/error.rs
//
// Failure taxonomy for the audio path.
//
// None of these ever reach the game loop or the UI. Each operation catches
// them at its own boundary, logs them, and reports an outcome value instead.

use thiserror::Error;

/// Failure while turning a fetched payload into a [`Track`](crate::track::Track).
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid MIDI payload: {0}")]
    Midi(#[from] midly::Error),

    #[error("timeline contains no notes")]
    Empty,
}

/// Audio-path failures.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The output device cannot start, or voices cannot be built for it.
    #[error("output device unavailable: {0}")]
    PlatformUnavailable(String),

    /// The track resource could not be fetched (404, network failure).
    #[error("track resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The fetched timeline is malformed.
    #[error("malformed track timeline: {0}")]
    ParseFailure(#[from] TrackError),

    /// The device was suspended by the platform mid-session.
    #[error("output device suspended")]
    TransientSuspension,
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

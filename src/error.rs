//! Error types returned by streams, device bindings and the manager.

use thiserror::Error;

/// A stream could not prepare itself for a sample rate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream cannot run at {0} Hz")]
    UnsupportedRate(u32),
    #[error("invalid stream format: {0}")]
    InvalidFormat(&'static str),
    #[error("stream error: {0}")]
    Other(String),
}

/// The output device could not be opened, started or paused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("no output device available")]
    NoDevice,
    #[error("device does not support {sample_rate} Hz with {channels} channels")]
    UnsupportedConfig { sample_rate: u32, channels: usize },
    #[error("failed to build output stream: {0}")]
    Build(String),
    #[error("failed to start output stream: {0}")]
    Play(String),
    #[error("failed to pause output stream: {0}")]
    Pause(String),
    #[error("device is not open")]
    Closed,
}

/// Status of a manager operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    /// The manager is disabled or has no sample rate yet.
    #[error("mixer is disabled or has no sample rate")]
    NotReady,
    #[error("stream is already registered")]
    DuplicateStream,
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,
    #[error(transparent)]
    Configure(#[from] StreamError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

pub type Result<T, E = MixerError> = core::result::Result<T, E>;

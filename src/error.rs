//! Crate-wide error type

use thiserror::Error;

/// Everything that can go wrong in the simulation, synthesis and settings layers.
#[derive(Error, Debug)]
pub enum Error {
    /// `start()` was asked to begin outside the simulation's value range.
    #[error("start value {value} must lie within [{min}, {max}]")]
    StartValueOutOfRange { value: f64, min: f64, max: f64 },

    /// Update listeners are fixed once a simulation is running.
    #[error("update listeners must be added before the simulation starts")]
    ListenerWhileRunning,

    /// Minimum visible change has to be strictly positive.
    #[error("minimum visible change must be positive, got {0}")]
    InvalidMinimumVisibleChange(f64),

    /// Synthesizer input that cannot produce a waveform.
    #[error("invalid synthesis input: {0}")]
    InvalidInput(String),

    /// An output sink failed to play a clip.
    #[error("playback failed: {0}")]
    Playback(String),

    /// Settings could not be parsed or serialized.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

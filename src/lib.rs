//! Bouncy - fling physics with plucked-string wall notes
//!
//! Core modules:
//! - `sim`: Frame-clocked scalar physics (friction, simulations, frame scheduler)
//! - `audio`: Procedural plucked-string synthesis and playback sinks
//! - `arena`: Ball-in-a-box controller playing a note on every wall hit
//! - `settings`: JSON-backed tuning knobs

pub mod arena;
pub mod audio;
pub mod error;
pub mod settings;
pub mod sim;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use arena::{Arena, Direction};
pub use error::{Error, Result};
pub use settings::Settings;
pub use sim::Axis;

/// Tuning constants
pub mod consts {
    /// Integration step cap (120 Hz keeps long frames stable)
    pub const SIM_DT: f64 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Smallest change worth animating, per kind of animated property
    pub const MIN_VISIBLE_CHANGE_PIXELS: f64 = 1.0;
    pub const MIN_VISIBLE_CHANGE_ROTATION_DEGREES: f64 = 1.0 / 10.0;
    pub const MIN_VISIBLE_CHANGE_ALPHA: f64 = 1.0 / 256.0;
    pub const MIN_VISIBLE_CHANGE_SCALE: f64 = 1.0 / 500.0;

    /// Value threshold as a fraction of the minimum visible change
    pub const THRESHOLD_MULTIPLIER: f64 = 0.75;
    /// Value threshold to velocity threshold (one 16 ms frame)
    pub const VELOCITY_THRESHOLD_MULTIPLIER: f64 = 1000.0 / 16.0;

    /// Default fling friction (units/s²)
    pub const DEFAULT_FRICTION: f64 = 3000.0;
    /// Velocity applied by a directional key press (units/s)
    pub const KEY_IMPULSE_VELOCITY: f64 = 4500.0;
    /// Ball radius relative to the shorter side of the arena
    pub const BALL_RADIUS_FRACTION: f64 = 1.0 / 20.0;

    /// Audio defaults
    pub const SAMPLE_RATE: u32 = 44_100;
    pub const NOTE_DURATION_S: f64 = 4.0;
    /// MIDI-style semitone number of A4
    pub const MIDDLE_A_SEMITONE: f64 = 69.0;
    pub const MIDDLE_A_FREQUENCY: f64 = 440.0;
}

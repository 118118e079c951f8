//! Tuning knobs
//!
//! Every field has a default, so a settings file only needs the values it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{DIATONIC_SCALE, StringParams};
use crate::consts::{
    BALL_RADIUS_FRACTION, DEFAULT_FRICTION, KEY_IMPULSE_VELOCITY, MIDDLE_A_SEMITONE,
    MIN_VISIBLE_CHANGE_ALPHA, MIN_VISIBLE_CHANGE_PIXELS, MIN_VISIBLE_CHANGE_ROTATION_DEGREES,
    MIN_VISIBLE_CHANGE_SCALE, NOTE_DURATION_S, SAMPLE_RATE,
};
use crate::error::Result;

/// What kind of property a simulation animates, which decides how small a
/// change still shows on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisibleChange {
    #[default]
    Pixels,
    Rotation,
    Alpha,
    Scale,
}

impl VisibleChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibleChange::Pixels => "pixels",
            VisibleChange::Rotation => "rotation",
            VisibleChange::Alpha => "alpha",
            VisibleChange::Scale => "scale",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pixels" | "px" => Some(VisibleChange::Pixels),
            "rotation" | "degrees" => Some(VisibleChange::Rotation),
            "alpha" => Some(VisibleChange::Alpha),
            "scale" => Some(VisibleChange::Scale),
            _ => None,
        }
    }

    /// Minimum visible change for this kind of property
    pub fn threshold(&self) -> f64 {
        match self {
            VisibleChange::Pixels => MIN_VISIBLE_CHANGE_PIXELS,
            VisibleChange::Rotation => MIN_VISIBLE_CHANGE_ROTATION_DEGREES,
            VisibleChange::Alpha => MIN_VISIBLE_CHANGE_ALPHA,
            VisibleChange::Scale => MIN_VISIBLE_CHANGE_SCALE,
        }
    }
}

/// Fling physics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlingSettings {
    /// Deceleration in units/s²
    pub friction: f64,
    pub min_visible_change: f64,
    /// Velocity a directional nudge applies
    pub key_impulse: f64,
}

impl Default for FlingSettings {
    fn default() -> Self {
        Self {
            friction: DEFAULT_FRICTION,
            min_visible_change: MIN_VISIBLE_CHANGE_PIXELS,
            key_impulse: KEY_IMPULSE_VELOCITY,
        }
    }
}

/// Wall-hit notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub note_duration_s: f64,
    /// Semitone the scale is built on (69 = A4)
    pub root_semitone: f64,
    /// Semitone offsets from the root, cycled through one per hit
    pub scale: Vec<i32>,
    /// Master volume (0.0 - 1.0)
    pub volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            note_duration_s: NOTE_DURATION_S,
            root_semitone: MIDDLE_A_SEMITONE,
            scale: DIATONIC_SCALE.to_vec(),
            volume: 0.8,
            muted: false,
        }
    }
}

/// Arena geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    /// Ball radius relative to the shorter side
    pub radius_fraction: f64,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            radius_fraction: BALL_RADIUS_FRACTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fling: FlingSettings,
    pub audio: AudioSettings,
    pub string: StringParams,
    pub arena: ArenaSettings,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    /// Apply the minimum visible change of a property kind
    pub fn apply_visible_change(&mut self, kind: VisibleChange) {
        self.fling.min_visible_change = kind.threshold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.fling.friction, 3000.0);
        assert_eq!(settings.fling.key_impulse, 4500.0);
        assert_eq!(settings.audio.sample_rate, 44_100);
        assert_eq!(settings.audio.note_duration_s, 4.0);
        assert_eq!(settings.audio.scale.len(), 14);
        assert_eq!(settings.arena.radius_fraction, 0.05);
        assert_eq!(settings.string.decay, 0.996);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            Settings::from_json(r#"{"fling": {"friction": 1200}, "audio": {"muted": true}}"#)
                .unwrap();
        assert_eq!(settings.fling.friction, 1200.0);
        assert_eq!(settings.fling.key_impulse, 4500.0);
        assert!(settings.audio.muted);
        assert_eq!(settings.audio.sample_rate, 44_100);
        assert_eq!(settings.string, StringParams::default());
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = Settings::default();
        settings.audio.scale = vec![0, 3, 7];
        settings.string.pick_position = 0.3;
        let parsed = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_bad_json_is_settings_error() {
        assert!(matches!(
            Settings::from_json("{\"fling\": 5}"),
            Err(Error::Settings(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let path = std::env::temp_dir().join("bouncy-settings-does-not-exist.json");
        assert!(matches!(Settings::load(&path), Err(Error::Io(_))));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let name = format!("bouncy-settings-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, r#"{"arena": {"radius_fraction": 0.1}}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.arena.radius_fraction, 0.1);
    }

    #[test]
    fn test_visible_change_presets() {
        let mut settings = Settings::default();
        settings.apply_visible_change(VisibleChange::Alpha);
        assert_eq!(settings.fling.min_visible_change, 1.0 / 256.0);
        assert_eq!(VisibleChange::from_str("Degrees"), Some(VisibleChange::Rotation));
        assert_eq!(VisibleChange::Scale.threshold(), 0.002);
        assert_eq!(VisibleChange::from_str("volume"), None);
    }
}

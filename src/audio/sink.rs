//! Playback sinks for rendered notes

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

/// A finished block of PCM audio
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl PcmClip {
    /// Mono 16-bit clip
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            bit_depth: 16,
        }
    }

    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Samples as floats in [-1, 1]
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| *s as f32 / i16::MAX as f32)
            .collect()
    }
}

/// Somewhere a clip can be played
pub trait AudioSink {
    fn play(&self, clip: &PcmClip) -> Result<()>;
}

impl<S: AudioSink + ?Sized> AudioSink for Arc<S> {
    fn play(&self, clip: &PcmClip) -> Result<()> {
        (**self).play(clip)
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn play(&self, clip: &PcmClip) -> Result<()> {
        (**self).play(clip)
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, clip: &PcmClip) -> Result<()> {
        log::debug!(
            "Dropping {:.2}s clip at {} Hz",
            clip.duration_s(),
            clip.sample_rate
        );
        Ok(())
    }
}

/// Keeps every clip it is given, for tests and the headless demo
#[derive(Debug, Default)]
pub struct RecordingSink {
    clips: Mutex<Vec<PcmClip>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clips(&self) -> Vec<PcmClip> {
        self.clips
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.clips.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, clip: &PcmClip) -> Result<()> {
        self.clips
            .lock()
            .map_err(|_| Error::Playback("recording sink poisoned".into()))?
            .push(clip.clone());
        Ok(())
    }
}

/// Web Audio playback
#[cfg(target_arch = "wasm32")]
pub use web_audio::WebAudioSink;

#[cfg(target_arch = "wasm32")]
mod web_audio {
    use web_sys::{AudioContext, AudioContextState};

    use super::{AudioSink, PcmClip};
    use crate::error::{Error, Result};

    fn js_error(err: wasm_bindgen::JsValue) -> Error {
        Error::Playback(format!("{err:?}"))
    }

    /// Plays clips through an `AudioContext`, each through its own gain node
    pub struct WebAudioSink {
        ctx: AudioContext,
        volume: f32,
    }

    impl WebAudioSink {
        pub fn new(volume: f32) -> Result<Self> {
            // Fails outside a secure context
            let ctx = AudioContext::new().map_err(js_error)?;
            Ok(Self {
                ctx,
                volume: volume.clamp(0.0, 1.0),
            })
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            let _ = self.ctx.resume();
        }

        pub fn set_volume(&mut self, volume: f32) {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    impl AudioSink for WebAudioSink {
        fn play(&self, clip: &PcmClip) -> Result<()> {
            if clip.samples.is_empty() || self.volume <= 0.0 {
                return Ok(());
            }
            if self.ctx.state() == AudioContextState::Suspended {
                let _ = self.ctx.resume();
            }

            let buffer = self
                .ctx
                .create_buffer(
                    clip.channels as u32,
                    clip.samples.len() as u32,
                    clip.sample_rate as f32,
                )
                .map_err(js_error)?;
            let mut data = clip.to_f32();
            buffer.copy_to_channel(&mut data, 0).map_err(js_error)?;

            let source = self.ctx.create_buffer_source().map_err(js_error)?;
            source.set_buffer(Some(&buffer));
            let gain = self.ctx.create_gain().map_err(js_error)?;
            gain.gain().set_value(self.volume);

            source.connect_with_audio_node(&gain).map_err(js_error)?;
            gain.connect_with_audio_node(&self.ctx.destination())
                .map_err(js_error)?;
            source.start().map_err(js_error)?;
            Ok(())
        }
    }
}

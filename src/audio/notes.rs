//! Note selection and off-thread rendering

use crate::consts::{MIDDLE_A_FREQUENCY, MIDDLE_A_SEMITONE};
use crate::error::Result;

use super::sink::{AudioSink, PcmClip};
use super::string::{StringParams, synthesize_with};

/// Up the major scale and back down, one octave
pub const DIATONIC_SCALE: [i32; 14] = [0, 2, 4, 5, 7, 9, 11, 12, 11, 9, 7, 5, 4, 2];

/// Equal-tempered frequency of a semitone number (69 = A4 = 440 Hz)
#[inline]
pub fn standard_frequency(semitone: f64) -> f64 {
    MIDDLE_A_FREQUENCY * 2f64.powf((semitone - MIDDLE_A_SEMITONE) / 12.0)
}

/// Walks a scale, one step per note
#[derive(Debug, Clone)]
pub struct Melody {
    root: f64,
    steps: Vec<i32>,
    counter: usize,
}

impl Melody {
    pub fn new(root: f64, steps: Vec<i32>) -> Self {
        Self {
            root,
            steps,
            counter: 0,
        }
    }

    /// Advance and return the next semitone. The first call lands on the
    /// second scale step.
    pub fn next_semitone(&mut self) -> f64 {
        if self.steps.is_empty() {
            return self.root;
        }
        self.counter = (self.counter + 1) % self.steps.len();
        self.root + self.steps[self.counter] as f64
    }

    pub fn next_frequency(&mut self) -> f64 {
        standard_frequency(self.next_semitone())
    }
}

/// Everything needed to render one note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    pub sample_rate: u32,
    pub frequency: f64,
    pub duration_s: f64,
}

impl NoteRequest {
    pub fn render(&self, params: &StringParams) -> Result<PcmClip> {
        let samples = synthesize_with(
            params,
            self.sample_rate,
            self.frequency,
            self.duration_s,
            &mut rand::rng(),
        )?;
        Ok(PcmClip::mono(samples, self.sample_rate))
    }
}

/// Renders and plays notes on behalf of the frame loop. Failures are logged,
/// never reported back.
pub trait NoteDispatcher {
    fn dispatch(&self, note: NoteRequest);
}

fn render_and_play(note: &NoteRequest, params: &StringParams, sink: &dyn AudioSink) {
    let result = note.render(params).and_then(|clip| sink.play(&clip));
    if let Err(e) = result {
        log::error!("Failed to play {:.1} Hz note: {}", note.frequency, e);
    }
}

/// Renders on the calling thread
pub struct InlineDispatcher<S> {
    sink: S,
    params: StringParams,
}

impl<S: AudioSink> InlineDispatcher<S> {
    pub fn new(sink: S, params: StringParams) -> Self {
        Self { sink, params }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: AudioSink> NoteDispatcher for InlineDispatcher<S> {
    fn dispatch(&self, note: NoteRequest) {
        render_and_play(&note, &self.params, &self.sink);
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use threaded::ThreadedDispatcher;

#[cfg(not(target_arch = "wasm32"))]
mod threaded {
    use std::sync::Arc;
    use std::thread;

    use super::{NoteDispatcher, NoteRequest, render_and_play};
    use crate::audio::sink::AudioSink;
    use crate::audio::string::StringParams;

    /// Renders each note on its own short-lived thread so a frame never
    /// waits on synthesis
    pub struct ThreadedDispatcher {
        sink: Arc<dyn AudioSink + Send + Sync>,
        params: StringParams,
    }

    impl ThreadedDispatcher {
        pub fn new(sink: Arc<dyn AudioSink + Send + Sync>, params: StringParams) -> Self {
            Self { sink, params }
        }
    }

    impl NoteDispatcher for ThreadedDispatcher {
        fn dispatch(&self, note: NoteRequest) {
            let sink = Arc::clone(&self.sink);
            let params = self.params;
            let spawned = thread::Builder::new()
                .name("note-synth".into())
                .spawn(move || render_and_play(&note, &params, &*sink));
            if let Err(e) = spawned {
                log::error!("Failed to spawn note thread: {}", e);
            }
        }
    }
}

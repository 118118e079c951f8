//! Audio for wall hits
//!
//! Notes are synthesized procedurally, no sample files needed. Synthesis is
//! plain computation and can run on any thread; only the sink decides where
//! the sound goes.

pub mod notes;
pub mod sink;
pub mod string;

pub use notes::{
    DIATONIC_SCALE, InlineDispatcher, Melody, NoteDispatcher, NoteRequest, standard_frequency,
};
#[cfg(not(target_arch = "wasm32"))]
pub use notes::ThreadedDispatcher;
pub use sink::{AudioSink, NullSink, PcmClip, RecordingSink};
#[cfg(target_arch = "wasm32")]
pub use sink::WebAudioSink;
pub use string::{StringParams, synthesize, synthesize_with};

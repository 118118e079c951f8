//! Browser bindings
//!
//! JS owns the canvas and the `requestAnimationFrame` loop; it forwards
//! input and frame times here and draws the ball wherever `x()`/`y()` say.

use wasm_bindgen::prelude::*;

use crate::arena::{Arena, Direction};
use crate::audio::{AudioSink, InlineDispatcher, NullSink, WebAudioSink};
use crate::error::Error;
use crate::settings::{Settings, VisibleChange};
use crate::sim::{FrameRequester, Scheduler};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        // Already initialized by an earlier instance
        return;
    }
    log::info!("Bouncy starting...");
}

fn to_js(err: Error) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Calls back into JS when the scheduler wants another frame
struct JsFrameRequester(js_sys::Function);

impl FrameRequester for JsFrameRequester {
    fn request_frame(&self) {
        if let Err(e) = self.0.call0(&JsValue::NULL) {
            log::error!("Frame request callback failed: {:?}", e);
        }
    }
}

#[wasm_bindgen]
pub struct WebBouncy {
    arena: Arena,
}

#[wasm_bindgen]
impl WebBouncy {
    /// `settings_json` may be omitted or partial
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: Option<String>) -> Result<WebBouncy, JsValue> {
        let settings = match settings_json {
            Some(json) => Settings::from_json(&json).map_err(to_js)?,
            None => Settings::default(),
        };

        let sink: Box<dyn AudioSink> = match WebAudioSink::new(settings.audio.volume) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                log::warn!("Audio disabled: {}", e);
                Box::new(NullSink)
            }
        };
        let dispatcher = InlineDispatcher::new(sink, settings.string);

        let scheduler = Scheduler::for_current_thread();
        let arena = Arena::new(&scheduler, settings, dispatcher).map_err(to_js)?;
        Ok(WebBouncy { arena })
    }

    /// Register the function to call when a frame is wanted
    pub fn set_frame_callback(&self, callback: js_sys::Function) {
        self.arena
            .scheduler()
            .set_frame_requester(JsFrameRequester(callback));
    }

    /// Advance to `time_ms` (a `requestAnimationFrame` timestamp). Returns
    /// the number of walls hit.
    pub fn frame(&mut self, time_ms: f64) -> Result<u32, JsValue> {
        let contacts = self
            .arena
            .advance_frame(time_ms.max(0.0) as u64)
            .map_err(to_js)?;
        Ok(contacts.len() as u32)
    }

    pub fn needs_frame(&self) -> bool {
        self.arena.needs_frame()
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.arena.resize(width, height);
    }

    pub fn x(&self) -> f64 {
        self.arena.position().x
    }

    pub fn y(&self) -> f64 {
        self.arena.position().y
    }

    pub fn radius(&self) -> f64 {
        self.arena.radius()
    }

    pub fn press(&self) {
        self.arena.press();
    }

    pub fn drag(&self, dx: f64, dy: f64) {
        self.arena.drag(dx, dy);
    }

    pub fn fling(&self, velocity_x: f64, velocity_y: f64) -> Result<(), JsValue> {
        self.arena.fling(velocity_x, velocity_y).map_err(to_js)
    }

    /// Handle a `KeyboardEvent.key`. Returns false for keys that do nothing.
    pub fn key(&self, key: &str) -> Result<bool, JsValue> {
        let Some(direction) = Direction::from_key(key) else {
            return Ok(false);
        };
        self.arena.nudge(direction).map_err(to_js)?;
        Ok(true)
    }

    /// Switch the settle threshold ("pixels", "rotation", "alpha", "scale").
    /// Returns false for an unknown name.
    pub fn set_visible_change(&mut self, kind: &str) -> Result<bool, JsValue> {
        let Some(kind) = VisibleChange::from_str(kind) else {
            return Ok(false);
        };
        self.arena.set_visible_change(kind).map_err(to_js)?;
        Ok(true)
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.arena.set_muted(muted);
    }
}

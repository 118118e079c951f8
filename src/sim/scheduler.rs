//! Frame scheduler
//!
//! Turns an external periodic timing pulse into ticks for every active
//! simulation on the control thread. All simulations advanced by one pulse
//! see the same frame time, which keeps independent axes in lockstep.
//!
//! The scheduler handle is `Rc`-based and therefore neither `Send` nor
//! `Sync`: it, and every simulation registered with it, stays on the thread
//! that created it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Something that wants to be advanced once per frame
pub trait FrameCallback {
    /// Advance to `frame_time_ms`. Returns true once the callback is finished.
    fn do_frame(&self, frame_time_ms: u64) -> bool;
}

/// Monotonic millisecond clock used for delayed registrations
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created
#[derive(Debug, Clone)]
pub struct UptimeClock {
    #[cfg(not(target_arch = "wasm32"))]
    origin: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    origin: f64,
}

impl Default for UptimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            origin: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            origin: js_sys::Date::now(),
        }
    }
}

impl Clock for UptimeClock {
    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> u64 {
        (js_sys::Date::now() - self.origin).max(0.0) as u64
    }
}

/// Hand-driven clock for deterministic replay and tests
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.0.set(self.0.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Asks the host for another timing pulse (e.g. `requestAnimationFrame`)
pub trait FrameRequester {
    fn request_frame(&self);
}

/// What happened to a delivered timing pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The sweep ran; `advanced` callbacks were ticked and `active` remain registered
    Swept { advanced: usize, active: usize },
    /// A sweep was already in progress, the pulse was ignored
    Dropped,
}

struct Entry {
    callback: Rc<dyn FrameCallback>,
    /// Skip ticks until the clock passes this deadline
    not_before: Option<u64>,
    removed: bool,
}

impl Entry {
    fn is(&self, callback: &Rc<dyn FrameCallback>) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(callback))
    }
}

struct Registry {
    entries: Vec<Entry>,
    dirty: bool,
    sweeping: bool,
    armed: bool,
    frame_time_ms: u64,
}

impl Registry {
    fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.removed).count()
    }

    fn compact(&mut self) {
        if self.dirty {
            self.entries.retain(|e| !e.removed);
            self.dirty = false;
        }
    }
}

/// Shared handle to one control thread's frame scheduler
#[derive(Clone)]
pub struct Scheduler {
    registry: Rc<RefCell<Registry>>,
    clock: Rc<dyn Clock>,
    requester: Rc<RefCell<Option<Box<dyn FrameRequester>>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT: Scheduler = Scheduler::new();
}

impl Scheduler {
    /// Scheduler driven by wall-clock uptime
    pub fn new() -> Self {
        Self::with_clock(UptimeClock::new())
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                entries: Vec::new(),
                dirty: false,
                sweeping: false,
                armed: false,
                frame_time_ms: 0,
            })),
            clock: Rc::new(clock),
            requester: Rc::new(RefCell::new(None)),
        }
    }

    /// The lazily created scheduler of the calling thread
    pub fn for_current_thread() -> Self {
        CURRENT.with(Scheduler::clone)
    }

    /// Install the hook used to ask the host for the next pulse
    pub fn set_frame_requester(&self, requester: impl FrameRequester + 'static) {
        *self.requester.borrow_mut() = Some(Box::new(requester));
    }

    /// Frame time of the most recent sweep
    pub fn frame_time(&self) -> u64 {
        self.registry.borrow().frame_time_ms
    }

    /// Whether the scheduler expects another pulse
    pub fn is_armed(&self) -> bool {
        self.registry.borrow().armed
    }

    pub fn active_count(&self) -> usize {
        self.registry.borrow().live_count()
    }

    pub fn is_registered(&self, callback: &Rc<dyn FrameCallback>) -> bool {
        self.registry
            .borrow()
            .entries
            .iter()
            .any(|e| !e.removed && e.is(callback))
    }

    /// Add `callback` to the active set. With `delay_ms > 0` it is skipped
    /// until that much clock time has passed.
    pub fn register(&self, callback: Rc<dyn FrameCallback>, delay_ms: u64) {
        let not_before = (delay_ms > 0).then(|| self.clock.now_ms() + delay_ms);
        let arm = {
            let mut registry = self.registry.borrow_mut();
            match registry.entries.iter_mut().find(|e| e.is(&callback)) {
                Some(entry) => {
                    entry.removed = false;
                    entry.not_before = not_before;
                }
                None => registry.entries.push(Entry {
                    callback,
                    not_before,
                    removed: false,
                }),
            }
            let arm = !registry.armed;
            registry.armed = true;
            arm
        };
        if arm {
            self.request_frame();
        }
    }

    /// Remove `callback` from the active set. Safe to call from inside a sweep.
    pub fn unregister(&self, callback: &Rc<dyn FrameCallback>) {
        let mut registry = self.registry.borrow_mut();
        if let Some(entry) = registry
            .entries
            .iter_mut()
            .find(|e| !e.removed && e.is(callback))
        {
            entry.removed = true;
            entry.not_before = None;
            registry.dirty = true;
        }
        if !registry.sweeping {
            registry.compact();
        }
    }

    /// Advance every due callback once with `frame_time_ms`.
    pub fn on_external_tick(&self, frame_time_ms: u64) -> TickOutcome {
        {
            let mut registry = self.registry.borrow_mut();
            if registry.sweeping {
                log::warn!("Dropping frame {frame_time_ms}: previous sweep still running");
                return TickOutcome::Dropped;
            }
            registry.sweeping = true;
            registry.armed = false;
            registry.frame_time_ms = frame_time_ms;
        }

        let now = self.clock.now_ms();
        let mut advanced = 0;
        let mut index = 0;
        loop {
            let callback = {
                let mut registry = self.registry.borrow_mut();
                let Some(entry) = registry.entries.get_mut(index) else {
                    break;
                };
                index += 1;
                if entry.removed {
                    continue;
                }
                if let Some(deadline) = entry.not_before {
                    if deadline >= now {
                        continue;
                    }
                    entry.not_before = None;
                }
                entry.callback.clone()
            };
            // No borrow is held here: the callback may register, unregister or tick
            let finished = callback.do_frame(frame_time_ms);
            advanced += 1;
            if finished {
                let mut registry = self.registry.borrow_mut();
                // Entries are only appended mid-sweep, so the index still points at it
                if let Some(entry) = registry.entries.get_mut(index - 1) {
                    entry.removed = true;
                    entry.not_before = None;
                    registry.dirty = true;
                }
            }
        }

        let (active, arm) = {
            let mut registry = self.registry.borrow_mut();
            registry.compact();
            registry.sweeping = false;
            let active = registry.live_count();
            let arm = active > 0 && !registry.armed;
            if active > 0 {
                registry.armed = true;
            }
            (active, arm)
        };
        if arm {
            self.request_frame();
        }
        TickOutcome::Swept { advanced, active }
    }

    fn request_frame(&self) {
        if let Some(requester) = self.requester.borrow().as_ref() {
            requester.request_frame();
        }
    }
}

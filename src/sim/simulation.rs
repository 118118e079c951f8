//! Scalar physics simulation
//!
//! A [`Simulation`] advances one (value, velocity) pair under a [`Force`]
//! each time its [`Scheduler`] delivers a frame, writes the result into a
//! bound [`ValueHolder`], and stops by itself once the force reports
//! equilibrium.
//!
//! Handles are `Rc`-based. They cannot leave the control thread, so
//! `start()` and `cancel()` from any other thread is rejected by the
//! compiler:
//!
//! ```compile_fail
//! use bouncy::sim::{Scheduler, Simulation, ValueHolder};
//!
//! let scheduler = Scheduler::new();
//! let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
//! std::thread::spawn(move || fling.cancel());
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::force::{Force, Friction, MassState};
use super::listeners::{ListenerId, Listeners};
use super::scheduler::{FrameCallback, Scheduler};
use crate::consts::{MAX_SUBSTEPS, MIN_VISIBLE_CHANGE_PIXELS, SIM_DT, THRESHOLD_MULTIPLIER};
use crate::error::{Error, Result};

/// The scalar a simulation animates, shared with whoever reads it back
#[derive(Debug, Clone, Default)]
pub struct ValueHolder(Rc<Cell<f64>>);

impl ValueHolder {
    pub fn new(value: f64) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn get(&self) -> f64 {
        self.0.get()
    }

    pub fn set(&self, value: f64) {
        self.0.set(value);
    }
}

/// Delivered to update listeners once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUpdate {
    pub value: f64,
    pub velocity: f64,
}

/// Delivered to end listeners when the simulation stops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationEnd {
    pub value: f64,
    pub velocity: f64,
    /// True when stopped by `cancel()`, false at equilibrium
    pub canceled: bool,
}

#[derive(Debug)]
struct State {
    value: f64,
    velocity: f64,
    start_value_set: bool,
    running: bool,
    /// Bumped on every start so a stale frame cannot end a newer run
    run: u64,
    last_frame_time: Option<u64>,
    min: f64,
    max: f64,
    min_visible_change: f64,
}

impl State {
    /// Integrate `delta_ms` of motion. Returns true at equilibrium.
    fn advance(&mut self, force: &dyn Force, delta_ms: u64) -> bool {
        let total = delta_ms as f64 / 1000.0;
        let steps = ((total / SIM_DT).ceil() as u32).clamp(1, MAX_SUBSTEPS);
        let dt = total / steps as f64;

        let mut mass = MassState::new(self.value, self.velocity);
        for _ in 0..steps {
            mass = force.step(mass, dt);
        }
        self.value = mass.value;
        self.velocity = mass.velocity;

        if force.is_at_equilibrium(self.value, self.velocity) {
            self.velocity = 0.0;
            true
        } else {
            false
        }
    }
}

struct Inner {
    me: Weak<Inner>,
    scheduler: Scheduler,
    target: ValueHolder,
    force: RefCell<Box<dyn Force>>,
    state: RefCell<State>,
    update_listeners: Listeners<FrameUpdate>,
    end_listeners: Listeners<SimulationEnd>,
}

impl Inner {
    fn as_callback(&self) -> Option<Rc<dyn FrameCallback>> {
        self.me.upgrade().map(|me| me as Rc<dyn FrameCallback>)
    }

    /// Write the current value to the target, then tell the update listeners
    fn push_value(&self) {
        let (value, velocity) = {
            let state = self.state.borrow();
            (state.value, state.velocity)
        };
        self.target.set(value);
        self.update_listeners.notify(FrameUpdate { value, velocity });
    }

    fn end(&self, canceled: bool) {
        let (value, velocity) = {
            let mut state = self.state.borrow_mut();
            if !state.running {
                return;
            }
            state.running = false;
            state.last_frame_time = None;
            state.start_value_set = false;
            (state.value, state.velocity)
        };
        if let Some(callback) = self.as_callback() {
            self.scheduler.unregister(&callback);
        }
        log::debug!("Simulation ended at {value} (velocity {velocity}, canceled: {canceled})");

        let end = SimulationEnd {
            value,
            velocity,
            canceled,
        };
        self.end_listeners.notify(end);
    }
}

impl FrameCallback for Inner {
    fn do_frame(&self, frame_time_ms: u64) -> bool {
        let (run, finished) = {
            let mut state = self.state.borrow_mut();
            let run = state.run;
            match state.last_frame_time.replace(frame_time_ms) {
                // First frame only shows the start value
                None => (run, false),
                Some(last) => {
                    let delta = frame_time_ms.saturating_sub(last);
                    let finished = state.advance(&**self.force.borrow(), delta);
                    state.value = state.value.max(state.min).min(state.max);
                    (run, finished)
                }
            }
        };

        self.push_value();

        // A listener may have canceled and restarted us; that run is not ours to end
        let same_run = {
            let state = self.state.borrow();
            state.running && state.run == run
        };
        if finished && same_run {
            self.end(false);
        }
        // Done, unless an end listener already began the next run
        !self.state.borrow().running
    }
}

/// A value/velocity pair animated by a force until equilibrium
#[derive(Clone)]
pub struct Simulation {
    inner: Rc<Inner>,
}

impl Simulation {
    /// Simulation of `target` under `force`, ticked by `scheduler`
    pub fn new(scheduler: &Scheduler, target: ValueHolder, force: impl Force + 'static) -> Self {
        let inner = Rc::new_cyclic(|me| Inner {
            me: me.clone(),
            scheduler: scheduler.clone(),
            target,
            force: RefCell::new(Box::new(force)),
            state: RefCell::new(State {
                value: 0.0,
                velocity: 0.0,
                start_value_set: false,
                running: false,
                run: 0,
                last_frame_time: None,
                min: f64::NEG_INFINITY,
                max: f64::INFINITY,
                min_visible_change: MIN_VISIBLE_CHANGE_PIXELS,
            }),
            update_listeners: Listeners::default(),
            end_listeners: Listeners::default(),
        });
        Self { inner }
    }

    /// Friction-driven fling with the default deceleration
    pub fn fling(scheduler: &Scheduler, target: ValueHolder) -> Self {
        Self::new(scheduler, target, Friction::default())
    }

    pub fn target(&self) -> &ValueHolder {
        &self.inner.target
    }

    /// Start from `value` instead of reading the target at `start()`
    pub fn set_start_value(&self, value: f64) -> &Self {
        let mut state = self.inner.state.borrow_mut();
        state.value = value;
        state.start_value_set = true;
        self
    }

    pub fn set_start_velocity(&self, velocity: f64) -> &Self {
        self.inner.state.borrow_mut().velocity = velocity;
        self
    }

    pub fn set_min_value(&self, min: f64) -> &Self {
        self.inner.state.borrow_mut().min = min;
        self
    }

    pub fn set_max_value(&self, max: f64) -> &Self {
        self.inner.state.borrow_mut().max = max;
        self
    }

    /// Smallest change of the animated value that is visible to the user.
    /// Drives the force's equilibrium threshold.
    pub fn set_min_visible_change(&self, min_visible_change: f64) -> Result<&Self> {
        if !(min_visible_change > 0.0) {
            return Err(Error::InvalidMinimumVisibleChange(min_visible_change));
        }
        self.inner.state.borrow_mut().min_visible_change = min_visible_change;
        self.inner
            .force
            .borrow_mut()
            .set_value_threshold(min_visible_change * THRESHOLD_MULTIPLIER);
        Ok(self)
    }

    pub fn min_visible_change(&self) -> f64 {
        self.inner.state.borrow().min_visible_change
    }

    /// Listen to every frame. Listeners are fixed while the simulation runs.
    pub fn add_update_listener(
        &self,
        listener: impl FnMut(&FrameUpdate) + 'static,
    ) -> Result<ListenerId> {
        if self.is_running() {
            return Err(Error::ListenerWhileRunning);
        }
        Ok(self.inner.update_listeners.add(listener))
    }

    pub fn remove_update_listener(&self, id: ListenerId) {
        self.inner.update_listeners.remove(id);
    }

    pub fn add_end_listener(&self, listener: impl FnMut(&SimulationEnd) + 'static) -> ListenerId {
        self.inner.end_listeners.add(listener)
    }

    pub fn remove_end_listener(&self, id: ListenerId) {
        self.inner.end_listeners.remove(id);
    }

    /// Begin animating on the next frame. No-op while already running.
    pub fn start(&self) -> Result<()> {
        let (value, velocity) = {
            let mut state = self.inner.state.borrow_mut();
            if state.running {
                return Ok(());
            }
            let value = if state.start_value_set {
                state.value
            } else {
                self.inner.target.get()
            };
            if !(value >= state.min && value <= state.max) {
                return Err(Error::StartValueOutOfRange {
                    value,
                    min: state.min,
                    max: state.max,
                });
            }
            state.value = value;
            state.running = true;
            state.run += 1;
            (value, state.velocity)
        };

        log::debug!(
            "Simulation starting at {value} with velocity {velocity} ({} update listeners)",
            self.inner.update_listeners.len()
        );
        if let Some(callback) = self.inner.as_callback() {
            self.inner.scheduler.register(callback, 0);
        }
        Ok(())
    }

    /// Stop immediately and notify end listeners with `canceled = true`.
    /// No-op when not running.
    pub fn cancel(&self) {
        self.inner.end(true);
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.borrow().running
    }

    pub fn value(&self) -> f64 {
        self.inner.state.borrow().value
    }

    pub fn velocity(&self) -> f64 {
        self.inner.state.borrow().velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scheduler::ManualClock;
    use proptest::prelude::*;

    const FRAME_MS: u64 = 16;

    fn scheduler() -> Scheduler {
        Scheduler::with_clock(ManualClock::new(0))
    }

    /// Deliver frames until nothing is registered; returns the frame count
    fn run_until_idle(scheduler: &Scheduler, start_ms: u64, max_frames: usize) -> usize {
        let mut frames = 0;
        while scheduler.active_count() > 0 && frames < max_frames {
            scheduler.on_external_tick(start_ms + frames as u64 * FRAME_MS);
            frames += 1;
        }
        frames
    }

    #[test]
    fn test_first_frame_shows_start_value() {
        let scheduler = scheduler();
        let target = ValueHolder::new(0.0);
        let fling = Simulation::fling(&scheduler, target.clone());
        fling.set_start_value(10.0).set_start_velocity(1000.0);
        fling.start().unwrap();

        scheduler.on_external_tick(100);
        assert_eq!(target.get(), 10.0);
        assert_eq!(fling.velocity(), 1000.0);

        scheduler.on_external_tick(116);
        assert!(target.get() > 10.0);
        assert!(fling.velocity() < 1000.0);
    }

    #[test]
    fn test_start_reads_target_when_no_start_value() {
        let scheduler = scheduler();
        let target = ValueHolder::new(42.0);
        let fling = Simulation::fling(&scheduler, target.clone());
        fling.start().unwrap();
        scheduler.on_external_tick(0);
        assert_eq!(fling.value(), 42.0);
        assert_eq!(target.get(), 42.0);
    }

    #[test]
    fn test_target_written_before_listeners() {
        let scheduler = scheduler();
        let target = ValueHolder::new(0.0);
        let fling = Simulation::fling(&scheduler, target.clone());
        let mismatches = Rc::new(Cell::new(0));
        {
            let target = target.clone();
            let mismatches = mismatches.clone();
            fling
                .add_update_listener(move |update| {
                    if target.get() != update.value {
                        mismatches.set(mismatches.get() + 1);
                    }
                })
                .unwrap();
        }
        fling.set_start_velocity(2000.0).start().unwrap();
        run_until_idle(&scheduler, 0, 500);
        assert_eq!(mismatches.get(), 0);
    }

    #[test]
    fn test_out_of_range_start_fails_fast() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        fling.set_min_value(0.0).set_max_value(100.0).set_start_value(150.0);

        let err = fling.start().unwrap_err();
        assert!(matches!(err, Error::StartValueOutOfRange { value, .. } if value == 150.0));
        assert!(!fling.is_running());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_update_listener_rejected_while_running() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        fling.set_start_velocity(100.0).start().unwrap();
        assert!(matches!(
            fling.add_update_listener(|_| {}),
            Err(Error::ListenerWhileRunning)
        ));
        // End listeners can still be added
        fling.add_end_listener(|_| {});
    }

    #[test]
    fn test_cancel_twice_notifies_once() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let ends = Rc::new(RefCell::new(Vec::new()));
        {
            let ends = ends.clone();
            fling.add_end_listener(move |end| ends.borrow_mut().push(*end));
        }
        fling.set_start_velocity(3000.0).start().unwrap();
        scheduler.on_external_tick(0);
        scheduler.on_external_tick(16);

        fling.cancel();
        fling.cancel();
        assert_eq!(ends.borrow().len(), 1);
        assert!(ends.borrow()[0].canceled);
        assert!(!fling.is_running());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        fling.set_start_velocity(3000.0).start().unwrap();
        scheduler.on_external_tick(0);
        scheduler.on_external_tick(16);
        let value = fling.value();

        fling.set_start_value(-500.0);
        fling.start().unwrap();
        assert_eq!(fling.value(), -500.0);
        // Still the same run: the next frame integrates instead of restarting
        scheduler.on_external_tick(32);
        assert!(fling.value() > -500.0 && fling.value() != value);
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn test_fling_reaches_equilibrium() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let end = Rc::new(RefCell::new(None));
        {
            let end = end.clone();
            fling.add_end_listener(move |e| *end.borrow_mut() = Some(*e));
        }
        fling.set_start_velocity(-4500.0).start().unwrap();
        let frames = run_until_idle(&scheduler, 0, 10_000);

        assert!(frames < 10_000);
        assert!(!fling.is_running());
        let end = end.borrow().expect("end listener fired");
        assert!(!end.canceled);
        assert!(end.velocity.abs() < Friction::default().velocity_threshold());
        assert!(end.value < 0.0);
    }

    #[test]
    fn test_linear_deceleration_time() {
        let friction = 3000.0;
        let scheduler = scheduler();
        let fling = Simulation::new(&scheduler, ValueHolder::new(0.0), Friction::new(friction));
        let last_frame = Rc::new(Cell::new(0u64));
        {
            let last_frame = last_frame.clone();
            let scheduler = scheduler.clone();
            fling.add_end_listener(move |_| last_frame.set(scheduler.frame_time()));
        }
        fling.set_start_velocity(4500.0).start().unwrap();
        run_until_idle(&scheduler, 0, 10_000);

        let elapsed = last_frame.get() as f64 / 1000.0;
        let expected = 4500.0 / friction;
        // Equilibrium is declared just above zero speed, within one frame
        assert!(elapsed <= expected + FRAME_MS as f64 / 1000.0, "{elapsed} vs {expected}");
        assert!(elapsed >= expected - 0.05, "{elapsed} vs {expected}");
    }

    #[test]
    fn test_velocity_decreases_monotonically() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let speeds = Rc::new(RefCell::new(Vec::new()));
        {
            let speeds = speeds.clone();
            fling
                .add_update_listener(move |update| speeds.borrow_mut().push(update.velocity))
                .unwrap();
        }
        fling.set_start_velocity(4500.0).start().unwrap();
        run_until_idle(&scheduler, 0, 10_000);

        let speeds = speeds.borrow();
        assert!(speeds.windows(2).all(|w| w[1] <= w[0]));
        assert!(speeds.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_value_clamped_velocity_kept() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        fling
            .set_min_value(0.0)
            .set_max_value(100.0)
            .set_start_velocity(4500.0)
            .start()
            .unwrap();
        for frame in 0..10 {
            scheduler.on_external_tick(frame * FRAME_MS);
        }
        assert_eq!(fling.value(), 100.0);
        assert!(fling.velocity() > 4000.0);
        assert!(fling.is_running());
    }

    #[test]
    fn test_two_simulations_share_frame_time() {
        let scheduler = scheduler();
        let horizontal = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let vertical = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let stamps = Rc::new(RefCell::new(Vec::new()));
        for sim in [&horizontal, &vertical] {
            let stamps = stamps.clone();
            let scheduler = scheduler.clone();
            sim.add_update_listener(move |_| stamps.borrow_mut().push(scheduler.frame_time()))
                .unwrap();
        }
        horizontal.set_start_velocity(1000.0).start().unwrap();
        vertical.set_start_velocity(-700.0).start().unwrap();

        scheduler.on_external_tick(48);
        assert_eq!(*stamps.borrow(), vec![48, 48]);
    }

    #[test]
    fn test_restart_from_update_listener() {
        // Reflect at a wall from inside the frame callback, the way the arena does
        let scheduler = scheduler();
        let target = ValueHolder::new(0.0);
        let fling = Simulation::fling(&scheduler, target.clone());
        let ends = Rc::new(RefCell::new(Vec::new()));
        {
            let ends = ends.clone();
            fling.add_end_listener(move |end| ends.borrow_mut().push(end.canceled));
        }
        {
            let handle = fling.clone();
            let target = target.clone();
            fling
                .add_update_listener(move |update| {
                    if update.value > 50.0 {
                        target.set(50.0);
                        handle.cancel();
                        handle.set_start_velocity(-update.velocity);
                        handle.start().unwrap();
                    }
                })
                .unwrap();
        }
        fling.set_start_velocity(4000.0).start().unwrap();
        for frame in 0..5 {
            scheduler.on_external_tick(frame * FRAME_MS);
        }
        assert_eq!(*ends.borrow(), vec![true]);
        assert!(fling.is_running());
        assert!(fling.velocity() < 0.0);
        assert!(target.get() <= 50.0);
    }

    #[test]
    fn test_restart_from_end_listener_stays_registered() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let restarted = Rc::new(Cell::new(false));
        {
            let handle = fling.clone();
            let restarted = restarted.clone();
            fling.add_end_listener(move |end| {
                if !end.canceled && !restarted.get() {
                    restarted.set(true);
                    handle.set_start_velocity(2000.0).start().unwrap();
                }
            });
        }
        // 60 - 3000 * 0.016 = 12, under the threshold after one step
        fling.set_start_velocity(60.0).start().unwrap();
        scheduler.on_external_tick(0);
        scheduler.on_external_tick(16);

        assert!(restarted.get());
        assert!(fling.is_running());
        assert_eq!(scheduler.active_count(), 1);
        scheduler.on_external_tick(32);
        scheduler.on_external_tick(48);
        assert!(fling.value() > 0.0);
    }

    #[test]
    fn test_end_raised_inside_end_listener_is_delivered() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let ends = Rc::new(RefCell::new(Vec::new()));
        {
            let handle = fling.clone();
            let ends = ends.clone();
            fling.add_end_listener(move |end| {
                let first = ends.borrow().is_empty();
                ends.borrow_mut().push(end.canceled);
                if first {
                    handle.set_start_velocity(500.0).start().unwrap();
                    handle.cancel();
                }
            });
        }
        fling.set_start_velocity(500.0).start().unwrap();
        fling.cancel();

        assert_eq!(*ends.borrow(), vec![true, true]);
        assert!(!fling.is_running());
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_finished_fling_leaves_scheduler_idle() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        fling.set_start_velocity(1000.0).start().unwrap();
        assert!(scheduler.is_armed());
        run_until_idle(&scheduler, 0, 1_000);
        assert!(!fling.is_running());
        assert_eq!(scheduler.active_count(), 0);
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn test_min_visible_change_must_be_positive() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        assert!(fling.set_min_visible_change(0.0).is_err());
        assert!(fling.set_min_visible_change(-1.0).is_err());
        assert!(fling.set_min_visible_change(f64::NAN).is_err());
        fling.set_min_visible_change(0.5).unwrap();
        assert_eq!(fling.min_visible_change(), 0.5);
    }

    #[test]
    fn test_finer_visible_change_runs_longer() {
        let frames_for = |visible_change: f64| {
            let scheduler = scheduler();
            let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
            fling.set_min_visible_change(visible_change).unwrap();
            fling.set_start_velocity(4500.0).start().unwrap();
            run_until_idle(&scheduler, 0, 10_000)
        };
        assert!(frames_for(0.01) >= frames_for(1.0));
    }

    #[test]
    fn test_removed_update_listener_not_called() {
        let scheduler = scheduler();
        let fling = Simulation::fling(&scheduler, ValueHolder::new(0.0));
        let calls = Rc::new(Cell::new(0));
        let id = {
            let calls = calls.clone();
            fling
                .add_update_listener(move |_| calls.set(calls.get() + 1))
                .unwrap()
        };
        fling.remove_update_listener(id);
        fling.set_start_velocity(500.0).start().unwrap();
        scheduler.on_external_tick(0);
        assert_eq!(calls.get(), 0);
    }

    proptest! {
        #[test]
        fn prop_value_within_bounds_after_every_frame(
            velocity in -20_000.0f64..20_000.0,
            start in -50.0f64..50.0,
            half_width in 50.0f64..500.0,
            frame_gap in 1u64..100,
        ) {
            let scheduler = scheduler();
            let fling = Simulation::fling(&scheduler, ValueHolder::new(start));
            fling
                .set_min_value(-half_width)
                .set_max_value(half_width)
                .set_start_velocity(velocity)
                .start()
                .unwrap();

            let mut now = 0;
            for _ in 0..400 {
                if !fling.is_running() {
                    break;
                }
                scheduler.on_external_tick(now);
                now += frame_gap;
                prop_assert!(fling.value() >= -half_width && fling.value() <= half_width);
            }
        }

        #[test]
        fn prop_fling_terminates(
            velocity in -20_000.0f64..20_000.0,
            friction in 500.0f64..20_000.0,
        ) {
            let scheduler = scheduler();
            let fling = Simulation::new(&scheduler, ValueHolder::new(0.0), Friction::new(friction));
            fling.set_start_velocity(velocity).start().unwrap();
            // Worst case 20_000 / 500 = 40 s of 16 ms frames
            let frames = run_until_idle(&scheduler, 0, 5_000);
            prop_assert!(frames < 5_000);
            prop_assert!(fling.velocity().abs() < Friction::new(friction).velocity_threshold());
        }
    }
}

//! Ball-in-a-box controller
//!
//! Two fling simulations, one per axis, move a ball around a rectangle.
//! After every frame the ball is checked against the walls: an axis that
//! hit a wall is clamped back inside and flung the other way with the
//! speed it had, and the frame's hits play one plucked note.

use glam::DVec2;

use crate::audio::{Melody, NoteDispatcher, NoteRequest};
use crate::error::Result;
use crate::settings::{Settings, VisibleChange};
use crate::sim::{
    Axis, Bounds, Friction, Scheduler, Simulation, TickOutcome, ValueHolder, WallContact,
    ball_box_collision, reflect_velocity,
};

/// Key-press direction, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Direction for a `KeyboardEvent.key` value: arrows or WASD
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" | "a" | "A" => Some(Direction::Left),
            "ArrowRight" | "d" | "D" => Some(Direction::Right),
            "ArrowUp" | "w" | "W" => Some(Direction::Up),
            "ArrowDown" | "s" | "S" => Some(Direction::Down),
            _ => None,
        }
    }

    fn axis_and_sign(self) -> (Axis, f64) {
        match self {
            Direction::Left => (Axis::Horizontal, -1.0),
            Direction::Right => (Axis::Horizontal, 1.0),
            Direction::Up => (Axis::Vertical, -1.0),
            Direction::Down => (Axis::Vertical, 1.0),
        }
    }
}

pub struct Arena {
    scheduler: Scheduler,
    horizontal: Simulation,
    vertical: Simulation,
    bounds: Bounds,
    radius: f64,
    settings: Settings,
    melody: Melody,
    dispatcher: Box<dyn NoteDispatcher>,
}

impl Arena {
    pub fn new(
        scheduler: &Scheduler,
        settings: Settings,
        dispatcher: impl NoteDispatcher + 'static,
    ) -> Result<Self> {
        let axis_sim = || -> Result<Simulation> {
            let sim = Simulation::new(
                scheduler,
                ValueHolder::new(0.0),
                Friction::new(settings.fling.friction),
            );
            sim.set_min_visible_change(settings.fling.min_visible_change)?;
            Ok(sim)
        };
        let horizontal = axis_sim()?;
        let vertical = axis_sim()?;
        let melody = Melody::new(settings.audio.root_semitone, settings.audio.scale.clone());

        Ok(Self {
            scheduler: scheduler.clone(),
            horizontal,
            vertical,
            bounds: Bounds::default(),
            radius: 0.0,
            settings,
            melody,
            dispatcher: Box::new(dispatcher),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn simulation(&self, axis: Axis) -> &Simulation {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }

    /// Set the box. The ball radius follows the shorter side.
    pub fn set_bounds(&mut self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) {
        self.bounds = Bounds::new(min_x, max_x, min_y, max_y);
        let shorter = self.bounds.width().min(self.bounds.height());
        self.radius = shorter * self.settings.arena.radius_fraction;
    }

    /// New surface size: box at the origin, ball back in the middle
    pub fn resize(&mut self, width: f64, height: f64) {
        self.set_bounds(0.0, width, 0.0, height);
        let center = self.bounds.center();
        self.set_position(center);
        log::info!("Arena resized to {width}x{height}, ball radius {}", self.radius);
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn value(&self, axis: Axis) -> f64 {
        self.simulation(axis).target().get()
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.value(Axis::Horizontal), self.value(Axis::Vertical))
    }

    /// Current velocity; zero on an axis that is at rest
    pub fn velocity(&self) -> DVec2 {
        DVec2::new(self.axis_velocity(Axis::Horizontal), self.axis_velocity(Axis::Vertical))
    }

    fn axis_velocity(&self, axis: Axis) -> f64 {
        let sim = self.simulation(axis);
        if sim.is_running() { sim.velocity() } else { 0.0 }
    }

    fn set_position(&self, position: DVec2) {
        self.horizontal.target().set(position.x);
        self.vertical.target().set(position.y);
    }

    /// Give one axis a velocity. A running axis keeps going with the new velocity.
    pub fn start_impulse(&self, axis: Axis, velocity: f64) -> Result<()> {
        self.simulation(axis).set_start_velocity(velocity).start()
    }

    pub fn fling(&self, velocity_x: f64, velocity_y: f64) -> Result<()> {
        self.start_impulse(Axis::Horizontal, velocity_x)?;
        self.start_impulse(Axis::Vertical, velocity_y)
    }

    /// Directional key press
    pub fn nudge(&self, direction: Direction) -> Result<()> {
        let (axis, sign) = direction.axis_and_sign();
        self.start_impulse(axis, sign * self.settings.fling.key_impulse)
    }

    pub fn cancel(&self, axis: Axis) {
        self.simulation(axis).cancel();
    }

    /// Touch down: the ball stops where it is
    pub fn press(&self) {
        self.horizontal.cancel();
        self.vertical.cancel();
    }

    /// Move the ball by a pointer delta
    pub fn drag(&self, dx: f64, dy: f64) {
        self.set_position(self.position() + DVec2::new(dx, dy));
    }

    /// Whether a frame tick is wanted
    pub fn needs_frame(&self) -> bool {
        self.scheduler.is_armed()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.settings.audio.muted = muted;
    }

    /// Switch both axes to the minimum visible change of `kind`
    pub fn set_visible_change(&mut self, kind: VisibleChange) -> Result<()> {
        self.settings.apply_visible_change(kind);
        let threshold = self.settings.fling.min_visible_change;
        self.horizontal.set_min_visible_change(threshold)?;
        self.vertical.set_min_visible_change(threshold)?;
        log::info!("Minimum visible change: {} ({threshold})", kind.as_str());
        Ok(())
    }

    /// Run one frame: tick the simulations, then bounce off any walls
    pub fn advance_frame(&mut self, frame_time_ms: u64) -> Result<Vec<WallContact>> {
        if let TickOutcome::Dropped = self.scheduler.on_external_tick(frame_time_ms) {
            return Ok(Vec::new());
        }
        self.resolve_walls()
    }

    /// Clamp the ball inside the box and reverse every axis that hit a wall
    pub fn resolve_walls(&mut self) -> Result<Vec<WallContact>> {
        let contacts = ball_box_collision(self.position(), self.radius, &self.bounds);
        if contacts.is_empty() {
            return Ok(contacts);
        }

        let velocity = self.velocity();
        for contact in &contacts {
            let axis = contact.wall.axis();
            let sim = self.simulation(axis);
            sim.target().set(axis.of(contact.corrected));
            sim.cancel();

            let bounced = axis.of(reflect_velocity(velocity, contact.normal));
            if bounced != 0.0 {
                sim.set_start_velocity(bounced).start()?;
            }
            log::debug!("Hit {:?} wall at {:?}", contact.wall, contact.corrected);
        }

        self.play_wall_note();
        Ok(contacts)
    }

    fn play_wall_note(&mut self) {
        let audio = &self.settings.audio;
        if audio.muted {
            return;
        }
        let note = NoteRequest {
            sample_rate: audio.sample_rate,
            frequency: self.melody.next_frequency(),
            duration_s: audio.note_duration_s,
        };
        self.dispatcher.dispatch(note);
    }
}

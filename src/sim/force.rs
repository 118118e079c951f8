//! Force models driving a scalar simulation
//!
//! A force maps the current (value, velocity) pair to an acceleration and
//! decides when motion has settled. Forces hold no per-frame state, so the
//! same inputs always integrate to the same outputs.

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FRICTION, MIN_VISIBLE_CHANGE_PIXELS, THRESHOLD_MULTIPLIER,
    VELOCITY_THRESHOLD_MULTIPLIER,
};

/// Value/velocity pair advanced by one integration step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassState {
    pub value: f64,
    pub velocity: f64,
}

impl MassState {
    pub fn new(value: f64, velocity: f64) -> Self {
        Self { value, velocity }
    }
}

/// Acceleration model plugged into a [`Simulation`](super::Simulation)
pub trait Force {
    /// Acceleration at the given state, in units/s²
    fn acceleration(&self, value: f64, velocity: f64) -> f64;

    /// Whether motion is considered finished
    fn is_at_equilibrium(&self, value: f64, velocity: f64) -> bool;

    /// Called when the owning simulation changes its minimum visible change
    fn set_value_threshold(&mut self, threshold: f64);

    /// Velocity after `dt` seconds. Override when the force must not push
    /// velocity past some limit within a single step.
    fn next_velocity(&self, value: f64, velocity: f64, dt: f64) -> f64 {
        velocity + self.acceleration(value, velocity) * dt
    }

    /// One semi-implicit Euler step: velocity first, then position with the
    /// updated velocity.
    fn step(&self, state: MassState, dt: f64) -> MassState {
        let velocity = self.next_velocity(state.value, state.velocity, dt);
        MassState {
            value: state.value + velocity * dt,
            velocity,
        }
    }
}

/// Constant-magnitude friction opposing motion ("fling")
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Friction {
    /// Deceleration magnitude in units/s²
    magnitude: f64,
    /// Speed below which the fling is over
    velocity_threshold: f64,
}

impl Default for Friction {
    fn default() -> Self {
        Self::new(DEFAULT_FRICTION)
    }
}

impl Friction {
    /// Friction with the given deceleration; negative input is taken by magnitude.
    pub fn new(magnitude: f64) -> Self {
        Self {
            magnitude: magnitude.abs(),
            velocity_threshold: MIN_VISIBLE_CHANGE_PIXELS
                * THRESHOLD_MULTIPLIER
                * VELOCITY_THRESHOLD_MULTIPLIER,
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn velocity_threshold(&self) -> f64 {
        self.velocity_threshold
    }
}

impl Force for Friction {
    fn acceleration(&self, _value: f64, velocity: f64) -> f64 {
        if velocity == 0.0 {
            0.0
        } else {
            -velocity.signum() * self.magnitude
        }
    }

    fn is_at_equilibrium(&self, _value: f64, velocity: f64) -> bool {
        velocity.abs() < self.velocity_threshold
    }

    fn set_value_threshold(&mut self, threshold: f64) {
        self.velocity_threshold = threshold * VELOCITY_THRESHOLD_MULTIPLIER;
    }

    fn next_velocity(&self, value: f64, velocity: f64, dt: f64) -> f64 {
        let next = velocity + self.acceleration(value, velocity) * dt;
        // Friction stops motion, it never reverses it
        if next.signum() != velocity.signum() {
            0.0
        } else {
            next
        }
    }
}

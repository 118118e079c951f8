//! Frame-clocked simulation module
//!
//! Everything here is single-threaded and driven by frame ticks:
//! - One scheduler per thread hands every frame the same timestamp
//! - Simulations integrate their force in fixed-size substeps
//! - Handles are `!Send`, so cross-thread use does not compile

pub mod collision;
pub mod force;
mod listeners;
pub mod scheduler;
pub mod simulation;

pub use collision::{Axis, Bounds, Wall, WallContact, ball_box_collision, reflect_velocity};
pub use force::{Force, Friction, MassState};
pub use listeners::ListenerId;
pub use scheduler::{
    Clock, FrameCallback, FrameRequester, ManualClock, Scheduler, TickOutcome, UptimeClock,
};
pub use simulation::{FrameUpdate, Simulation, SimulationEnd, ValueHolder};

//! Collision detection and response for the ball in its box
//!
//! The ball is a circle moving inside an axis-aligned rectangle. Each wall
//! is tested independently, so a ball driven into a corner reports two
//! contacts in the same frame.

use glam::DVec2;

/// One of the two independent motion axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// Component of `v` along this axis
    #[inline]
    pub fn of(self, v: DVec2) -> f64 {
        match self {
            Axis::Horizontal => v.x,
            Axis::Vertical => v.y,
        }
    }

    /// `v` with this axis' component replaced
    #[inline]
    pub fn with(self, v: DVec2, component: f64) -> DVec2 {
        match self {
            Axis::Horizontal => DVec2::new(component, v.y),
            Axis::Vertical => DVec2::new(v.x, component),
        }
    }
}

/// Box side, in screen coordinates (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wall {
    Left,
    Right,
    Top,
    Bottom,
}

impl Wall {
    pub fn axis(self) -> Axis {
        match self {
            Wall::Left | Wall::Right => Axis::Horizontal,
            Wall::Top | Wall::Bottom => Axis::Vertical,
        }
    }

    /// Unit normal pointing back into the box
    pub fn inward_normal(self) -> DVec2 {
        match self {
            Wall::Left => DVec2::X,
            Wall::Right => DVec2::NEG_X,
            Wall::Top => DVec2::Y,
            Wall::Bottom => DVec2::NEG_Y,
        }
    }
}

/// Axis-aligned rectangle the ball lives in
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min: DVec2::new(min_x, min_y),
            max: DVec2::new(max_x, max_y),
        }
    }

    /// Box anchored at the origin
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, width, 0.0, height)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Range a ball of `radius` may occupy along `axis` without touching a wall
    pub fn free_range(&self, axis: Axis, radius: f64) -> (f64, f64) {
        (axis.of(self.min) + radius, axis.of(self.max) - radius)
    }
}

/// A wall the ball has reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    pub wall: Wall,
    /// Ball center pushed back to touch the wall
    pub corrected: DVec2,
    /// Surface normal, pointing into the box
    pub normal: DVec2,
    /// How far the ball had passed the wall
    pub penetration: f64,
}

/// Walls the ball overlaps, at most one per axis.
///
/// A ball exactly touching a wall is not a contact. On a box narrower than
/// the ball the lower wall wins.
pub fn ball_box_collision(
    ball_pos: DVec2,
    ball_radius: f64,
    bounds: &Bounds,
) -> Vec<WallContact> {
    let mut contacts = Vec::with_capacity(2);
    for (axis, low, high) in [
        (Axis::Horizontal, Wall::Left, Wall::Right),
        (Axis::Vertical, Wall::Top, Wall::Bottom),
    ] {
        let (lo, hi) = bounds.free_range(axis, ball_radius);
        let pos = axis.of(ball_pos);
        let hit = if pos < lo {
            Some((low, lo, lo - pos))
        } else if pos > hi {
            Some((high, hi, pos - hi))
        } else {
            None
        };
        if let Some((wall, limit, penetration)) = hit {
            contacts.push(WallContact {
                wall,
                corrected: axis.with(ball_pos, limit),
                normal: wall.inward_normal(),
                penetration,
            });
        }
    }
    contacts
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: DVec2, normal: DVec2) -> DVec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

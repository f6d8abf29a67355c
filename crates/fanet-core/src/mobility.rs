//! UAV mobility models
//!
//! Mobility is driven by the simulator: every update interval it calls
//! [`Mobility::advance`] and publishes the new position to the node's
//! [`PositionProvider`](crate::mesh::PositionProvider).

use crate::mesh::packet::Position;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

/// Chance per step of picking a new horizontal heading
const HEADING_CHANGE_PROBABILITY: f64 = 0.1;

/// Margin kept from a bound after bouncing off it (meters)
const BOUNCE_MARGIN: f64 = 1.0;

/// A movement model
pub trait Mobility {
    /// Current position
    fn position(&self) -> Position;

    /// Move forward by `dt`
    fn advance(&mut self, dt: Duration);
}

/// Box the UAVs fly in (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 2000.0,
            min_y: 0.0,
            max_y: 2000.0,
            min_z: 50.0,
            max_z: 150.0,
        }
    }
}

impl Bounds {
    /// Whether `p` lies inside the box, bounds included
    pub fn contains(&self, p: &Position) -> bool {
        (self.min_x..=self.max_x).contains(&p.x)
            && (self.min_y..=self.max_y).contains(&p.y)
            && (self.min_z..=self.max_z).contains(&p.z)
    }
}

/// Velocity in meters per second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    pub fn horizontal_speed(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// A node that never moves
#[derive(Debug, Clone, Copy)]
pub struct StaticMobility {
    position: Position,
}

impl StaticMobility {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

impl Mobility for StaticMobility {
    fn position(&self) -> Position {
        self.position
    }

    fn advance(&mut self, _dt: Duration) {}
}

/// Straight-line flight that bounces off the area and altitude bounds,
/// with an occasional random change of heading.
#[derive(Debug)]
pub struct BounceMobility {
    position: Position,
    velocity: Velocity,
    bounds: Bounds,
    rng: StdRng,
}

impl BounceMobility {
    /// Start at `initial` flying along +x at a speed drawn from
    /// `[min_speed, max_speed)`.
    pub fn new(initial: Position, bounds: Bounds, min_speed: f64, max_speed: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let speed = if max_speed > min_speed {
            rng.gen_range(min_speed..max_speed)
        } else {
            min_speed
        };
        Self {
            position: initial,
            velocity: Velocity {
                x: speed,
                y: 0.0,
                z: 0.0,
            },
            bounds,
            rng,
        }
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

impl Mobility for BounceMobility {
    fn position(&self) -> Position {
        self.position
    }

    fn advance(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        if dt <= 0.0 {
            return;
        }
        let b = self.bounds;

        let (x, vx, bx) = bounce(self.position.x + self.velocity.x * dt, self.velocity.x, b.min_x, b.max_x);
        let (y, vy, by) = bounce(self.position.y + self.velocity.y * dt, self.velocity.y, b.min_y, b.max_y);
        let (z, vz, bz) = bounce(self.position.z + self.velocity.z * dt, self.velocity.z, b.min_z, b.max_z);
        let bounced = bx || by || bz;

        self.position = Position::new(x, y, z);
        self.velocity = Velocity { x: vx, y: vy, z: vz };

        if !bounced && self.rng.gen_bool(HEADING_CHANGE_PROBABILITY) {
            let angle = self.rng.gen_range(0.0..2.0 * PI);
            let speed = self.velocity.horizontal_speed();
            self.velocity.x = speed * angle.cos();
            self.velocity.y = speed * angle.sin();
        }

        if bounced {
            tracing::trace!("UAV bounced at {}", self.position);
        }
    }
}

/// Clamp one axis into `(min, max)` and point the velocity back inside
fn bounce(value: f64, velocity: f64, min: f64, max: f64) -> (f64, f64, bool) {
    if value <= min {
        (min + BOUNCE_MARGIN, velocity.abs(), true)
    } else if value >= max {
        (max - BOUNCE_MARGIN, -velocity.abs(), true)
    } else {
        (value, velocity, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_never_moves() {
        let p = Position::new(500.0, 500.0, 0.0);
        let mut m = StaticMobility::new(p);
        m.advance(Duration::from_secs(100));
        assert_eq!(m.position(), p);
    }

    #[test]
    fn test_initial_velocity_along_x() {
        let m = BounceMobility::new(Position::new(100.0, 100.0, 100.0), Bounds::default(), 10.0, 20.0, 7);
        let v = m.velocity();
        assert!((10.0..20.0).contains(&v.x));
        assert_eq!(v.y, 0.0);
        assert_eq!(v.z, 0.0);
    }

    #[test]
    fn test_bounce_at_max_x() {
        let bounds = Bounds::default();
        let mut m = BounceMobility::new(Position::new(1995.0, 100.0, 100.0), bounds, 10.0, 10.0, 1);

        m.advance(Duration::from_secs(1));

        assert_eq!(m.position().x, bounds.max_x - 1.0);
        assert_eq!(m.velocity().x, -10.0);
    }

    #[test]
    fn test_bounce_helper() {
        assert_eq!(bounce(-5.0, -3.0, 0.0, 100.0), (1.0, 3.0, true));
        assert_eq!(bounce(100.0, 3.0, 0.0, 100.0), (99.0, -3.0, true));
        assert_eq!(bounce(50.0, 3.0, 0.0, 100.0), (50.0, 3.0, false));
    }

    #[test]
    fn test_stays_in_bounds_and_keeps_speed() {
        let bounds = Bounds::default();
        let mut m = BounceMobility::new(Position::new(1000.0, 1000.0, 100.0), bounds, 15.0, 25.0, 99);
        let speed = m.velocity().horizontal_speed();

        for _ in 0..2000 {
            m.advance(Duration::from_secs(1));
            assert!(bounds.contains(&m.position()), "{}", m.position());
            assert!((m.velocity().horizontal_speed() - speed).abs() < 1e-6);
        }
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let start = Position::new(300.0, 300.0, 80.0);
        let mut a = BounceMobility::new(start, Bounds::default(), 10.0, 20.0, 5);
        let mut b = BounceMobility::new(start, Bounds::default(), 10.0, 20.0, 5);
        for _ in 0..50 {
            a.advance(Duration::from_secs(2));
            b.advance(Duration::from_secs(2));
        }
        assert_eq!(a.position(), b.position());
    }
}

//! Flight Physics
//!
//! One attempt's vertical motion and death detection. The bird stays at a
//! fixed x; the course scrolls past it.

use serde::{Serialize, Deserialize};

use crate::core::geometry::Rect;
use crate::game::config::{PhysicsConfig, GROUND_TOP, PLAYFIELD_HEIGHT};

/// Why an attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Hit a pipe
    Obstacle,
    /// Hit the ground band
    Ground,
    /// Left the playfield vertically
    OutOfBounds,
}

/// Attempt state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightState {
    /// Flying; input accepted
    Alive,
    /// Terminal until reset
    Dead(DeathCause),
}

/// Vertical flight model for a single attempt.
#[derive(Clone, Debug)]
pub struct FlightSimulator {
    config: PhysicsConfig,
    y: f64,
    velocity_y: f64,
    state: FlightState,
    /// Dead and lying on the ground
    resting: bool,
}

impl FlightSimulator {
    /// Create a live bird at the configured spawn point.
    pub fn new(config: PhysicsConfig) -> Self {
        let y = config.spawn_y;
        Self {
            config,
            y,
            velocity_y: 0.0,
            state: FlightState::Alive,
            resting: false,
        }
    }

    /// Apply a flap impulse. Ignored while dead.
    ///
    /// Returns true if the flap was applied.
    pub fn flap(&mut self) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.velocity_y = self.config.flap_velocity;
        true
    }

    /// Integrate gravity over `delta_ms`.
    ///
    /// Returns the cause if the bird died during this step. A dead bird keeps
    /// falling until it rests on the ground.
    pub fn integrate(&mut self, delta_ms: f64) -> Option<DeathCause> {
        if self.resting {
            return None;
        }

        let dt = delta_ms / 1000.0;
        let max = self.config.max_vertical_speed;
        self.velocity_y = (self.velocity_y + self.config.gravity * dt).clamp(-max, max);
        self.y += self.velocity_y * dt;

        let half_height = self.config.hitbox_height / 2.0;

        if !self.is_alive() {
            if self.y + half_height >= GROUND_TOP {
                self.y = GROUND_TOP - half_height;
                self.velocity_y = 0.0;
                self.resting = true;
            }
            return None;
        }

        let cause = if self.y < 0.0 || self.y > PLAYFIELD_HEIGHT {
            Some(DeathCause::OutOfBounds)
        } else if self.y + half_height >= GROUND_TOP {
            Some(DeathCause::Ground)
        } else {
            None
        };

        if let Some(cause) = cause {
            self.kill(cause);
        }
        cause
    }

    /// End the attempt. Returns false if already dead.
    pub fn kill(&mut self, cause: DeathCause) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.state = FlightState::Dead(cause);
        if cause == DeathCause::Ground {
            self.y = GROUND_TOP - self.config.hitbox_height / 2.0;
            self.velocity_y = 0.0;
            self.resting = true;
        }
        true
    }

    /// Start a fresh attempt at height `y`.
    pub fn reset(&mut self, y: f64) {
        self.y = y;
        self.velocity_y = 0.0;
        self.state = FlightState::Alive;
        self.resting = false;
    }

    /// Collision box centred on the bird.
    pub fn hitbox(&self) -> Rect {
        Rect::centered(
            self.config.bird_x,
            self.y,
            self.config.hitbox_width,
            self.config.hitbox_height,
        )
    }

    /// Check if the attempt is still running.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == FlightState::Alive
    }

    /// Current state.
    pub fn state(&self) -> FlightState {
        self.state
    }

    /// Death cause, if dead.
    pub fn death_cause(&self) -> Option<DeathCause> {
        match self.state {
            FlightState::Alive => None,
            FlightState::Dead(cause) => Some(cause),
        }
    }

    /// Vertical position (centre).
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Vertical velocity.
    pub fn velocity_y(&self) -> f64 {
        self.velocity_y
    }

    /// Horizontal screen position.
    pub fn x(&self) -> f64 {
        self.config.bird_x
    }

    /// Dead and settled on the ground.
    pub fn is_resting(&self) -> bool {
        self.resting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP_MS: f64 = 1000.0 / 60.0;

    fn bird() -> FlightSimulator {
        FlightSimulator::new(PhysicsConfig::default())
    }

    #[test]
    fn test_gravity_accelerates_downward() {
        let mut flight = bird();
        flight.integrate(100.0);
        assert!((flight.velocity_y() - 80.0).abs() < 1e-9);
        assert!(flight.y() > 300.0);
    }

    #[test]
    fn test_flap_sets_fixed_velocity() {
        let mut flight = bird();
        flight.integrate(500.0);
        assert!(flight.flap());
        assert_eq!(flight.velocity_y(), -350.0);
    }

    #[test]
    fn test_vertical_speed_clamped() {
        let mut flight = bird();
        flight.reset(10.0);
        for _ in 0..50 {
            flight.integrate(STEP_MS);
        }
        assert!(flight.velocity_y() <= 600.0);
    }

    #[test]
    fn test_falls_to_ground_death() {
        let mut flight = bird();
        let mut cause = None;
        for _ in 0..600 {
            if let Some(c) = flight.integrate(STEP_MS) {
                cause = Some(c);
                break;
            }
        }
        assert_eq!(cause, Some(DeathCause::Ground));
        assert!(!flight.is_alive());
        assert!(flight.is_resting());
        assert_eq!(flight.hitbox().bottom, GROUND_TOP);
    }

    #[test]
    fn test_leaving_top_is_out_of_bounds() {
        let mut flight = bird();
        flight.reset(5.0);
        flight.flap();
        assert_eq!(flight.integrate(STEP_MS), Some(DeathCause::OutOfBounds));
    }

    #[test]
    fn test_flap_ignored_while_dead() {
        let mut flight = bird();
        assert!(flight.kill(DeathCause::Obstacle));
        assert!(!flight.kill(DeathCause::Ground));
        assert_eq!(flight.death_cause(), Some(DeathCause::Obstacle));

        let before = flight.velocity_y();
        assert!(!flight.flap());
        assert_eq!(flight.velocity_y(), before);
    }

    #[test]
    fn test_dead_bird_keeps_falling_then_rests() {
        let mut flight = bird();
        flight.kill(DeathCause::Obstacle);

        assert_eq!(flight.integrate(STEP_MS), None);
        assert!(flight.y() > 300.0);

        for _ in 0..600 {
            flight.integrate(STEP_MS);
        }
        assert!(flight.is_resting());
        let rest_y = flight.y();
        flight.integrate(STEP_MS);
        assert_eq!(flight.y(), rest_y);
    }

    #[test]
    fn test_reset_revives() {
        let mut flight = bird();
        flight.kill(DeathCause::Ground);
        flight.reset(300.0);

        assert!(flight.is_alive());
        assert!(!flight.is_resting());
        assert_eq!(flight.y(), 300.0);
        assert_eq!(flight.velocity_y(), 0.0);
        assert!(flight.flap());
    }

    #[test]
    fn test_hitbox_is_centred() {
        let flight = bird();
        assert_eq!(flight.hitbox(), Rect::new(140.0, 280.0, 180.0, 320.0));
    }
}

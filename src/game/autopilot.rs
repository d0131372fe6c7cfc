//! Deterministic Bot Input
//!
//! A simple flap policy for the headless runner and tests: aim for the centre
//! of the next gap and flap whenever the bird is falling below it.

use crate::game::course::CourseGenerator;
use crate::game::flight::FlightSimulator;

/// Flap policy.
#[derive(Clone, Debug, PartialEq)]
pub struct Autopilot {
    /// Added to the target height (positive aims lower)
    pub aim_offset: f64,
    /// How far below the target the bird may sink before flapping
    pub flap_threshold: f64,
    /// Target height when no obstacle is ahead
    pub cruise_y: f64,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self {
            aim_offset: 0.0,
            flap_threshold: 20.0,
            cruise_y: 300.0,
        }
    }
}

impl Autopilot {
    /// Bot that aims `aim_offset` px below gap centres.
    pub fn with_offset(aim_offset: f64) -> Self {
        Self { aim_offset, ..Self::default() }
    }

    /// Height the bot is steering for.
    pub fn target_y(&self, flight: &FlightSimulator, course: &CourseGenerator) -> f64 {
        let bird_left = flight.hitbox().left;
        course
            .obstacles()
            .iter()
            .find(|o| o.x + o.width / 2.0 >= bird_left)
            .map_or(self.cruise_y, |o| o.gap_center_y)
            + self.aim_offset
    }

    /// Check if the bot flaps this frame.
    pub fn should_flap(&self, flight: &FlightSimulator, course: &CourseGenerator) -> bool {
        if !flight.is_alive() {
            return false;
        }
        let target = self.target_y(flight, course);
        flight.velocity_y() > 0.0 && flight.y() > target + self.flap_threshold
    }
}

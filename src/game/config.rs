//! Simulation Tunables
//!
//! Every number that shapes the course, the flight model or the score lives
//! here. Defaults reproduce the browser clients exactly; changing any of the
//! course or physics values splits the player base into incompatible courses.

use serde::{Serialize, Deserialize};

// =============================================================================
// PLAYFIELD
// =============================================================================

/// Playfield width in pixels.
pub const PLAYFIELD_WIDTH: f64 = 800.0;

/// Playfield height in pixels.
pub const PLAYFIELD_HEIGHT: f64 = 600.0;

/// Height of the ground band at the bottom of the playfield.
pub const GROUND_HEIGHT: f64 = 64.0;

/// Y coordinate of the top of the ground band.
pub const GROUND_TOP: f64 = PLAYFIELD_HEIGHT - GROUND_HEIGHT;

// =============================================================================
// CONFIG GROUPS
// =============================================================================

/// Flight model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Downward acceleration (px/s²)
    pub gravity: f64,
    /// Vertical velocity set by a flap (px/s, negative is up)
    pub flap_velocity: f64,
    /// Absolute cap on vertical speed (px/s)
    pub max_vertical_speed: f64,
    /// Fixed horizontal screen position of the bird
    pub bird_x: f64,
    /// Vertical spawn position
    pub spawn_y: f64,
    /// Hitbox width
    pub hitbox_width: f64,
    /// Hitbox height
    pub hitbox_height: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 800.0,
            flap_velocity: -350.0,
            max_vertical_speed: 600.0,
            bird_x: PLAYFIELD_WIDTH * 0.2,
            spawn_y: PLAYFIELD_HEIGHT / 2.0,
            hitbox_width: 40.0,
            hitbox_height: 40.0,
        }
    }
}

/// Obstacle and token generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Obstacle width
    pub obstacle_width: f64,
    /// X where new obstacles appear (just off the right edge)
    pub spawn_x: f64,
    /// Starting gap size for every attempt
    pub base_gap: f64,
    /// Gap size floor for the difficulty ratchet
    pub min_gap: f64,
    /// Gap shrink applied every `ratchet_every` obstacles
    pub gap_decrement: f64,
    /// Obstacles per ratchet step
    pub ratchet_every: u32,
    /// Largest narrowing, as a fraction of the current gap
    pub gap_narrow_fraction: f64,
    /// Largest widening, as a fraction of the current gap
    pub gap_widen_fraction: f64,
    /// Smallest possible gap-centre offset above `gap/2`
    pub gap_center_min: f64,
    /// Largest possible gap centre
    pub gap_center_max: f64,
    /// Spawn interval at base scroll speed (ms)
    pub base_spawn_interval_ms: f64,
    /// Damping of spawn-rate growth with scroll speed
    pub spawn_rate_damping: f64,
    /// Chance that an obstacle carries a token
    pub token_chance: f64,
    /// Token side length
    pub token_size: f64,
    /// Token vertical spread as a fraction of the gap (±)
    pub token_spread_fraction: f64,
    /// Token pickup box as a fraction of the token size
    pub token_hitbox_fraction: f64,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            obstacle_width: 80.0,
            spawn_x: PLAYFIELD_WIDTH + 80.0,
            base_gap: 180.0,
            min_gap: 120.0,
            gap_decrement: 2.0,
            ratchet_every: 10,
            gap_narrow_fraction: 0.4,
            gap_widen_fraction: 0.25,
            gap_center_min: 150.0,
            gap_center_max: 400.0,
            base_spawn_interval_ms: 1800.0,
            spawn_rate_damping: 0.5,
            token_chance: 0.3,
            token_size: 24.0,
            token_spread_fraction: 1.0 / 3.0,
            token_hitbox_fraction: 0.7,
        }
    }
}

/// Scroll-speed progression. Presentation and course cadence only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedConfig {
    /// Base scroll speed (px/s)
    pub base: f64,
    /// Scroll speed cap (px/s)
    pub max: f64,
    /// Distance between speed steps (m)
    pub step_distance: f64,
    /// Fractional increase per step
    pub step_increase: f64,
    /// Fractional increase per step in hard mode
    pub hard_step_increase: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base: 200.0,
            max: 300.0,
            step_distance: 50.0,
            step_increase: 0.1,
            hard_step_increase: 0.2,
        }
    }
}

impl SpeedConfig {
    /// Scroll speed for the given attempt distance.
    pub fn scroll_speed(&self, distance_m: f64, hard_mode: bool) -> f64 {
        let step = if hard_mode { self.hard_step_increase } else { self.step_increase };
        let steps = (distance_m / self.step_distance).floor();
        (self.base * (1.0 + steps * step)).min(self.max)
    }
}

impl CourseConfig {
    /// Spawn interval for the given scroll speed (ms).
    ///
    /// At base speed this is `base_spawn_interval_ms`; faster scrolling
    /// shortens it, damped so the course stays flyable.
    pub fn spawn_interval_ms(&self, scroll_speed: f64, base_speed: f64) -> f64 {
        let speed_ratio = scroll_speed / base_speed;
        let rate = 1.0 + self.spawn_rate_damping * (speed_ratio - 1.0);
        if rate <= 0.0 {
            return self.base_spawn_interval_ms;
        }
        self.base_spawn_interval_ms / rate
    }
}

/// Score model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Canonical distance rate (m/s), independent of scroll speed
    pub distance_per_second: f64,
    /// Distance per multiplier step (m)
    pub multiplier_milestone: f64,
    /// Points per token before the multiplier
    pub token_base_points: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_per_second: 20.0,
            multiplier_milestone: 100.0,
            token_base_points: 10,
        }
    }
}

/// Match timers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Countdown before the shared match goes active (ms)
    pub countdown_ms: i64,
    /// Delay between a death and the next attempt (ms)
    pub restart_grace_ms: f64,
    /// Default match length (s)
    pub default_duration_secs: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            countdown_ms: 3000,
            restart_grace_ms: 800.0,
            default_duration_secs: 60,
        }
    }
}

/// All simulation tunables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Flight model
    pub physics: PhysicsConfig,
    /// Course generation
    pub course: CourseConfig,
    /// Scroll speed
    pub speed: SpeedConfig,
    /// Score model
    pub scoring: ScoringConfig,
    /// Timers
    pub timing: TimingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_speed_steps() {
        let speed = SpeedConfig::default();
        assert_eq!(speed.scroll_speed(0.0, false), 200.0);
        assert_eq!(speed.scroll_speed(49.9, false), 200.0);
        assert!((speed.scroll_speed(50.0, false) - 220.0).abs() < 1e-9);
        assert!((speed.scroll_speed(50.0, true) - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_scroll_speed_capped() {
        let speed = SpeedConfig::default();
        assert_eq!(speed.scroll_speed(10_000.0, false), 300.0);
        assert_eq!(speed.scroll_speed(10_000.0, true), 300.0);
    }

    #[test]
    fn test_spawn_interval_damped() {
        let course = CourseConfig::default();
        assert_eq!(course.spawn_interval_ms(200.0, 200.0), 1800.0);
        // 1.5x speed with 0.5 damping spawns 1.25x as often
        assert!((course.spawn_interval_ms(300.0, 200.0) - 1440.0).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_match_playfield() {
        let config = GameConfig::default();
        assert_eq!(config.physics.bird_x, 160.0);
        assert_eq!(config.physics.spawn_y, 300.0);
        assert_eq!(config.course.spawn_x, 880.0);
        assert_eq!(GROUND_TOP, 536.0);
    }
}

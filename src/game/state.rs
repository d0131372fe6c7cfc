//! Match Identity and Phase
//!
//! `MatchConfig` is fixed once a match starts and owned by the session that
//! simulates it. `MatchPhase` is the coarse lifecycle position.

use serde::{Serialize, Deserialize};

/// Wall-clock instant in milliseconds since the Unix epoch.
pub type TimestampMs = i64;

// =============================================================================
// MATCH CONFIG
// =============================================================================

/// Immutable match parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Opaque match identity
    pub match_id: String,
    /// Course determinism key
    pub seed: u32,
    /// Display name of the local player
    pub player_name: String,
    /// Per-client participant identity, stable for the match
    pub session_id: String,
    /// Match length in seconds
    pub duration_secs: u32,
    /// Faster scroll-speed growth
    pub hard_mode: bool,
}

impl MatchConfig {
    /// Create a match config with the default duration.
    pub fn new(
        match_id: impl Into<String>,
        seed: u32,
        player_name: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            seed,
            player_name: player_name.into(),
            session_id: session_id.into(),
            duration_secs: crate::DEFAULT_MATCH_DURATION_SECS,
            hard_mode: false,
        }
    }

    /// Set the match length.
    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Enable or disable hard mode.
    pub fn with_hard_mode(mut self, hard_mode: bool) -> Self {
        self.hard_mode = hard_mode;
        self
    }

    /// Match length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration_secs) * 1000
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Match lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Not started
    #[default]
    Idle,
    /// Waiting for the shared start instant
    Countdown,
    /// Attempts are being flown
    Active,
    /// Time is up; terminal until reset
    Ended,
}

impl MatchPhase {
    /// Stable lowercase name for logs and events.
    pub fn name(self) -> &'static str {
        match self {
            MatchPhase::Idle => "idle",
            MatchPhase::Countdown => "countdown",
            MatchPhase::Active => "active",
            MatchPhase::Ended => "ended",
        }
    }

    /// Check if the match is running (countdown or active).
    pub fn is_running(self) -> bool {
        matches!(self, MatchPhase::Countdown | MatchPhase::Active)
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

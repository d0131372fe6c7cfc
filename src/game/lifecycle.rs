//! Match Lifecycle
//!
//! `Idle -> Countdown -> Active -> Ended`, plus the automatic restart of
//! attempts after a short grace delay. Practice matches skip the countdown
//! and time themselves from accumulated frame deltas; shared matches time
//! everything from the [`SimulationClock`] anchor.

use tracing::{debug, info};

use crate::game::clock::SimulationClock;
use crate::game::config::TimingConfig;
use crate::game::state::{MatchPhase, TimestampMs};

// =============================================================================
// ERRORS
// =============================================================================

/// Lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// The match service has no start instant for this match
    #[error("match {0} has no shared start timestamp")]
    MissingStartTimestamp(String),

    /// The requested transition is not valid from the current phase
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        /// Current phase
        phase: MatchPhase,
        /// Attempted action
        action: &'static str,
    },

    /// A match must last at least one second
    #[error("invalid match duration: {0}s")]
    InvalidDuration(u32),
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Timing mode fixed at start.
#[derive(Clone, Debug, PartialEq)]
enum MatchTiming {
    /// Single participant; timed by accumulated delta
    Practice { elapsed_ms: f64, duration_ms: f64 },
    /// Shared clock anchor
    Shared(SimulationClock),
}

/// Something the caller must act on after `update`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Phase changed
    Phase {
        /// Previous phase
        from: MatchPhase,
        /// New phase
        to: MatchPhase,
    },
    /// Grace delay elapsed; begin a fresh attempt
    RestartAttempt,
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Match lifecycle and attempt-restart scheduling.
#[derive(Clone, Debug)]
pub struct MatchStateMachine {
    config: TimingConfig,
    phase: MatchPhase,
    timing: Option<MatchTiming>,
    /// Grace time left before the next attempt
    pending_restart_ms: Option<f64>,
}

impl MatchStateMachine {
    /// Create an idle machine.
    pub fn new(config: TimingConfig) -> Self {
        Self {
            config,
            phase: MatchPhase::Idle,
            timing: None,
            pending_restart_ms: None,
        }
    }

    /// Start a single-participant match. Goes straight to `Active`.
    pub fn start_practice(&mut self, duration_secs: u32) -> Result<(), MatchError> {
        self.expect_idle("start")?;
        if duration_secs == 0 {
            return Err(MatchError::InvalidDuration(duration_secs));
        }

        self.timing = Some(MatchTiming::Practice {
            elapsed_ms: 0.0,
            duration_ms: f64::from(duration_secs) * 1000.0,
        });
        self.phase = MatchPhase::Active;

        info!(duration_secs, "Practice match started");
        Ok(())
    }

    /// Start a shared match anchored at `match_start_ms`.
    ///
    /// A missing anchor is fatal: guessing one would desynchronize clients.
    pub fn start_shared(
        &mut self,
        match_id: &str,
        match_start_ms: Option<TimestampMs>,
        duration_secs: u32,
        clock_offset_ms: i64,
    ) -> Result<(), MatchError> {
        self.expect_idle("start")?;
        if duration_secs == 0 {
            return Err(MatchError::InvalidDuration(duration_secs));
        }
        let start = match_start_ms.ok_or_else(|| MatchError::MissingStartTimestamp(match_id.to_string()))?;

        let clock = SimulationClock::anchored(
            start,
            self.config.countdown_ms,
            i64::from(duration_secs) * 1000,
        )
        .with_offset(clock_offset_ms);

        info!(
            match_id,
            start,
            active_at = clock.active_at_ms(),
            ends_at = clock.ends_at_ms(),
            "Shared match countdown started"
        );

        self.timing = Some(MatchTiming::Shared(clock));
        self.phase = MatchPhase::Countdown;
        Ok(())
    }

    /// Advance timers.
    ///
    /// `delta_ms` drives practice timing and the restart grace delay;
    /// `now_ms` drives shared timing.
    pub fn update(&mut self, delta_ms: f64, now_ms: TimestampMs) -> Vec<Transition> {
        let mut transitions = Vec::new();

        if self.phase == MatchPhase::Countdown {
            if let Some(MatchTiming::Shared(clock)) = &self.timing {
                if clock.is_active(now_ms) {
                    self.set_phase(MatchPhase::Active, &mut transitions);
                }
            }
        }

        if self.phase != MatchPhase::Active {
            return transitions;
        }

        let expired = match &mut self.timing {
            Some(MatchTiming::Practice { elapsed_ms, duration_ms }) => {
                *elapsed_ms += delta_ms;
                *elapsed_ms >= *duration_ms
            }
            Some(MatchTiming::Shared(clock)) => clock.is_expired(now_ms),
            None => false,
        };

        if expired {
            // A restart still in its grace delay is dropped
            self.pending_restart_ms = None;
            self.set_phase(MatchPhase::Ended, &mut transitions);
            return transitions;
        }

        if let Some(remaining) = self.pending_restart_ms.as_mut() {
            *remaining -= delta_ms;
            if *remaining <= 0.0 {
                self.pending_restart_ms = None;
                transitions.push(Transition::RestartAttempt);
            }
        }

        transitions
    }

    /// Record a death; schedules the next attempt while the match runs.
    pub fn attempt_ended(&mut self) {
        if self.phase == MatchPhase::Active {
            self.pending_restart_ms = Some(self.config.restart_grace_ms);
            debug!(grace_ms = self.config.restart_grace_ms, "Attempt restart scheduled");
        }
    }

    /// Return to `Idle` after a finished match.
    pub fn reset(&mut self) -> Result<(), MatchError> {
        if self.phase.is_running() {
            return Err(MatchError::InvalidTransition { phase: self.phase, action: "reset" });
        }
        self.clear();
        Ok(())
    }

    /// Abandon the match from any phase. Returns true if a match was running.
    pub fn leave(&mut self) -> bool {
        let was_running = self.phase.is_running();
        if was_running {
            info!(phase = %self.phase, "Match abandoned");
        }
        self.clear();
        was_running
    }

    fn clear(&mut self) {
        self.phase = MatchPhase::Idle;
        self.timing = None;
        self.pending_restart_ms = None;
    }

    fn expect_idle(&self, action: &'static str) -> Result<(), MatchError> {
        if self.phase == MatchPhase::Idle {
            Ok(())
        } else {
            Err(MatchError::InvalidTransition { phase: self.phase, action })
        }
    }

    fn set_phase(&mut self, to: MatchPhase, transitions: &mut Vec<Transition>) {
        let from = self.phase;
        self.phase = to;
        info!(%from, %to, "Match phase changed");
        transitions.push(Transition::Phase { from, to });
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Check if a restart is waiting out its grace delay.
    pub fn restart_pending(&self) -> bool {
        self.pending_restart_ms.is_some()
    }

    /// Shared clock, for shared matches.
    pub fn clock(&self) -> Option<&SimulationClock> {
        match &self.timing {
            Some(MatchTiming::Shared(clock)) => Some(clock),
            _ => None,
        }
    }

    /// Match time left, or `None` outside a match.
    pub fn time_remaining_ms(&self, now_ms: TimestampMs) -> Option<i64> {
        match (&self.timing, self.phase) {
            (_, MatchPhase::Ended) => Some(0),
            (Some(MatchTiming::Practice { elapsed_ms, duration_ms }), _) => {
                Some((duration_ms - elapsed_ms).max(0.0).ceil() as i64)
            }
            (Some(MatchTiming::Shared(clock)), _) => Some(clock.time_remaining_ms(now_ms)),
            (None, _) => None,
        }
    }

    /// Countdown left while counting down.
    pub fn countdown_remaining_ms(&self, now_ms: TimestampMs) -> Option<i64> {
        match (&self.timing, self.phase) {
            (Some(MatchTiming::Shared(clock)), MatchPhase::Countdown) => {
                Some(clock.countdown_remaining_ms(now_ms))
            }
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Score Accounting
//!
//! Converts simulated flight time and token pickups into attempt scores and
//! folds finished attempts into the match totals.
//!
//! Distance accrues at a canonical rate that never depends on scroll speed.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::config::ScoringConfig;

// =============================================================================
// ATTEMPT
// =============================================================================

/// One life from spawn to death.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number within the match
    pub index: u32,
    /// Distance flown (m)
    pub distance_m: f64,
    /// Current multiplier (never decreases within an attempt)
    pub multiplier: u32,
    /// Tokens picked up
    pub tokens_collected: u32,
    /// Points from tokens, each weighted by the multiplier at pickup
    pub token_bonus: u64,
    /// Still flying
    pub alive: bool,
}

impl Attempt {
    fn new(index: u32) -> Self {
        Self {
            index,
            distance_m: 0.0,
            multiplier: 1,
            tokens_collected: 0,
            token_bonus: 0,
            alive: true,
        }
    }

    /// `floor(distance * multiplier)` plus token bonuses.
    pub fn score(&self) -> u64 {
        (self.distance_m * f64::from(self.multiplier)).floor() as u64 + self.token_bonus
    }
}

/// A finished attempt as folded into the totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    /// Attempt number
    pub index: u32,
    /// Final score
    pub score: u64,
    /// Final distance (m)
    pub distance_m: f64,
    /// Final multiplier
    pub multiplier: u32,
    /// Tokens picked up
    pub tokens_collected: u32,
}

/// Per-match accumulators.
///
/// `None` means no attempt has finished yet, which is distinct from a
/// finished attempt that scored 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTotals {
    /// Sum of all finished attempts
    pub cumulative_score: u64,
    /// Highest finished attempt
    pub best_attempt_score: Option<u64>,
    /// Most recent finished attempt
    pub last_attempt_score: Option<u64>,
    /// Finished attempts
    pub attempts_completed: u32,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Attempt and match scoring.
#[derive(Clone, Debug)]
pub struct ScoringEngine {
    config: ScoringConfig,
    attempt: Attempt,
    totals: MatchTotals,
}

impl ScoringEngine {
    /// Create an engine with a fresh first attempt.
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            attempt: Attempt::new(1),
            totals: MatchTotals::default(),
        }
    }

    /// Accrue distance for `delta_ms` of flight.
    ///
    /// Returns the new multiplier when it increased.
    pub fn advance(&mut self, delta_ms: f64) -> Option<u32> {
        if !self.attempt.alive {
            return None;
        }

        self.attempt.distance_m += (delta_ms / 1000.0) * self.config.distance_per_second;

        let milestone = (self.attempt.distance_m / self.config.multiplier_milestone).floor() as u32;
        let multiplier = 1 + milestone;
        if multiplier > self.attempt.multiplier {
            self.attempt.multiplier = multiplier;
            return Some(multiplier);
        }
        None
    }

    /// Credit a token at the current multiplier. Returns the points awarded.
    pub fn collect_token(&mut self) -> u64 {
        if !self.attempt.alive {
            return 0;
        }
        let points = self.config.token_base_points * u64::from(self.attempt.multiplier);
        self.attempt.token_bonus += points;
        self.attempt.tokens_collected += 1;
        points
    }

    /// Finish the running attempt and fold it into the totals.
    ///
    /// Returns `None` if the attempt had already ended.
    pub fn end_attempt(&mut self) -> Option<AttemptSummary> {
        if !self.attempt.alive {
            return None;
        }
        self.attempt.alive = false;

        let score = self.attempt.score();
        self.totals.cumulative_score += score;
        self.totals.best_attempt_score = Some(self.totals.best_attempt_score.map_or(score, |b| b.max(score)));
        self.totals.last_attempt_score = Some(score);
        self.totals.attempts_completed += 1;

        debug!(
            attempt = self.attempt.index,
            score,
            distance = self.attempt.distance_m,
            cumulative = self.totals.cumulative_score,
            "Attempt scored"
        );

        Some(AttemptSummary {
            index: self.attempt.index,
            score,
            distance_m: self.attempt.distance_m,
            multiplier: self.attempt.multiplier,
            tokens_collected: self.attempt.tokens_collected,
        })
    }

    /// Replace the finished attempt with a fresh one.
    pub fn begin_attempt(&mut self) {
        let index = self.attempt.index + u32::from(!self.attempt.alive);
        self.attempt = Attempt::new(index);
    }

    /// Clear every accumulator back to a freshly constructed match.
    pub fn reset_match(&mut self) {
        self.attempt = Attempt::new(1);
        self.totals = MatchTotals::default();
    }

    /// Running attempt.
    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    /// Match totals.
    pub fn totals(&self) -> &MatchTotals {
        &self.totals
    }

    /// Score shown to peers: finished attempts plus the running one.
    pub fn live_score(&self) -> u64 {
        if self.attempt.alive {
            self.totals.cumulative_score + self.attempt.score()
        } else {
            self.totals.cumulative_score
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

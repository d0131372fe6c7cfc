//! Simulation Tick
//!
//! [`GameSession`] owns every piece of one player's match state and advances
//! it in a fixed order each frame:
//!
//! 1. drain queued commands
//! 2. advance the lifecycle (countdown, restart grace, expiry)
//! 3. fly the running attempt: scroll speed, physics, course, collisions,
//!    tokens, distance
//! 4. let a dead bird fall to the ground
//!
//! Nothing else mutates this state, so the same deltas and inputs always
//! produce the same course, attempts and score.

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::game::config::GameConfig;
use crate::game::course::CourseGenerator;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::flight::{DeathCause, FlightSimulator};
use crate::game::input::{Command, CommandQueue, CommandSender};
use crate::game::lifecycle::{MatchError, MatchStateMachine, Transition};
use crate::game::scoring::{MatchTotals, ScoringEngine};
use crate::game::state::{MatchConfig, MatchPhase, TimestampMs};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the match ended this tick
    pub match_ended: bool,
}

/// What the local player broadcasts to peers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalSample {
    /// Current attempt distance (m)
    pub distance_m: f64,
    /// Vertical position
    pub y: f64,
    /// Flying
    pub alive: bool,
    /// Finished attempts plus the running one
    pub score: u64,
}

/// One player's deterministic match simulation.
#[derive(Debug)]
pub struct GameSession {
    config: GameConfig,
    match_config: MatchConfig,
    course: CourseGenerator,
    flight: FlightSimulator,
    scoring: ScoringEngine,
    lifecycle: MatchStateMachine,
    commands: CommandQueue,
    frame: u64,
    scroll_speed: f64,
    best_distance_m: u64,
    attempt_started: bool,
}

impl GameSession {
    /// Create an idle session for a match.
    pub fn new(match_config: MatchConfig, config: GameConfig) -> Self {
        let course = CourseGenerator::new(match_config.seed, config.course.clone(), config.speed.base);
        let flight = FlightSimulator::new(config.physics.clone());
        let scoring = ScoringEngine::new(config.scoring.clone());
        let lifecycle = MatchStateMachine::new(config.timing.clone());
        let scroll_speed = config.speed.base;

        Self {
            config,
            match_config,
            course,
            flight,
            scoring,
            lifecycle,
            commands: CommandQueue::new(),
            frame: 0,
            scroll_speed,
            best_distance_m: 0,
            attempt_started: false,
        }
    }

    /// Seed the all-time best distance (loaded from local storage).
    pub fn with_best_distance(mut self, best_distance_m: u64) -> Self {
        self.best_distance_m = best_distance_m;
        self
    }

    /// Handle for enqueueing commands from outside the loop.
    pub fn commands(&self) -> CommandSender {
        self.commands.sender()
    }

    /// Start a single-participant match; the first attempt begins immediately.
    pub fn start_practice(&mut self) -> Result<Vec<GameEvent>, MatchError> {
        self.lifecycle.start_practice(self.match_config.duration_secs)?;
        let mut events = vec![self.event(GameEventData::PhaseChanged {
            from: MatchPhase::Idle,
            to: MatchPhase::Active,
        })];
        self.begin_attempt(&mut events);
        Ok(events)
    }

    /// Start a shared match anchored at the service-provided instant.
    pub fn start_shared(
        &mut self,
        match_start_ms: Option<TimestampMs>,
        clock_offset_ms: i64,
    ) -> Result<Vec<GameEvent>, MatchError> {
        self.lifecycle.start_shared(
            &self.match_config.match_id,
            match_start_ms,
            self.match_config.duration_secs,
            clock_offset_ms,
        )?;
        Ok(vec![self.event(GameEventData::PhaseChanged {
            from: MatchPhase::Idle,
            to: MatchPhase::Countdown,
        })])
    }

    /// Advance the simulation by one frame.
    pub fn tick(&mut self, delta_ms: f64, now_ms: TimestampMs) -> TickResult {
        self.frame += 1;
        let mut result = TickResult::default();

        // 1. Commands
        let mut flap = false;
        for command in self.commands.drain() {
            match command {
                Command::Flap => flap = true,
                Command::Reset => self.reset_match(&mut result.events),
                Command::Leave => self.leave_match(&mut result.events),
            }
        }

        // 2. Lifecycle
        let transitions = self.lifecycle.update(delta_ms, now_ms);
        // A client joining after the shared end never gets to fly
        let ends_now = transitions
            .iter()
            .any(|t| matches!(t, Transition::Phase { to: MatchPhase::Ended, .. }));
        for transition in transitions {
            match transition {
                Transition::Phase { from, to } => {
                    result.events.push(self.event(GameEventData::PhaseChanged { from, to }));
                    match to {
                        MatchPhase::Active if !ends_now => self.begin_attempt(&mut result.events),
                        MatchPhase::Active => {}
                        MatchPhase::Ended => {
                            self.finish_match(&mut result.events);
                            result.match_ended = true;
                        }
                        MatchPhase::Idle | MatchPhase::Countdown => {}
                    }
                }
                Transition::RestartAttempt => self.begin_attempt(&mut result.events),
            }
        }

        // 3. Flight
        if self.lifecycle.phase() == MatchPhase::Active && self.flight.is_alive() {
            if flap {
                self.flight.flap();
            }
            self.fly(delta_ms, &mut result.events);
        } else if !self.flight.is_alive() {
            // 4. Visual fall only
            self.flight.integrate(delta_ms);
        }

        result
    }

    fn fly(&mut self, delta_ms: f64, events: &mut Vec<GameEvent>) {
        self.scroll_speed = self
            .config
            .speed
            .scroll_speed(self.scoring.attempt().distance_m, self.match_config.hard_mode);

        if let Some(cause) = self.flight.integrate(delta_ms) {
            self.end_attempt(Some(cause), events);
            return;
        }

        self.course.update(delta_ms, self.scroll_speed);

        let hitbox = self.flight.hitbox();
        if self.course.first_collision(&hitbox).is_some() {
            self.flight.kill(DeathCause::Obstacle);
            self.end_attempt(Some(DeathCause::Obstacle), events);
            return;
        }

        for token in self.course.collect_tokens_overlapping(&hitbox) {
            let multiplier = self.scoring.attempt().multiplier;
            let points = self.scoring.collect_token();
            events.push(self.event(GameEventData::TokenCollected { token_id: token.id, points, multiplier }));
        }

        if let Some(multiplier) = self.scoring.advance(delta_ms) {
            events.push(self.event(GameEventData::MultiplierIncreased { multiplier }));
        }
    }

    fn begin_attempt(&mut self, events: &mut Vec<GameEvent>) {
        self.attempt_started = true;
        self.scoring.begin_attempt();
        self.course.reset();
        self.flight.reset(self.config.physics.spawn_y);
        self.scroll_speed = self.config.speed.base;

        let attempt = self.scoring.attempt().index;
        debug!(attempt, frame = self.frame, "Attempt started");
        events.push(self.event(GameEventData::AttemptStarted { attempt }));
    }

    fn end_attempt(&mut self, cause: Option<DeathCause>, events: &mut Vec<GameEvent>) {
        let Some(summary) = self.scoring.end_attempt() else {
            return;
        };

        let floored = summary.distance_m.floor() as u64;
        events.push(self.event(GameEventData::AttemptEnded { summary, cause }));

        if floored > self.best_distance_m {
            self.best_distance_m = floored;
            events.push(self.event(GameEventData::NewBestDistance { distance_m: floored }));
        }

        if cause.is_some() {
            self.lifecycle.attempt_ended();
        }
    }

    fn finish_match(&mut self, events: &mut Vec<GameEvent>) {
        // The attempt in flight when time runs out still counts
        if self.attempt_started && self.flight.is_alive() && self.scoring.attempt().alive {
            self.end_attempt(None, events);
        }

        let totals = self.scoring.totals().clone();
        info!(
            match_id = %self.match_config.match_id,
            total = totals.cumulative_score,
            attempts = totals.attempts_completed,
            "Match ended"
        );
        events.push(self.event(GameEventData::MatchEnded { totals }));
    }

    fn reset_match(&mut self, events: &mut Vec<GameEvent>) {
        let from = self.lifecycle.phase();
        if let Err(e) = self.lifecycle.reset() {
            debug!(error = %e, "Reset ignored");
            return;
        }
        self.clear_match_state();
        if from != MatchPhase::Idle {
            events.push(self.event(GameEventData::PhaseChanged { from, to: MatchPhase::Idle }));
        }
    }

    fn leave_match(&mut self, events: &mut Vec<GameEvent>) {
        if self.lifecycle.leave() {
            events.push(self.event(GameEventData::MatchLeft));
        }
        self.clear_match_state();
    }

    fn clear_match_state(&mut self) {
        self.attempt_started = false;
        self.scoring.reset_match();
        self.course.reseed();
        self.flight.reset(self.config.physics.spawn_y);
        self.scroll_speed = self.config.speed.base;
    }

    fn event(&self, data: GameEventData) -> GameEvent {
        GameEvent::new(self.frame, data)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Snapshot for the broadcast loop.
    pub fn local_sample(&self) -> LocalSample {
        LocalSample {
            distance_m: self.scoring.attempt().distance_m,
            y: self.flight.y(),
            alive: self.flight.is_alive() && self.lifecycle.phase() == MatchPhase::Active,
            score: self.scoring.live_score(),
        }
    }

    /// Match parameters.
    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    /// Simulation tunables.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.lifecycle.phase()
    }

    /// Lifecycle state machine.
    pub fn lifecycle(&self) -> &MatchStateMachine {
        &self.lifecycle
    }

    /// Course state.
    pub fn course(&self) -> &CourseGenerator {
        &self.course
    }

    /// Flight state.
    pub fn flight(&self) -> &FlightSimulator {
        &self.flight
    }

    /// Score state.
    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Match totals.
    pub fn totals(&self) -> &MatchTotals {
        self.scoring.totals()
    }

    /// Scroll speed used for the last frame.
    pub fn scroll_speed(&self) -> f64 {
        self.scroll_speed
    }

    /// All-time best distance (m).
    pub fn best_distance_m(&self) -> u64 {
        self.best_distance_m
    }

    /// Frames simulated.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

// =============================================================================
// TESTS
// =============================================================================

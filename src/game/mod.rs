//! Game Logic Module
//!
//! All single-player simulation code. Deterministic given the match seed, the
//! frame deltas and the command sequence.
//!
//! ## Module Structure
//!
//! - `config`: Tunables for physics, course, speed, scoring and timers
//! - `state`: Match parameters and lifecycle phase
//! - `course`: Seeded obstacle and token generation
//! - `flight`: Vertical physics and death detection
//! - `scoring`: Attempt scores and match totals
//! - `clock`: Shared-anchor match clock
//! - `lifecycle`: Match state machine and attempt restarts
//! - `input`: Command queue drained once per tick
//! - `events`: Events emitted by each tick
//! - `autopilot`: Deterministic bot input
//! - `tick`: The per-frame update order

pub mod config;
pub mod state;
pub mod course;
pub mod flight;
pub mod scoring;
pub mod clock;
pub mod lifecycle;
pub mod input;
pub mod events;
pub mod autopilot;
pub mod tick;

// Re-export key types
pub use config::GameConfig;
pub use state::{MatchConfig, MatchPhase, TimestampMs};
pub use course::{CourseGenerator, Obstacle, Token, SpawnRecord};
pub use flight::{FlightSimulator, DeathCause};
pub use scoring::{ScoringEngine, Attempt, AttemptSummary, MatchTotals};
pub use clock::{SimulationClock, WallClock, SystemClock, ManualClock};
pub use lifecycle::{MatchStateMachine, MatchError};
pub use input::{Command, CommandSender};
pub use events::{GameEvent, GameEventData};
pub use autopilot::Autopilot;
pub use tick::{GameSession, LocalSample, TickResult};

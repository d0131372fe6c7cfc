//! # Flappy Gull Engine
//!
//! Deterministic simulation and multiplayer sync for Flappy Gull, a
//! flap-to-survive side-scroller where every player in a match flies the
//! same seeded course and competes on cumulative score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FLAPPY GULL ENGINE                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Mulberry32 PRNG                    │
//! │  ├── geometry.rs - Axis-aligned rectangles                   │
//! │  └── hash.rs     - Course fingerprints                       │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── course.rs   - Obstacle and token generation             │
//! │  ├── flight.rs   - Vertical physics                          │
//! │  ├── scoring.rs  - Attempts and match totals                 │
//! │  ├── lifecycle.rs- Countdown, restarts, expiry               │
//! │  └── tick.rs     - Per-frame update order                    │
//! │                                                              │
//! │  network/        - Position sync (non-deterministic)         │
//! │  ├── transport.rs- Broadcast loop and peer map               │
//! │  ├── interpolation.rs - Ghost smoothing                      │
//! │  └── session.rs  - Multiplayer match session                 │
//! │                                                              │
//! │  repository/     - Match service (create, start, scores)     │
//! │  config.rs       - Launch parameters and environment         │
//! │  storage.rs      - Local best distance                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - All randomness from one seeded Mulberry32 stream
//! - Draws happen in a fixed order per spawned obstacle
//! - No HashMap in simulation state (BTreeMap for sorted iteration)
//! - No wall-clock reads; time arrives as frame deltas and an explicit `now`
//!
//! Given the same seed and the same frame deltas, every client builds the
//! **same course**, which [`CourseGenerator::fingerprint`] makes checkable.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod repository;
pub mod config;
pub mod storage;

// Re-export commonly used types
pub use self::core::rng::SeededRandom;
pub use self::core::hash::Fingerprint;
pub use game::course::CourseGenerator;
pub use game::state::{MatchConfig, MatchPhase, TimestampMs};
pub use game::tick::{GameSession, LocalSample, TickResult};
pub use network::session::{MultiplayerSession, SessionConfig, SessionError};
pub use repository::{MatchRepository, RepositoryError};
pub use config::{EngineConfig, LaunchParams, ConfigError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default match length (seconds)
pub const DEFAULT_MATCH_DURATION_SECS: u32 = 60;

/// Position broadcast period (ms), i.e. 20 Hz
pub const BROADCAST_INTERVAL_MS: u64 = 50;

/// Peers silent this long are dropped (ms)
pub const PEER_STALE_AFTER_MS: i64 = 5000;

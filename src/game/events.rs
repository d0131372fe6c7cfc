//! Game Events
//!
//! Events generated during a tick, for presentation layers, sessions and logs.

use serde::{Serialize, Deserialize};

use crate::game::flight::DeathCause;
use crate::game::scoring::{AttemptSummary, MatchTotals};
use crate::game::state::MatchPhase;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventData {
    /// Match phase changed
    PhaseChanged {
        /// Previous phase
        from: MatchPhase,
        /// New phase
        to: MatchPhase,
    },

    /// A fresh attempt began
    AttemptStarted {
        /// Attempt number
        attempt: u32,
    },

    /// The running attempt ended and was folded into the totals
    AttemptEnded {
        /// Final attempt values
        summary: AttemptSummary,
        /// `None` when the match clock ran out mid-flight
        cause: Option<DeathCause>,
    },

    /// A token was picked up
    TokenCollected {
        /// Token id
        token_id: u32,
        /// Points awarded
        points: u64,
        /// Multiplier at pickup
        multiplier: u32,
    },

    /// The multiplier crossed a milestone
    MultiplierIncreased {
        /// New multiplier
        multiplier: u32,
    },

    /// A new all-time best distance
    NewBestDistance {
        /// Floored distance (m)
        distance_m: u64,
    },

    /// The match finished
    MatchEnded {
        /// Final totals
        totals: MatchTotals,
    },

    /// The player abandoned the match
    MatchLeft,
}

/// A game event stamped with the frame it occurred in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Frame counter at emission
    pub frame: u64,
    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(frame: u64, data: GameEventData) -> Self {
        Self { frame, data }
    }

    /// Check if this event ends the match.
    pub fn is_match_end(&self) -> bool {
        matches!(self.data, GameEventData::MatchEnded { .. })
    }

    /// Serialize to JSON (for presentation bridges).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

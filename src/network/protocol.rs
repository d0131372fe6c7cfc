//! Protocol Messages
//!
//! Wire format for the realtime position channel. Relay messages are JSON
//! for parity with browser clients, with an optional bincode binary frame
//! for relays that forward binary messages verbatim.

use serde::{Serialize, Deserialize};

use crate::game::tick::LocalSample;

/// Event name carried by position broadcasts.
pub const POSITION_EVENT: &str = "position";

/// Channel topic for a match's position broadcasts.
pub fn positions_topic(match_id: &str) -> String {
    format!("match:{match_id}:positions")
}

// =============================================================================
// POSITION PAYLOAD
// =============================================================================

/// One player's broadcast state.
///
/// Field names on the wire match the browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPosition {
    /// Sender's participant identity
    pub session_id: String,
    /// Sender's display name
    pub player_name: String,
    /// Sender's current-attempt distance (m), not cumulative
    #[serde(rename = "scroll_distance")]
    pub distance_m: f64,
    /// Sender's vertical position
    #[serde(rename = "y")]
    pub vertical_position: f64,
    /// Sender is flying
    #[serde(rename = "is_alive")]
    pub alive: bool,
    /// Sender's running match score
    pub current_score: u64,
}

impl PlayerPosition {
    /// Build from a local sample.
    pub fn from_sample(session_id: &str, player_name: &str, sample: &LocalSample) -> Self {
        Self {
            session_id: session_id.to_string(),
            player_name: player_name.to_string(),
            distance_m: sample.distance_m,
            vertical_position: sample.y,
            alive: sample.alive,
            current_score: sample.score,
        }
    }
}

// =============================================================================
// RELAY ENVELOPE
// =============================================================================

/// Messages exchanged with a relay (both directions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Subscribe to a topic.
    Join {
        /// Topic name
        topic: String,
    },

    /// Unsubscribe from a topic.
    Leave {
        /// Topic name
        topic: String,
    },

    /// Fan a payload out to every subscriber of a topic.
    Broadcast {
        /// Topic name
        topic: String,
        /// Event name
        event: String,
        /// Position payload
        payload: PlayerPosition,
    },
}

impl RelayMessage {
    /// Position broadcast on a topic.
    pub fn position(topic: &str, payload: PlayerPosition) -> Self {
        Self::Broadcast {
            topic: topic.to_string(),
            event: POSITION_EVENT.to_string(),
            payload,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Compact binary position frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFrame {
    /// Topic name
    pub topic: String,
    /// Position payload
    pub payload: PlayerPosition,
}

impl PositionFrame {
    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================

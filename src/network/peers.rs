//! Peer Registry
//!
//! Latest known state per remote participant. Updates are last-write-wins
//! with no sequence numbers: a late packet can briefly move a peer
//! backwards. Acceptable for ghosts, which are never authoritative.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::state::TimestampMs;
use crate::network::protocol::PlayerPosition;

/// Latest state of one remote participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerState {
    /// Participant identity
    pub session_id: String,
    /// Display name
    pub player_name: String,
    /// Peer's current-attempt distance (m)
    pub distance_m: f64,
    /// Peer's vertical position
    pub vertical_position: f64,
    /// Peer is flying
    pub alive: bool,
    /// Peer's running match score
    pub current_score: u64,
    /// Local time the last update arrived
    pub last_seen_ms: TimestampMs,
}

impl PeerState {
    fn from_position(position: PlayerPosition, now_ms: TimestampMs) -> Self {
        Self {
            session_id: position.session_id,
            player_name: position.player_name,
            distance_m: position.distance_m,
            vertical_position: position.vertical_position,
            alive: position.alive,
            current_score: position.current_score,
            last_seen_ms: now_ms,
        }
    }
}

/// Outcome of applying one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    /// First message from this peer (or first after removal)
    Joined,
    /// Overwrote a known peer
    Updated,
}

/// Peer map keyed by session id.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: BTreeMap<String, PeerState>,
    stale_after_ms: i64,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new(stale_after_ms: i64) -> Self {
        Self { peers: BTreeMap::new(), stale_after_ms }
    }

    /// Store a message, replacing whatever was known about the sender.
    pub fn apply(&mut self, position: PlayerPosition, now_ms: TimestampMs) -> PeerUpdate {
        let state = PeerState::from_position(position, now_ms);
        match self.peers.insert(state.session_id.clone(), state) {
            Some(_) => PeerUpdate::Updated,
            None => PeerUpdate::Joined,
        }
    }

    /// Drop peers silent for longer than the staleness window.
    ///
    /// Returns the removed session ids.
    pub fn prune_stale(&mut self, now_ms: TimestampMs) -> Vec<String> {
        let cutoff = now_ms - self.stale_after_ms;
        let stale: Vec<String> = self
            .peers
            .values()
            .filter(|p| p.last_seen_ms < cutoff)
            .map(|p| p.session_id.clone())
            .collect();

        for id in &stale {
            self.peers.remove(id);
            debug!(session_id = %id, "Peer went stale");
        }
        stale
    }

    /// Remove a peer explicitly. Returns true if it was known.
    pub fn remove(&mut self, session_id: &str) -> bool {
        self.peers.remove(session_id).is_some()
    }

    /// Forget every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    /// Current snapshot.
    pub fn peers(&self) -> &BTreeMap<String, PeerState> {
        &self.peers
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

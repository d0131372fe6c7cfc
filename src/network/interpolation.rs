//! Remote Entity Interpolation
//!
//! Turns the jittery peer snapshot into ghosts that move smoothly at render
//! cadence. Ghosts live in the local player's frame of reference: a peer
//! level with us in distance sits at our bird's x, one 10 m ahead sits
//! 100 px to the right.
//!
//! Ghosts are presentation only and never feed back into the simulation.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::network::peers::PeerState;

/// Ghost easing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatorConfig {
    /// Fraction of the remaining distance covered per step
    pub smoothing: f64,
    /// Time for a dead ghost to fade out (ms)
    pub fade_ms: f64,
    /// Screen pixels per metre of distance difference
    pub px_per_metre: f64,
    /// Local bird's screen x (the reference point)
    pub bird_x: f64,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.3,
            fade_ms: 500.0,
            px_per_metre: 10.0,
            bird_x: 160.0,
        }
    }
}

/// Visual state of one remote participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ghost {
    /// Peer identity
    pub session_id: String,
    /// Peer display name
    pub player_name: String,
    /// Where the latest snapshot puts the peer (screen x)
    pub target_x: f64,
    /// Where the latest snapshot puts the peer (screen y)
    pub target_y: f64,
    /// Drawn position (screen x)
    pub rendered_x: f64,
    /// Drawn position (screen y)
    pub rendered_y: f64,
    /// Peer is flying
    pub alive: bool,
    /// 1.0 while alive, fades to 0.0 after death
    pub opacity: f64,
    /// Peer's running match score
    pub score: u64,
    /// Time since the peer died (ms)
    pub dead_for_ms: f64,
}

impl Ghost {
    fn snap(&mut self) {
        self.rendered_x = self.target_x;
        self.rendered_y = self.target_y;
    }

    /// Check if the ghost should still be drawn.
    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

/// Eases every tracked peer toward its latest snapshot.
#[derive(Debug, Clone, Default)]
pub struct RemoteEntityInterpolator {
    config: InterpolatorConfig,
    ghosts: BTreeMap<String, Ghost>,
}

impl RemoteEntityInterpolator {
    /// Create an empty interpolator.
    pub fn new(config: InterpolatorConfig) -> Self {
        Self { config, ghosts: BTreeMap::new() }
    }

    fn target_x(&self, peer_distance_m: f64, local_distance_m: f64) -> f64 {
        self.config.bird_x + (peer_distance_m - local_distance_m) * self.config.px_per_metre
    }

    /// Reconcile ghosts with the current peer snapshot.
    ///
    /// Peers missing from `peers` have already outlived the staleness window
    /// and their ghosts are dropped.
    pub fn sync(&mut self, peers: &BTreeMap<String, PeerState>, local_distance_m: f64) {
        self.ghosts.retain(|id, _| {
            let keep = peers.contains_key(id);
            if !keep {
                debug!(session_id = %id, "Ghost removed");
            }
            keep
        });

        for (id, peer) in peers {
            let target_x = self.target_x(peer.distance_m, local_distance_m);
            let target_y = peer.vertical_position;

            let Some(ghost) = self.ghosts.get_mut(id) else {
                let ghost = Ghost {
                    session_id: id.clone(),
                    player_name: peer.player_name.clone(),
                    target_x,
                    target_y,
                    rendered_x: target_x,
                    rendered_y: target_y,
                    alive: peer.alive,
                    opacity: if peer.alive { 1.0 } else { 0.0 },
                    score: peer.current_score,
                    dead_for_ms: if peer.alive { 0.0 } else { self.config.fade_ms },
                };
                debug!(session_id = %id, "Ghost added");
                self.ghosts.insert(id.clone(), ghost);
                continue;
            };

            ghost.score = peer.current_score;
            ghost.player_name.clone_from(&peer.player_name);

            match (ghost.alive, peer.alive) {
                (true, true) => {
                    ghost.target_x = target_x;
                    ghost.target_y = target_y;
                }
                (true, false) => {
                    // Freeze where it died
                    ghost.alive = false;
                    ghost.dead_for_ms = 0.0;
                    ghost.target_x = ghost.rendered_x;
                    ghost.target_y = ghost.rendered_y;
                }
                (false, true) => {
                    // New attempt: no easing across the discontinuity
                    ghost.alive = true;
                    ghost.opacity = 1.0;
                    ghost.dead_for_ms = 0.0;
                    ghost.target_x = target_x;
                    ghost.target_y = target_y;
                    ghost.snap();
                }
                (false, false) => {}
            }
        }
    }

    /// Advance easing and fades by one render frame.
    pub fn step(&mut self, delta_ms: f64) {
        let smoothing = self.config.smoothing;
        let fade_ms = self.config.fade_ms;

        for ghost in self.ghosts.values_mut() {
            if ghost.alive {
                ghost.rendered_x += (ghost.target_x - ghost.rendered_x) * smoothing;
                ghost.rendered_y += (ghost.target_y - ghost.rendered_y) * smoothing;
            } else {
                ghost.dead_for_ms += delta_ms;
                ghost.opacity = if fade_ms > 0.0 {
                    (1.0 - ghost.dead_for_ms / fade_ms).max(0.0)
                } else {
                    0.0
                };
            }
        }
    }

    /// Current ghosts, keyed by session id.
    pub fn ghosts(&self) -> &BTreeMap<String, Ghost> {
        &self.ghosts
    }

    /// Drop one ghost.
    pub fn remove(&mut self, session_id: &str) -> bool {
        self.ghosts.remove(session_id).is_some()
    }

    /// Drop every ghost.
    pub fn clear(&mut self) {
        self.ghosts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, distance_m: f64, y: f64, alive: bool) -> PeerState {
        PeerState {
            session_id: id.to_string(),
            player_name: id.to_uppercase(),
            distance_m,
            vertical_position: y,
            alive,
            current_score: 0,
            last_seen_ms: 0,
        }
    }

    fn snapshot(peers: &[PeerState]) -> BTreeMap<String, PeerState> {
        peers.iter().map(|p| (p.session_id.clone(), p.clone())).collect()
    }

    #[test]
    fn test_positions_relative_to_local_distance() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 30.0, 200.0, true), peer("b", 10.0, 400.0, true)]), 20.0);

        assert_eq!(interp.ghosts()["a"].rendered_x, 260.0);
        assert_eq!(interp.ghosts()["b"].rendered_x, 60.0);
        assert_eq!(interp.ghosts()["b"].rendered_y, 400.0);
    }

    #[test]
    fn test_exponential_smoothing() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 0.0, 300.0, true)]), 0.0);
        interp.sync(&snapshot(&[peer("a", 10.0, 200.0, true)]), 0.0);

        interp.step(16.0);
        let ghost = &interp.ghosts()["a"];
        assert!((ghost.rendered_x - 190.0).abs() < 1e-9);
        assert!((ghost.rendered_y - 270.0).abs() < 1e-9);

        for _ in 0..60 {
            interp.step(16.0);
        }
        assert!((interp.ghosts()["a"].rendered_x - 260.0).abs() < 1e-6);
    }

    #[test]
    fn test_death_freezes_and_fades() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 0.0, 300.0, true)]), 0.0);
        interp.sync(&snapshot(&[peer("a", 5.0, 300.0, true)]), 0.0);
        interp.step(16.0);
        let frozen_x = interp.ghosts()["a"].rendered_x;

        interp.sync(&snapshot(&[peer("a", 5.0, 536.0, false)]), 0.0);
        interp.step(250.0);
        let ghost = &interp.ghosts()["a"];
        assert!(!ghost.alive);
        assert_eq!(ghost.rendered_x, frozen_x);
        assert!((ghost.opacity - 0.5).abs() < 1e-9);

        interp.step(300.0);
        assert!(!interp.ghosts()["a"].is_visible());
    }

    #[test]
    fn test_respawn_snaps() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 80.0, 300.0, true)]), 0.0);
        interp.sync(&snapshot(&[peer("a", 80.0, 536.0, false)]), 0.0);
        interp.step(600.0);

        interp.sync(&snapshot(&[peer("a", 0.0, 300.0, true)]), 0.0);
        let ghost = &interp.ghosts()["a"];
        assert!(ghost.alive);
        assert_eq!(ghost.rendered_x, 160.0);
        assert_eq!(ghost.rendered_y, 300.0);
        assert_eq!(ghost.opacity, 1.0);
    }

    #[test]
    fn test_absent_peers_removed() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 0.0, 300.0, true), peer("b", 0.0, 300.0, true)]), 0.0);
        interp.sync(&snapshot(&[peer("b", 1.0, 300.0, true)]), 0.0);

        assert!(!interp.ghosts().contains_key("a"));
        assert!(interp.remove("b"));
        assert!(interp.ghosts().is_empty());
    }

    #[test]
    fn test_first_seen_dead_is_invisible() {
        let mut interp = RemoteEntityInterpolator::default();
        interp.sync(&snapshot(&[peer("a", 3.0, 536.0, false)]), 0.0);
        assert!(!interp.ghosts()["a"].is_visible());
    }
}

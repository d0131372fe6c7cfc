//! Position Sync Transport
//!
//! Broadcasts the local player's sample at a fixed cadence and collects
//! peers' broadcasts into a [`PeerRegistry`]. Inbound messages are queued by
//! the channel's pump tasks and only applied when the game loop calls
//! [`SyncTransport::poll`], so the registry has a single writer.
//!
//! Every failure here degrades ghosts to stale; none of them stop the match.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::game::state::TimestampMs;
use crate::game::tick::LocalSample;
use crate::network::channel::{ChannelLink, RealtimeChannel, TransportError};
use crate::network::peers::{PeerRegistry, PeerState, PeerUpdate};
use crate::network::protocol::{positions_topic, PlayerPosition};

/// Transport timing.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Time between broadcasts (50 ms = 20 Hz)
    pub broadcast_interval: Duration,
    /// Peers silent for longer than this are dropped (ms)
    pub stale_after_ms: i64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_millis(crate::BROADCAST_INTERVAL_MS),
            stale_after_ms: crate::PEER_STALE_AFTER_MS,
        }
    }
}

/// What one `poll` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Peer messages applied
    pub applied: usize,
    /// Own echoes discarded
    pub own_discarded: usize,
    /// Peers seen for the first time
    pub joined: Vec<String>,
    /// Peers dropped as stale
    pub stale: Vec<String>,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Broadcasts queued for sending
    pub sent: u64,
    /// Peer messages applied
    pub received: u64,
    /// Own echoes discarded
    pub own_discarded: u64,
}

/// Match-scoped position channel.
pub struct SyncTransport<C: RealtimeChannel> {
    channel: C,
    topic: String,
    session_id: String,
    player_name: String,
    config: TransportConfig,
    link: Option<ChannelLink>,
    broadcaster: Option<JoinHandle<()>>,
    peers: PeerRegistry,
    sent: Arc<AtomicU64>,
    received: u64,
    own_discarded: u64,
    link_lost: bool,
}

impl<C: RealtimeChannel> SyncTransport<C> {
    /// Create a disconnected transport for a match.
    pub fn new(
        channel: C,
        match_id: &str,
        session_id: impl Into<String>,
        player_name: impl Into<String>,
        config: TransportConfig,
    ) -> Self {
        let peers = PeerRegistry::new(config.stale_after_ms);
        Self {
            channel,
            topic: positions_topic(match_id),
            session_id: session_id.into(),
            player_name: player_name.into(),
            config,
            link: None,
            broadcaster: None,
            peers,
            sent: Arc::new(AtomicU64::new(0)),
            received: 0,
            own_discarded: 0,
            link_lost: false,
        }
    }

    /// Open the match channel. A second call is a no-op.
    #[instrument(skip(self), fields(topic = %self.topic))]
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.link.is_some() {
            debug!("Already connected");
            return Ok(());
        }
        let link = self.channel.open(&self.topic).await?;
        self.link = Some(link);
        self.link_lost = false;
        info!(session_id = %self.session_id, "Sync transport connected");
        Ok(())
    }

    /// Start the fixed-cadence broadcast loop, calling `sample` each tick.
    ///
    /// Returns `Ok(false)` if a loop is already running.
    pub fn start_broadcasting<F>(&mut self, mut sample: F) -> Result<bool, TransportError>
    where
        F: FnMut() -> LocalSample + Send + 'static,
    {
        if self.broadcaster.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(false);
        }
        let outbound = self.link.as_ref().ok_or(TransportError::NotConnected)?.outbound();

        let session_id = self.session_id.clone();
        let player_name = self.player_name.clone();
        let interval = self.config.broadcast_interval;
        let sent = Arc::clone(&self.sent);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let position = PlayerPosition::from_sample(&session_id, &player_name, &sample());

                match outbound.try_send(position) {
                    Ok(()) => {
                        let count = sent.fetch_add(1, Ordering::Relaxed) + 1;
                        // Every 2 seconds at 20 Hz
                        if count % 40 == 0 {
                            debug!(count, "Broadcasting position");
                        }
                    }
                    Err(TrySendError::Full(_)) => debug!("Outbound queue full, skipping broadcast"),
                    Err(TrySendError::Closed(_)) => {
                        warn!("Channel closed, broadcast loop stopping");
                        break;
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Position broadcast started");
        self.broadcaster = Some(handle);
        Ok(true)
    }

    /// Stop the broadcast loop. Safe to call repeatedly.
    pub fn stop_broadcasting(&mut self) {
        if let Some(handle) = self.broadcaster.take() {
            handle.abort();
            debug!("Position broadcast stopped");
        }
    }

    /// Apply every queued peer message, then prune stale peers.
    pub fn poll(&mut self, now_ms: TimestampMs) -> PollSummary {
        let mut summary = PollSummary::default();

        if let Some(link) = self.link.as_mut() {
            loop {
                match link.try_recv() {
                    Ok(Some(position)) => {
                        if position.session_id == self.session_id {
                            summary.own_discarded += 1;
                            continue;
                        }
                        let id = position.session_id.clone();
                        if self.peers.apply(position, now_ms) == PeerUpdate::Joined {
                            debug!(session_id = %id, "Peer joined");
                            summary.joined.push(id);
                        }
                        summary.applied += 1;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        if !self.link_lost {
                            warn!(topic = %self.topic, "Sync channel lost; ghosts will go stale");
                            self.link_lost = true;
                        }
                        break;
                    }
                }
            }
        }

        self.received += summary.applied as u64;
        self.own_discarded += summary.own_discarded as u64;
        summary.stale = self.prune_stale(now_ms);
        summary
    }

    /// Drop peers silent for longer than the staleness window.
    pub fn prune_stale(&mut self, now_ms: TimestampMs) -> Vec<String> {
        self.peers.prune_stale(now_ms)
    }

    /// Latest state per peer.
    pub fn other_players(&self) -> &BTreeMap<String, PeerState> {
        self.peers.peers()
    }

    /// Forget a peer (e.g. removed from the roster).
    pub fn remove_player(&mut self, session_id: &str) -> bool {
        self.peers.remove(session_id)
    }

    /// Release the channel and forget every peer. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.stop_broadcasting();
        if let Some(mut link) = self.link.take() {
            link.close();
            info!(topic = %self.topic, "Sync transport disconnected");
        }
        self.peers.clear();
    }

    /// Check if a channel is open.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Check if the broadcast loop is running.
    pub fn is_broadcasting(&self) -> bool {
        self.broadcaster.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Channel topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received,
            own_discarded: self.own_discarded,
        }
    }
}

impl<C: RealtimeChannel> Drop for SyncTransport<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// TESTS
// =============================================================================

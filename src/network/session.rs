//! Multiplayer Match Session
//!
//! Wires one player's deterministic [`GameSession`] to the outside world:
//! the match service anchors the start and stores the final score, the sync
//! transport carries positions both ways, and the interpolator turns peers
//! into ghosts.
//!
//! The game loop owns everything here. The broadcast loop reads the local
//! sample through a `watch` channel and inbound positions are only applied in
//! [`MultiplayerSession::frame`], so no task ever touches simulation state.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::LaunchParams;
use crate::game::clock::WallClock;
use crate::game::config::GameConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{Command, CommandSender};
use crate::game::lifecycle::MatchError;
use crate::game::scoring::MatchTotals;
use crate::game::tick::{GameSession, LocalSample, TickResult};
use crate::network::channel::{RealtimeChannel, TransportError};
use crate::network::interpolation::{InterpolatorConfig, RemoteEntityInterpolator};
use crate::network::transport::{SyncTransport, TransportConfig};
use crate::repository::{submit_with_retry, MatchRepository, RepositoryError, RetryPolicy, ScoreRow, ScoreSubmission};
use crate::storage::{BestDistanceStore, StorageError};

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Lifecycle precondition failed
    #[error("match error: {0}")]
    Match(#[from] MatchError),

    /// Channel could not be (re)opened
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Match service call failed
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Local best distance could not be loaded
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The submission task was cancelled or panicked
    #[error("score submission task failed: {0}")]
    Submission(#[from] tokio::task::JoinError),
}

/// Tunables for a multiplayer session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Simulation tunables
    pub game: GameConfig,
    /// Broadcast cadence and peer staleness
    pub transport: TransportConfig,
    /// Ghost easing
    pub interpolator: InterpolatorConfig,
    /// Score submission retries
    pub retry: RetryPolicy,
    /// Added to the local clock before comparing against the shared anchor (ms)
    pub clock_offset_ms: i64,
}

/// One row of the live match leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based position
    pub rank: usize,
    /// Participant identity
    pub session_id: String,
    /// Display name
    pub player_name: String,
    /// Running match score
    pub score: u64,
    /// This row is the local player
    pub is_local: bool,
}

/// A player's participation in a shared match.
pub struct MultiplayerSession<C: RealtimeChannel, R: MatchRepository> {
    game: GameSession,
    transport: SyncTransport<C>,
    ghosts: RemoteEntityInterpolator,
    repository: Arc<R>,
    clock: Arc<dyn WallClock>,
    best_store: Arc<dyn BestDistanceStore>,
    sample_tx: watch::Sender<LocalSample>,
    submission: Option<JoinHandle<Result<u32, RepositoryError>>>,
    retry: RetryPolicy,
    clock_offset_ms: i64,
}

impl<C: RealtimeChannel, R: MatchRepository> MultiplayerSession<C, R> {
    /// Build an idle session for the launched match.
    pub fn prepare(
        params: &LaunchParams,
        channel: C,
        repository: Arc<R>,
        clock: Arc<dyn WallClock>,
        best_store: Arc<dyn BestDistanceStore>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let best_distance_m = best_store.load()?;
        let game = GameSession::new(params.match_config(), config.game).with_best_distance(best_distance_m);
        let transport = SyncTransport::new(
            channel,
            &params.match_id,
            params.session_id.clone(),
            params.player_name.clone(),
            config.transport,
        );
        let (sample_tx, _) = watch::channel(game.local_sample());

        info!(
            match_id = %params.match_id,
            seed = params.seed,
            player = %params.player_name,
            best_distance_m,
            "Session prepared"
        );

        Ok(Self {
            game,
            transport,
            ghosts: RemoteEntityInterpolator::new(config.interpolator),
            repository,
            clock,
            best_store,
            sample_tx,
            submission: None,
            retry: config.retry,
            clock_offset_ms: config.clock_offset_ms,
        })
    }

    /// Anchor the match on the service's start timestamp and join the channel.
    ///
    /// A missing timestamp is fatal. A channel failure is not: the match is
    /// playable alone and ghosts simply never appear.
    #[instrument(skip(self), fields(match_id = %self.game.match_config().match_id))]
    pub async fn start(&mut self) -> Result<Vec<GameEvent>, SessionError> {
        let match_id = self.game.match_config().match_id.clone();
        let started_at = self.repository.get_match_start_timestamp(&match_id).await?;

        let events = match self.game.start_shared(started_at, self.clock_offset_ms) {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "Cannot start match");
                return Err(e.into());
            }
        };

        if let Err(e) = self.connect().await {
            warn!(error = %e, "Playing without position sync");
        }
        Ok(events)
    }

    /// Reopen the channel after a failure. No-op while connected.
    #[instrument(skip(self))]
    pub async fn reconnect(&mut self) -> Result<(), SessionError> {
        self.connect().await.map_err(Into::into)
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        let samples = self.sample_tx.subscribe();
        self.transport.start_broadcasting(move || *samples.borrow())?;
        Ok(())
    }

    /// Advance one frame: simulate, publish, then absorb peer updates.
    pub fn frame(&mut self, delta_ms: f64) -> TickResult {
        let now_ms = self.clock.now_ms();
        let result = self.game.tick(delta_ms, now_ms);
        self.sample_tx.send_replace(self.game.local_sample());

        self.transport.poll(now_ms);
        self.ghosts
            .sync(self.transport.other_players(), self.game.scoring().attempt().distance_m);
        self.ghosts.step(delta_ms);

        for event in &result.events {
            match &event.data {
                GameEventData::NewBestDistance { distance_m } => {
                    if let Err(e) = self.best_store.save(*distance_m) {
                        warn!(error = %e, "Failed to save best distance");
                    }
                }
                GameEventData::MatchEnded { totals } => self.on_match_ended(totals.clone()),
                _ => {}
            }
        }

        result
    }

    fn on_match_ended(&mut self, totals: MatchTotals) {
        self.transport.stop_broadcasting();

        if self.submission.is_some() {
            return;
        }

        let config = self.game.match_config();
        let submission = ScoreSubmission {
            match_id: config.match_id.clone(),
            session_id: config.session_id.clone(),
            player_name: config.player_name.clone(),
            total_score: totals.cumulative_score,
            best_flight: totals.best_attempt_score.unwrap_or(0),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let repository = Arc::clone(&self.repository);
                let retry = self.retry.clone();
                self.submission = Some(runtime.spawn(submit_with_retry(repository, submission, retry)));
            }
            Err(_) => warn!("No async runtime; final score not submitted"),
        }
    }

    /// Live leaderboard: the local running score plus every peer's broadcast score.
    pub fn standings(&self) -> Vec<Standing> {
        let config = self.game.match_config();
        let mut rows: Vec<Standing> = std::iter::once(Standing {
            rank: 0,
            session_id: config.session_id.clone(),
            player_name: config.player_name.clone(),
            score: self.game.scoring().live_score(),
            is_local: true,
        })
        .chain(self.transport.other_players().values().map(|peer| Standing {
            rank: 0,
            session_id: peer.session_id.clone(),
            player_name: peer.player_name.clone(),
            score: peer.current_score,
            is_local: false,
        }))
        .collect();

        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.session_id.cmp(&b.session_id)));
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        rows
    }

    /// Abandon the match: the running attempt is forfeited and nothing is submitted.
    pub fn leave(&mut self) -> Vec<GameEvent> {
        self.game.commands().send(Command::Leave);
        let result = self.game.tick(0.0, self.clock.now_ms());
        self.transport.disconnect();
        self.ghosts.clear();
        info!(match_id = %self.game.match_config().match_id, "Left match");
        result.events
    }

    /// Wait for the score submission, release the channel and fetch the leaderboard.
    ///
    /// A failed submission is logged; the leaderboard is still fetched.
    #[instrument(skip(self), fields(match_id = %self.game.match_config().match_id))]
    pub async fn finish(mut self) -> Result<Vec<ScoreRow>, SessionError> {
        if let Some(handle) = self.submission.take() {
            if let Err(e) = handle.await? {
                warn!(error = %e, "Final score was not stored");
            }
        }
        self.transport.disconnect();
        self.ghosts.clear();

        let rows = self.repository.list_scores(&self.game.match_config().match_id).await?;
        info!(rows = rows.len(), "Match results fetched");
        Ok(rows)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// The local simulation.
    pub fn game(&self) -> &GameSession {
        &self.game
    }

    /// Handle for enqueueing input.
    pub fn commands(&self) -> CommandSender {
        self.game.commands()
    }

    /// Current ghosts.
    pub fn ghosts(&self) -> &RemoteEntityInterpolator {
        &self.ghosts
    }

    /// The sync transport.
    pub fn transport(&self) -> &SyncTransport<C> {
        &self.transport
    }

    /// Check if the final score has been handed to the match service.
    pub fn submission_started(&self) -> bool {
        self.submission.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::game::autopilot::Autopilot;
    use crate::game::clock::ManualClock;
    use crate::game::state::MatchPhase;
    use crate::network::channel::ChannelLink;
    use crate::network::memory::MemoryHub;
    use crate::repository::InMemoryRepository;
    use crate::storage::MemoryBestDistanceStore;

    const START_MS: i64 = 1_700_000_000_000;
    const FRAME_MS: i64 = 20;

    fn params(session_id: &str) -> LaunchParams {
        LaunchParams {
            match_id: "m1".to_string(),
            seed: 42,
            player_name: session_id.to_uppercase(),
            session_id: session_id.to_string(),
            duration_secs: Some(2),
            hard_mode: false,
        }
    }

    async fn repository(started: bool) -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_match("m1", 42, 2, false).await;
        if started {
            repo.start_match("m1", START_MS).await.expect("known match");
        }
        repo
    }

    fn session<C: RealtimeChannel>(
        session_id: &str,
        channel: C,
        repo: &Arc<InMemoryRepository>,
        clock: &ManualClock,
        store: Arc<MemoryBestDistanceStore>,
    ) -> MultiplayerSession<C, InMemoryRepository> {
        MultiplayerSession::prepare(
            &params(session_id),
            channel,
            Arc::clone(repo),
            Arc::new(clock.clone()),
            store,
            SessionConfig::default(),
        )
        .expect("prepared")
    }

    /// Drive frames in lockstep with the manual clock and tokio's paused time.
    async fn run_frames<C: RealtimeChannel>(
        sessions: &mut [&mut MultiplayerSession<C, InMemoryRepository>],
        clock: &ManualClock,
        frames: usize,
        bot: &Autopilot,
    ) {
        for _ in 0..frames {
            clock.advance(FRAME_MS);
            tokio::time::sleep(Duration::from_millis(FRAME_MS as u64)).await;
            for s in sessions.iter_mut() {
                if bot.should_flap(s.game().flight(), s.game().course()) {
                    s.commands().flap();
                }
                s.frame(FRAME_MS as f64);
            }
        }
    }

    struct UnreachableRelay;

    impl RealtimeChannel for UnreachableRelay {
        async fn open(&self, _topic: &str) -> Result<ChannelLink, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_players_full_match() {
        let hub = MemoryHub::new();
        let repo = repository(true).await;
        let clock = ManualClock::new(START_MS);
        let mut a = session("a", hub.clone(), &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));
        let mut b = session("b", hub.clone(), &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));

        a.start().await.expect("started");
        b.start().await.expect("started");
        assert_eq!(a.game().phase(), MatchPhase::Countdown);

        // Countdown plus one second of flight
        let bot = Autopilot::default();
        run_frames(&mut [&mut a, &mut b], &clock, 200, &bot).await;
        assert_eq!(a.game().phase(), MatchPhase::Active);

        assert!(a.ghosts().ghosts().contains_key("b"));
        assert!(!a.ghosts().ghosts().contains_key("a"));
        let standings = a.standings();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings.iter().filter(|s| s.is_local).count(), 1);
        assert_eq!(standings.iter().map(|s| s.rank).collect::<Vec<_>>(), vec![1, 2]);

        // Identical seed and inputs: identical courses
        assert_eq!(a.game().course().fingerprint(), b.game().course().fingerprint());

        run_frames(&mut [&mut a, &mut b], &clock, 60, &bot).await;
        assert_eq!(a.game().phase(), MatchPhase::Ended);
        assert!(a.submission_started());
        assert!(!a.transport().is_broadcasting());

        let a_total = a.game().totals().cumulative_score;
        a.finish().await.expect("finished");
        let rows = b.finish().await.expect("finished");

        assert_eq!(rows.len(), 2);
        assert!(rows[0].total_score >= rows[1].total_score);
        assert!(rows.iter().any(|r| r.session_id == "a" && r.total_score == a_total));
    }

    #[tokio::test]
    async fn test_missing_start_timestamp_is_fatal() {
        let repo = repository(false).await;
        let clock = ManualClock::new(START_MS);
        let mut a = session("a", MemoryHub::new(), &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));

        let result = a.start().await;
        assert!(matches!(result, Err(SessionError::Match(MatchError::MissingStartTimestamp(_)))));
        assert_eq!(a.game().phase(), MatchPhase::Idle);
        assert!(!a.transport().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_relay_still_playable() {
        let repo = repository(true).await;
        let clock = ManualClock::new(START_MS);
        let mut a = session("a", UnreachableRelay, &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));

        a.start().await.expect("sync failure is not fatal");
        assert!(!a.transport().is_connected());
        assert!(a.reconnect().await.is_err());

        run_frames(&mut [&mut a], &clock, 200, &Autopilot::default()).await;
        assert_eq!(a.game().phase(), MatchPhase::Active);
        assert!(a.game().scoring().attempt().distance_m > 0.0);
        assert_eq!(a.standings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_forfeits_and_submits_nothing() {
        let hub = MemoryHub::new();
        let repo = repository(true).await;
        let clock = ManualClock::new(START_MS);
        let mut a = session("a", hub.clone(), &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));

        a.start().await.expect("started");
        run_frames(&mut [&mut a], &clock, 200, &Autopilot::default()).await;

        let events = a.leave();
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::MatchLeft)));
        assert!(!a.submission_started());
        assert!(!a.transport().is_connected());
        assert_eq!(a.game().totals().cumulative_score, 0);

        assert!(a.finish().await.expect("finished").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_best_distance_is_saved() {
        let repo = repository(true).await;
        let clock = ManualClock::new(START_MS);
        let store = Arc::new(MemoryBestDistanceStore::new(3));
        let mut a = session("a", MemoryHub::new(), &repo, &clock, Arc::clone(&store));
        assert_eq!(a.game().best_distance_m(), 3);

        a.start().await.expect("started");
        // No input: the bird falls to the ground well within the match
        for _ in 0..260 {
            clock.advance(FRAME_MS);
            a.frame(FRAME_MS as f64);
        }

        let best = a.game().best_distance_m();
        assert!(best > 3);
        assert_eq!(store.load().expect("infallible"), best);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_still_lists_scores() {
        let repo = repository(true).await;
        repo.fail_next_submissions(10);
        let clock = ManualClock::new(START_MS);
        let mut a = session("a", MemoryHub::new(), &repo, &clock, Arc::new(MemoryBestDistanceStore::default()));

        a.start().await.expect("started");
        for _ in 0..260 {
            clock.advance(FRAME_MS);
            a.frame(FRAME_MS as f64);
        }
        assert_eq!(a.game().phase(), MatchPhase::Ended);
        assert!(a.finish().await.expect("finished").is_empty());
    }
}

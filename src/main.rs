//! Flappy Gull Headless Runner
//!
//! Plays a short shared match between two autopilot gulls, in real time,
//! over the configured relay (in-process unless `RELAY_URL` is set) and
//! match service (in-memory unless `SUPABASE_URL`/`SUPABASE_ANON_KEY` are
//! set). Then replays each gull offline and checks the course and totals
//! match.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use flappygull::{
    VERSION,
    config::{EngineConfig, LaunchParams},
    core::hash::{short_hex, Fingerprint},
    game::{
        Autopilot, GameConfig, GameEventData, GameSession, ManualClock, MatchConfig, MatchPhase,
        MatchTotals, SystemClock, TimestampMs, WallClock,
    },
    network::{MemoryHub, MultiplayerSession, RealtimeChannel, SessionConfig, WebSocketChannel},
    repository::{InMemoryRepository, MatchRepository, ScoreRow, SupabaseRepository},
    storage::{BestDistanceStore, FileBestDistanceStore, MemoryBestDistanceStore},
};

/// Fixed frame step (ms)
const FRAME_MS: i64 = 16;

/// Demo match length (seconds)
const DEMO_DURATION_SECS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let engine = EngineConfig::from_env().context("invalid environment")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&engine.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Flappy Gull Engine v{}", VERSION);
    info!("Frame step: {} ms, match duration: {} s", FRAME_MS, DEMO_DURATION_SECS);

    match engine.supabase.clone() {
        Some(supabase) => {
            info!(url = %supabase.url, "Using Supabase match service");
            let repository = Arc::new(SupabaseRepository::new(supabase.url, supabase.anon_key));
            with_relay(repository, &engine).await
        }
        None => {
            info!("Using in-memory match service");
            with_relay(Arc::new(InMemoryRepository::new()), &engine).await
        }
    }
}

/// Pick the position relay, then play.
async fn with_relay<R: MatchRepository>(repository: Arc<R>, engine: &EngineConfig) -> anyhow::Result<()> {
    match engine.relay_url.clone() {
        Some(url) => {
            info!(%url, "Using WebSocket relay");
            demo_match(WebSocketChannel::new(url), repository, engine).await?;
        }
        None => {
            info!("Using in-process relay");
            demo_match(MemoryHub::new(), repository, engine).await?;
        }
    }
    Ok(())
}

struct Player<C: RealtimeChannel, R: MatchRepository> {
    session: MultiplayerSession<C, R>,
    bot: Autopilot,
}

/// Play one shared match between two autopilots and return the leaderboard.
async fn demo_match<C: RealtimeChannel + Clone, R: MatchRepository>(
    channel: C,
    repository: Arc<R>,
    engine: &EngineConfig,
) -> anyhow::Result<Vec<ScoreRow>> {
    info!("=== Starting Demo Match ===");

    let created = repository
        .create_match(DEMO_DURATION_SECS, false)
        .await
        .context("failed to create match")?;

    // The shared anchor is "now"; the countdown runs before anyone flies
    let clock = ManualClock::new(SystemClock.now_ms());
    let start_ms = clock.now_ms();
    repository
        .start_match(&created.match_id, start_ms)
        .await
        .context("failed to start match")?;

    info!("Match ID: {}", created.match_id);
    info!("Match code: {}", created.match_code);
    info!("Seed: {}", created.seed);

    let roster = [("gull-1", "Gull One", 0.0), ("gull-2", "Gull Two", 25.0)];
    let mut players = Vec::with_capacity(roster.len());

    for (i, (session_id, name, aim_offset)) in roster.into_iter().enumerate() {
        let params = LaunchParams {
            match_id: created.match_id.clone(),
            seed: created.seed,
            player_name: name.to_string(),
            session_id: session_id.to_string(),
            duration_secs: Some(DEMO_DURATION_SECS),
            hard_mode: false,
        };
        // Only the first gull keeps its best distance on disk
        let store: Arc<dyn BestDistanceStore> = if i == 0 {
            Arc::new(FileBestDistanceStore::new(&engine.best_distance_path))
        } else {
            Arc::new(MemoryBestDistanceStore::default())
        };

        let mut session = MultiplayerSession::prepare(
            &params,
            channel.clone(),
            Arc::clone(&repository),
            Arc::new(clock.clone()),
            store,
            SessionConfig::default(),
        )?;
        session.start().await?;
        players.push(Player { session, bot: Autopilot::with_offset(aim_offset) });
    }

    // Countdown + match + slack
    let max_frames = (3_000 + i64::from(DEMO_DURATION_SECS) * 1_000) / FRAME_MS + 60;
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_MS as u64));
    let mut frames: i64 = 0;

    while frames < max_frames && players.iter().any(|p| p.session.game().phase() != MatchPhase::Ended) {
        ticker.tick().await;
        clock.advance(FRAME_MS);
        frames += 1;

        for player in players.iter_mut() {
            let game = player.session.game();
            if player.bot.should_flap(game.flight(), game.course()) {
                player.session.commands().flap();
            }

            let result = player.session.frame(FRAME_MS as f64);
            let name = &player.session.game().match_config().player_name;
            for event in &result.events {
                match &event.data {
                    GameEventData::AttemptEnded { summary, cause } => {
                        info!(
                            "{} attempt {} ended ({:?}): {} pts at {:.1} m",
                            name, summary.index, cause, summary.score, summary.distance_m
                        );
                    }
                    GameEventData::NewBestDistance { distance_m } => {
                        info!("{} new best distance: {} m", name, distance_m);
                    }
                    GameEventData::MatchEnded { totals } => {
                        info!("{} finished with {} pts", name, totals.cumulative_score);
                    }
                    _ => {}
                }
            }
        }

        // Report every second
        if frames % 62 == 0 {
            if let Some(first) = players.first() {
                let ghosts = first.session.ghosts().ghosts().len();
                let board: Vec<String> = first
                    .session
                    .standings()
                    .iter()
                    .map(|s| format!("#{} {} {}", s.rank, s.player_name, s.score))
                    .collect();
                info!("Frame {}: {} ghost(s) | {}", frames, ghosts, board.join(" | "));
            }
        }
    }

    if frames >= max_frames {
        warn!("Frame budget exhausted before every match ended");
    }

    // Snapshot before the sessions are consumed
    let snapshots: Vec<(MatchConfig, Autopilot, Fingerprint, MatchTotals)> = players
        .iter()
        .map(|p| {
            let game = p.session.game();
            (
                game.match_config().clone(),
                p.bot.clone(),
                game.course().fingerprint(),
                game.totals().clone(),
            )
        })
        .collect();

    info!("=== Match Results ===");
    let mut rows = Vec::new();
    for player in players {
        rows = player.session.finish().await?;
    }
    for (i, row) in rows.iter().enumerate() {
        info!("#{}: {} - Score: {} (best flight {})", i + 1, row.player_name, row.total_score, row.best_flight);
    }

    info!("=== Verifying Determinism ===");
    let mut all_match = true;
    for (config, bot, fingerprint, totals) in snapshots {
        let name = config.player_name.clone();
        let (replay_fingerprint, replay_totals) = replay(config, &bot, start_ms, frames)?;
        info!(
            "{}: live {} / replay {}",
            name,
            short_hex(&fingerprint),
            short_hex(&replay_fingerprint)
        );
        all_match &= fingerprint == replay_fingerprint && totals == replay_totals;
    }

    if all_match {
        info!("DETERMINISM VERIFIED: Courses and totals match!");
    } else {
        warn!("DETERMINISM FAILURE: Replays differ!");
    }
    Ok(rows)
}

/// Re-run one player's match offline with the same frames and inputs.
fn replay(
    config: MatchConfig,
    bot: &Autopilot,
    start_ms: TimestampMs,
    frames: i64,
) -> anyhow::Result<(Fingerprint, MatchTotals)> {
    let mut game = GameSession::new(config, GameConfig::default());
    game.start_shared(Some(start_ms), 0)?;

    for frame in 1..=frames {
        if bot.should_flap(game.flight(), game.course()) {
            game.commands().flap();
        }
        game.tick(FRAME_MS as f64, start_ms + frame * FRAME_MS);
        if game.phase() == MatchPhase::Ended {
            break;
        }
    }

    Ok((game.course().fingerprint(), game.totals().clone()))
}

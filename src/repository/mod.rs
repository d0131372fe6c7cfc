//! Match Service Boundary
//!
//! The remote service that creates matches, anchors their start time and
//! stores final scores. Every call is fallible and latency-bearing; the
//! simulation never waits on one mid-match.

pub mod memory;
pub mod supabase;

pub use memory::InMemoryRepository;
pub use supabase::SupabaseRepository;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::game::state::TimestampMs;

/// A freshly created match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedMatch {
    /// Match identity
    pub match_id: String,
    /// Course seed shared by every participant
    pub seed: u32,
    /// Short human-shareable join code
    pub match_code: String,
}

/// Final result for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    /// Match identity
    pub match_id: String,
    /// Participant identity
    pub session_id: String,
    /// Display name
    pub player_name: String,
    /// Sum of attempt scores
    pub total_score: u64,
    /// Best single attempt score
    pub best_flight: u64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Participant identity
    pub session_id: String,
    /// Display name
    pub player_name: String,
    /// Sum of attempt scores
    pub total_score: u64,
    /// Best single attempt score
    pub best_flight: u64,
}

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service answered with an error status
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The service returned no row where one was required
    #[error("no row returned")]
    NoRowReturned,

    /// Unknown match
    #[error("match not found: {0}")]
    NotFound(String),

    /// Service temporarily unreachable
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Check if retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Parse(_) | Self::NoRowReturned | Self::NotFound(_) => false,
        }
    }
}

/// Persistence and lookup for matches and their leaderboards.
pub trait MatchRepository: Send + Sync + 'static {
    /// Create a match and return its identity, seed and join code.
    fn create_match(
        &self,
        duration_secs: u32,
        hard_mode: bool,
    ) -> impl Future<Output = Result<CreatedMatch, RepositoryError>> + Send;

    /// The shared start instant, or `None` if the match has not been started.
    fn get_match_start_timestamp(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<Option<TimestampMs>, RepositoryError>> + Send;

    /// Anchor the shared start instant; done once by whoever starts the match.
    fn start_match(
        &self,
        match_id: &str,
        started_at: TimestampMs,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Store a participant's final score.
    fn submit_score(
        &self,
        submission: &ScoreSubmission,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Leaderboard rows for a match, best first.
    fn list_scores(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<Vec<ScoreRow>, RepositoryError>> + Send;
}

/// Bounded linear-backoff retry for score submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first
    pub max_attempts: u32,
    /// Added to the delay after each failure
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_step: Duration::from_millis(500) }
    }
}

/// Submit a score, retrying transient failures.
///
/// Returns the number of tries used on success.
pub async fn submit_with_retry<R: MatchRepository>(
    repository: Arc<R>,
    submission: ScoreSubmission,
    policy: RetryPolicy,
) -> Result<u32, RepositoryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match repository.submit_score(&submission).await {
            Ok(()) => {
                info!(
                    match_id = %submission.match_id,
                    total_score = submission.total_score,
                    attempt,
                    "Score submitted"
                );
                return Ok(attempt);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_step * attempt;
                warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Score submission failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(error = %e, attempt, "Score submission failed");
                return Err(e);
            }
        }
    }
}

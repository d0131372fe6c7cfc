//! In-memory match service for tests and the headless runner.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::game::state::TimestampMs;
use crate::repository::{CreatedMatch, MatchRepository, RepositoryError, ScoreRow, ScoreSubmission};

#[derive(Debug, Clone)]
struct MatchRecord {
    seed: u32,
    match_code: String,
    duration_secs: u32,
    hard_mode: bool,
    started_at: Option<TimestampMs>,
}

/// Match service held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    matches: RwLock<BTreeMap<String, MatchRecord>>,
    scores: RwLock<BTreeMap<String, Vec<ScoreRow>>>,
    failures_pending: AtomicU32,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a match with a known id and seed.
    pub async fn insert_match(&self, match_id: &str, seed: u32, duration_secs: u32, hard_mode: bool) {
        let record = MatchRecord {
            seed,
            match_code: match_code_for(match_id),
            duration_secs,
            hard_mode,
            started_at: None,
        };
        self.matches.write().await.insert(match_id.to_string(), record);
    }

    /// Make the next `count` submissions fail with a transient error.
    pub fn fail_next_submissions(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Duration and hard-mode flag of a stored match.
    pub async fn match_settings(&self, match_id: &str) -> Option<(u32, bool)> {
        self.matches
            .read()
            .await
            .get(match_id)
            .map(|r| (r.duration_secs, r.hard_mode))
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn match_code_for(match_id: &str) -> String {
    match_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase()
}

impl MatchRepository for InMemoryRepository {
    async fn create_match(&self, duration_secs: u32, hard_mode: bool) -> Result<CreatedMatch, RepositoryError> {
        let id = Uuid::new_v4();
        let match_id = id.to_string();
        // Low 32 bits of a random UUID
        let seed = id.as_u128() as u32;

        self.insert_match(&match_id, seed, duration_secs, hard_mode).await;
        let match_code = match_code_for(&match_id);
        debug!(%match_id, seed, "Match created");

        Ok(CreatedMatch { match_id, seed, match_code })
    }

    async fn get_match_start_timestamp(&self, match_id: &str) -> Result<Option<TimestampMs>, RepositoryError> {
        self.matches
            .read()
            .await
            .get(match_id)
            .map(|r| r.started_at)
            .ok_or_else(|| RepositoryError::NotFound(match_id.to_string()))
    }

    async fn start_match(&self, match_id: &str, started_at: TimestampMs) -> Result<(), RepositoryError> {
        let mut matches = self.matches.write().await;
        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| RepositoryError::NotFound(match_id.to_string()))?;
        record.started_at = Some(started_at);
        debug!(match_id, started_at, "Match started");
        Ok(())
    }

    async fn submit_score(&self, submission: &ScoreSubmission) -> Result<(), RepositoryError> {
        if self.take_injected_failure() {
            return Err(RepositoryError::Unavailable("injected failure".to_string()));
        }

        let row = ScoreRow {
            session_id: submission.session_id.clone(),
            player_name: submission.player_name.clone(),
            total_score: submission.total_score,
            best_flight: submission.best_flight,
        };

        // A retried submission replaces the earlier row
        let mut scores = self.scores.write().await;
        let rows = scores.entry(submission.match_id.clone()).or_default();
        rows.retain(|r| r.session_id != row.session_id);
        rows.push(row);
        Ok(())
    }

    async fn list_scores(&self, match_id: &str) -> Result<Vec<ScoreRow>, RepositoryError> {
        let mut rows = self.scores.read().await.get(match_id).cloned().unwrap_or_default();
        rows.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(session_id: &str, total_score: u64) -> ScoreSubmission {
        ScoreSubmission {
            match_id: "m1".to_string(),
            session_id: session_id.to_string(),
            player_name: session_id.to_uppercase(),
            total_score,
            best_flight: total_score / 2,
        }
    }

    #[tokio::test]
    async fn test_create_then_start() {
        let repo = InMemoryRepository::new();
        let created = repo.create_match(90, true).await.expect("created");
        assert_eq!(created.match_code.len(), 6);
        assert_eq!(repo.match_settings(&created.match_id).await, Some((90, true)));

        assert_eq!(repo.get_match_start_timestamp(&created.match_id).await.expect("known"), None);
        repo.start_match(&created.match_id, 1_700_000_000_000).await.expect("started");
        assert_eq!(
            repo.get_match_start_timestamp(&created.match_id).await.expect("known"),
            Some(1_700_000_000_000)
        );
    }

    #[tokio::test]
    async fn test_unknown_match() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.get_match_start_timestamp("nope").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(repo.start_match("nope", 0).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scores_sorted_and_resubmission_replaces() {
        let repo = InMemoryRepository::new();
        repo.submit_score(&submission("a", 50)).await.expect("stored");
        repo.submit_score(&submission("b", 90)).await.expect("stored");
        repo.submit_score(&submission("a", 70)).await.expect("stored");

        let rows = repo.list_scores("m1").await.expect("listed");
        let order: Vec<_> = rows.iter().map(|r| (r.session_id.as_str(), r.total_score)).collect();
        assert_eq!(order, vec![("b", 90), ("a", 70)]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let repo = InMemoryRepository::new();
        repo.fail_next_submissions(1);
        assert!(repo.submit_score(&submission("a", 1)).await.is_err());
        assert!(repo.submit_score(&submission("a", 1)).await.is_ok());
    }
}

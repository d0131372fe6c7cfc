//! Supabase (PostgREST) match service using the anon key

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::game::clock::{format_timestamp, parse_timestamp};
use crate::game::state::TimestampMs;
use crate::repository::{CreatedMatch, MatchRepository, RepositoryError, ScoreRow, ScoreSubmission};

/// Supabase client for the `matches` and `leaderboard` tables.
#[derive(Clone)]
pub struct SupabaseRepository {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Row returned by the `create_match` RPC.
#[derive(Debug, Deserialize)]
struct CreatedMatchRow {
    match_id: String,
    match_code: String,
}

/// Subset of a `matches` row.
#[derive(Debug, Deserialize)]
struct MatchRow {
    id: String,
    match_code: String,
    seed: i64,
    started_at: Option<String>,
}

impl MatchRow {
    fn started_at_ms(&self) -> Result<Option<TimestampMs>, RepositoryError> {
        self.started_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| RepositoryError::Parse(format!("started_at: {e}")))
    }
}

/// Body of the start update.
#[derive(Debug, Serialize)]
struct StartMatchPatch {
    status: &'static str,
    started_at: String,
}

#[derive(Debug, Serialize)]
struct CreateMatchArgs {
    p_duration: u32,
    p_hard_mode: bool,
}

impl SupabaseRepository {
    /// Create a client for a project URL and anon key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Get the REST API URL for a stored function
    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RepositoryError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RepositoryError::Api { status: status.as_u16(), body })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RepositoryError> {
        response.json().await.map_err(|e| RepositoryError::Parse(e.to_string()))
    }

    /// Authenticated GET returning every matching row
    async fn get<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, RepositoryError> {
        let response = self
            .authorized(self.client.get(self.rest_url(table)))
            .query(query)
            .send()
            .await?;
        Self::parse(Self::check(response).await?).await
    }

    /// Authenticated GET expecting a single row
    async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, RepositoryError> {
        let response = self
            .authorized(self.client.get(self.rest_url(table)))
            .query(query)
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        Self::parse(Self::check(response).await?).await.map(Some)
    }

    /// Authenticated PATCH of the rows matching `query`
    async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &[(&str, String)],
        data: &T,
    ) -> Result<usize, RepositoryError> {
        let response = self
            .authorized(self.client.patch(self.rest_url(table)))
            .query(query)
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::parse(Self::check(response).await?).await?;
        Ok(rows.len())
    }

    /// Authenticated POST (insert) without returning the row
    async fn insert<T: Serialize>(&self, table: &str, data: &T) -> Result<(), RepositoryError> {
        let response = self
            .authorized(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=minimal")
            .json(data)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    /// Call a stored function
    async fn rpc<A: Serialize, R: DeserializeOwned>(&self, function: &str, args: &A) -> Result<R, RepositoryError> {
        let response = self
            .authorized(self.client.post(self.rpc_url(function)))
            .json(args)
            .send()
            .await?;
        Self::parse(Self::check(response).await?).await
    }

    async fn fetch_match(&self, match_id: &str) -> Result<MatchRow, RepositoryError> {
        self.get_one("matches", &match_query(match_id))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(match_id.to_string()))
    }
}

impl MatchRepository for SupabaseRepository {
    async fn create_match(&self, duration_secs: u32, hard_mode: bool) -> Result<CreatedMatch, RepositoryError> {
        let args = CreateMatchArgs { p_duration: duration_secs, p_hard_mode: hard_mode };
        let rows: Vec<CreatedMatchRow> = self.rpc("create_match", &args).await?;
        let created = rows.into_iter().next().ok_or(RepositoryError::NoRowReturned)?;

        // The RPC does not return the seed
        let row = self.fetch_match(&created.match_id).await?;
        debug!(match_id = %row.id, code = %created.match_code, "Match created");

        Ok(CreatedMatch {
            match_id: row.id,
            // Stored seeds are reduced to 32 bits the same way browser clients do
            seed: row.seed as u32,
            match_code: created.match_code,
        })
    }

    async fn get_match_start_timestamp(&self, match_id: &str) -> Result<Option<TimestampMs>, RepositoryError> {
        self.fetch_match(match_id).await?.started_at_ms()
    }

    async fn start_match(&self, match_id: &str, started_at: TimestampMs) -> Result<(), RepositoryError> {
        let started_at = format_timestamp(started_at)
            .ok_or_else(|| RepositoryError::Parse(format!("start instant out of range: {started_at}")))?;
        let patch = StartMatchPatch { status: "active", started_at };
        let updated = self.update("matches", &[("id", eq(match_id))], &patch).await?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(match_id.to_string()));
        }
        debug!(match_id, started_at = %patch.started_at, "Match started");
        Ok(())
    }

    async fn submit_score(&self, submission: &ScoreSubmission) -> Result<(), RepositoryError> {
        self.insert("leaderboard", submission).await
    }

    async fn list_scores(&self, match_id: &str) -> Result<Vec<ScoreRow>, RepositoryError> {
        self.get("leaderboard", &scores_query(match_id)).await
    }
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn match_query(match_id: &str) -> [(&'static str, String); 2] {
    [("id", eq(match_id)), ("select", "id,match_code,seed,started_at".to_string())]
}

fn scores_query(match_id: &str) -> [(&'static str, String); 3] {
    [
        ("match_id", eq(match_id)),
        ("select", "session_id,player_name,total_score,best_flight".to_string()),
        ("order", "total_score.desc".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let repo = SupabaseRepository::new("https://abc.supabase.co/", "key");
        assert_eq!(repo.rest_url("matches"), "https://abc.supabase.co/rest/v1/matches");
        assert_eq!(repo.rpc_url("create_match"), "https://abc.supabase.co/rest/v1/rpc/create_match");
    }

    #[test]
    fn test_match_ids_are_encoded_into_one_filter() {
        let repo = SupabaseRepository::new("https://abc.supabase.co", "key");
        let request = repo
            .client
            .get(repo.rest_url("leaderboard"))
            .query(&scores_query("m1&select=*,seed"))
            .build()
            .expect("builds");

        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ("match_id".to_string(), "eq.m1&select=*,seed".to_string()));
        assert_eq!(pairs[1].0, "select");
        assert!(!request.url().query().unwrap_or_default().contains("&select=*"));

        let request = repo
            .client
            .get(repo.rest_url("matches"))
            .query(&match_query("a,b"))
            .build()
            .expect("builds");
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("id".to_string(), "eq.a,b".to_string()));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_start_patch_body() {
        let body = serde_json::to_value(StartMatchPatch {
            status: "active",
            started_at: format_timestamp(1_714_564_800_250).expect("in range"),
        })
        .expect("serializes");
        assert_eq!(body["status"], "active");
        assert_eq!(body["started_at"], "2024-05-01T12:00:00.250Z");
    }

    #[test]
    fn test_match_row_start_timestamp() {
        let row: MatchRow = serde_json::from_str(
            r#"{"id":"m1","match_code":"ABC123","seed":42,"started_at":"2024-05-01T12:00:00.250+00:00"}"#,
        )
        .expect("parses");
        assert_eq!(row.started_at_ms().expect("valid"), Some(1_714_564_800_250));

        let pending: MatchRow =
            serde_json::from_str(r#"{"id":"m1","match_code":"ABC123","seed":42,"started_at":null}"#).expect("parses");
        assert_eq!(pending.started_at_ms().expect("valid"), None);

        let broken: MatchRow =
            serde_json::from_str(r#"{"id":"m1","match_code":"X","seed":1,"started_at":"yesterday"}"#).expect("parses");
        assert!(matches!(broken.started_at_ms(), Err(RepositoryError::Parse(_))));
    }

    #[test]
    fn test_submission_body_uses_table_columns() {
        let body = serde_json::to_value(ScoreSubmission {
            match_id: "m1".to_string(),
            session_id: "s1".to_string(),
            player_name: "Ada".to_string(),
            total_score: 10,
            best_flight: 7,
        })
        .expect("serializes");
        assert_eq!(body["best_flight"], 7);
        assert_eq!(body["total_score"], 10);
    }
}

//! Launch and Environment Configuration
//!
//! A match is launched from a URL-style query string carrying the match
//! identity and seed. Service endpoints come from the environment.

use std::path::PathBuf;

use reqwest::Url;
use tracing::debug;

use crate::game::state::MatchConfig;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required launch parameter is absent or empty
    #[error("missing launch parameter: {0}")]
    MissingParam(&'static str),

    /// A launch parameter could not be parsed
    #[error("invalid launch parameter {name}: {value:?}")]
    InvalidParam {
        /// Parameter name
        name: &'static str,
        /// Raw value
        value: String,
    },

    /// The query string is not well formed
    #[error("malformed query string: {0}")]
    MalformedQuery(String),

    /// Only one of an environment variable pair is set
    #[error("{present} is set but {missing} is not")]
    IncompleteEnv {
        /// Variable that was found
        present: &'static str,
        /// Variable that was expected alongside it
        missing: &'static str,
    },
}

/// Parameters a client is launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    /// Match identity
    pub match_id: String,
    /// Course seed
    pub seed: u32,
    /// Display name
    pub player_name: String,
    /// Participant identity
    pub session_id: String,
    /// Match duration, when given
    pub duration_secs: Option<u32>,
    /// Hard mode (only the literal `true` enables it)
    pub hard_mode: bool,
}

impl LaunchParams {
    /// Parse from a query string such as `?matchId=...&seed=42&...`.
    pub fn from_query(query: &str) -> Result<Self, ConfigError> {
        let query = query.trim_start_matches('?');
        let url = Url::parse(&format!("flappygull://launch?{query}"))
            .map_err(|e| ConfigError::MalformedQuery(e.to_string()))?;
        Self::from_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Parse from decoded key/value pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut match_id = None;
        let mut seed = None;
        let mut player_name = None;
        let mut session_id = None;
        let mut duration = None;
        let mut hard_mode = None;

        for (key, value) in pairs {
            let value: String = value.into();
            match key.as_ref() {
                "matchId" => match_id = Some(value),
                "seed" => seed = Some(value),
                "playerName" => player_name = Some(value),
                "sessionId" => session_id = Some(value),
                "duration" => duration = Some(value),
                "hardMode" => hard_mode = Some(value),
                other => debug!(key = other, "Ignoring unknown launch parameter"),
            }
        }

        let seed_raw = required("seed", seed)?;
        let seed = seed_raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidParam { name: "seed", value: seed_raw.clone() })?;

        let duration_secs = match duration.filter(|d| !d.is_empty()) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or(ConfigError::InvalidParam { name: "duration", value: raw })?,
            ),
            None => None,
        };

        Ok(Self {
            match_id: required("matchId", match_id)?,
            // Wraps the way browser clients coerce seeds to 32 bits
            seed: seed as u32,
            player_name: required("playerName", player_name)?,
            session_id: required("sessionId", session_id)?,
            duration_secs,
            hard_mode: hard_mode.as_deref() == Some("true"),
        })
    }

    /// Build the simulation's match parameters.
    pub fn match_config(&self) -> MatchConfig {
        let config = MatchConfig::new(
            self.match_id.clone(),
            self.seed,
            self.player_name.clone(),
            self.session_id.clone(),
        )
        .with_hard_mode(self.hard_mode);

        match self.duration_secs {
            Some(duration) => config.with_duration(duration),
            None => config,
        }
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or(ConfigError::MissingParam(name))
}

/// Default location of the best-distance file.
pub const DEFAULT_BEST_DISTANCE_PATH: &str = "flappygull_best_distance.json";

/// Supabase project credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL
    pub url: String,
    /// Public anon key
    pub anon_key: String,
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Match service credentials, if configured
    pub supabase: Option<SupabaseConfig>,
    /// WebSocket relay for position sync, if configured
    pub relay_url: Option<String>,
    /// Where the local best distance is stored
    pub best_distance_path: PathBuf,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supabase: None,
            relay_url: None,
            best_distance_path: PathBuf::from(DEFAULT_BEST_DISTANCE_PATH),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig { url, anon_key }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::IncompleteEnv { present: "SUPABASE_URL", missing: "SUPABASE_ANON_KEY" })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteEnv { present: "SUPABASE_ANON_KEY", missing: "SUPABASE_URL" })
            }
        };

        Ok(Self {
            supabase,
            relay_url: get("RELAY_URL"),
            best_distance_path: get("BEST_DISTANCE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BEST_DISTANCE_PATH)),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parses_full_query() {
        let params = LaunchParams::from_query(
            "?matchId=abc-123&seed=42&playerName=Ada%20L&sessionId=s1&duration=90&hardMode=true",
        )
        .expect("valid");

        assert_eq!(params.match_id, "abc-123");
        assert_eq!(params.seed, 42);
        assert_eq!(params.player_name, "Ada L");
        assert_eq!(params.duration_secs, Some(90));
        assert!(params.hard_mode);

        let config = params.match_config();
        assert_eq!(config.duration_secs, 90);
        assert!(config.hard_mode);
    }

    #[test]
    fn test_optional_params_default() {
        let params = LaunchParams::from_query("matchId=m&seed=7&playerName=Bo&sessionId=s&hardMode=1").expect("valid");
        assert_eq!(params.duration_secs, None);
        assert!(!params.hard_mode);
        assert_eq!(params.match_config().duration_secs, crate::DEFAULT_MATCH_DURATION_SECS);
    }

    #[test]
    fn test_missing_and_invalid_params() {
        assert_eq!(
            LaunchParams::from_query("matchId=m&seed=7&playerName=Bo"),
            Err(ConfigError::MissingParam("sessionId"))
        );
        assert_eq!(
            LaunchParams::from_query("matchId=&seed=7&playerName=Bo&sessionId=s"),
            Err(ConfigError::MissingParam("matchId"))
        );
        assert!(matches!(
            LaunchParams::from_query("matchId=m&seed=seven&playerName=Bo&sessionId=s"),
            Err(ConfigError::InvalidParam { name: "seed", .. })
        ));
        assert!(matches!(
            LaunchParams::from_query("matchId=m&seed=7&playerName=Bo&sessionId=s&duration=0"),
            Err(ConfigError::InvalidParam { name: "duration", .. })
        ));
    }

    #[test]
    fn test_negative_seed_wraps() {
        let params = LaunchParams::from_pairs([
            ("matchId", "m"),
            ("seed", "-1"),
            ("playerName", "Bo"),
            ("sessionId", "s"),
        ])
        .expect("valid");
        assert_eq!(params.seed, u32::MAX);
    }

    #[test]
    fn test_env_config() {
        let vars: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("RELAY_URL", "ws://localhost:4000"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).expect("valid");

        assert_eq!(config.supabase.map(|s| s.anon_key), Some("anon".to_string()));
        assert_eq!(config.relay_url.as_deref(), Some("ws://localhost:4000"));
        assert_eq!(config.best_distance_path, PathBuf::from(DEFAULT_BEST_DISTANCE_PATH));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_requires_both_supabase_vars() {
        let result = EngineConfig::from_lookup(|k| (k == "SUPABASE_URL").then(|| "https://x".to_string()));
        assert!(matches!(result, Err(ConfigError::IncompleteEnv { missing: "SUPABASE_ANON_KEY", .. })));
        assert_eq!(EngineConfig::from_lookup(|_| None), Ok(EngineConfig::default()));
    }
}

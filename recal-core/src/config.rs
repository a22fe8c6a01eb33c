//! Configuration loading.
//!
//! Config lives at `~/.config/recal/config.toml`. The ledger token can be
//! overridden with the `RECAL_LEDGER_TOKEN` environment variable so it never
//! has to be written to disk.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Engine tuning knobs. Defaults preserve the observed legacy behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tolerance window (minutes) when matching a record against existing
    /// calendar events, to absorb clock skew.
    #[serde(default = "default_match_window_minutes")]
    pub match_window_minutes: i64,

    /// Settling delay (seconds) before clearing a record's lock, giving the
    /// ledger's eventual consistency time to catch up.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Delay (seconds) between records during bulk runs, to respect
    /// upstream rate limits. Absent in incremental runs.
    #[serde(default = "default_bulk_delay_secs")]
    pub bulk_delay_secs: u64,

    /// Fixed backoff (seconds) after a rate-limit response.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Retry ceiling for rate-limited requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether description differences count as drift.
    #[serde(default = "default_true")]
    pub compare_description: bool,
}

fn default_match_window_minutes() -> i64 {
    5
}

fn default_settle_secs() -> u64 {
    6
}

fn default_bulk_delay_secs() -> u64 {
    12
}

fn default_retry_backoff_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            match_window_minutes: default_match_window_minutes(),
            settle_secs: default_settle_secs(),
            bulk_delay_secs: default_bulk_delay_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_retries: default_max_retries(),
            compare_description: default_true(),
        }
    }
}

impl EngineConfig {
    /// Zeroed delays, for tests and dry environments.
    pub fn without_delays(mut self) -> Self {
        self.settle_secs = 0;
        self.bulk_delay_secs = 0;
        self.retry_backoff_secs = 0;
        self
    }
}

/// Connection settings for the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    /// API token; prefer the `RECAL_LEDGER_TOKEN` environment variable.
    #[serde(default)]
    pub api_token: String,
}

/// Which calendar a run targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Google calendar id (e.g. "primary" or an address-style id).
    pub calendar_id: String,
    /// Google account whose stored session to use.
    pub account: String,
    /// Ledger-side tag selecting the records bound to this calendar.
    #[serde(default)]
    pub calendar_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn path() -> SyncResult<std::path::PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("could not determine config directory".into()))?;
        Ok(base.join("recal").join("config.toml"))
    }

    pub fn load() -> SyncResult<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "no config found at {} (create it with [ledger] and [calendar] sections)",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&contents)
            .map_err(|e| SyncError::Config(format!("failed to parse {}: {}", path.display(), e)))?;

        if let Ok(token) = std::env::var("RECAL_LEDGER_TOKEN") {
            if !token.is_empty() {
                config.ledger.api_token = token;
            }
        }

        if config.ledger.api_token.is_empty() {
            return Err(SyncError::Config(
                "ledger api token missing: set ledger.api_token or RECAL_LEDGER_TOKEN".into(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_match_legacy_behavior() {
        let config = EngineConfig::default();
        assert_eq!(config.match_window_minutes, 5);
        assert_eq!(config.settle_secs, 6);
        assert_eq!(config.bulk_delay_secs, 12);
        assert_eq!(config.retry_backoff_secs, 10);
        assert_eq!(config.max_retries, 3);
        assert!(config.compare_description);
    }

    #[test]
    fn test_partial_engine_section_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [ledger]
            base_url = "https://ledger.example.com/api"
            api_token = "secret"

            [calendar]
            calendar_id = "primary"
            account = "ops@example.com"

            [engine]
            settle_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.settle_secs, 0);
        assert_eq!(config.engine.bulk_delay_secs, 12);
        assert_eq!(config.calendar.calendar_key, None);
    }
}

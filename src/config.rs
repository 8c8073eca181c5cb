//! Configuration and settings management
//!
//! Loads settings from environment variables and layered config files,
//! and defines the tuning constants for caching, retries and chunking.

use crate::cache::FetchPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of channel-name fragments the bot answers in
    #[serde(rename = "valid_channels")]
    pub valid_channels_str: Option<String>,

    /// Chat the web-form relay posts into
    pub relay_chat_id: Option<i64>,

    /// Bind address for the web form server
    #[serde(default = "default_web_bind")]
    pub web_bind: String,

    /// Text forecast product page
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Latest surface observations page
    #[serde(default = "default_observations_url")]
    pub observations_url: String,

    /// Animated radar composite
    #[serde(default = "default_radar_url")]
    pub radar_url: String,

    /// Dictionary search page, queried per word
    #[serde(default = "default_dictionary_url")]
    pub dictionary_url: String,

    /// Comma-separated list of observation stations for the summary
    #[serde(rename = "locations")]
    pub locations_str: Option<String>,
}

fn default_web_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_forecast_url() -> String {
    "https://meteo.arso.gov.si/uploads/probase/www/fproduct/text/sl/fcast_si_text.html".to_string()
}

fn default_observations_url() -> String {
    "https://meteo.arso.gov.si/uploads/probase/www/observ/surface/text/sl/observation_si_latest.html"
        .to_string()
}

fn default_radar_url() -> String {
    "https://meteo.arso.gov.si/uploads/probase/www/observ/radar/si0-rm-anim.gif".to_string()
}

fn default_dictionary_url() -> String {
    "https://fran.si/iskanje".to_string()
}

const DEFAULT_LOCATIONS: &[&str] = &["Ljubljana", "Maribor", "Novo mesto", "Murska Sobota"];

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Channel-name fragments the bot is allowed to answer in.
    /// A chat qualifies when its title contains any fragment.
    #[must_use]
    pub fn valid_channels(&self) -> Vec<String> {
        parse_list(self.valid_channels_str.as_deref())
    }

    /// Observation stations shown in the `vreme` summary, in order.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        let configured = parse_list(self.locations_str.as_deref());
        if configured.is_empty() {
            DEFAULT_LOCATIONS.iter().map(|s| (*s).to_string()).collect()
        } else {
            configured
        }
    }
}

/// Splits a comma/semicolon-separated list, trimming entries. Entries
/// may contain spaces ("Novo mesto"), so whitespace is not a separator.
fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(|c: char| c == ',' || c == ';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
            .collect()
    })
    .unwrap_or_default()
}

// Fetch cache tuning.
/// Freshness window for the weather pages and the radar image.
pub const PAGE_FRESH_SECS: u64 = 600;
/// Freshness window for dictionary lookups; definitions do not churn.
pub const DICTIONARY_FRESH_SECS: u64 = 86_400;
/// Cooldown after a failed refresh before the next attempt. Tunable;
/// must stay below the freshness windows.
pub const FAILURE_COOLDOWN_SECS: u64 = 60;
/// Total fetch attempts per refresh.
pub const FETCH_MAX_ATTEMPTS: usize = 3;
/// Fixed delay between fetch attempts.
pub const FETCH_RETRY_BACKOFF_MS: u64 = 500;

// Chat transport tuning.
/// Initial backoff for outbound send retries.
pub const CHAT_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for outbound send retries.
pub const CHAT_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries after the first failed send.
pub const CHAT_API_MAX_RETRIES: usize = 3;
/// Maximum length per outbound chunk, below the hard transport limit
/// to leave headroom for formatting markup.
pub const MESSAGE_LIMIT: usize = 4000;

/// Refresh policy for the weather pages and the radar image.
#[must_use]
pub fn page_policy() -> FetchPolicy {
    FetchPolicy {
        fresh_for: Duration::from_secs(PAGE_FRESH_SECS),
        max_attempts: FETCH_MAX_ATTEMPTS,
        retry_backoff: Duration::from_millis(FETCH_RETRY_BACKOFF_MS),
        failure_cooldown: Duration::from_secs(FAILURE_COOLDOWN_SECS),
    }
}

/// Refresh policy for per-word dictionary lookups.
#[must_use]
pub fn dictionary_policy() -> FetchPolicy {
    FetchPolicy {
        fresh_for: Duration::from_secs(DICTIONARY_FRESH_SECS),
        max_attempts: FETCH_MAX_ATTEMPTS,
        retry_backoff: Duration::from_millis(FETCH_RETRY_BACKOFF_MS),
        failure_cooldown: Duration::from_secs(FAILURE_COOLDOWN_SECS),
    }
}

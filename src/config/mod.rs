use std::collections::HashSet;
use std::env;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

pub const DEFAULT_API_BASE_URL: &str = "https://v3.football.api-sports.io";
pub const DEFAULT_MATCHES_SOURCE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PREFERRED_BOOKMAKER: &str = "betano";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CONCURRENCY: usize = 4;

const DEFAULT_ALLOWED_COUNTRIES: &[&str] = &[
    "England", "Spain", "Italy", "Germany", "France", "Portugal", "Netherlands",
    "Belgium", "Switzerland", "Austria", "Denmark", "Sweden", "Norway", "Poland",
    "Czech Republic", "Croatia", "Serbia", "Greece", "Turkey", "Scotland", "Brazil",
];

const DEFAULT_TOP_LEAGUES: &[&str] = &[
    "Premier League", "La Liga", "Serie A", "Bundesliga", "Ligue 1",
    "Primeira Liga", "Eredivisie",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be at most {max}, got {value}")]
    TooLarge { key: &'static str, value: u64, max: u64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub matches_source_url: String,
    pub cache_ttl: Duration,
    pub upstream_timeout: Duration,
    /// Max in-flight upstream calls, shared by all requests.
    pub upstream_concurrency: usize,
    pub preferred_bookmaker: String,
    /// Kept in configured order for `/debug/countries`.
    pub allowed_countries: Vec<String>,
    pub top_leagues: Vec<String>,
    country_set: HashSet<String>,
    league_set: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_COUNTRIES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_TOP_LEAGUES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl Config {
    /// Defaults for everything except the two allow-lists.
    pub fn new(allowed_countries: Vec<String>, top_leagues: Vec<String>) -> Self {
        let country_set = allowed_countries.iter().cloned().collect();
        let league_set = top_leagues.iter().cloned().collect();
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            matches_source_url: DEFAULT_MATCHES_SOURCE_URL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            upstream_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            upstream_concurrency: DEFAULT_CONCURRENCY,
            preferred_bookmaker: DEFAULT_PREFERRED_BOOKMAKER.to_string(),
            allowed_countries,
            top_leagues,
            country_set,
            league_set,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let allowed_countries = env::var("ALLOWED_COUNTRIES")
            .ok()
            .map(|v| split_list(&v))
            .unwrap_or_else(|| DEFAULT_ALLOWED_COUNTRIES.iter().map(|s| s.to_string()).collect());
        let top_leagues = env::var("TOP_LEAGUES")
            .ok()
            .map(|v| split_list(&v))
            .unwrap_or_else(|| DEFAULT_TOP_LEAGUES.iter().map(|s| s.to_string()).collect());

        let mut config = Self::new(allowed_countries, top_leagues);

        config.api_key = env::var("API_FOOTBALL_KEY").ok().filter(|k| !k.trim().is_empty());
        if let Ok(url) = env::var("API_FOOTBALL_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = env::var("MATCHES_SOURCE_URL") {
            config.matches_source_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(name) = env::var("PREFERRED_BOOKMAKER") {
            if !name.trim().is_empty() {
                config.preferred_bookmaker = name.trim().to_string();
            }
        }

        config.cache_ttl = Duration::from_secs(positive_var("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?);
        config.upstream_timeout =
            Duration::from_secs(positive_var("UPSTREAM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?);
        let concurrency = positive_var("UPSTREAM_CONCURRENCY", DEFAULT_CONCURRENCY as u64)?;
        config.upstream_concurrency =
            bounded("UPSTREAM_CONCURRENCY", concurrency, Semaphore::MAX_PERMITS as u64)? as usize;

        Ok(config)
    }

    pub fn is_country_allowed(&self, country: Option<&str>) -> bool {
        country.is_some_and(|c| self.country_set.contains(c))
    }

    pub fn is_top_league(&self, league: Option<&str>) -> bool {
        league.is_some_and(|l| self.league_set.contains(l))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn positive_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => parse_positive(key, &raw),
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { key, value: raw.to_string() }),
    }
}

fn bounded(key: &'static str, value: u64, max: u64) -> Result<u64, ConfigError> {
    if value > max {
        return Err(ConfigError::TooLarge { key, value, max });
    }
    Ok(value)
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org/route/v1/driving";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:1b";

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:8501",
    "http://127.0.0.1:8501",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

/// Runtime settings, read from `CHILL_*` environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub overpass_url: String,
    pub osrm_url: String,
    /// Base URL of an Ollama-compatible server; the remote classifier is off without it.
    pub ollama_url: Option<String>,
    pub ollama_model: String,
    pub upstream_timeout: Duration,
    pub search_radius_km: f64,
    pub search_limit: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            ollama_url: None,
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            upstream_timeout: Duration::from_secs(10),
            search_radius_km: 5.0,
            search_limit: 50,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 120,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind: env_string("CHILL_BIND").unwrap_or(defaults.bind),
            overpass_url: env_string("CHILL_OVERPASS_URL").unwrap_or(defaults.overpass_url),
            osrm_url: env_string("CHILL_OSRM_URL").unwrap_or(defaults.osrm_url),
            ollama_url: env_string("CHILL_OLLAMA_URL"),
            ollama_model: env_string("CHILL_OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            upstream_timeout: env_parse("CHILL_UPSTREAM_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.upstream_timeout),
            search_radius_km: env_parse::<f64>("CHILL_SEARCH_RADIUS_KM")
                .filter(|radius| radius.is_finite() && *radius > 0.0)
                .unwrap_or(defaults.search_radius_km),
            search_limit: env_parse("CHILL_SEARCH_LIMIT").unwrap_or(defaults.search_limit),
            rate_limit_window: env_parse("CHILL_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env_parse("CHILL_RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            allowed_origins: env_string("CHILL_ALLOWED_ORIGINS")
                .map(|value| parse_origins(&value))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|value| value.parse::<T>().ok())
}

pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blanks_dropped() {
        assert_eq!(
            parse_origins(" http://a.test/ ,, https://b.test"),
            vec!["http://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn defaults_match_public_services() {
        let config = ApiConfig::default();
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.search_limit, 50);
        assert!(config.ollama_url.is_none());
    }
}

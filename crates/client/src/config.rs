//! Application configuration

use std::env;
use std::time::Duration;

use url::Url;

/// Tool configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Homeserver
    pub homeserver_url: Url,
    pub admin_token: String,

    // HTTP
    pub request_timeout_ms: u64,
    pub retry_delay_ms: u64,

    // Listings
    pub page_size: usize,  // rows per screen in interactive listings
    pub fetch_limit: u32,  // items requested per server page

    // Deletion tracking
    pub status_poll_attempts: u32,
    pub status_poll_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(None, None)
    }

    /// Load configuration, letting explicit values win over the environment
    pub fn from_env_with(
        homeserver_url: Option<String>,
        admin_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw_url = homeserver_url
            .or_else(|| env::var("HOMESERVER_URL").ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("HOMESERVER_URL"))?;
        let homeserver_url = parse_homeserver_url(&raw_url)?;

        let admin_token = admin_token
            .or_else(|| env::var("ADMIN_TOKEN").ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::Missing("ADMIN_TOKEN"))?;

        let page_size: usize = env::var("HSADMIN_PAGE_SIZE")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        if page_size == 0 {
            return Err(ConfigError::Invalid("HSADMIN_PAGE_SIZE must be greater than 0"));
        }

        Ok(Self {
            homeserver_url,
            admin_token,

            request_timeout_ms: env::var("HSADMIN_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30000),
            retry_delay_ms: env::var("HSADMIN_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),

            page_size,
            fetch_limit: env::var("HSADMIN_FETCH_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse::<u32>()
                .unwrap_or(100)
                .max(1),

            status_poll_attempts: env::var("HSADMIN_STATUS_POLL_ATTEMPTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            status_poll_interval_ms: env::var("HSADMIN_STATUS_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}

/// Accepts bare hosts like `matrix.example.org` by assuming https
pub fn parse_homeserver_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&candidate).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid homeserver URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to clear env vars after tests
    fn cleanup_config() {
        for key in [
            "HOMESERVER_URL",
            "ADMIN_TOKEN",
            "HSADMIN_PAGE_SIZE",
            "HSADMIN_FETCH_LIMIT",
            "HSADMIN_RETRY_DELAY_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial(env)]
    fn test_missing_token_is_reported() {
        cleanup_config();
        env::set_var("HOMESERVER_URL", "https://matrix.example.org");

        match Config::from_env() {
            Err(ConfigError::Missing("ADMIN_TOKEN")) => {}
            other => panic!("Expected Missing error for ADMIN_TOKEN, got: {:?}", other),
        }

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_defaults_and_overrides() {
        cleanup_config();
        env::set_var("HOMESERVER_URL", "https://matrix.example.org/");
        env::set_var("ADMIN_TOKEN", "syt_env_token");
        env::set_var("HSADMIN_FETCH_LIMIT", "25");

        let config = Config::from_env().unwrap();
        assert_eq!(config.homeserver_url.as_str(), "https://matrix.example.org/");
        assert_eq!(config.admin_token, "syt_env_token");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.fetch_limit, 25);
        assert_eq!(config.retry_delay(), Duration::from_millis(500));

        // Explicit values beat the environment
        let config = Config::from_env_with(
            Some("http://localhost:8008".to_string()),
            Some("syt_flag_token".to_string()),
        )
        .unwrap();
        assert_eq!(config.homeserver_url.as_str(), "http://localhost:8008/");
        assert_eq!(config.admin_token, "syt_flag_token");

        cleanup_config();
    }

    #[test]
    #[serial(env)]
    fn test_zero_page_size_rejected() {
        cleanup_config();
        env::set_var("HOMESERVER_URL", "matrix.example.org");
        env::set_var("ADMIN_TOKEN", "t");
        env::set_var("HSADMIN_PAGE_SIZE", "0");

        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        cleanup_config();
    }

    #[test]
    fn test_homeserver_url_parsing() {
        assert_eq!(
            parse_homeserver_url("matrix.example.org").unwrap().as_str(),
            "https://matrix.example.org/"
        );
        assert!(parse_homeserver_url("ftp://example.org").is_err());
        assert!(parse_homeserver_url("http://").is_err());
    }
}

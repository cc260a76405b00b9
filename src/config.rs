//! Runtime configuration, validated once at startup.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Canvas instance used when `CANVAS_URL` is not set.
pub const DEFAULT_CANVAS_URL: &str = "https://canvas.lms.unimelb.edu.au/api/v1";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Canvas caps `per_page` at 100.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 100;

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings shared by the Canvas client and the orchestration layer.
#[derive(Clone)]
pub struct Config {
    canvas_url: String,
    api_token: String,
    timeout: Duration,
    page_size: u32,
    concurrency: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("canvas_url", &self.canvas_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Config {
    /// Create a validated configuration with default tuning values.
    ///
    /// # Arguments
    /// * `canvas_url` - API root, e.g. `https://canvas.example.edu/api/v1`
    /// * `api_token` - Canvas personal access token
    pub fn new(canvas_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self, ConfigError> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(ConfigError::Empty("CANVAS_API_TOKEN".to_string()));
        }

        let canvas_url = canvas_url.into().trim().trim_end_matches('/').to_string();
        if canvas_url.is_empty() {
            return Err(ConfigError::Empty("CANVAS_URL".to_string()));
        }
        if !canvas_url.starts_with("http://") && !canvas_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl {
                name: "CANVAS_URL".to_string(),
                value: canvas_url,
            });
        }

        Ok(Self {
            canvas_url,
            api_token: api_token.trim().to_string(),
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Load configuration from the process environment.
    ///
    /// `CANVAS_API_TOKEN` is required. `CANVAS_URL`, `CANVAS_TIMEOUT_SECS`,
    /// `CANVAS_PAGE_SIZE` and `CANVAS_CONCURRENCY` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = env::var("CANVAS_API_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("CANVAS_API_TOKEN".to_string()))?;
        let url = env::var("CANVAS_URL").unwrap_or_else(|_| DEFAULT_CANVAS_URL.to_string());

        let mut config = Self::new(url, token)?;
        if let Some(secs) = parse_env::<u64>("CANVAS_TIMEOUT_SECS")? {
            config = config.with_timeout(Duration::from_secs(secs))?;
        }
        if let Some(size) = parse_env::<u32>("CANVAS_PAGE_SIZE")? {
            config = config.with_page_size(size)?;
        }
        if let Some(width) = parse_env::<usize>("CANVAS_CONCURRENCY")? {
            config = config.with_concurrency(width)?;
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(invalid("CANVAS_TIMEOUT_SECS", "0"));
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, ConfigError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(invalid("CANVAS_PAGE_SIZE", page_size));
        }
        self.page_size = page_size;
        Ok(self)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(invalid("CANVAS_CONCURRENCY", concurrency));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// API root including the version segment.
    pub fn canvas_url(&self) -> &str {
        &self.canvas_url
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

fn invalid(name: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let config = Config::new("https://canvas.test/api/v1/", "token").unwrap();
        assert_eq!(config.canvas_url(), "https://canvas.test/api/v1");
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Config::new(DEFAULT_CANVAS_URL, "   ").unwrap_err();
        assert!(matches!(err, ConfigError::Empty(ref name) if name == "CANVAS_API_TOKEN"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let err = Config::new("ftp://canvas.test", "token").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
        assert!(Config::new("", "token").is_err());
    }

    #[test]
    fn test_tuning_bounds() {
        let config = Config::new(DEFAULT_CANVAS_URL, "token").unwrap();
        assert!(config.clone().with_page_size(0).is_err());
        assert!(config.clone().with_page_size(101).is_err());
        assert!(config.clone().with_concurrency(0).is_err());
        assert!(config.clone().with_timeout(Duration::ZERO).is_err());
        assert_eq!(config.with_page_size(50).unwrap().page_size(), 50);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = Config::new(DEFAULT_CANVAS_URL, "super-secret").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

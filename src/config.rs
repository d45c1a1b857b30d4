//! Engine configuration
//!
//! All knobs for the fetch engine live in [`EngineConfig`], threaded through
//! constructors explicitly. Environment variables are read in exactly one
//! place, [`EngineConfig::from_env`]; nothing else in the crate touches
//! ambient process state, so the engine stays testable without environment
//! mutation.

use crate::error::{Error, Result};
use crate::fetch::RateLimiterConfig;
use std::time::Duration;

/// Default number of fetch attempts per page before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base for the exponential retry delay, in seconds.
pub const DEFAULT_BASE_DELAY_SECS: u64 = 2;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Configuration for the paginated fetch engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fetch attempts per page (transient faults only)
    pub max_retries: u32,
    /// Base of the exponential retry delay
    pub base_delay: Duration,
    /// Upper bound on a single retry sleep
    pub max_delay: Duration,
    /// Items requested per page
    pub page_size: usize,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Read timeout while consuming a streamed page body
    pub read_timeout: Duration,
    /// Total timeout for plain (non-streamed) queries
    pub query_timeout: Duration,
    /// Idle connections kept per host in the shared pool
    pub pool_max_idle: usize,
    /// Optional request-rate limit (off by default)
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(300),
            page_size: DEFAULT_PAGE_SIZE,
            connect_timeout: Duration::from_secs_f64(9.15),
            read_timeout: Duration::from_secs(180),
            query_timeout: Duration::from_secs(60),
            pool_max_idle: 50,
            rate_limit: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Build a config from environment variables, falling back to defaults.
    ///
    /// Recognized variables: `NETWORK_RETRIES`, `NETWORK_SLEEP` (seconds),
    /// `PAGE_STEP`, `TIMEOUT_CONNECT` (seconds, fractional allowed),
    /// `TIMEOUT_READ` (seconds). Unset variables keep their defaults; a set
    /// but unparsable variable is a hard error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = read_env("NETWORK_RETRIES")? {
            config.max_retries = parse_env("NETWORK_RETRIES", &v)?;
        }
        if let Some(v) = read_env("NETWORK_SLEEP")? {
            config.base_delay = Duration::from_secs(parse_env("NETWORK_SLEEP", &v)?);
        }
        if let Some(v) = read_env("PAGE_STEP")? {
            config.page_size = parse_env("PAGE_STEP", &v)?;
        }
        if let Some(v) = read_env("TIMEOUT_CONNECT")? {
            config.connect_timeout = Duration::from_secs_f64(parse_env("TIMEOUT_CONNECT", &v)?);
        }
        if let Some(v) = read_env("TIMEOUT_READ")? {
            config.read_timeout = Duration::from_secs_f64(parse_env("TIMEOUT_READ", &v)?);
        }

        Ok(config)
    }
}

fn read_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(Error::invalid_config(name, "not valid unicode"))
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::invalid_config(name, format!("{e}")))
}

/// Builder for [`EngineConfig`]
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the fetch attempt ceiling
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the retry delay base and cap
    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.base_delay = base;
        self.config.max_delay = max;
        self
    }

    /// Set the page size
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the streamed-body read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the plain-query total timeout
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    /// Set the idle connection pool size per host
    pub fn pool_max_idle(mut self, size: usize) -> Self {
        self.config.pool_max_idle = size;
        self
    }

    /// Enable request-rate limiting
    pub fn rate_limit(mut self, limit: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(limit);
        self
    }

    /// Build the config
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

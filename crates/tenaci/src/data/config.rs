//! Serializable client configuration.
//!
//! Durations are stored as integer milliseconds (or seconds for the cache TTL)
//! so the config reads naturally from TOML:
//!
//! ```
//! use tenaci::ClientConfig;
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     [cache]
//!     enabled = true
//!     ttl_secs = 30
//!
//!     [retry]
//!     max_attempts = 5
//!     success_statuses = [200, 204]
//!
//!     [retry.backoff]
//!     strategy = "constant"
//!     interval_ms = 250
//! "#).unwrap();
//!
//! assert!(config.cache.enabled);
//! assert_eq!(config.retry.max_attempts, 5);
//! ```

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.retry.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled:  bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled:  false,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first; 0 selects the default.
    pub max_attempts:     u32,
    /// Upper bound on time spent retrying; 0 means unbounded.
    pub max_elapsed_ms:   u64,
    pub success_statuses: Vec<u16>,
    pub backoff:          BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts:     0,
            max_elapsed_ms:   DEFAULT_MAX_ELAPSED_TIME.as_millis() as u64,
            success_statuses: vec![200],
            backoff:          BackoffConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn max_elapsed_time(&self) -> Duration { Duration::from_millis(self.max_elapsed_ms) }

    /// Check the settings that deserialization alone cannot rule out.
    pub fn validate(&self) -> Result<()> {
        self.success_statuses()?;
        self.backoff.validate()
    }

    pub fn success_statuses(&self) -> Result<Vec<StatusCode>> {
        self.success_statuses
            .iter()
            .map(|&code| {
                StatusCode::from_u16(code)
                    .map_err(|_| Error::Config(format!("invalid status code {code}")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffConfig {
    Exponential {
        #[serde(default = "defaults::initial_ms")]
        initial_ms:           u64,
        #[serde(default = "defaults::multiplier")]
        multiplier:           f64,
        #[serde(default = "defaults::randomization_factor")]
        randomization_factor: f64,
        #[serde(default = "defaults::max_interval_ms")]
        max_interval_ms:      u64,
    },
    Constant {
        interval_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Exponential {
            initial_ms:           defaults::initial_ms(),
            multiplier:           defaults::multiplier(),
            randomization_factor: defaults::randomization_factor(),
            max_interval_ms:      defaults::max_interval_ms(),
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<()> {
        if let BackoffConfig::Exponential {
            multiplier,
            randomization_factor,
            ..
        } = *self
        {
            for (name, value) in [("multiplier", multiplier), ("randomization_factor", randomization_factor)] {
                if !value.is_finite() {
                    return Err(Error::Config(format!("backoff {name} must be finite, got {value}")));
                }
            }
        }
        Ok(())
    }
}

mod defaults {
    pub fn initial_ms() -> u64 { 500 }

    pub fn multiplier() -> f64 { 1.5 }

    pub fn randomization_factor() -> f64 { 0.5 }

    pub fn max_interval_ms() -> u64 { 60_000 }
}

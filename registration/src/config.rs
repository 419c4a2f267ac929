use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_KEY_ENV: &str = "NITRONEWS_API_KEY";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,

    #[error("batch.immediate_cap must be at least 1")]
    NoImmediateCapacity,

    #[error("batch.background_queue_capacity must be at least 1")]
    NoQueueCapacity,

    #[error("remote.base_url cannot be a base for relative paths: {0}")]
    InvalidBaseUrl(Url),
}

/// Registration service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public registration endpoint
    #[serde(default = "Listener::public")]
    pub listener: Listener,
    /// Listener for health, readiness and status
    #[serde(default = "Listener::admin")]
    pub admin_listener: Listener,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub batch: BatchPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::public(),
            admin_listener: Listener::admin(),
            remote: RemoteConfig::default(),
            retry: RetryPolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.remote.base_url.cannot_be_a_base() {
            return Err(ValidationError::InvalidBaseUrl(self.remote.base_url.clone()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ValidationError::NoAttempts);
        }
        if self.batch.immediate_cap == 0 {
            return Err(ValidationError::NoImmediateCapacity);
        }
        if self.batch.background_queue_capacity == 0 {
            return Err(ValidationError::NoQueueCapacity);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn public() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }

    fn admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Connection details for the email-marketing API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: Url,
    /// Static credential. When absent it is read from `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub user_agent: String,
    /// Per-attempt timeout for a single outbound call.
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: Url::parse("https://api.criaenvio.com/v1").expect("static url is valid"),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.into(),
            user_agent: "Neuronio-Form/1.0".into(),
            request_timeout_ms: 15_000,
        }
    }
}

impl RemoteConfig {
    /// The credential from the file, falling back to the environment. Empty
    /// strings count as missing.
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Retry and backoff applied to every outbound call.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear backoff unit after a transport failure.
    pub transport_backoff_ms: u64,
    /// Linear backoff unit after a 429.
    pub throttle_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            transport_backoff_ms: 1_000,
            throttle_backoff_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    pub fn transport_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.transport_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn throttle_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.throttle_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// How segment assignment is split between the request and the background worker.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchPolicy {
    /// Number of plan entries processed before the response is returned.
    pub immediate_cap: usize,
    pub immediate_delay_ms: u64,
    pub background_delay_ms: u64,
    pub background_queue_capacity: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            immediate_cap: 6,
            immediate_delay_ms: 1_000,
            background_delay_ms: 2_000,
            background_queue_capacity: 64,
        }
    }
}

impl BatchPolicy {
    pub fn immediate_delay(&self) -> Duration {
        Duration::from_millis(self.immediate_delay_ms)
    }

    pub fn background_delay(&self) -> Duration {
        Duration::from_millis(self.background_delay_ms)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Backoff;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_IDLE_MS: u64 = 4 * 60 * 1_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_POOL_SIZE: usize = 1;

/// Tunables of the call dispatch pipeline.
///
/// Durations are kept in milliseconds so the configuration can be loaded
/// from plain documents. With the `serde` feature every field is optional
/// when deserializing and missing fields take their default.
///
/// | Setting | Default |
/// |---|---|
/// | Request timeout | 5 seconds |
/// | Max idle time of a connection | 4 minutes |
/// | Max attempts before giving up a retry | 3 |
/// | Pool size | 1 |
/// | Max session memory hint | none |
/// | Retry delay | zero |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stashwire::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_request_timeout(Duration::from_secs(2))
///     .with_pool_size(4);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.request_timeout(), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    request_timeout_ms: u64,
    max_idle_ms: u64,
    max_attempts: u32,
    pool_size: usize,
    max_session_memory_mb: Option<u32>,
    backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_idle_ms: DEFAULT_MAX_IDLE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pool_size: DEFAULT_POOL_SIZE,
            max_session_memory_mb: None,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Sets the deadline applied to each attempt when the caller did not set one.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Sets how long a connection may stay unused before it is replaced.
    #[must_use]
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle_ms = duration_to_millis(max_idle);
        self
    }

    /// Sets the highest attempt number after which a failed attempt is still retried.
    ///
    /// With the default of 3, an always failing eligible call is attempted 4 times.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the number of connections calls are spread across.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the memory hint passed to the transport when opening a connection.
    #[must_use]
    pub fn with_max_session_memory_mb(mut self, megabytes: u32) -> Self {
        self.max_session_memory_mb = Some(megabytes);
        self
    }

    /// Sets the delay schedule between attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// The per-attempt timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The maximum idle time of a connection.
    #[must_use]
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }

    /// The maximum attempt number that may still be retried.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The number of pooled connections.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// The memory hint for new connections, in megabytes.
    #[must_use]
    pub fn max_session_memory_mb(&self) -> Option<u32> {
        self.max_session_memory_mb
    }

    /// The retry delay schedule.
    #[must_use]
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Checks that the configuration can drive a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the pool is empty or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::new("pool size must be at least 1"));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::new("request timeout must be greater than zero"));
        }

        if self.max_idle_ms == 0 {
            return Err(ConfigError::new("max idle time must be greater than zero"));
        }

        if let Some(max) = self.backoff.max_delay_ms
            && max < self.backoff.base_delay_ms
        {
            return Err(ConfigError::new("max retry delay must not be lower than the base delay"));
        }

        Ok(())
    }
}

/// Delay schedule between attempts of a retried call.
///
/// The default is a zero delay: a retry is sent as soon as the failed attempt
/// completes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackoffConfig {
    /// Shape of the schedule.
    pub kind: Backoff,
    /// Base delay in milliseconds. Zero disables delays entirely.
    pub base_delay_ms: u64,
    /// Upper bound of a single delay in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Whether delays are randomized.
    pub use_jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            kind: Backoff::Constant,
            base_delay_ms: 0,
            max_delay_ms: None,
            use_jitter: false,
        }
    }
}

/// An invalid [`ClientConfig`].
#[ohno::error]
#[display("invalid client configuration: {reason}")]
pub struct ConfigError {
    reason: String,
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

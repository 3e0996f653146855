//! Outbound HTTP configuration.
//!
//! Deserialised from the `[http]` table of the server configuration file.
//! Missing keys take their defaults; unknown keys are rejected.
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! http_version = "auto"
//! ```

use std::{ops::RangeInclusive, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Accepted values for [`HttpConfig::timeout_secs`].
pub const TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=300;

/// Accepted values for [`HttpConfig::connect_timeout_secs`].
pub const CONNECT_TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=60;

/// Timeouts and protocol preference for upstream calls.
///
/// Requests are never retried; `timeout_secs` bounds the whole exchange,
/// 30 seconds unless configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Idle keep-alive connections kept per upstream host.
    pub pool_max_idle_per_host: usize,
    /// Whole-request deadline in seconds.
    pub timeout_secs: u64,
    /// TCP + TLS handshake deadline in seconds.
    pub connect_timeout_secs: u64,
    /// Protocol used towards the upstream.
    pub http_version: HttpVersion,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { pool_max_idle_per_host: 10, timeout_secs: 30, connect_timeout_secs: 10, http_version: HttpVersion::Auto }
    }
}

impl HttpConfig {
    /// Checks both timeouts against [`TIMEOUT_SECS_RANGE`] and
    /// [`CONNECT_TIMEOUT_SECS_RANGE`].
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::ConfigError`] naming the first value out of range.
    pub fn validate(&self) -> Result<()> {
        within("timeout_secs", self.timeout_secs, &TIMEOUT_SECS_RANGE)?;
        within("connect_timeout_secs", self.connect_timeout_secs, &CONNECT_TIMEOUT_SECS_RANGE)
    }

    /// Whole-request deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Handshake deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn within(name: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SandboxError::ConfigError(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

/// Protocol used towards the upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 with prior knowledge.
    Http2,
    /// Whatever ALPN negotiates.
    #[default]
    Auto,
}

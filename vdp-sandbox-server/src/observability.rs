//! Logging setup and the health report.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). Set
//! `LOG_FORMAT=json` for one JSON object per line. Audit events from the
//! library use the `audit` target, so `RUST_LOG=info,audit=off` silences them.

use std::io;

use serde::Serialize;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_FILTER: &str = "info";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured output for terminals.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT").map(|value| Self::parse(&value)).unwrap_or_default()
    }

    /// `json` in any case selects [`LogFormat::Json`]; anything else is pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Installs the global subscriber. Call once, before anything logs.
///
/// Span close events are emitted so request handlers show their duration.
pub fn init_observability(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(layer).init(),
        LogFormat::Json => registry.with(layer.json().with_current_span(true)).init(),
    }
}

/// Overall server health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every check passed.
    Healthy,
    /// Serving, but a capability is missing (e.g. MLE disabled).
    Degraded,
    /// A check failed; requests are likely to fail too.
    Unhealthy,
}

/// Result of one check. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    /// Working.
    Pass,
    /// Working with reduced capability.
    Warn,
    /// Not working.
    Fail,
}

/// One named check in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    /// Check name, e.g. `settings_store`.
    pub name: &'static str,
    /// Outcome.
    pub status: CheckOutcome,
    /// Human-readable detail.
    pub message: String,
}

impl HealthCheck {
    /// Passing check.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, status: CheckOutcome::Pass, message: message.into() }
    }

    /// Degraded check.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn warn(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, status: CheckOutcome::Warn, message: message.into() }
    }

    /// Failed check.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self { name, status: CheckOutcome::Fail, message: message.into() }
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Worst outcome across [`checks`](Self::checks).
    pub status: HealthStatus,
    /// Server crate version.
    pub version: &'static str,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Whether MLE is enabled.
    pub mle_available: bool,
    /// Whether a credential bundle is saved.
    pub settings_saved: bool,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Builds a report whose status is derived from `checks`.
    #[must_use]
    pub fn new(uptime_secs: u64, mle_available: bool, settings_saved: bool, checks: Vec<HealthCheck>) -> Self {
        let status = match checks.iter().map(|check| check.status).max() {
            None | Some(CheckOutcome::Pass) => HealthStatus::Healthy,
            Some(CheckOutcome::Warn) => HealthStatus::Degraded,
            Some(CheckOutcome::Fail) => HealthStatus::Unhealthy,
        };
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs,
            mle_available,
            settings_saved,
            checks,
        }
    }

    /// `false` once any check failed.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.status != HealthStatus::Unhealthy
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON\n"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Pretty);
    }

    #[test]
    fn test_status_is_worst_outcome() {
        let report = HealthReport::new(0, true, false, vec![]);
        assert_eq!(report.status, HealthStatus::Healthy);

        let report = HealthReport::new(
            0,
            false,
            false,
            vec![HealthCheck::pass("settings_store", "empty"), HealthCheck::warn("mle", "off")],
        );
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.is_serving());

        let report = HealthReport::new(
            0,
            true,
            false,
            vec![HealthCheck::fail("settings_store", "unreadable"), HealthCheck::warn("mle", "off")],
        );
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!report.is_serving());
    }

    #[test]
    fn test_report_json_shape() {
        let report =
            HealthReport::new(42, false, true, vec![HealthCheck::warn("mle", "encryption disabled")]);

        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["status"], "degraded");
        assert_eq!(value["uptimeSecs"], 42);
        assert_eq!(value["mleAvailable"], false);
        assert_eq!(value["settingsSaved"], true);
        assert_eq!(
            value["checks"],
            json!([{"name": "mle", "status": "warn", "message": "encryption disabled"}])
        );
    }
}

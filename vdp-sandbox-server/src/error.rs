//! Server error types.

use std::{io, path::PathBuf};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use vdp_sandbox::SandboxError;

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`ServerConfig`](crate::config::ServerConfig).
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine setup failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Binding or serving failed.
    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),
}

/// JSON error response, `{"error": ..., "details"?: ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    /// Error with a message only.
    #[must_use]
    pub fn new(status: StatusCode, error: &str) -> Self {
        Self { status, body: json!({ "error": error }) }
    }

    /// Error with message and details.
    #[must_use]
    pub fn with_details(status: StatusCode, error: &str, details: &str) -> Self {
        Self { status, body: json!({ "error": error, "details": details }) }
    }

    /// Error with a prepared body.
    #[must_use]
    pub const fn from_body(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SandboxError> for ApiError {
    fn from(error: SandboxError) -> Self {
        let status =
            if error.is_user_error() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
        Self::new(status, &error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_bad_request() {
        let error = ApiError::from(SandboxError::MissingField("password"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.body, json!({"error": "Missing required field: password"}));
    }

    #[test]
    fn test_other_errors_are_internal() {
        let error = ApiError::from(SandboxError::SettingsError("disk full".to_owned()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_with_details() {
        let error = ApiError::with_details(StatusCode::INTERNAL_SERVER_ERROR, "Failed", "why");
        assert_eq!(error.body["details"], "why");
    }

    #[test]
    fn test_from_body_keeps_body() {
        let body = json!({"error": "Visa API request failed", "status": 503, "data": null});
        let error = ApiError::from_body(StatusCode::SERVICE_UNAVAILABLE, body.clone());

        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.body, body);
    }
}

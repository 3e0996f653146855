//! Error types for the VDP sandbox engine.
//!
//! All errors implement [`std::error::Error`] via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Validation errors** ([`SandboxError::InvalidFormat`], [`SandboxError::MissingField`],
//!   [`SandboxError::InvalidUrl`]): user-correctable, block dispatch
//! - **Signing errors** ([`SandboxError::MalformedToken`]): block dispatch
//! - **Crypto errors** ([`SandboxError::UnsupportedKeyFormat`],
//!   [`SandboxError::EncryptionFailure`], [`SandboxError::DecryptionFailure`])
//! - **Transport errors** ([`SandboxError::HttpError`], [`SandboxError::TransportError`]):
//!   no response was received
//! - **Setup errors** ([`SandboxError::RequestSetup`]): nothing was sent
//! - **Storage and configuration errors** ([`SandboxError::SettingsError`],
//!   [`SandboxError::ConfigError`])
//!
//! MLE being unconfigured is deliberately *not* an error: see
//! [`crate::mle::EncryptOutcome::Disabled`].
//!
//! # Examples
//!
//! ```
//! use vdp_sandbox::error::{Result, SandboxError};
//!
//! fn require(field: &'static str, value: &str) -> Result<()> {
//!     if value.is_empty() {
//!         return Err(SandboxError::MissingField(field));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require("password", "").is_err());
//! ```

use thiserror::Error;

use crate::keys::KeyRole;

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors that can occur while validating, signing, encrypting or dispatching.
///
/// The messages are surfaced verbatim to the developer using the sandbox, so
/// they name the offending field or key role where one exists.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum SandboxError {
    /// PEM text does not carry the BEGIN/END markers expected for its role.
    ///
    /// # Recovery
    ///
    /// Upload the correct file for the field named in the message.
    #[error("Invalid {} format", .0.field_name())]
    InvalidFormat(KeyRole),

    /// A field required by the selected authentication method is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but its value cannot be used.
    #[error("Invalid value for {field}: {reason}")]
    InvalidField {
        /// Wire name of the field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The endpoint URL could not be parsed; the request is not sent.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The assembled X-Pay-Token does not have the `xv2:<ts>:<tag>` shape.
    #[error("Malformed X-Pay-Token: {0}")]
    MalformedToken(String),

    /// The private key is neither PKCS#8 nor PKCS#1 RSA.
    ///
    /// This is a hard failure for the decrypt call that hit it.
    #[error("Unsupported private key format: {0}")]
    UnsupportedKeyFormat(String),

    /// JWE encryption failed; the outbound request is aborted.
    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    /// JWE decryption failed.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// HTTP request failed before a response was received.
    ///
    /// # Recovery
    ///
    /// Check network connectivity, the proxy settings and that the mutual TLS
    /// certificate matches the private key.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The request was sent but no response arrived.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The upstream request could not be built, e.g. the client certificate
    /// does not parse or the proxy URL is invalid. Nothing was sent.
    #[error("Error setting up upstream request: {0}")]
    RequestSetup(String),

    /// No credential bundle has been saved yet.
    #[error("Settings not found. Please save settings first.")]
    SettingsNotFound,

    /// Reading or writing the settings file failed.
    #[error("Settings store error: {0}")]
    SettingsError(String),

    /// A configuration value is out of range or unparseable.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SandboxError {
    /// Returns `true` when the request may have left the process but no
    /// response came back.
    #[must_use]
    pub const fn is_no_response(&self) -> bool {
        matches!(self, Self::HttpError(_) | Self::TransportError(_))
    }

    /// Returns `true` for errors the developer can fix by editing input.
    ///
    /// The server maps these to `400 Bad Request`.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::MissingField(_)
                | Self::InvalidField { .. }
                | Self::InvalidUrl(_)
                | Self::SettingsNotFound
        )
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        Self::SettingsError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_names_field() {
        let error = SandboxError::InvalidFormat(KeyRole::MlePrivateKey);
        assert_eq!(error.to_string(), "Invalid mlePrivateKeyPem format");
    }

    #[test]
    fn test_missing_field_message() {
        let error = SandboxError::MissingField("password");
        assert_eq!(error.to_string(), "Missing required field: password");
    }

    #[test]
    fn test_user_error_classification() {
        assert!(SandboxError::MissingField("userId").is_user_error());
        assert!(SandboxError::InvalidUrl("nope".into()).is_user_error());
        assert!(!SandboxError::EncryptionFailure("boom".into()).is_user_error());
        assert!(!SandboxError::TransportError("refused".into()).is_user_error());
    }

    #[test]
    fn test_no_response_classification() {
        assert!(SandboxError::TransportError("refused".into()).is_no_response());
        assert!(!SandboxError::RequestSetup("bad identity".into()).is_no_response());
        assert!(!SandboxError::MissingField("apiKey").is_no_response());
    }

    #[test]
    fn test_io_error_maps_to_settings_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = SandboxError::from(io);
        assert!(matches!(error, SandboxError::SettingsError(_)));
        assert!(error.to_string().contains("denied"));
    }
}

//! VDP Sandbox: request authentication and encryption for the Visa Developer Platform
//!
//! A library for exercising card-network payment APIs from a developer
//! sandbox. It stores a credential bundle, signs requests, wraps bodies in
//! JWE envelopes and proxies them upstream.
//!
//! # What does it do?
//!
//! - **Two authentication schemes**: mutual TLS with `Authorization: Basic`,
//!   or API key with an HMAC-SHA256 `X-PAY-TOKEN`
//! - **Message Level Encryption**: `RSA-OAEP-256` / `A128GCM` compact JWE,
//!   applied before signing so the token covers the ciphertext
//! - **Degrade, don't fail**: unconfigured MLE is a no-op and undecryptable
//!   responses are returned raw with an annotation
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ SettingsRepository │  saved CredentialBundle
//! └────────┬───────────┘
//!          │
//! ┌────────▼─────────────────────────────────────────────┐
//! │                 RequestOrchestrator                  │
//! │  headers ─► EnvelopeEngine ─► XPayTokenSigner ─► ... │
//! │              (encrypt)         (CanonicalRequest)    │
//! └────────┬─────────────────────────────────────────────┘
//!          │ Transport (mutual TLS, proxy, 30 s timeout)
//! ┌────────▼────────┐
//! │  Upstream API   │  sandbox / certification / production
//! └─────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## 1. Sign a request
//!
//! ```rust
//! use vdp_sandbox::xpay::{CanonicalRequest, ResourcePathMap, XPayTokenSigner};
//!
//! # fn example() -> vdp_sandbox::Result<()> {
//! let request = CanonicalRequest::build_at(
//!     1_700_000_000,
//!     "https://sandbox.api.visa.com/vdp/helloworld",
//!     "GET",
//!     "",
//!     "K1",
//!     &ResourcePathMap::visa_defaults(),
//! )?;
//! let token = XPayTokenSigner::new("secret").sign(&request)?;
//!
//! assert_eq!(request.message(), "1700000000helloworldapiKey=K1");
//! assert!(token.as_str().starts_with("xv2:1700000000:"));
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Proxy a request with saved settings
//!
//! ```rust,no_run
//! use serde_json::json;
//! use vdp_sandbox::{
//!     mle::EnvelopeEngine,
//!     orchestrator::{ProxyRequest, RequestOrchestrator},
//!     settings::FileSettingsRepository,
//!     transport::HttpTransport,
//! };
//!
//! # async fn example() -> vdp_sandbox::Result<()> {
//! let orchestrator = RequestOrchestrator::new(
//!     FileSettingsRepository::new("settings.json"),
//!     HttpTransport::new()?,
//!     EnvelopeEngine::new(true),
//! );
//!
//! let request = ProxyRequest::new("POST", "/visadirect/fundstransfer/v1/pushfundstransactions")
//!     .with_payload(json!({"amount": "124.05"}));
//! let outcome = orchestrator.execute(request).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`keys`]: PEM marker validation per key role
//! - [`xpay`]: canonical message and X-Pay-Token signing
//! - [`mle`]: envelope encryption and decryption
//! - [`settings`]: credential bundle and its persistence
//! - [`transport`]: upstream HTTP dispatch
//! - [`orchestrator`]: the request pipeline
//! - [`security`]: audit events and redaction
//!
//! # Security Considerations
//!
//! The settings file is plaintext JSON. Secrets are redacted from `Debug`
//! output and zeroized on drop, but anyone who can read the file has the
//! credentials.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`] with [`SandboxError`].
//! [`SandboxError::is_user_error`] separates input problems from failures.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from josekit, openssl and reqwest"
)]

pub mod error;
pub mod keys;
pub mod mle;
pub mod orchestrator;
pub mod security;
pub mod settings;
pub mod transport;
pub mod xpay;

pub use error::{Result, SandboxError};
pub use orchestrator::{ProxyFailure, ProxyOutcome, ProxyRequest, RequestOrchestrator};
pub use settings::{AuthMethod, CredentialBundle, SettingsRepository};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = std::marker::PhantomData::<SandboxError>;
        let _ = std::marker::PhantomData::<RequestOrchestrator<settings::InMemorySettingsRepository>>;
    }
}

//! Upstream dispatch.
//!
//! The sealed [`Transport`] trait sends one fully prepared request and
//! returns whatever the upstream answered, whatever the status code. Status
//! interpretation, decryption and error mapping belong to the
//! [`RequestOrchestrator`](crate::orchestrator::RequestOrchestrator).
//!
//! # Examples
//!
//! ```rust,no_run
//! use url::Url;
//! use vdp_sandbox::transport::{HttpConfig, HttpTransport, OutboundRequest, Transport};
//!
//! # async fn example() -> vdp_sandbox::error::Result<()> {
//! let transport = HttpTransport::with_config(&HttpConfig::default())?;
//! let url = Url::parse("https://sandbox.api.visa.com/vdp/helloworld?apiKey=K1")
//!     .map_err(|e| vdp_sandbox::SandboxError::InvalidUrl(e.to_string()))?;
//!
//! let headers = vec![("Accept".to_owned(), "application/json".to_owned())];
//! let response = transport.send(OutboundRequest::new("GET", &url, &headers)).await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::fmt;

use url::Url;

use crate::error::Result;

pub mod config;
pub mod http;
mod sealed;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Client certificate and key presented during the TLS handshake.
#[derive(Clone, Copy)]
pub struct ClientIdentity<'a> {
    /// PEM certificate (chain).
    pub certificate_pem: &'a str,
    /// PEM private key for the certificate.
    pub private_key_pem: &'a str,
}

impl fmt::Debug for ClientIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("certificate_pem_len", &self.certificate_pem.len())
            .field("private_key_pem", &"[REDACTED]")
            .finish()
    }
}

/// HTTP proxy used for the request.
#[derive(Clone)]
pub struct ProxySettings<'a> {
    /// Proxy URL, `http://host:port`.
    pub url: String,
    /// Basic auth user, if the proxy requires it.
    pub username: Option<&'a str>,
    /// Basic auth password.
    pub password: Option<&'a str>,
}

impl fmt::Debug for ProxySettings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A fully prepared upstream request.
///
/// Headers are sent in order; the URL already carries the signed query string.
#[derive(Debug, Clone)]
pub struct OutboundRequest<'a> {
    /// HTTP method, e.g. `GET`.
    pub method: &'a str,
    /// Absolute request URL.
    pub url: &'a Url,
    /// Header name/value pairs.
    pub headers: &'a [(String, String)],
    /// Request body, sent verbatim.
    pub body: Option<&'a [u8]>,
    /// Mutual TLS identity.
    pub identity: Option<ClientIdentity<'a>>,
    /// Proxy to route through.
    pub proxy: Option<ProxySettings<'a>>,
}

impl<'a> OutboundRequest<'a> {
    /// Creates a request without body, client identity or proxy.
    #[must_use]
    pub const fn new(method: &'a str, url: &'a Url, headers: &'a [(String, String)]) -> Self {
        Self { method, url, headers, body: None, identity: None, proxy: None }
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: &'a [u8]) -> Self {
        self.body = Some(body);
        self
    }

    /// Presents `identity` during the TLS handshake.
    #[must_use]
    pub fn with_identity(mut self, identity: ClientIdentity<'a>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Routes the request through `proxy`.
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxySettings<'a>) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

/// Upstream response, any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Response headers, lowercase names.
    pub headers: Vec<(String, String)>,
}

impl TransportResponse {
    /// First header value with the given name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends prepared requests upstream.
///
/// This trait is sealed: implementations handle client private keys and
/// proxy credentials, so only this crate may provide them.
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Sends `request` and returns the upstream response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::RequestSetup`](crate::SandboxError::RequestSetup)
    ///   if the request cannot be built (bad identity, proxy, header or method)
    /// - [`SandboxError::HttpError`](crate::SandboxError::HttpError) or
    ///   [`SandboxError::TransportError`](crate::SandboxError::TransportError)
    ///   if no response was received
    fn send<'a>(
        &'a self,
        request: OutboundRequest<'a>,
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

//! HTTP transport implementation.
//!
//! Plain requests share one pooled [`reqwest::Client`]. Requests that need a
//! client certificate or a proxy get a dedicated client built for that call,
//! since reqwest binds both to the client rather than the request.
//!
//! Header names are written in lowercase whatever casing the caller used.

use reqwest::{Client, ClientBuilder, Identity, Method, Proxy};
use tracing::instrument;
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{Result, SandboxError},
    transport::{ClientIdentity, OutboundRequest, ProxySettings, Transport, TransportResponse, sealed},
};

/// Allows only `http` and `https` URLs with a host.
fn validate_url(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "https" | "http") {
        return Err(SandboxError::RequestSetup(format!(
            "unsupported URL scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(SandboxError::RequestSetup(format!("URL missing host: {url}")));
    }
    Ok(())
}

/// Validates header name and value for CRLF injection prevention.
fn validate_header(name: &str, value: &str) -> Result<()> {
    if name.is_empty() || name.contains(['\r', '\n', '\0', ':']) {
        return Err(SandboxError::RequestSetup(format!("invalid header name {name:?}")));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(SandboxError::RequestSetup(format!(
            "invalid value for header {name}: control characters not allowed"
        )));
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| SandboxError::RequestSetup(format!("unsupported HTTP method: {method}")))
}

/// HTTP/1.1 and HTTP/2 transport using reqwest with rustls.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates a transport with default timeouts (30 s request, 10 s connect).
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::RequestSetup`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::ConfigError`] for out-of-range values and
    /// [`SandboxError::RequestSetup`] if the client cannot be built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        let client = Self::builder(config)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| SandboxError::RequestSetup(format!("HTTP client: {e}")))?;
        Ok(Self { client, config: config.clone() })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn builder(config: &HttpConfig) -> ClientBuilder {
        let builder = Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        }
    }

    /// Client for one request, carrying its identity and proxy.
    fn dedicated_client(
        &self,
        identity: Option<ClientIdentity<'_>>,
        proxy: Option<&ProxySettings<'_>>,
    ) -> Result<Client> {
        let mut builder = Self::builder(&self.config).pool_max_idle_per_host(0);

        if let Some(identity) = identity {
            // rustls expects certificate and key in one PEM buffer.
            let mut pem = identity.certificate_pem.trim_end().to_owned();
            pem.push('\n');
            pem.push_str(identity.private_key_pem.trim_end());
            pem.push('\n');
            let identity = Identity::from_pem(pem.as_bytes()).map_err(|e| {
                SandboxError::RequestSetup(format!("invalid client certificate or key: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        if let Some(proxy) = proxy {
            let mut upstream_proxy = Proxy::all(&proxy.url).map_err(|e| {
                SandboxError::RequestSetup(format!("invalid proxy {}: {e}", proxy.url))
            })?;
            if let (Some(username), Some(password)) = (proxy.username, proxy.password)
                && !username.is_empty()
            {
                upstream_proxy = upstream_proxy.basic_auth(username, password);
            }
            builder = builder.proxy(upstream_proxy);
        }

        builder.build().map_err(|e| SandboxError::RequestSetup(format!("HTTP client: {e}")))
    }

    #[instrument(
        skip(self, request),
        fields(
            method = request.method,
            host = request.url.host_str().unwrap_or_default(),
            path = request.url.path(),
            mutual_tls = request.identity.is_some(),
            proxied = request.proxy.is_some(),
        )
    )]
    async fn execute_request(&self, request: OutboundRequest<'_>) -> Result<TransportResponse> {
        validate_url(request.url)?;
        let method = parse_method(request.method)?;
        for (name, value) in request.headers {
            validate_header(name, value)?;
        }

        let dedicated;
        let client = if request.identity.is_some() || request.proxy.is_some() {
            dedicated = self.dedicated_client(request.identity, request.proxy.as_ref())?;
            &dedicated
        } else {
            &self.client
        };

        let mut builder = client.request(method, request.url.clone());
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_vec());
        }

        let upstream = builder.build().map_err(|e| SandboxError::RequestSetup(e.to_string()))?;
        let response = client.execute(upstream).await?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(status, body_len = body.len(), "upstream responded");
        Ok(TransportResponse { status, body, headers })
    }
}

impl Transport for HttpTransport {
    async fn send<'a>(&'a self, request: OutboundRequest<'a>) -> Result<TransportResponse> {
        self.execute_request(request).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.config.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Url {
        Url::parse(text).unwrap()
    }

    #[test]
    fn test_http_transport_new() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.protocol_name(), "http");
        assert_eq!(transport.config().timeout_secs, 30);
    }

    #[test]
    fn test_http_transport_protocol_name() {
        let http1 = HttpConfig { http_version: HttpVersion::Http1, ..Default::default() };
        assert_eq!(HttpTransport::with_config(&http1).unwrap().protocol_name(), "http/1.1");

        let http2 = HttpConfig { http_version: HttpVersion::Http2, ..Default::default() };
        assert_eq!(HttpTransport::with_config(&http2).unwrap().protocol_name(), "http/2");
    }

    #[test]
    fn test_with_config_rejects_invalid_timeout() {
        let config = HttpConfig { timeout_secs: 0, ..Default::default() };
        assert!(matches!(HttpTransport::with_config(&config), Err(SandboxError::ConfigError(_))));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url(&url("https://sandbox.api.visa.com/vdp/helloworld")).is_ok());
        assert!(validate_url(&url("http://127.0.0.1:8080/x")).is_ok());
        assert!(matches!(
            validate_url(&url("file:///etc/passwd")),
            Err(SandboxError::RequestSetup(_))
        ));
    }

    #[test]
    fn test_validate_header_rejects_crlf() {
        assert!(validate_header("Accept", "application/json").is_ok());
        assert!(validate_header("X-Evil", "a\r\nInjected: 1").is_err());
        assert!(validate_header("Bad\nName", "v").is_err());
        assert!(validate_header("", "v").is_err());
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("POST").unwrap(), Method::POST);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn test_invalid_identity_is_setup_error() {
        let transport = HttpTransport::new().unwrap();
        let identity = ClientIdentity { certificate_pem: "garbage", private_key_pem: "garbage" };
        let result = transport.dedicated_client(Some(identity), None);
        assert!(matches!(result, Err(SandboxError::RequestSetup(_))));
    }

    #[test]
    fn test_proxy_client_builds() {
        let transport = HttpTransport::new().unwrap();
        let proxy = ProxySettings {
            url: "http://proxy.local:3128".to_owned(),
            username: Some("user"),
            password: Some("pass"),
        };
        assert!(transport.dedicated_client(None, Some(&proxy)).is_ok());
    }

    #[tokio::test]
    async fn test_send_rejects_bad_header_before_dispatch() {
        let transport = HttpTransport::new().unwrap();
        let target = url("https://sandbox.api.visa.com/vdp/helloworld");
        let headers = vec![("X-Test".to_owned(), "bad\nvalue".to_owned())];

        let result = transport.send(OutboundRequest::new("GET", &target, &headers)).await;
        assert!(matches!(result, Err(SandboxError::RequestSetup(_))));
    }

    /// Accepts one connection, answers `{}` and hands back the raw request head.
    fn capture_one_request() -> (u16, std::thread::JoinHandle<String>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0_u8; 1024];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = stream.read(&mut chunk).unwrap();
                if read == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..read]);
            }
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
                )
                .unwrap();
            String::from_utf8(raw).unwrap()
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_header_names_are_lowercase_on_the_wire() {
        let (port, server) = capture_one_request();
        let config = HttpConfig { http_version: HttpVersion::Http1, ..Default::default() };
        let transport = HttpTransport::with_config(&config).unwrap();
        let target = url(&format!("http://127.0.0.1:{port}/vdp/helloworld"));
        let headers = vec![
            ("X-PAY-TOKEN".to_owned(), "xv2:1:ab".to_owned()),
            ("keyId".to_owned(), "kid-1".to_owned()),
        ];

        let response = transport.send(OutboundRequest::new("GET", &target, &headers)).await.unwrap();
        let raw = server.join().unwrap();

        assert_eq!(response.status, 200);
        assert!(raw.starts_with("GET /vdp/helloworld HTTP/1.1\r\n"), "{raw}");
        assert!(raw.contains("\r\nx-pay-token: xv2:1:ab\r\n"), "{raw}");
        assert!(raw.contains("\r\nkeyid: kid-1\r\n"), "{raw}");
        assert!(!raw.contains("X-PAY-TOKEN"), "{raw}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_no_response() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::new().unwrap();
        let target = url(&format!("http://127.0.0.1:{port}/vdp/helloworld"));
        let result = transport.send(OutboundRequest::new("GET", &target, &[])).await;

        let error = result.unwrap_err();
        assert!(error.is_no_response(), "unexpected error {error:?}");
    }
}

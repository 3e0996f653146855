//! Request orchestration.
//!
//! [`RequestOrchestrator`] drives one proxied call through its stages:
//!
//! ```text
//! Idle → BuildingHeaders → [Encrypting] → [Signing] → Dispatching → [Decrypting] → Done | Failed
//! ```
//!
//! - **BuildingHeaders**: caller headers first, then `Accept`, `Content-Type`,
//!   `User-Agent`, `Host`, `keyId` (MLE) and `Authorization: Basic` (mutual auth)
//! - **Encrypting**: body-carrying methods when the bundle has MLE keys. The
//!   envelope is what gets signed.
//! - **Signing**: X-Pay-Token only. Adds `X-PAY-TOKEN`, drops `Authorization`.
//! - **Dispatching**: one attempt, no retries. Statuses below 500 are normal
//!   outcomes; 500 and above take the upstream failure path.
//! - **Decrypting**: responses carrying `encData`. Failures are annotated,
//!   never escalated.
//!
//! # Examples
//!
//! ```rust,no_run
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
//! let request = ProxyRequest::new("GET", "/vdp/helloworld");
//! match orchestrator.execute(request).await {
//!     Ok(outcome) => println!("{} {}", outcome.status, outcome.data),
//!     Err(failure) => eprintln!("{failure} ({})", failure.status_code()),
//! }
//! # Ok(())
//! # }
//! ```

use std::{collections::BTreeMap, fmt, time::Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

mod environment;
mod error_mapping;
mod headers;

pub use environment::Environment;
pub use error_mapping::{ErrorDetails, ErrorMappings, extract_error_code};
pub use headers::{
    ACCEPT, APPLICATION_JSON, AUTHORIZATION, CONTENT_TYPE, DEFAULT_USER_AGENT, HOST, HeaderList,
    USER_AGENT,
};

use crate::{
    error::{Result, SandboxError},
    keys::KeyRole,
    mle::{DecryptOutcome, EncryptOutcome, Envelope, EnvelopeEngine, MLE_KEY_ID_HEADER},
    security::audit::{AuditEvent, AuditEventType, audit_log},
    settings::{AuthMethod, CredentialBundle, SettingsRepository},
    transport::{
        ClientIdentity, HttpTransport, OutboundRequest, ProxySettings, Transport, TransportResponse,
    },
    xpay::{
        CanonicalRequest, PathSource, ResourcePathMap, X_PAY_TOKEN, XPayTokenSigner,
        canonical::minify_body, method_carries_body,
    },
};

/// Stage of a proxied request, emitted as a `debug` trace on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    /// Not started.
    Idle,
    /// Assembling headers and credentials.
    BuildingHeaders,
    /// Wrapping the body in an MLE envelope.
    Encrypting,
    /// Computing the X-Pay-Token.
    Signing,
    /// Waiting for the upstream.
    Dispatching,
    /// Opening an encrypted response.
    Decrypting,
    /// Finished with a response.
    Done,
    /// Finished without a usable response.
    Failed,
}

impl RequestStage {
    /// Stage name used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BuildingHeaders => "building_headers",
            Self::Encrypting => "encrypting",
            Self::Signing => "signing",
            Self::Dispatching => "dispatching",
            Self::Decrypting => "decrypting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(request_id: Uuid, stage: RequestStage) {
    tracing::debug!(%request_id, %stage, "request stage");
}

/// A request to proxy upstream.
///
/// Deserializes from the `/api/proxy` body; `apiUrl` is accepted for `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Absolute URL, or a path resolved against [`environment`](Self::environment).
    #[serde(default, alias = "apiUrl")]
    pub url: String,
    /// HTTP method. Blank means `GET`.
    #[serde(default)]
    pub method: String,
    /// Request body. JSON values are sent minified; strings verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Extra headers. Engine-set headers take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Overrides the saved bundle's authentication method for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    /// Environment for relative URLs. Defaults to sandbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
}

impl ProxyRequest {
    /// Creates a request without payload or extra headers.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { url: url.into(), method: method.into(), ..Self::default() }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds an extra header.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(BTreeMap::new).insert(name.into(), value.into());
        self
    }

    /// Overrides the authentication method.
    #[must_use]
    pub const fn with_auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = Some(auth_method);
        self
    }

    /// Selects the environment for relative URLs.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Upper-cased method, `GET` when blank.
    #[must_use]
    pub fn normalized_method(&self) -> String {
        let method = self.method.trim();
        if method.is_empty() { "GET".to_owned() } else { method.to_ascii_uppercase() }
    }

    /// Checks that the request can be attempted.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::MissingField`] for a blank URL or a `POST`
    /// without payload.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(SandboxError::MissingField("url"));
        }
        let has_payload = match &self.payload {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        };
        if self.normalized_method() == "POST" && !has_payload {
            return Err(SandboxError::MissingField("payload"));
        }
        Ok(())
    }
}

/// Upstream response as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOutcome {
    /// Correlation id, also present in audit events.
    pub request_id: Uuid,
    /// Upstream HTTP status.
    pub status: u16,
    /// Response body as JSON; non-JSON bodies become a string, empty ones `null`.
    pub data: Value,
    /// Decrypted body when the response carried `encData`.
    pub decrypted_data: Option<Value>,
    /// Response headers. Repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// Whether the response body was an MLE envelope.
    pub is_encrypted: bool,
    /// `responseStatus.code` for statuses of 400 and above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Description of [`error_code`](Self::error_code), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_mapping: Option<ErrorDetails>,
    /// Why decryption of an encrypted response failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decryption_error: Option<String>,
}

/// Why a proxied request produced no normal outcome.
#[must_use = "failures should be reported to the caller"]
#[derive(Debug, Error)]
pub enum ProxyFailure {
    /// Rejected before dispatch: validation, signing or encryption failed.
    #[error(transparent)]
    Rejected(SandboxError),

    /// The upstream answered with status 500 or above.
    #[error("Visa API request failed")]
    Upstream(Box<ProxyOutcome>),

    /// The request was sent but no response arrived.
    #[error("No response received from Visa API")]
    NoResponse {
        /// Transport error text.
        details: String,
    },

    /// The upstream request could not be built. Nothing was sent.
    #[error("Error setting up Visa API request")]
    Setup {
        /// Setup error text.
        details: String,
    },
}

impl ProxyFailure {
    /// HTTP status to answer the caller with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected(error) if error.is_user_error() => 400,
            Self::Upstream(outcome) => outcome.status,
            Self::Rejected(_) | Self::NoResponse { .. } | Self::Setup { .. } => 500,
        }
    }

    /// Underlying error text, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::NoResponse { details } | Self::Setup { details } => Some(details),
            Self::Rejected(_) | Self::Upstream(_) => None,
        }
    }
}

impl From<SandboxError> for ProxyFailure {
    fn from(error: SandboxError) -> Self {
        match error {
            SandboxError::RequestSetup(details) => Self::Setup { details },
            error if error.is_no_response() => Self::NoResponse { details: error.to_string() },
            error => Self::Rejected(error),
        }
    }
}

/// Result of [`RequestOrchestrator::execute`].
pub type ProxyResult = std::result::Result<ProxyOutcome, ProxyFailure>;

/// Runs proxied requests against the saved credential bundle.
///
/// The bundle is loaded fresh for every call; nothing is cached between
/// requests.
#[derive(Debug)]
pub struct RequestOrchestrator<R, T = HttpTransport> {
    settings: R,
    transport: T,
    engine: EnvelopeEngine,
    path_map: ResourcePathMap,
    error_mappings: ErrorMappings,
    user_agent: String,
}

impl<R: SettingsRepository, T: Transport> RequestOrchestrator<R, T> {
    /// Creates an orchestrator with the default path map and error table.
    #[must_use]
    pub fn new(settings: R, transport: T, engine: EnvelopeEngine) -> Self {
        Self {
            settings,
            transport,
            engine,
            path_map: ResourcePathMap::visa_defaults(),
            error_mappings: ErrorMappings::builtin(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Replaces the resource path map.
    #[must_use]
    pub fn with_path_map(mut self, path_map: ResourcePathMap) -> Self {
        self.path_map = path_map;
        self
    }

    /// Replaces the error code table.
    #[must_use]
    pub fn with_error_mappings(mut self, error_mappings: ErrorMappings) -> Self {
        self.error_mappings = error_mappings;
        self
    }

    /// Sets the `User-Agent` sent upstream.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Settings store.
    #[must_use]
    pub const fn settings(&self) -> &R {
        &self.settings
    }

    /// Whether MLE is available at all.
    #[must_use]
    pub const fn mle_available(&self) -> bool {
        self.engine.is_enabled()
    }

    /// Loads the saved bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::SettingsError`] if the store cannot be read.
    pub async fn load_settings(&self) -> Result<Option<CredentialBundle>> {
        self.settings.load().await
    }

    /// Validates and persists `bundle`, returning the normalised bundle.
    ///
    /// # Errors
    ///
    /// Validation errors from [`CredentialBundle::validate`], or
    /// [`SandboxError::SettingsError`] if the store cannot be written.
    pub async fn save_settings(&self, bundle: CredentialBundle) -> Result<CredentialBundle> {
        let request_id = Uuid::new_v4();
        let auth_method = bundle.auth_method;
        let bundle = match bundle.into_validated() {
            Ok(bundle) => bundle,
            Err(error) => {
                crate::audit!(
                    AuditEventType::SettingsRejected,
                    request_id,
                    with_auth_method(auth_method.as_str()),
                    with_error(&error.to_string()),
                );
                return Err(error);
            }
        };

        self.settings.save(&bundle).await?;
        let mut event = AuditEvent::new(AuditEventType::SettingsSaved, request_id)
            .with_auth_method(auth_method.as_str());
        if let Some(key_id) = bundle.mle_key_id.as_deref() {
            event = event.with_key_id(key_id);
        }
        audit_log(&event);
        tracing::info!(auth_method = %auth_method, mle = bundle.has_mle(), "settings saved");
        Ok(bundle)
    }

    /// Removes the saved bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::SettingsError`] if the store cannot be written.
    pub async fn clear_settings(&self) -> Result<()> {
        self.settings.clear().await?;
        crate::audit!(AuditEventType::SettingsCleared, Uuid::new_v4());
        Ok(())
    }

    /// Decrypts a compact JWE, or an `{"encData": ...}` object, with the saved
    /// MLE private key.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::MissingField`] when there is no data or no private key
    /// - [`SandboxError::SettingsNotFound`] when nothing has been saved
    /// - [`SandboxError::UnsupportedKeyFormat`] or
    ///   [`SandboxError::DecryptionFailure`] when decryption fails
    pub async fn decrypt_stored(&self, encrypted: &Value) -> Result<Value> {
        let jwe = match encrypted {
            Value::String(text) => text.trim().to_owned(),
            other => Envelope::from_value(other).map(|envelope| envelope.enc_data).unwrap_or_default(),
        };
        if jwe.is_empty() {
            return Err(SandboxError::MissingField("encryptedData"));
        }

        let bundle = self.settings.load().await?.ok_or(SandboxError::SettingsNotFound)?;
        let private_key = bundle
            .mle_private_key_pem()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SandboxError::MissingField(KeyRole::MlePrivateKey.field_name()))?;

        let request_id = Uuid::new_v4();
        match self.engine.decrypt_compact(&jwe, private_key) {
            Ok(value) => {
                crate::audit!(AuditEventType::ResponseDecrypted, request_id);
                Ok(value)
            }
            Err(error) => {
                crate::audit!(
                    AuditEventType::DecryptionDegraded,
                    request_id,
                    with_error(&error.to_string()),
                );
                Err(error)
            }
        }
    }

    /// Runs `request` through every stage and returns the upstream outcome.
    ///
    /// # Errors
    ///
    /// See [`ProxyFailure`]. Decryption problems are reported in
    /// [`ProxyOutcome::decryption_error`] instead.
    #[instrument(
        skip(self, request),
        fields(method = %request.method, request_id = tracing::field::Empty)
    )]
    pub async fn execute(&self, request: ProxyRequest) -> ProxyResult {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));
        enter(request_id, RequestStage::Idle);

        let started = Instant::now();
        let result = self.run(request_id, &request, started).await;

        match &result {
            Ok(outcome) => {
                enter(request_id, RequestStage::Done);
                tracing::info!(status = outcome.status, "request completed");
            }
            Err(failure) => {
                enter(request_id, RequestStage::Failed);
                let message = match failure.details() {
                    Some(details) => format!("{failure}: {details}"),
                    None => failure.to_string(),
                };
                tracing::warn!(error = %message, "request failed");
                let mut event = AuditEvent::new(AuditEventType::RequestFailed, request_id)
                    .with_method(request.normalized_method())
                    .with_error(&message)
                    .with_duration(started.elapsed());
                if let ProxyFailure::Upstream(outcome) = failure {
                    event = event.with_status(outcome.status);
                }
                audit_log(&event);
            }
        }
        result
    }

    async fn run(&self, request_id: Uuid, request: &ProxyRequest, started: Instant) -> ProxyResult {
        request.validate()?;
        let bundle = self.settings.load().await?.ok_or(SandboxError::SettingsNotFound)?;
        let auth_method = request.auth_method.unwrap_or(bundle.auth_method);
        let method = request.normalized_method();
        let url = request.environment.unwrap_or_default().resolve_url(&request.url)?;
        let parsed = Url::parse(&url).map_err(|e| SandboxError::InvalidUrl(format!("{url}: {e}")))?;

        enter(request_id, RequestStage::BuildingHeaders);
        let mut headers = self.base_headers(request, &bundle, &parsed);
        if auth_method == AuthMethod::MutualAuth {
            require_field("userId", &bundle.user_id)?;
            require_field("password", bundle.password.expose())?;
            require_field(KeyRole::ServerCertificate.field_name(), &bundle.server_certificate_pem)?;
            require_field(
                KeyRole::ClientPrivateKey.field_name(),
                bundle.client_private_key_pem.expose(),
            )?;
            headers.set(AUTHORIZATION, format!("Basic {}", bundle.basic_credentials()));
        }

        let payload = request.payload.as_ref().filter(|payload| !payload.is_null());
        let mut body = match payload {
            Some(payload) if method_carries_body(&method) => {
                Some(self.prepare_body(request_id, payload, &bundle)?)
            }
            _ => None,
        };

        let dispatch_url = match auth_method {
            AuthMethod::XPayToken => {
                enter(request_id, RequestStage::Signing);
                let canonical = self.sign(
                    request_id,
                    &url,
                    &method,
                    body.as_deref().unwrap_or_default(),
                    &bundle,
                    &mut headers,
                )?;
                if body.is_some() {
                    body = Some(canonical.request_body.clone());
                }
                canonical.dispatch_url().clone()
            }
            AuthMethod::MutualAuth => parsed,
        };

        let proxy = bundle.proxy_url()?.map(|url| ProxySettings {
            url,
            username: Some(bundle.proxy_username.trim()).filter(|user| !user.is_empty()),
            password: Some(bundle.proxy_password.expose()),
        });

        enter(request_id, RequestStage::Dispatching);
        let mut outbound = OutboundRequest::new(&method, &dispatch_url, headers.as_slice());
        if let Some(body) = &body {
            outbound = outbound.with_body(body.as_bytes());
        }
        if auth_method == AuthMethod::MutualAuth {
            outbound = outbound.with_identity(ClientIdentity {
                certificate_pem: &bundle.server_certificate_pem,
                private_key_pem: bundle.client_private_key_pem.expose(),
            });
        }
        if let Some(proxy) = proxy {
            outbound = outbound.with_proxy(proxy);
        }

        let response = self.transport.send(outbound).await?;
        crate::audit!(
            AuditEventType::RequestDispatched,
            request_id,
            with_auth_method(auth_method.as_str()),
            with_method(method.as_str()),
            with_url(dispatch_url.as_str()),
            with_status(response.status),
            with_duration(started.elapsed()),
        );

        self.interpret(request_id, response, &bundle)
    }

    fn base_headers(&self, request: &ProxyRequest, bundle: &CredentialBundle, url: &Url) -> HeaderList {
        let mut headers: HeaderList = request.headers.iter().flatten().collect();
        headers.set(ACCEPT, APPLICATION_JSON);
        headers.set(CONTENT_TYPE, APPLICATION_JSON);
        headers.set(USER_AGENT, self.user_agent.as_str());
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_owned(),
            };
            headers.set(HOST, host);
        }
        if bundle.has_mle()
            && let Some(key_id) = bundle.mle_key_id.as_deref()
        {
            headers.set(MLE_KEY_ID_HEADER, key_id.trim());
        }
        headers
    }

    /// Body text to send, encrypted when the bundle has MLE keys.
    fn prepare_body(&self, request_id: Uuid, payload: &Value, bundle: &CredentialBundle) -> Result<String> {
        if !bundle.has_mle() {
            return Ok(body_text(payload));
        }

        enter(request_id, RequestStage::Encrypting);
        let outcome = self.engine.encrypt(
            payload,
            bundle.mle_public_key_pem.as_deref(),
            bundle.mle_key_id.as_deref(),
        )?;
        match outcome {
            EncryptOutcome::Encrypted(envelope) => {
                let mut event = AuditEvent::new(AuditEventType::PayloadEncrypted, request_id);
                if let Some(key_id) = bundle.mle_key_id.as_deref() {
                    event = event.with_key_id(key_id);
                }
                audit_log(&event);
                Ok(envelope.to_json_string())
            }
            EncryptOutcome::Disabled(payload) => Ok(body_text(&payload)),
        }
    }

    fn sign(
        &self,
        request_id: Uuid,
        url: &str,
        method: &str,
        body: &str,
        bundle: &CredentialBundle,
        headers: &mut HeaderList,
    ) -> Result<CanonicalRequest> {
        require_field("apiKey", &bundle.api_key)?;
        require_field("sharedSecret", bundle.shared_secret.expose())?;

        let mut canonical = CanonicalRequest::build(url, method, body, &bundle.api_key, &self.path_map)?;
        let override_path = bundle.resource_path_override.trim();
        if canonical.path_source == PathSource::Unmapped && !override_path.is_empty() {
            canonical = canonical.with_resource_path(override_path);
        }

        let token = XPayTokenSigner::new(bundle.shared_secret.expose()).sign(&canonical)?;
        headers.remove(AUTHORIZATION);
        headers.set(X_PAY_TOKEN, token.as_str());

        crate::audit!(
            AuditEventType::TokenSigned,
            request_id,
            with_auth_method(AuthMethod::XPayToken.as_str()),
            with_url(canonical.dispatch_url().as_str()),
        );
        Ok(canonical)
    }

    fn interpret(
        &self,
        request_id: Uuid,
        response: TransportResponse,
        bundle: &CredentialBundle,
    ) -> ProxyResult {
        let data = parse_body(&response.body);
        let is_encrypted = Envelope::from_value(&data).is_some();

        let mut decrypted_data = None;
        let mut decryption_error = None;
        if is_encrypted {
            enter(request_id, RequestStage::Decrypting);
            match self.engine.decrypt(data.clone(), bundle.mle_private_key_pem()) {
                Ok(DecryptOutcome::Decrypted(value)) => {
                    crate::audit!(AuditEventType::ResponseDecrypted, request_id);
                    decrypted_data = Some(value);
                }
                Ok(DecryptOutcome::Disabled(_)) => {}
                Ok(DecryptOutcome::Failed { reason, .. }) => decryption_error = Some(reason),
                Err(error) => decryption_error = Some(error.to_string()),
            }
            if let Some(reason) = &decryption_error {
                tracing::warn!(%request_id, error = %reason, "keeping encrypted response body");
                crate::audit!(AuditEventType::DecryptionDegraded, request_id, with_error(reason));
            }
        }

        let error_code = if response.status >= 400 {
            extract_error_code(&data).or_else(|| decrypted_data.as_ref().and_then(extract_error_code))
        } else {
            None
        };
        let error_mapping =
            error_code.as_deref().and_then(|code| self.error_mappings.lookup(code)).cloned();

        let outcome = ProxyOutcome {
            request_id,
            status: response.status,
            data,
            decrypted_data,
            headers: collect_headers(response.headers),
            is_encrypted,
            error_code,
            error_mapping,
            decryption_error,
        };

        if outcome.status >= 500 { Err(ProxyFailure::Upstream(Box::new(outcome))) } else { Ok(outcome) }
    }
}

fn require_field(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() { Err(SandboxError::MissingField(field)) } else { Ok(()) }
}

/// Strings are sent as given (minus JSON whitespace); other values as compact JSON.
fn body_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => minify_body(text),
        other => other.to_string(),
    }
}

fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn collect_headers(headers: Vec<(String, String)>) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        collected
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

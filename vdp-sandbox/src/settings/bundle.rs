//! Credential bundle model and validation.

use std::fmt;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use serde::{Deserialize, Deserializer, Serialize};

use super::SecretString;
use crate::{
    error::{Result, SandboxError},
    keys::{KeyRole, validate_key_format},
};

/// Authentication scheme applied to outbound requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethod {
    /// Mutual TLS plus HTTP Basic `userId:password`.
    #[default]
    #[serde(rename = "mutualAuth")]
    MutualAuth,
    /// API key query parameter plus `X-PAY-TOKEN` HMAC header.
    #[serde(rename = "xpayToken", alias = "xPayToken")]
    XPayToken,
}

impl AuthMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MutualAuth => "mutualAuth",
            Self::XPayToken => "xpayToken",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for one upstream account.
///
/// Field names follow the settings JSON. Older settings files written with
/// `sslServerCert`, `sslClientKey`, `keyId`, `mleServerKey`, `mleClientKey`
/// and `resourcePath` load unchanged.
///
/// Secret fields are [`SecretString`]s: redacted from `Debug` output and
/// wiped from memory on drop.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::settings::{AuthMethod, CredentialBundle};
///
/// let bundle = CredentialBundle {
///     auth_method: AuthMethod::XPayToken,
///     api_key: "K1".to_owned(),
///     shared_secret: "secret".into(),
///     resource_path_override: "helloworld".to_owned(),
///     ..CredentialBundle::default()
/// };
/// let bundle = bundle.into_validated()?;
/// assert!(!bundle.has_mle());
/// # Ok::<(), vdp_sandbox::SandboxError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    /// Selected authentication scheme.
    #[serde(default)]
    pub auth_method: AuthMethod,

    /// Basic auth user id (mutual auth).
    #[serde(default)]
    pub user_id: String,
    /// Basic auth password (mutual auth).
    #[serde(default)]
    pub password: SecretString,
    /// Client certificate presented during the TLS handshake (mutual auth).
    #[serde(default, alias = "sslServerCert")]
    pub server_certificate_pem: String,
    /// Private key for [`server_certificate_pem`](Self::server_certificate_pem).
    #[serde(default, alias = "sslClientKey")]
    pub client_private_key_pem: SecretString,

    /// API key injected as the `apiKey` query parameter (X-Pay-Token).
    #[serde(default)]
    pub api_key: String,
    /// HMAC secret for the X-Pay-Token (X-Pay-Token).
    #[serde(default)]
    pub shared_secret: SecretString,
    /// Resource path used when the URL path matches no known prefix.
    #[serde(default, alias = "resourcePath")]
    pub resource_path_override: String,

    /// MLE key identifier, sent as JWE `kid` and `keyId` header.
    #[serde(default, alias = "keyId", skip_serializing_if = "Option::is_none")]
    pub mle_key_id: Option<String>,
    /// Upstream MLE public key or certificate.
    #[serde(default, alias = "mleServerKey", skip_serializing_if = "Option::is_none")]
    pub mle_public_key_pem: Option<String>,
    /// Client MLE private key.
    #[serde(default, alias = "mleClientKey", skip_serializing_if = "Option::is_none")]
    pub mle_private_key_pem: Option<SecretString>,

    /// Route outbound requests through an HTTP proxy.
    #[serde(default)]
    pub use_proxy: bool,
    /// Proxy host name.
    #[serde(default)]
    pub proxy_host: String,
    /// Proxy port, as entered. Numbers and strings are both accepted.
    #[serde(default, deserialize_with = "string_or_number")]
    pub proxy_port: String,
    /// Proxy basic auth user.
    #[serde(default)]
    pub proxy_username: String,
    /// Proxy basic auth password.
    #[serde(default)]
    pub proxy_password: SecretString,
}

impl CredentialBundle {
    /// Normalises then validates the bundle, ready to persist.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn into_validated(self) -> Result<Self> {
        let bundle = self.normalized();
        bundle.validate()?;
        Ok(bundle)
    }

    /// Clears the fields of the authentication method that is not selected
    /// and turns blank MLE fields into `None`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        match self.auth_method {
            AuthMethod::MutualAuth => {
                self.api_key.clear();
                self.shared_secret = SecretString::default();
                self.resource_path_override.clear();
            }
            AuthMethod::XPayToken => {
                self.user_id.clear();
                self.password = SecretString::default();
                self.server_certificate_pem.clear();
                self.client_private_key_pem = SecretString::default();
            }
        }
        for field in [&mut self.mle_key_id, &mut self.mle_public_key_pem] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        if self.mle_private_key_pem.as_ref().is_some_and(SecretString::is_blank) {
            self.mle_private_key_pem = None;
        }
        self
    }

    /// Checks the bundle against the rules for its authentication method.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::MissingField`] naming the first empty required field
    /// - [`SandboxError::InvalidFormat`] when a PEM field has the wrong markers
    /// - [`SandboxError::InvalidField`] for an unparseable proxy port
    pub fn validate(&self) -> Result<()> {
        match self.auth_method {
            AuthMethod::MutualAuth => {
                require("userId", &self.user_id)?;
                require("password", self.password.expose())?;
                require(KeyRole::ServerCertificate.field_name(), &self.server_certificate_pem)?;
                require(KeyRole::ClientPrivateKey.field_name(), self.client_private_key_pem.expose())?;
                validate_key_format(&self.server_certificate_pem, KeyRole::ServerCertificate)?;
                validate_key_format(
                    self.client_private_key_pem.expose(),
                    KeyRole::ClientPrivateKey,
                )?;
            }
            AuthMethod::XPayToken => {
                require("apiKey", &self.api_key)?;
                require("sharedSecret", self.shared_secret.expose())?;
                require("resourcePathOverride", &self.resource_path_override)?;
            }
        }

        let any_mle = !blank(self.mle_key_id.as_deref())
            || !blank(self.mle_public_key_pem.as_deref())
            || !blank(self.mle_private_key_pem());
        if any_mle {
            require("mleKeyId", self.mle_key_id.as_deref().unwrap_or_default())?;
            let public = self.mle_public_key_pem.as_deref().unwrap_or_default();
            let private = self.mle_private_key_pem().unwrap_or_default();
            require(KeyRole::MlePublicKey.field_name(), public)?;
            require(KeyRole::MlePrivateKey.field_name(), private)?;
            validate_key_format(public, KeyRole::MlePublicKey)?;
            validate_key_format(private, KeyRole::MlePrivateKey)?;
        }

        if self.use_proxy {
            require("proxyHost", &self.proxy_host)?;
            require("proxyPort", &self.proxy_port)?;
            self.proxy_port_number()?;
        }

        Ok(())
    }

    /// Returns `true` when a complete MLE key set is present.
    #[must_use]
    pub fn has_mle(&self) -> bool {
        !blank(self.mle_key_id.as_deref())
            && !blank(self.mle_public_key_pem.as_deref())
            && !blank(self.mle_private_key_pem())
    }

    /// Client MLE private key, if set.
    #[must_use]
    pub fn mle_private_key_pem(&self) -> Option<&str> {
        self.mle_private_key_pem.as_ref().map(SecretString::expose)
    }

    /// `Authorization: Basic` credential, `base64(userId:password)`.
    #[must_use]
    pub fn basic_credentials(&self) -> String {
        BASE64_STANDARD.encode(format!("{}:{}", self.user_id, self.password.expose()))
    }

    /// Parsed proxy port.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidField`] unless the port is in `1..=65535`.
    pub fn proxy_port_number(&self) -> Result<u16> {
        match self.proxy_port.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(SandboxError::InvalidField {
                field: "proxyPort",
                reason: format!("{:?} is not a TCP port", self.proxy_port),
            }),
        }
    }

    /// Proxy URL (`http://host:port`) when proxying is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidField`] for an invalid port.
    pub fn proxy_url(&self) -> Result<Option<String>> {
        if !self.use_proxy || self.proxy_host.trim().is_empty() {
            return Ok(None);
        }
        let port = self.proxy_port_number()?;
        let host = self.proxy_host.trim();
        let host = host
            .strip_prefix("http://")
            .or_else(|| host.strip_prefix("https://"))
            .unwrap_or(host);
        Ok(Some(format!("http://{host}:{port}")))
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() { Err(SandboxError::MissingField(field)) } else { Ok(()) }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
        Missing(()),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
        Port::Missing(()) => String::new(),
    })
}

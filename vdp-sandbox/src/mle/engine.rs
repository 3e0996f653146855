//! JWE envelope encryption and decryption.

use std::time::SystemTime;

use josekit::jwe::{self, JweHeader, RSA_OAEP_256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::keys::{decryption_key_pem, encryption_key_pem};
use crate::{
    error::{Result, SandboxError},
    xpay::canonical::since_epoch,
};

/// Key management algorithm in the protected header.
pub const ALGORITHM: &str = "RSA-OAEP-256";
/// Content encryption algorithm in the protected header.
pub const CONTENT_ENCRYPTION: &str = "A128GCM";
/// JSON field carrying the compact JWE.
pub const ENC_DATA: &str = "encData";

/// `{"encData": "<compact JWE>"}` wrapper sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Compact JWE serialization (five dot-separated parts).
    #[serde(rename = "encData")]
    pub enc_data: String,
}

impl Envelope {
    /// Extracts an envelope from a JSON value carrying a string `encData` field.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .get(ENC_DATA)
            .and_then(Value::as_str)
            .map(|jwe| Self { enc_data: jwe.to_owned() })
    }

    /// JSON text of the envelope; this is the string that gets signed and sent.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::json!({ ENC_DATA: self.enc_data }).to_string()
    }

    /// JSON value of the envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ ENC_DATA: self.enc_data })
    }
}

/// Result of [`EnvelopeEngine::encrypt`].
#[derive(Debug, Clone, PartialEq)]
pub enum EncryptOutcome {
    /// The payload was wrapped in an envelope.
    Encrypted(Envelope),
    /// MLE is unavailable or not configured; the payload is returned unchanged.
    Disabled(Value),
}

impl EncryptOutcome {
    /// Returns `true` when the payload was encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    /// Body value to send upstream.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Encrypted(envelope) => envelope.to_value(),
            Self::Disabled(payload) => payload,
        }
    }
}

/// Result of [`EnvelopeEngine::decrypt`].
///
/// Decryption failures degrade to [`DecryptOutcome::Failed`] rather than an
/// error so the caller can still show the raw upstream response.
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptOutcome {
    /// Plaintext, parsed as JSON when possible, otherwise a JSON string.
    Decrypted(Value),
    /// Nothing to decrypt, or MLE unavailable; the input is returned unchanged.
    Disabled(Value),
    /// Decryption was attempted and failed.
    Failed {
        /// The value that could not be decrypted.
        original: Value,
        /// Why decryption failed.
        reason: String,
    },
}

impl DecryptOutcome {
    /// Decrypted value, if any.
    #[must_use]
    pub const fn decrypted(&self) -> Option<&Value> {
        match self {
            Self::Decrypted(value) => Some(value),
            Self::Disabled(_) | Self::Failed { .. } => None,
        }
    }
}

/// Message Level Encryption engine.
///
/// `mle_enabled` is decided once at startup. When it is `false` every
/// operation is a no-op that returns its input.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use vdp_sandbox::mle::{EncryptOutcome, EnvelopeEngine};
///
/// let engine = EnvelopeEngine::new(true);
/// let outcome = engine.encrypt(&json!({"amount": "10"}), None, None)?;
/// assert!(matches!(outcome, EncryptOutcome::Disabled(_)));
/// # Ok::<(), vdp_sandbox::SandboxError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeEngine {
    mle_enabled: bool,
}

impl EnvelopeEngine {
    /// Creates an engine with the given capability flag.
    #[must_use]
    pub const fn new(mle_enabled: bool) -> Self {
        Self { mle_enabled }
    }

    /// Whether MLE can be performed at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.mle_enabled
    }

    /// Encrypts `payload` for the holder of `public_key_pem`.
    ///
    /// String payloads are encrypted verbatim; anything else is serialised
    /// to compact JSON first. The protected header carries `kid` and an
    /// `iat` in epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::EncryptionFailure`] if the key cannot be
    /// loaded or JWE serialisation fails. A missing key or key id is not an
    /// error and yields [`EncryptOutcome::Disabled`].
    #[instrument(skip(self, payload, public_key_pem), fields(
        mle_enabled = self.mle_enabled,
        has_key = public_key_pem.is_some_and(|k| !k.is_empty()),
        key_id = key_id.unwrap_or_default(),
    ))]
    pub fn encrypt(
        &self,
        payload: &Value,
        public_key_pem: Option<&str>,
        key_id: Option<&str>,
    ) -> Result<EncryptOutcome> {
        let (Some(public_key_pem), Some(key_id)) =
            (non_empty(public_key_pem), non_empty(key_id))
        else {
            tracing::info!("MLE not configured, sending payload unencrypted");
            return Ok(EncryptOutcome::Disabled(payload.clone()));
        };
        if !self.mle_enabled {
            tracing::info!("MLE unavailable, sending payload unencrypted");
            return Ok(EncryptOutcome::Disabled(payload.clone()));
        }

        let plaintext = match payload {
            Value::String(text) => text.clone(),
            other => serde_json::to_string(other)
                .map_err(|e| SandboxError::EncryptionFailure(format!("payload encoding: {e}")))?,
        };

        let key_pem = encryption_key_pem(public_key_pem)?;
        let encrypter = RSA_OAEP_256
            .encrypter_from_pem(&key_pem)
            .map_err(|e| SandboxError::EncryptionFailure(format!("failed to load MLE public key: {e}")))?;

        let mut header = JweHeader::new();
        header.set_algorithm(ALGORITHM);
        header.set_content_encryption(CONTENT_ENCRYPTION);
        header.set_key_id(key_id);
        header
            .set_claim("iat", Some(Value::from(epoch_millis(SystemTime::now())?)))
            .map_err(|e| SandboxError::EncryptionFailure(format!("header: {e}")))?;

        let jwe = jwe::serialize_compact(plaintext.as_bytes(), &header, &encrypter)
            .map_err(|e| SandboxError::EncryptionFailure(format!("JWE encryption failed: {e}")))?;

        tracing::debug!(jwe_len = jwe.len(), "payload encrypted");
        Ok(EncryptOutcome::Encrypted(Envelope { enc_data: jwe }))
    }

    /// Decrypts a response value carrying an `encData` field.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::UnsupportedKeyFormat`] if the private key is
    /// neither PKCS#8 nor PKCS#1. Every other failure is reported as
    /// [`DecryptOutcome::Failed`].
    #[instrument(skip(self, response, private_key_pem), fields(
        mle_enabled = self.mle_enabled,
        has_key = private_key_pem.is_some_and(|k| !k.is_empty()),
    ))]
    pub fn decrypt(&self, response: Value, private_key_pem: Option<&str>) -> Result<DecryptOutcome> {
        if !self.mle_enabled {
            return Ok(DecryptOutcome::Disabled(response));
        }
        let Some(envelope) = Envelope::from_value(&response) else {
            return Ok(DecryptOutcome::Disabled(response));
        };
        let Some(private_key_pem) = non_empty(private_key_pem) else {
            tracing::info!("encrypted response but no MLE private key configured");
            return Ok(DecryptOutcome::Disabled(response));
        };

        match self.decrypt_compact(&envelope.enc_data, private_key_pem) {
            Ok(value) => Ok(DecryptOutcome::Decrypted(value)),
            Err(error @ SandboxError::UnsupportedKeyFormat(_)) => Err(error),
            Err(error) => {
                tracing::warn!(error = %error, "response decryption failed, returning raw body");
                Ok(DecryptOutcome::Failed { original: response, reason: error.to_string() })
            }
        }
    }

    /// Decrypts a bare compact JWE string.
    ///
    /// The plaintext is parsed as JSON; text that is not JSON comes back as
    /// a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::UnsupportedKeyFormat`] for unusable key
    /// encodings and [`SandboxError::DecryptionFailure`] for everything else.
    pub fn decrypt_compact(&self, jwe: &str, private_key_pem: &str) -> Result<Value> {
        if !self.mle_enabled {
            return Err(SandboxError::DecryptionFailure(
                "message level encryption is not available".to_owned(),
            ));
        }

        let key_pem = decryption_key_pem(private_key_pem)?;
        let decrypter = RSA_OAEP_256.decrypter_from_pem(&key_pem).map_err(|e| {
            SandboxError::DecryptionFailure(format!("failed to load MLE private key: {e}"))
        })?;
        let (plaintext, _header) = jwe::deserialize_compact(jwe.trim(), &decrypter)
            .map_err(|e| SandboxError::DecryptionFailure(e.to_string()))?;

        let text = String::from_utf8_lossy(&plaintext);
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned())))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn epoch_millis(now: SystemTime) -> Result<u64> {
    let elapsed = since_epoch(now)?;
    u64::try_from(elapsed.as_millis())
        .map_err(|e| SandboxError::RequestSetup(format!("unix time in milliseconds overflows: {e}")))
}

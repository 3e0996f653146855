//! Message Level Encryption (MLE).
//!
//! Request bodies are wrapped in a compact JWE (`RSA-OAEP-256` key
//! management, `A128GCM` content encryption) and sent as
//! `{"encData": "<jwe>"}`. Encrypted responses use the same envelope and are
//! opened with the client MLE private key.
//!
//! Encryption happens before X-Pay-Token signing, so the token covers the
//! ciphertext envelope rather than the plaintext.
//!
//! # Outcomes
//!
//! MLE being unconfigured is a normal state, not an error:
//!
//! - [`EncryptOutcome::Disabled`] returns the payload unchanged
//! - [`DecryptOutcome::Disabled`] returns the response unchanged
//! - [`DecryptOutcome::Failed`] keeps the raw response when decryption fails
//!
//! Only an unusable private-key encoding is a hard error
//! ([`SandboxError::UnsupportedKeyFormat`](crate::SandboxError::UnsupportedKeyFormat)).

mod engine;
mod keys;

pub use engine::{
    ALGORITHM, CONTENT_ENCRYPTION, DecryptOutcome, ENC_DATA, EncryptOutcome, Envelope,
    EnvelopeEngine,
};

/// Request header naming the MLE key pair.
pub const MLE_KEY_ID_HEADER: &str = "keyId";

//! X-Pay-Token generation with HMAC-SHA256.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::instrument;
use zeroize::Zeroize;

use super::canonical::CanonicalRequest;
use crate::error::{Result, SandboxError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the token. Casing is fixed.
pub const X_PAY_TOKEN: &str = "X-PAY-TOKEN";

/// Token version prefix.
pub const TOKEN_VERSION: &str = "xv2";

/// A signed `xv2:<timestamp>:<hex tag>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    value: String,
    timestamp_secs: u64,
}

impl SignedToken {
    /// Parses and checks the shape of an existing token.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::MalformedToken`] unless the token has exactly
    /// three colon-separated parts, version `xv2` and a numeric timestamp.
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(':').collect();
        let [version, timestamp, tag] = parts.as_slice() else {
            return Err(SandboxError::MalformedToken(format!(
                "expected 3 parts, found {}",
                parts.len()
            )));
        };
        if *version != TOKEN_VERSION {
            return Err(SandboxError::MalformedToken(format!("unexpected version {version:?}")));
        }
        if tag.is_empty() {
            return Err(SandboxError::MalformedToken("empty signature".to_owned()));
        }
        let timestamp_secs = timestamp
            .parse::<u64>()
            .map_err(|_| SandboxError::MalformedToken(format!("bad timestamp {timestamp:?}")))?;

        Ok(Self { value: value.to_owned(), timestamp_secs })
    }

    /// Full header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Timestamp embedded in the token.
    #[must_use]
    pub const fn timestamp_secs(&self) -> u64 {
        self.timestamp_secs
    }

    /// Lowercase hex HMAC tag.
    #[must_use]
    pub fn signature_hex(&self) -> &str {
        self.value.rsplit(':').next().unwrap_or_default()
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<SignedToken> for String {
    fn from(token: SignedToken) -> Self {
        token.value
    }
}

/// Signs canonical requests with the shared secret.
///
/// The secret is wiped from memory when the signer is dropped.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::xpay::{CanonicalRequest, ResourcePathMap, XPayTokenSigner};
///
/// let request = CanonicalRequest::build_at(
///     1_700_000_000,
///     "https://sandbox.api.visa.com/vdp/helloworld",
///     "GET",
///     "",
///     "K1",
///     &ResourcePathMap::default(),
/// )?;
/// let token = XPayTokenSigner::new("secret").sign(&request)?;
/// assert!(token.as_str().starts_with("xv2:1700000000:"));
/// # Ok::<(), vdp_sandbox::SandboxError>(())
/// ```
pub struct XPayTokenSigner {
    secret: String,
}

impl XPayTokenSigner {
    /// Creates a signer for the given shared secret.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn new(shared_secret: impl Into<String>) -> Self {
        Self { secret: shared_secret.into() }
    }

    /// Signs `request`, using its own timestamp in the token.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::MalformedToken`] if the assembled token fails
    /// the shape check.
    #[instrument(skip(self, request), fields(
        timestamp = request.timestamp_secs,
        resource_path = %request.resource_path,
        body_len = request.request_body.len(),
    ))]
    pub fn sign(&self, request: &CanonicalRequest) -> Result<SignedToken> {
        let tag = self.sign_message(&request.message())?;
        let token = SignedToken::parse(&format!("{TOKEN_VERSION}:{}:{tag}", request.timestamp_secs))?;
        tracing::debug!("x-pay-token generated");
        Ok(token)
    }

    /// Lowercase hex HMAC-SHA256 of `message` under the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::MalformedToken`] if the MAC cannot be keyed.
    pub fn sign_message(&self, message: &str) -> Result<String> {
        // HMAC accepts keys of any length; this only fails on API misuse.
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SandboxError::MalformedToken(format!("invalid HMAC key: {e}")))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for XPayTokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPayTokenSigner").field("secret", &"[REDACTED]").finish()
    }
}

impl Drop for XPayTokenSigner {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpay::ResourcePathMap;

    #[test]
    fn test_hmac_known_vector() {
        let signer = XPayTokenSigner::new("secret");
        assert_eq!(
            signer.sign_message("test").unwrap(),
            "0329a06b62cd16b33eb6792be8c60b158d89a2ee3a876fce9a881ebb488c0914"
        );
    }

    #[test]
    fn test_helloworld_token() {
        let request = CanonicalRequest::build_at(
            1_700_000_000,
            "https://sandbox.api.visa.com/vdp/helloworld?x=2&a=1",
            "GET",
            "",
            "K1",
            &ResourcePathMap::new([("/vdp/", "")]),
        )
        .unwrap();

        let token = XPayTokenSigner::new("secret").sign(&request).unwrap();
        assert_eq!(
            token.as_str(),
            "xv2:1700000000:95f6f8ac3ec141d59273d2d0c9fa252fabecf99bc4cc7eac92720afbf3bbe032"
        );
        assert_eq!(token.timestamp_secs(), 1_700_000_000);
    }

    #[test]
    fn test_post_token() {
        let request = CanonicalRequest::build_at(
            1_700_000_000,
            "https://sandbox.api.visa.com/vdp/payments/v1/authorize",
            "POST",
            r#"{ "amount": "10" }"#,
            "K1",
            &ResourcePathMap::default(),
        )
        .unwrap();

        let token = XPayTokenSigner::new("K1secret").sign(&request).unwrap();
        assert_eq!(
            token.signature_hex(),
            "9a8ffd35c71ad7c1f5ce739567ab741c5c957c31acf4ebc27237337e242aa42c"
        );
    }

    #[test]
    fn test_token_timestamp_matches_request() {
        let request = CanonicalRequest::build_at(
            42,
            "https://sandbox.api.visa.com/vdp/helloworld",
            "GET",
            "",
            "K",
            &ResourcePathMap::default(),
        )
        .unwrap();
        let token = XPayTokenSigner::new("s").sign(&request).unwrap();
        assert!(token.as_str().starts_with("xv2:42:"));
    }

    #[test]
    fn test_empty_secret_still_signs() {
        let tag = XPayTokenSigner::new("").sign_message("message").unwrap();
        assert_eq!(tag.len(), 64);
    }

    #[test]
    fn test_parse_rejects_wrong_part_count() {
        assert!(matches!(SignedToken::parse("xv2:1"), Err(SandboxError::MalformedToken(_))));
        assert!(matches!(
            SignedToken::parse("xv2:1:ab:cd"),
            Err(SandboxError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        assert!(SignedToken::parse("xv1:1:abcd").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric_timestamp() {
        assert!(SignedToken::parse("xv2:now:abcd").is_err());
    }

    #[test]
    fn test_parse_accepts_valid_token() {
        let token = SignedToken::parse("xv2:1700000000:abcdef").unwrap();
        assert_eq!(token.timestamp_secs(), 1_700_000_000);
        assert_eq!(token.signature_hex(), "abcdef");
        assert_eq!(token.to_string(), "xv2:1700000000:abcdef");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = XPayTokenSigner::new("super-secret-value");
        let debug = format!("{signer:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}

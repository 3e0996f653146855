//! X-Pay-Token authentication.
//!
//! Requests using API-key authentication carry an `X-PAY-TOKEN` header
//! computed as:
//!
//! ```text
//! xv2:<ts>:hex(HMAC-SHA256(sharedSecret, ts + resourcePath + queryString + body))
//! ```
//!
//! [`CanonicalRequest`] assembles the signed message and the dispatch URL;
//! [`XPayTokenSigner`] turns it into a [`SignedToken`]. Both take the
//! timestamp from the same value so the two can never disagree.

pub(crate) mod canonical;
mod signer;

pub use canonical::{
    API_KEY_PARAM, CanonicalRequest, PathSource, ResolvedPath, ResourcePathMap,
    method_carries_body, unix_timestamp_secs,
};
pub use signer::{SignedToken, TOKEN_VERSION, X_PAY_TOKEN, XPayTokenSigner};

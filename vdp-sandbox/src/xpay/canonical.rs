//! Canonical message construction for X-Pay-Token signing.
//!
//! The canonical message is the byte-exact concatenation
//! `timestamp + resourcePath + queryString + requestBody` with no separators.

use std::time::{Duration, SystemTime};

use tracing::instrument;
use url::Url;

use crate::error::{Result, SandboxError};

/// Query parameter injected into every signed request.
pub const API_KEY_PARAM: &str = "apiKey";

/// Prefixes stripped when the mapping table has no matching entry.
const LEGACY_PREFIXES: &[&str] = &["/vdp/", "/visadirect/"];

/// How the resource path of a request was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    /// Longest-prefix match in the mapping table.
    Mapped,
    /// Hard-coded `/vdp/` or `/visadirect/` prefix stripped.
    Legacy,
    /// No rule applied; the URL path is used as-is.
    Unmapped,
}

/// Resource path after mapping, with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path fed into the canonical message.
    pub path: String,
    /// Rule that produced [`path`](Self::path).
    pub source: PathSource,
}

/// Lookup table from API base paths to their X-Pay-Token resource-path prefix.
///
/// Entries are matched by longest prefix. The replacement is usually empty,
/// which turns `/vdp/helloworld` into `helloworld`.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::xpay::{PathSource, ResourcePathMap};
///
/// let map = ResourcePathMap::new([("/vdp/", "")]);
/// let resolved = map.resolve("/vdp/helloworld");
/// assert_eq!(resolved.path, "helloworld");
/// assert_eq!(resolved.source, PathSource::Mapped);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePathMap {
    // Sorted by prefix length, longest first.
    entries: Vec<(String, String)>,
}

impl ResourcePathMap {
    /// Creates a table from `(prefix, replacement)` pairs.
    #[must_use]
    pub fn new<I, P, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        let mut entries: Vec<(String, String)> =
            entries.into_iter().map(|(p, r)| (p.into(), r.into())).collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Table with no entries; only the legacy prefixes apply.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Known Visa Developer Platform product base paths.
    #[must_use]
    pub fn visa_defaults() -> Self {
        Self::new([
            ("/vdp/", ""),
            ("/visadirect/", ""),
            ("/cybersource/", ""),
            ("/forexrates/", ""),
            ("/paai/", ""),
            ("/visapayouts/", ""),
            ("/vctc/", ""),
            ("/dcas/", ""),
        ])
    }

    /// Number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maps a URL path to its resource path.
    ///
    /// The table is consulted first; the legacy `/vdp/` and `/visadirect/`
    /// prefixes are only stripped when no table entry matches.
    #[must_use]
    pub fn resolve(&self, path: &str) -> ResolvedPath {
        if let Some((prefix, replacement)) =
            self.entries.iter().find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return ResolvedPath {
                path: format!("{replacement}{}", &path[prefix.len()..]),
                source: PathSource::Mapped,
            };
        }

        if let Some(prefix) = LEGACY_PREFIXES.iter().find(|prefix| path.starts_with(*prefix)) {
            return ResolvedPath { path: path[prefix.len()..].to_owned(), source: PathSource::Legacy };
        }

        ResolvedPath { path: path.to_owned(), source: PathSource::Unmapped }
    }
}

impl Default for ResourcePathMap {
    fn default() -> Self {
        Self::visa_defaults()
    }
}

/// Returns `true` for methods whose body is signed and eligible for MLE.
#[must_use]
pub fn method_carries_body(method: &str) -> bool {
    method.eq_ignore_ascii_case("POST") || method.eq_ignore_ascii_case("PUT")
}

/// Current unix time in whole seconds.
///
/// # Errors
///
/// Returns [`SandboxError::RequestSetup`] if the system clock is before the epoch.
pub fn unix_timestamp_secs() -> Result<u64> {
    since_epoch(SystemTime::now()).map(|elapsed| elapsed.as_secs())
}

/// Time elapsed between the unix epoch and `now`.
pub(crate) fn since_epoch(now: SystemTime) -> Result<Duration> {
    now.duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|e| SandboxError::RequestSetup(format!("system clock is before the unix epoch: {e}")))
}

/// Request attributes fed into the X-Pay-Token HMAC.
///
/// Built once per outbound call. The same value must be passed to the
/// [`XPayTokenSigner`](super::XPayTokenSigner) so the timestamp in the token
/// and in the signed message cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Unix time in seconds at build time.
    pub timestamp_secs: u64,
    /// Resource path after mapping.
    pub resource_path: String,
    /// Sorted query string including `apiKey`, without leading `?`.
    pub query_string: String,
    /// Minified JSON body, envelope JSON when MLE applies, or empty.
    pub request_body: String,
    /// Rule used to derive [`resource_path`](Self::resource_path).
    pub path_source: PathSource,
    dispatch_url: Url,
}

impl CanonicalRequest {
    /// Builds the canonical request using the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidUrl`] if `url` cannot be parsed.
    pub fn build(
        url: &str,
        method: &str,
        body: &str,
        api_key: &str,
        map: &ResourcePathMap,
    ) -> Result<Self> {
        Self::build_at(unix_timestamp_secs()?, url, method, body, api_key, map)
    }

    /// Builds the canonical request for an explicit timestamp.
    ///
    /// Pure: identical inputs always give an identical request.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidUrl`] if `url` cannot be parsed or has no host.
    ///
    /// # Examples
    ///
    /// ```
    /// use vdp_sandbox::xpay::{CanonicalRequest, ResourcePathMap};
    ///
    /// let map = ResourcePathMap::new([("/vdp/", "")]);
    /// let req = CanonicalRequest::build_at(
    ///     1_700_000_000,
    ///     "https://sandbox.api.visa.com/vdp/helloworld?x=2&a=1",
    ///     "GET",
    ///     "",
    ///     "K1",
    ///     &map,
    /// )?;
    /// assert_eq!(req.message(), "1700000000helloworlda=1&apiKey=K1&x=2");
    /// # Ok::<(), vdp_sandbox::SandboxError>(())
    /// ```
    #[instrument(skip(body, api_key, map), fields(body_len = body.len()))]
    pub fn build_at(
        timestamp_secs: u64,
        url: &str,
        method: &str,
        body: &str,
        api_key: &str,
        map: &ResourcePathMap,
    ) -> Result<Self> {
        let mut parsed =
            Url::parse(url).map_err(|e| SandboxError::InvalidUrl(format!("{url}: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(SandboxError::InvalidUrl(format!("{url}: missing host")));
        }

        let resolved = map.resolve(parsed.path());
        let query_string = canonical_query(parsed.query(), api_key);
        let request_body =
            if method_carries_body(method) { minify_body(body) } else { String::new() };

        parsed.set_query(Some(&query_string));
        parsed.set_fragment(None);

        Ok(Self {
            timestamp_secs,
            resource_path: resolved.path,
            query_string,
            request_body,
            path_source: resolved.source,
            dispatch_url: parsed,
        })
    }

    /// Replaces the resource path, e.g. with a configured override.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_resource_path(mut self, resource_path: impl Into<String>) -> Self {
        self.resource_path = resource_path.into();
        self
    }

    /// The exact string that is HMAC-signed.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{}{}{}{}",
            self.timestamp_secs, self.resource_path, self.query_string, self.request_body
        )
    }

    /// URL to dispatch: original scheme, host and path with the signed query string.
    #[must_use]
    pub fn dispatch_url(&self) -> &Url {
        &self.dispatch_url
    }
}

/// Sorts the query parameters by key and injects `apiKey` exactly once.
///
/// Parameters are kept in their raw (still percent-encoded) form so the
/// signed string matches what is sent on the wire. The sort is stable, so
/// repeated keys keep their relative order.
fn canonical_query(raw: Option<&str>, api_key: &str) -> String {
    let mut params: Vec<(&str, Option<&str>)> = raw
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (pair, None),
        })
        .filter(|(key, _)| *key != API_KEY_PARAM)
        .collect();

    let encoded_key: String = url::form_urlencoded::byte_serialize(api_key.as_bytes()).collect();
    params.push((API_KEY_PARAM, Some(&encoded_key)));
    params.sort_by(|a, b| a.0.cmp(b.0));

    params
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => (*key).to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Minifies a JSON body; non-JSON text is passed through trimmed.
pub(crate) fn minify_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .and_then(|value| serde_json::to_string(&value))
        .unwrap_or_else(|_| trimmed.to_owned())
}

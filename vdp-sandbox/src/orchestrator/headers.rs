//! Outbound header names and an ordered, case-insensitive header list.

/// `Accept` header.
pub const ACCEPT: &str = "Accept";
/// `Content-Type` header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// `User-Agent` header.
pub const USER_AGENT: &str = "User-Agent";
/// `Host` header.
pub const HOST: &str = "Host";
/// `Authorization` header.
pub const AUTHORIZATION: &str = "Authorization";

/// Media type sent and accepted for every request.
pub const APPLICATION_JSON: &str = "application/json";

/// User agent used unless the server configures another.
pub const DEFAULT_USER_AGENT: &str = "VDP Sandbox";

/// Header list that keeps insertion order and treats names case-insensitively.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::orchestrator::HeaderList;
///
/// let mut headers = HeaderList::new();
/// headers.set("authorization", "Basic abc");
/// headers.set("Authorization", "Basic xyz");
/// assert_eq!(headers.get("AUTHORIZATION"), Some("Basic xyz"));
/// assert_eq!(headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Sets `name` to `value`, replacing any header with the same name.
    ///
    /// A replaced header keeps its position; the new name casing wins.
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(&name)) {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Removes every header called `name`. Returns whether one was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    /// Value of the header called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no header is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

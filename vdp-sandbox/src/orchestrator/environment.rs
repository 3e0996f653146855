//! Target environments and URL resolution.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};

/// Upstream environment a relative request URL is resolved against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// `https://sandbox.api.visa.com`
    #[default]
    Sandbox,
    /// `https://cert.api.visa.com`
    #[serde(alias = "cert")]
    Certification,
    /// `https://api.visa.com`
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    /// Every environment.
    pub const ALL: [Self; 3] = [Self::Sandbox, Self::Certification, Self::Production];

    /// Base URL without trailing slash.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.api.visa.com",
            Self::Certification => "https://cert.api.visa.com",
            Self::Production => "https://api.visa.com",
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Certification => "certification",
            Self::Production => "production",
        }
    }

    /// Absolute URLs are returned unchanged; anything else is appended to
    /// [`base_url`](Self::base_url).
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidUrl`] for a blank URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use vdp_sandbox::orchestrator::Environment;
    ///
    /// assert_eq!(
    ///     Environment::Certification.resolve_url("/vdp/helloworld")?,
    ///     "https://cert.api.visa.com/vdp/helloworld"
    /// );
    /// assert_eq!(
    ///     Environment::Sandbox.resolve_url("http://127.0.0.1:9000/vdp/helloworld")?,
    ///     "http://127.0.0.1:9000/vdp/helloworld"
    /// );
    /// # Ok::<(), vdp_sandbox::SandboxError>(())
    /// ```
    pub fn resolve_url(self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SandboxError::InvalidUrl("empty URL".to_owned()));
        }
        let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
        if lower.starts_with("https://") || lower.starts_with("http://") {
            return Ok(url.to_owned());
        }
        Ok(format!("{}/{}", self.base_url(), url.trim_start_matches('/')))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SandboxError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "certification" | "cert" => Ok(Self::Certification),
            "production" | "prod" => Ok(Self::Production),
            other => Err(SandboxError::InvalidField {
                field: "environment",
                reason: format!("unknown environment {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls() {
        assert_eq!(Environment::default(), Environment::Sandbox);
        assert_eq!(Environment::Sandbox.base_url(), "https://sandbox.api.visa.com");
        assert_eq!(Environment::Production.base_url(), "https://api.visa.com");
    }

    #[test]
    fn test_resolve_relative_without_leading_slash() {
        assert_eq!(
            Environment::Sandbox.resolve_url("vdp/helloworld").unwrap(),
            "https://sandbox.api.visa.com/vdp/helloworld"
        );
    }

    #[test]
    fn test_resolve_absolute_case_insensitive_scheme() {
        assert_eq!(
            Environment::Production.resolve_url("HTTPS://x.test/a").unwrap(),
            "HTTPS://x.test/a"
        );
    }

    #[test]
    fn test_resolve_blank_is_invalid_url() {
        assert!(matches!(Environment::Sandbox.resolve_url("  "), Err(SandboxError::InvalidUrl(_))));
    }

    #[test]
    fn test_serde_names_and_aliases() {
        let env: Environment = serde_json::from_str("\"cert\"").unwrap();
        assert_eq!(env, Environment::Certification);
        assert_eq!(serde_json::to_string(&Environment::Production).unwrap(), "\"production\"");
    }

    #[test]
    fn test_from_str() {
        for env in Environment::ALL {
            assert_eq!(env.as_str().parse::<Environment>().unwrap(), env);
        }
        assert!("staging".parse::<Environment>().is_err());
    }
}

//! Upstream error code descriptions.
//!
//! Upstream error bodies carry `responseStatus.code`. The table maps those
//! codes to a description and troubleshooting hint for display. It ships with
//! a small built-in set and can be extended from a JSON file of the form
//! `{"<code>": {"description": "...", "troubleshooting": "..."}}`.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SandboxError};

/// Display text for one error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// What the code means.
    pub description: String,
    /// What to check.
    #[serde(default)]
    pub troubleshooting: String,
}

impl ErrorDetails {
    fn new(description: &str, troubleshooting: &str) -> Self {
        Self { description: description.to_owned(), troubleshooting: troubleshooting.to_owned() }
    }
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("05", "Do not honor", "The issuer declined the transaction. Try another test card."),
    (
        "14",
        "Invalid account number",
        "Check the primary account number in the payload against the sandbox test data.",
    ),
    ("51", "Insufficient funds", "Use a test account with an available balance."),
    ("54", "Expired card", "Check the card expiration date in the payload."),
    (
        "57",
        "Transaction not permitted to cardholder",
        "The card does not support this transaction type.",
    ),
    ("91", "Issuer unavailable", "Retry later; the issuer or switch is inoperative."),
    ("96", "System malfunction", "Retry later; the upstream system reported an internal error."),
];

/// Error code lookup table.
///
/// # Examples
///
/// ```
/// use vdp_sandbox::orchestrator::ErrorMappings;
///
/// let mappings = ErrorMappings::builtin();
/// assert!(mappings.lookup("14").is_some());
/// assert!(mappings.lookup("not-a-code").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMappings {
    entries: HashMap<String, ErrorDetails>,
}

impl ErrorMappings {
    /// Built-in table.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(code, description, hint)| ((*code).to_owned(), ErrorDetails::new(description, hint)))
            .collect();
        Self { entries }
    }

    /// Parses a JSON table.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::ConfigError`] if `json` is not a code → details object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries = serde_json::from_str(json)
            .map_err(|e| SandboxError::ConfigError(format!("error mapping: {e}")))?;
        Ok(Self { entries })
    }

    /// Reads a JSON table from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::ConfigError`] if the file cannot be read or parsed.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            SandboxError::ConfigError(format!("error mapping {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Adds every entry of `other`, replacing codes that already exist.
    #[must_use]
    pub fn extended(mut self, other: Self) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Details for `code`.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<&ErrorDetails> {
        self.entries.get(code)
    }

    /// Number of codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `responseStatus.code` of an upstream body, as a string.
///
/// Numeric codes are accepted and rendered without decoration.
#[must_use]
pub fn extract_error_code(body: &Value) -> Option<String> {
    match body.get("responseStatus")?.get("code")? {
        Value::String(code) if !code.trim().is_empty() => Some(code.trim().to_owned()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

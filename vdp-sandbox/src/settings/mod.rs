//! Credential bundle and its persistence.
//!
//! A single [`CredentialBundle`] is kept per sandbox. It is validated with
//! [`CredentialBundle::into_validated`] before being handed to a
//! [`SettingsRepository`], and loaded fresh for every proxied request.

mod bundle;
mod repository;
mod secret;

pub use bundle::{AuthMethod, CredentialBundle};
pub use repository::{FileSettingsRepository, InMemorySettingsRepository, SettingsRepository};
pub use secret::SecretString;

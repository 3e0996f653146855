//! Settings persistence.

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::sync::RwLock;

use super::CredentialBundle;
use crate::error::{Result, SandboxError};

/// Storage for the single saved credential bundle.
///
/// Implementations store whatever they are given; validation happens in
/// [`CredentialBundle::into_validated`] before `save` is called.
pub trait SettingsRepository: Send + Sync {
    /// Loads the saved bundle, or `None` when nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::SettingsError`] if the store cannot be read
    /// or its contents cannot be parsed.
    fn load(&self) -> impl Future<Output = Result<Option<CredentialBundle>>> + Send;

    /// Replaces the saved bundle.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::SettingsError`] if the store cannot be written.
    fn save(&self, bundle: &CredentialBundle) -> impl Future<Output = Result<()>> + Send;

    /// Removes the saved bundle. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::SettingsError`] if the store cannot be written.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Settings stored as pretty-printed JSON in a single file.
///
/// The file is plaintext. Anyone who can read it has the credentials.
#[derive(Debug, Clone)]
pub struct FileSettingsRepository {
    path: PathBuf,
}

impl FileSettingsRepository {
    /// Creates a repository backed by `path`. The file need not exist.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<PathBuf> accepts both &str and PathBuf"
    )]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsRepository for FileSettingsRepository {
    async fn load(&self) -> Result<Option<CredentialBundle>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let bundle = serde_json::from_str(&text).map_err(|e| {
            SandboxError::SettingsError(format!("{}: {e}", self.path.display()))
        })?;
        tracing::debug!(path = %self.path.display(), "settings loaded");
        Ok(Some(bundle))
    }

    async fn save(&self, bundle: &CredentialBundle) -> Result<()> {
        let json = serde_json::to_string_pretty(bundle)
            .map_err(|e| SandboxError::SettingsError(format!("serialisation: {e}")))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local settings store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    bundle: RwLock<Option<CredentialBundle>>,
}

impl InMemorySettingsRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-loaded with `bundle`.
    #[must_use]
    pub fn with_bundle(bundle: CredentialBundle) -> Self {
        Self { bundle: RwLock::new(Some(bundle)) }
    }
}

impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Option<CredentialBundle>> {
        Ok(self.bundle.read().await.clone())
    }

    async fn save(&self, bundle: &CredentialBundle) -> Result<()> {
        *self.bundle.write().await = Some(bundle.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.bundle.write().await = None;
        Ok(())
    }
}

//! Shared handler state.

use std::{sync::Arc, time::Instant};

use vdp_sandbox::{
    RequestOrchestrator,
    mle::EnvelopeEngine,
    orchestrator::ErrorMappings,
    settings::FileSettingsRepository,
    transport::HttpTransport,
};

use crate::{config::ServerConfig, error::ServerError};

/// Orchestrator used by the server.
pub type SandboxOrchestrator = RequestOrchestrator<FileSettingsRepository, HttpTransport>;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Request pipeline over the file-backed settings store.
    pub orchestrator: Arc<SandboxOrchestrator>,
    /// Server start, for uptime reporting.
    pub started: Instant,
}

impl AppState {
    /// Wraps an existing orchestrator.
    #[must_use]
    pub fn new(orchestrator: SandboxOrchestrator) -> Self {
        Self { orchestrator: Arc::new(orchestrator), started: Instant::now() }
    }

    /// Builds the orchestrator described by `config`.
    ///
    /// The error mapping file, when configured, extends the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Sandbox`] if the HTTP client cannot be built or
    /// the error mapping file cannot be read.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let transport = HttpTransport::with_config(&config.http)?;

        let mut error_mappings = ErrorMappings::builtin();
        if let Some(path) = &config.error_mapping_path {
            let extra = ErrorMappings::from_file(path).await?;
            tracing::info!(path = %path.display(), codes = extra.len(), "loaded error mappings");
            error_mappings = error_mappings.extended(extra);
        }

        let orchestrator = RequestOrchestrator::new(
            FileSettingsRepository::new(&config.settings_path),
            transport,
            EnvelopeEngine::new(config.mle_enabled),
        )
        .with_error_mappings(error_mappings)
        .with_user_agent(config.user_agent.as_str());

        Ok(Self::new(orchestrator))
    }

    /// Seconds since the state was created.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

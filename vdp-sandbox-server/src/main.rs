//! VDP Sandbox Server binary.
//!
//! ```text
//! vdp-sandbox-server --config sandbox.toml --listen 127.0.0.1:3001
//! ```

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from axum, josekit and reqwest"
)]

use std::process::ExitCode;

use clap::Parser;
use vdp_sandbox_server::{
    AppState, Cli, ServerError,
    observability::{LogFormat, init_observability},
    router,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let config = cli.resolve()?;
    let state = AppState::from_config(&config).await?;
    let app = router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        settings = %config.settings_path.display(),
        mle_enabled = config.mle_enabled,
        "VDP sandbox server listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

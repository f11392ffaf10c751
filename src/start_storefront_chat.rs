//! Startup helpers for the storefront chat server.

use std::process::ExitCode;

use crate::config::AppConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting storefront chat v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }
    tracing::info!(
        environment = %config.environment,
        shop = %config.shopify.shop,
        model = %config.claude.model,
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let port = config.server.port;
    let result = rt.block_on(async move {
        let state = AppState::new(config).await;
        server::run_server_with_shutdown(state, port, shutdown_signal()).await
    });

    if let Err(e) = result {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

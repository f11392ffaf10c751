//! HTTP server for the storefront chat assistant.
//!
//! Provides endpoints for:
//! - Health and diagnostics (database, AI client, environment)
//! - Custom-app auth entry points
//! - Conversation history and customer account URLs

pub mod conversations;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Error returned when the listener cannot be bound or the server stops abnormally.
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Router with the cross-origin and request tracing layers applied.
///
/// The chat widget is embedded in storefront pages on another origin, so
/// every origin, method and header is allowed.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve until the process is killed.
///
/// # Errors
/// Returns an error if the port cannot be bound.
pub async fn run_server(state: Arc<AppState>, port: u16) -> Result<(), ServerError> {
    run_server_with_shutdown(state, port, std::future::pending()).await
}

/// Serve until `shutdown_signal` resolves, then drain in-flight requests.
///
/// # Errors
/// Returns an error if the port cannot be bound.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let backend = state.store.backend();
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %backend, "Storefront chat server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Storefront chat server drained");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::ConversationStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_app_allows_cross_origin_requests() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(ConversationStore::null()));
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://shop.example")
            .body(Body::empty())
            .unwrap();

        let response = build_app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}

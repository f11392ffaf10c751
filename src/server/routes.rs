//! HTTP route handlers for the storefront chat API.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};

use crate::config::DEFAULT_PROMPT_TYPE;
use crate::llm::{
    ClaudeError, ConversationMessage, ConversationRequest, LoggingCallbacks, StreamOutcome,
};
use crate::shopify;

use super::conversations;
use super::state::AppState;

/// Message sent by the diagnostic chat routes.
const PROBE_MESSAGE: &str = "Hello";

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/debug-chat", get(debug_chat))
        .route("/test-simple", get(test_simple))
        .route("/test-env", get(test_env))
        .route("/auth/{*path}", get(auth_callback))
        .merge(conversations::routes())
        .with_state(state)
}

/// Health check endpoint: reports configuration, database and AI client status.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let claude = &state.config.claude;
    let key_length = claude.api_key.as_ref().map(String::len);

    let database_status = match state.store.check_connection().await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {e}"),
    };
    let claude_status = match state.claude() {
        Ok(_) => "service_created".to_string(),
        Err(e) => format!("error: {e}"),
    };

    Json(json!({
        "status": "ok",
        "service": "storefront-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "environment": {
            "appEnv": state.config.environment,
            "claudeKeyExists": key_length.is_some(),
            "claudeKeyLength": key_length,
        },
        "database": {
            "status": database_status,
            "backend": state.store.backend(),
        },
        "claude": {
            "status": claude_status,
        }
    }))
}

/// Stream one probe message with the configured prompt type.
async fn debug_chat(State(state): State<Arc<AppState>>) -> Response {
    let claude = &state.config.claude;
    let prompt_type = claude.default_prompt_type.clone();
    tracing::info!("Testing Claude API with a single user message");
    tracing::info!("API key available: {}", claude.api_key.is_some());

    match probe(&state, prompt_type.clone()).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "response": outcome,
            "config": {
                "model": claude.model,
                "promptType": prompt_type,
            }
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Debug chat error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "kind": e.kind(),
                    "apiKeySet": claude.api_key.is_some(),
                })),
            )
                .into_response()
        }
    }
}

/// Stream one probe message with the standard prompt type.
async fn test_simple(State(state): State<Arc<AppState>>) -> Response {
    tracing::info!("Testing simple Claude API call");

    match probe(&state, DEFAULT_PROMPT_TYPE.to_string()).await {
        Ok(outcome) => {
            tracing::info!("Claude API call completed: {}", outcome.message.id);
            Json(json!({ "success": true, "result": outcome })).into_response()
        }
        Err(e) => {
            tracing::error!(kind = e.kind(), "Detailed error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "kind": e.kind(),
                })),
            )
                .into_response()
        }
    }
}

/// Report which AI settings are present without revealing them.
async fn test_env(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key_length = state.config.claude.api_key.as_ref().map_or(0, String::len);

    let mut env_keys: Vec<String> = std::env::vars_os()
        .filter_map(|(key, _)| key.into_string().ok())
        .filter(|key| key.contains("CLAUDE"))
        .collect();
    env_keys.sort();

    Json(json!({
        "claudeApiKey": if key_length > 0 { "SET" } else { "NOT SET" },
        "claudeApiKeyLength": key_length,
        "appEnv": state.config.environment,
        "allEnvKeys": env_keys,
    }))
}

/// Auth entry point: `?shop=` starts a login, anything else is a callback.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.contains_key("shop") {
        return shopify::login().into_response();
    }

    let context = shopify::authenticate_admin(&state.config.shopify);
    tracing::debug!(
        shop = %context.admin.shop,
        token_configured = context.admin.access_token.is_some(),
        "Admin callback authenticated"
    );
    Json(Value::Null).into_response()
}

async fn probe(state: &AppState, prompt_type: String) -> Result<StreamOutcome, ClaudeError> {
    let service = state.claude()?;
    let request = ConversationRequest {
        messages: vec![ConversationMessage::user(PROBE_MESSAGE)],
        prompt_type,
        tools: Vec::new(),
    };
    let mut callbacks = LoggingCallbacks;
    service.stream_conversation(&request, &mut callbacks).await
}

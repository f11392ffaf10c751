//! Conversation endpoints backed by the conversation store.
//!
//! Store failures never surface here: writes that could not be persisted come
//! back as `202 Accepted` with a placeholder record instead of `201 Created`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::store::{CustomerAccountUrl, DEFAULT_HISTORY_LIMIT, Message, MessageRole};

use super::state::AppState;

/// Conversation routes, to be merged into the main router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/conversations/{id}/messages",
            get(get_history).post(save_message),
        )
        .route(
            "/api/conversations/{id}/customer-account-url",
            get(get_account_url).put(store_account_url),
        )
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of messages.
    pub limit: Option<usize>,
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// Number of messages.
    pub count: usize,
}

/// New message request.
#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    /// Author role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

/// Account URL update request.
#[derive(Debug, Deserialize)]
pub struct AccountUrlRequest {
    /// New account URL.
    pub url: String,
}

/// Account URL response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUrlResponse {
    /// Conversation id.
    pub conversation_id: String,
    /// Stored URL, if any.
    pub url: Option<String>,
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state
        .store
        .get_conversation_history(&conversation_id, limit)
        .await;
    let count = messages.len();

    Json(HistoryResponse { messages, count })
}

async fn save_message(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(request): Json<SaveMessageRequest>,
) -> (StatusCode, Json<Message>) {
    let message = state
        .store
        .save_message(&conversation_id, request.role, &request.content)
        .await;
    (write_status(message.is_placeholder()), Json(message))
}

async fn get_account_url(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<AccountUrlResponse> {
    let url = state.store.get_customer_account_url(&conversation_id).await;
    Json(AccountUrlResponse {
        conversation_id,
        url,
    })
}

async fn store_account_url(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(request): Json<AccountUrlRequest>,
) -> Result<(StatusCode, Json<CustomerAccountUrl>), (StatusCode, String)> {
    Url::parse(&request.url)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid url: {e}")))?;

    let record = state
        .store
        .store_customer_account_url(&conversation_id, &request.url)
        .await;
    Ok((write_status(record.is_placeholder()), Json(record)))
}

const fn write_status(placeholder: bool) -> StatusCode {
    if placeholder {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::server::create_router;
    use crate::store::{ConversationStore, SqliteStoreHandle};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::response::Response;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn sqlite_app() -> Router {
        let handle = SqliteStoreHandle::open_in_memory().await.unwrap();
        let store = ConversationStore::with_handle(Arc::new(handle));
        create_router(AppState::with_store(AppConfig::default(), Arc::new(store)))
    }

    fn null_app() -> Router {
        create_router(AppState::with_store(
            AppConfig::default(),
            Arc::new(ConversationStore::null()),
        ))
    }

    async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let app = sqlite_app().await;
        let path = "/api/conversations/c1/messages";

        let response = send(&app, "POST", path, Some(json!({"role": "user", "content": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = send(
            &app,
            "POST",
            path,
            Some(json!({"role": "assistant", "content": "hello"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(send(&app, "GET", path, None).await).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["messages"][1]["role"], "assistant");

        let body = json_body(send(&app, "GET", &format!("{path}?limit=1"), None).await).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let app = sqlite_app().await;
        let response = send(
            &app,
            "POST",
            "/api/conversations/c1/messages",
            Some(json!({"role": "tool", "content": "x"})),
        )
        .await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_null_store_accepts_without_persisting() {
        let app = null_app();
        let path = "/api/conversations/c1/messages";

        let response = send(&app, "POST", path, Some(json!({"role": "user", "content": "hi"}))).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["id"], "mock");

        let body = json_body(send(&app, "GET", path, None).await).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_account_url_round_trip() {
        let app = sqlite_app().await;
        let path = "/api/conversations/c1/customer-account-url";

        let body = json_body(send(&app, "GET", path, None).await).await;
        assert_eq!(body["conversationId"], "c1");
        assert!(body["url"].is_null());

        let response = send(&app, "PUT", path, Some(json!({"url": "https://x.example"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(send(&app, "GET", path, None).await).await;
        assert_eq!(body["url"], "https://x.example");

        let response = send(&app, "PUT", path, Some(json!({"url": "not a url"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! Streaming client for the Claude Messages API.
//!
//! Behaviour:
//! - POST `/v1/messages` with `stream: true`.
//! - Decode the event stream incrementally and fold it into one message.
//! - Report every text delta and the final message through `StreamCallbacks`.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClaudeConfig;
use crate::llm::error::ClaudeError;
use crate::llm::sse::SseDecoder;
use crate::llm::stream::{MessageAssembler, StreamCallbacks, StreamOutcome};
use crate::store::MessageRole;

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request timeout, streaming included.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// System prompt for the `standardAssistant` prompt type.
const STANDARD_ASSISTANT_PROMPT: &str =
    "You are a helpful shopping assistant for this store. Answer briefly and accurately.";

/// One turn of conversation sent to the model.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Author role; `system` turns are folded into the system prompt.
    pub role: MessageRole,
    /// Turn text.
    pub content: String,
}

impl ConversationMessage {
    /// Build a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Input of `stream_conversation`.
#[derive(Clone, Debug, Default)]
pub struct ConversationRequest {
    /// Conversation so far.
    pub messages: Vec<ConversationMessage>,
    /// Prompt type selecting the system prompt.
    pub prompt_type: String,
    /// Tool definitions, passed through as-is.
    pub tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// System prompt registered for a prompt type.
#[must_use]
pub fn system_prompt_for(prompt_type: &str) -> Option<&'static str> {
    match prompt_type {
        "standardAssistant" => Some(STANDARD_ASSISTANT_PROMPT),
        _ => None,
    }
}

/// Claude streaming client.
pub struct ClaudeService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl ClaudeService {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns an error if no API key is configured or the HTTP client cannot be built.
    pub fn from_config(config: &ClaudeConfig) -> Result<Self, ClaudeError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ClaudeError::MissingApiKey)?
            .to_string();
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CLIENT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    /// Model this client talks to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream a conversation turn.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status, an API
    /// `error` event, an undecodable payload, or a truncated stream.
    pub async fn stream_conversation(
        &self,
        request: &ConversationRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<StreamOutcome, ClaudeError> {
        let body = self.build_request(request);
        tracing::debug!(
            model = %self.model,
            prompt_type = %request.prompt_type,
            messages = body.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Claude API returned {status}: {body}");
            return Err(ClaudeError::HttpStatusNotOk {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = SseDecoder::new();
        let mut assembler = MessageAssembler::new();
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                if assembler.apply(&event.data, callbacks)? {
                    return assembler.finish();
                }
            }
        }

        if let Some(event) = decoder.finish() {
            assembler.apply(&event.data, callbacks)?;
        }
        assembler.finish()
    }

    fn build_request<'a>(&'a self, request: &'a ConversationRequest) -> MessagesRequest<'a> {
        let mut system: Vec<&str> = system_prompt_for(&request.prompt_type)
            .into_iter()
            .collect();
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role {
                MessageRole::System => system.push(&message.content),
                MessageRole::User | MessageRole::Assistant => messages.push(WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                }),
            }
        }

        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            stream: true,
        }
    }
}

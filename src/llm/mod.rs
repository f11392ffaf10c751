//! Conversational AI client.
//!
//! - `claude`: streaming Messages API client
//! - `sse`: event-stream decoder
//! - `stream`: streamed message types and callbacks

pub mod claude;
pub mod error;
pub mod sse;
pub mod stream;

pub use claude::{ClaudeService, ConversationMessage, ConversationRequest, system_prompt_for};
pub use error::ClaudeError;
pub use sse::{SseDecoder, SseEvent};
pub use stream::{
    AssistantMessage, ContentBlock, LoggingCallbacks, StreamCallbacks, StreamOutcome, Usage,
};

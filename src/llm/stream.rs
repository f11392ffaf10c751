//! Streaming message types and the event assembler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::error::ClaudeError;
use crate::store::MessageRole;

/// Receives streaming progress.
pub trait StreamCallbacks: Send {
    /// Called for every text delta.
    fn on_text(&mut self, text: &str);
    /// Called once with the complete assistant message.
    fn on_message(&mut self, message: &AssistantMessage);
}

/// Callbacks that only log what they receive.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingCallbacks;

impl StreamCallbacks for LoggingCallbacks {
    fn on_text(&mut self, text: &str) {
        tracing::debug!("Text chunk: {text}");
    }

    fn on_message(&mut self, message: &AssistantMessage) {
        tracing::info!(
            id = %message.id,
            stop_reason = ?message.stop_reason,
            output_tokens = message.usage.output_tokens,
            "Message complete"
        );
    }
}

/// Assistant content block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Text content.
        text: String,
    },
    /// Tool invocation requested by the model.
    ToolUse {
        /// Tool call id.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        input: Value,
    },
}

/// Token accounting.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Generated tokens.
    #[serde(default)]
    pub output_tokens: u64,
}

/// Complete assistant message assembled from a stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    /// Message id assigned by the API.
    pub id: String,
    /// Model that produced it.
    pub model: String,
    /// Always `assistant`.
    pub role: MessageRole,
    /// Content blocks in index order.
    pub content: Vec<ContentBlock>,
    /// Why generation stopped.
    pub stop_reason: Option<String>,
    /// Token usage.
    pub usage: Usage,
}

impl AssistantMessage {
    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect()
    }
}

/// Result of a streamed conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamOutcome {
    /// Final message.
    pub message: AssistantMessage,
    /// All text deltas in arrival order.
    pub text: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: Delta,
    },
    ContentBlockStop,
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<Usage>,
    },
    MessageStop,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageStart {
    id: String,
    model: String,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

enum BlockBuilder {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        json: String,
    },
}

impl BlockBuilder {
    fn build(self) -> Result<ContentBlock, ClaudeError> {
        match self {
            Self::Text(text) => Ok(ContentBlock::Text { text }),
            Self::ToolUse { id, name, json } => {
                let input = if json.trim().is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&json)?
                };
                Ok(ContentBlock::ToolUse { id, name, input })
            }
        }
    }
}

/// Folds stream events into one assistant message.
#[derive(Default)]
pub(crate) struct MessageAssembler {
    id: String,
    model: String,
    blocks: BTreeMap<usize, BlockBuilder>,
    stop_reason: Option<String>,
    usage: Usage,
    text: String,
    finished: Option<AssistantMessage>,
}

impl MessageAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply one event payload. Returns `true` once the message is complete.
    pub(crate) fn apply(
        &mut self,
        data: &str,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<bool, ClaudeError> {
        if data.trim().is_empty() {
            return Ok(false);
        }

        match serde_json::from_str::<StreamEvent>(data)? {
            StreamEvent::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model;
                self.usage = message.usage;
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let builder = match content_block {
                    BlockStart::Text { text } => BlockBuilder::Text(text),
                    BlockStart::ToolUse { id, name } => BlockBuilder::ToolUse {
                        id,
                        name,
                        json: String::new(),
                    },
                    BlockStart::Other => return Ok(false),
                };
                self.blocks.insert(index, builder);
            }
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                Delta::TextDelta { text } => {
                    let entry = self
                        .blocks
                        .entry(index)
                        .or_insert_with(|| BlockBuilder::Text(String::new()));
                    if let BlockBuilder::Text(buffer) = entry {
                        buffer.push_str(&text);
                    }
                    self.text.push_str(&text);
                    callbacks.on_text(&text);
                }
                Delta::InputJsonDelta { partial_json } => {
                    if let Some(BlockBuilder::ToolUse { json, .. }) = self.blocks.get_mut(&index) {
                        json.push_str(&partial_json);
                    }
                }
                Delta::Other => {}
            },
            StreamEvent::ContentBlockStop | StreamEvent::Other => {}
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage.output_tokens = usage.output_tokens;
                }
            }
            StreamEvent::MessageStop => {
                let blocks = std::mem::take(&mut self.blocks);
                let content = blocks
                    .into_values()
                    .map(BlockBuilder::build)
                    .collect::<Result<Vec<_>, _>>()?;
                let message = AssistantMessage {
                    id: std::mem::take(&mut self.id),
                    model: std::mem::take(&mut self.model),
                    role: MessageRole::Assistant,
                    content,
                    stop_reason: self.stop_reason.take(),
                    usage: self.usage,
                };
                callbacks.on_message(&message);
                self.finished = Some(message);
                return Ok(true);
            }
            StreamEvent::Error { error } => {
                return Err(ClaudeError::Api {
                    kind: error.kind,
                    message: error.message,
                });
            }
        }

        Ok(false)
    }

    /// Final outcome; fails if the stream never reached `message_stop`.
    pub(crate) fn finish(self) -> Result<StreamOutcome, ClaudeError> {
        let message = self.finished.ok_or(ClaudeError::IncompleteStream)?;
        Ok(StreamOutcome {
            message,
            text: self.text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<String>,
        messages: Vec<AssistantMessage>,
    }

    impl StreamCallbacks for Recorder {
        fn on_text(&mut self, text: &str) {
            self.chunks.push(text.to_string());
        }

        fn on_message(&mut self, message: &AssistantMessage) {
            self.messages.push(message.clone());
        }
    }

    const TRANSCRIPT: &[&str] = &[
        r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-test","usage":{"input_tokens":12,"output_tokens":1}}}"#,
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo!"}}"#,
        r#"{"type":"content_block_stop","index":0}"#,
        r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"search_catalog","input":{}}}"#,
        r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"query\":"}}"#,
        r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"lamps\"}"}}"#,
        r#"{"type":"content_block_stop","index":1}"#,
        r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":9}}"#,
        r#"{"type":"message_stop"}"#,
    ];

    #[test]
    fn test_assembles_text_and_tool_use() {
        let mut recorder = Recorder::default();
        let mut assembler = MessageAssembler::new();

        let mut done = false;
        for data in TRANSCRIPT {
            done = assembler.apply(data, &mut recorder).unwrap();
        }
        assert!(done);

        let outcome = assembler.finish().unwrap();
        assert_eq!(recorder.chunks, vec!["Hel", "lo!"]);
        assert_eq!(recorder.messages.len(), 1);
        assert_eq!(outcome.text, "Hello!");
        assert_eq!(outcome.message.id, "msg_1");
        assert_eq!(outcome.message.text(), "Hello!");
        assert_eq!(outcome.message.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(outcome.message.usage.input_tokens, 12);
        assert_eq!(outcome.message.usage.output_tokens, 9);
        assert_eq!(
            outcome.message.content[1],
            ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "search_catalog".to_string(),
                input: serde_json::json!({"query": "lamps"}),
            }
        );
    }

    #[test]
    fn test_error_event_fails() {
        let mut recorder = Recorder::default();
        let mut assembler = MessageAssembler::new();
        let result = assembler.apply(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            &mut recorder,
        );
        assert!(matches!(result, Err(ClaudeError::Api { ref kind, .. }) if kind == "overloaded_error"));
    }

    #[test]
    fn test_incomplete_stream_fails() {
        let mut recorder = Recorder::default();
        let mut assembler = MessageAssembler::new();
        assembler.apply(TRANSCRIPT[0], &mut recorder).unwrap();
        assert!(matches!(
            assembler.finish(),
            Err(ClaudeError::IncompleteStream)
        ));
    }
}

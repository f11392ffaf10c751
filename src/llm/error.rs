//! Errors produced by the Claude client.

use std::fmt;

/// Errors produced by the Claude client.
#[derive(Debug)]
pub enum ClaudeError {
    /// No API key was configured.
    MissingApiKey,
    /// The API answered with a non-success status.
    HttpStatusNotOk {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Transport error from the HTTP client.
    HttpClient(reqwest::Error),
    /// A stream payload could not be decoded.
    Decode(serde_json::Error),
    /// The stream carried an `error` event.
    Api {
        /// Error type reported by the API.
        kind: String,
        /// Error message reported by the API.
        message: String,
    },
    /// The body ended before `message_stop`.
    IncompleteStream,
}

impl ClaudeError {
    /// Short machine-readable name of the error variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::HttpStatusNotOk { .. } => "http_status",
            Self::HttpClient(_) => "http_client",
            Self::Decode(_) => "decode",
            Self::Api { .. } => "api",
            Self::IncompleteStream => "incomplete_stream",
        }
    }
}

impl From<reqwest::Error> for ClaudeError {
    fn from(value: reqwest::Error) -> Self {
        Self::HttpClient(value)
    }
}

impl From<serde_json::Error> for ClaudeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

impl fmt::Display for ClaudeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "CLAUDE_API_KEY is not set"),
            Self::HttpStatusNotOk { status, body } => {
                write!(f, "claude http status not ok: {status}: {body}")
            }
            Self::HttpClient(err) => write!(f, "http client error: {err}"),
            Self::Decode(err) => write!(f, "stream decode error: {err}"),
            Self::Api { kind, message } => write!(f, "claude api error ({kind}): {message}"),
            Self::IncompleteStream => write!(f, "stream ended before message_stop"),
        }
    }
}

impl std::error::Error for ClaudeError {}

//! Records persisted by the conversation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::ids;

/// Author of a stored message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Shopper input.
    User,
    /// Assistant response.
    Assistant,
    /// System instruction.
    System,
}

impl MessageRole {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(value.to_string()),
        }
    }
}

/// Customer account access token issued for a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerToken {
    /// Record id (`token_<millis>_<suffix>`).
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Access token.
    pub access_token: String,
    /// Refresh token, when the issuer returned one.
    pub refresh_token: Option<String>,
    /// Expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Insertion time; the newest row is the current token.
    pub created_at: DateTime<Utc>,
}

impl CustomerToken {
    /// Whether this record was never persisted.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        ids::is_placeholder(&self.id)
    }
}

/// PKCE verifier waiting for its authorization callback.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeVerifier {
    /// Record id (`verifier_<millis>_<suffix>`).
    pub id: String,
    /// Unique state parameter used for lookup.
    pub state: String,
    /// Verifier secret.
    pub verifier: String,
    /// Expiry of the pending attempt.
    pub expires_at: DateTime<Utc>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl CodeVerifier {
    /// Whether this record was never persisted.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        ids::is_placeholder(&self.id)
    }

    /// Whether the verifier has expired at `now`.
    ///
    /// Lookups do not filter on expiry; callers decide.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Parent row for messages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id, chosen by the caller.
    pub id: String,
    /// First save time.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
}

/// Single chat message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Record id.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Author role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Insertion time, used for ordering.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this record was never persisted.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        ids::is_placeholder(&self.id)
    }
}

/// Customer account URL attached to a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAccountUrl {
    /// Record id, kept across upserts.
    pub id: String,
    /// Owning conversation, at most one row each.
    pub conversation_id: String,
    /// Account URL.
    pub url: String,
    /// First write time.
    pub created_at: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl CustomerAccountUrl {
    /// Whether this record was never persisted.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        ids::is_placeholder(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_roundtrip() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(role.as_str().parse::<MessageRole>(), Ok(role));
        }
        assert_eq!("tool".parse::<MessageRole>(), Err("tool".to_string()));
    }

    #[test]
    fn test_code_verifier_expiry() {
        let now = Utc::now();
        let verifier = CodeVerifier {
            id: "verifier_1_abc".to_string(),
            state: "s1".to_string(),
            verifier: "v1".to_string(),
            expires_at: now + Duration::minutes(10),
            created_at: now,
        };

        assert!(!verifier.is_expired(now));
        assert!(verifier.is_expired(now + Duration::minutes(10)));
        assert!(!verifier.is_placeholder());
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let message = Message {
            id: ids::PLACEHOLDER_ID.to_string(),
            conversation_id: "c1".to_string(),
            role: MessageRole::Assistant,
            content: "hello".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(json["role"], "assistant");
        assert!(json.get("createdAt").is_some());
        assert!(message.is_placeholder());
    }
}

//! Conversation store: typed accessors over a backing store handle.
//!
//! Every operation is total. A failing handle call is logged at `warn` with
//! the operation name and replaced by that operation's default:
//!
//! | operation | default |
//! |---|---|
//! | `get_customer_token` | `None` |
//! | `store_customer_token` | degraded token |
//! | `store_code_verifier` | degraded verifier |
//! | `get_code_verifier` | `None` |
//! | `save_message` | degraded message |
//! | `get_conversation_history` | empty |
//! | `store_customer_account_url` | degraded URL record |
//! | `get_customer_account_url` | `None` |
//!
//! Degraded records carry the submitted values under the placeholder id
//! (see [`crate::store::ids::PLACEHOLDER_ID`]).

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::OnceCell;

use crate::config::StorageConfig;
use crate::store::errors::StoreResult;
use crate::store::handle::{StoreBackend, StoreHandle};
use crate::store::ids::{self, PLACEHOLDER_ID};
use crate::store::null::NullStoreHandle;
use crate::store::records::{
    CodeVerifier, CustomerAccountUrl, CustomerToken, Message, MessageRole,
};
use crate::store::sqlite::SqliteStoreHandle;

/// Default number of messages returned by `get_conversation_history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

static SHARED: OnceCell<Arc<ConversationStore>> = OnceCell::const_new();

/// Best-effort persistence for chat conversations and auth handshakes.
pub struct ConversationStore {
    handle: Arc<dyn StoreHandle>,
}

impl ConversationStore {
    /// Wrap an explicit handle.
    #[must_use]
    pub fn with_handle(handle: Arc<dyn StoreHandle>) -> Self {
        Self { handle }
    }

    /// Store that persists nothing.
    #[must_use]
    pub fn null() -> Self {
        Self::with_handle(Arc::new(NullStoreHandle::new()))
    }

    /// Open the configured database, falling back to the null store.
    ///
    /// Never fails: any open or schema error selects the null store.
    pub async fn connect(config: &StorageConfig) -> Self {
        if config.disabled {
            tracing::warn!("Database disabled by configuration, using null store");
            return Self::null();
        }

        match SqliteStoreHandle::open(&config.sqlite_path).await {
            Ok(handle) => {
                tracing::info!("Database opened at {}", config.sqlite_path.display());
                Self::with_handle(Arc::new(handle))
            }
            Err(err) => {
                tracing::warn!("Database connection failed, using null store: {err}");
                Self::null()
            }
        }
    }

    /// Process-wide store, opened on first use and reused afterwards.
    ///
    /// Later calls ignore `config`.
    pub async fn shared(config: &StorageConfig) -> Arc<Self> {
        SHARED
            .get_or_init(|| async { Arc::new(Self::connect(config).await) })
            .await
            .clone()
    }

    /// Backend behind this store.
    #[must_use]
    pub fn backend(&self) -> StoreBackend {
        self.handle.backend()
    }

    /// Connectivity check for diagnostics.
    ///
    /// # Errors
    /// Returns the handle's error when the store does not answer.
    pub async fn check_connection(&self) -> StoreResult<()> {
        self.handle.ping().await
    }

    /// Most recent customer token of a conversation.
    pub async fn get_customer_token(&self, conversation_id: &str) -> Option<CustomerToken> {
        let result = self
            .handle
            .find_latest_customer_token(conversation_id.to_string())
            .await;
        degrade("get_customer_token", result, || None)
    }

    /// Record a newly issued customer token.
    pub async fn store_customer_token(
        &self,
        conversation_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> CustomerToken {
        let token = CustomerToken {
            id: ids::token_id(),
            conversation_id: conversation_id.to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: expires_at.trunc_subsecs(3),
            created_at: now(),
        };
        let fallback = placeholder_token(&token);
        let result = self.handle.insert_customer_token(token).await;
        degrade("store_customer_token", result, || fallback)
    }

    /// Record a pending authorization attempt.
    pub async fn store_code_verifier(
        &self,
        state: &str,
        verifier: &str,
        expires_at: DateTime<Utc>,
    ) -> CodeVerifier {
        let record = CodeVerifier {
            id: ids::verifier_id(),
            state: state.to_string(),
            verifier: verifier.to_string(),
            expires_at: expires_at.trunc_subsecs(3),
            created_at: now(),
        };
        let fallback = CodeVerifier {
            id: PLACEHOLDER_ID.to_string(),
            ..record.clone()
        };
        let result = self.handle.insert_code_verifier(record).await;
        degrade("store_code_verifier", result, || fallback)
    }

    /// Verifier registered under `state`, expired or not.
    pub async fn get_code_verifier(&self, state: &str) -> Option<CodeVerifier> {
        let result = self.handle.find_code_verifier(state.to_string()).await;
        degrade("get_code_verifier", result, || None)
    }

    /// Append a message, creating the conversation on first write.
    pub async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Message {
        let created_at = now();
        let message = Message {
            id: ids::row_id(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at,
        };
        let fallback = Message {
            id: PLACEHOLDER_ID.to_string(),
            ..message.clone()
        };

        let result = match self
            .handle
            .upsert_conversation(conversation_id.to_string(), created_at)
            .await
        {
            Ok(_) => self.handle.insert_message(message).await,
            Err(err) => Err(err),
        };
        degrade("save_message", result, || fallback)
    }

    /// Oldest-first messages of a conversation, at most `limit`.
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Vec<Message> {
        let result = self
            .handle
            .list_messages(conversation_id.to_string(), limit)
            .await;
        degrade("get_conversation_history", result, Vec::new)
    }

    /// Attach or replace the account URL of a conversation.
    pub async fn store_customer_account_url(
        &self,
        conversation_id: &str,
        url: &str,
    ) -> CustomerAccountUrl {
        let at = now();
        let record = CustomerAccountUrl {
            id: ids::row_id(),
            conversation_id: conversation_id.to_string(),
            url: url.to_string(),
            created_at: at,
            updated_at: at,
        };
        let fallback = CustomerAccountUrl {
            id: PLACEHOLDER_ID.to_string(),
            ..record.clone()
        };
        let result = self.handle.upsert_customer_account_url(record).await;
        degrade("store_customer_account_url", result, || fallback)
    }

    /// Account URL of a conversation. An empty stored URL reads as `None`.
    pub async fn get_customer_account_url(&self, conversation_id: &str) -> Option<String> {
        let result = self
            .handle
            .find_customer_account_url(conversation_id.to_string())
            .await
            .map(|record| record.map(|r| r.url).filter(|url| !url.is_empty()));
        degrade("get_customer_account_url", result, || None)
    }
}

fn degrade<T>(operation: &'static str, result: StoreResult<T>, fallback: impl FnOnce() -> T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(operation, error = %err, "Database error, continuing without persistence");
            fallback()
        }
    }
}

fn placeholder_token(token: &CustomerToken) -> CustomerToken {
    CustomerToken {
        id: PLACEHOLDER_ID.to_string(),
        ..token.clone()
    }
}

// Stored timestamps have millisecond precision.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

//! Data-access surface shared by every backing store.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::errors::StoreResult;
use crate::store::records::{
    CodeVerifier, Conversation, CustomerAccountUrl, CustomerToken, Message,
};

/// Boxed future type for store handle operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which backing store a handle talks to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Live `SQLite` database.
    Sqlite,
    /// No-op stand-in, nothing is persisted.
    Null,
}

impl StoreBackend {
    /// Stable string form for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw access to persisted records.
///
/// Implementations surface every failure as an error; the degrade-to-default
/// policy lives one layer up in `ConversationStore`.
pub trait StoreHandle: Send + Sync {
    /// Backend label.
    fn backend(&self) -> StoreBackend;

    /// Check that the store answers.
    ///
    /// # Errors
    /// Returns an error if the store cannot be reached.
    fn ping(&self) -> StoreFuture<'_, StoreResult<()>>;

    /// Newest token for a conversation.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_latest_customer_token(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerToken>>>;

    /// Insert a token row.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert_customer_token(
        &self,
        token: CustomerToken,
    ) -> StoreFuture<'_, StoreResult<CustomerToken>>;

    /// Insert a verifier row. Fails when `state` is already taken.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the state is a duplicate.
    fn insert_code_verifier(
        &self,
        verifier: CodeVerifier,
    ) -> StoreFuture<'_, StoreResult<CodeVerifier>>;

    /// Verifier by unique state.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_code_verifier(&self, state: String)
    -> StoreFuture<'_, StoreResult<Option<CodeVerifier>>>;

    /// Create the conversation or refresh its `updated_at`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert_conversation(
        &self,
        conversation_id: String,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Conversation by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_conversation(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<Conversation>>>;

    /// Append a message row.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert_message(&self, message: Message) -> StoreFuture<'_, StoreResult<Message>>;

    /// Oldest-first messages of a conversation, at most `limit`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages(
        &self,
        conversation_id: String,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<Message>>>;

    /// Insert the account URL or replace `url` and `updated_at` of the existing row.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn upsert_customer_account_url(
        &self,
        record: CustomerAccountUrl,
    ) -> StoreFuture<'_, StoreResult<CustomerAccountUrl>>;

    /// Account URL row of a conversation.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn find_customer_account_url(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerAccountUrl>>>;
}

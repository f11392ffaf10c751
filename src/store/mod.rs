//! Conversation persistence with a degrade-to-default contract.
//!
//! - `handle`: the raw data-access trait shared by backends
//! - `sqlite`: `SQLite` backend
//! - `null`: no-op backend selected when the database is unavailable
//! - `conversation_store`: the total, typed API used by route handlers

pub mod conversation_store;
pub mod errors;
pub mod handle;
pub mod ids;
pub mod null;
pub mod records;
pub mod sqlite;

pub use conversation_store::{ConversationStore, DEFAULT_HISTORY_LIMIT};
pub use errors::{StoreError, StoreResult};
pub use handle::{StoreBackend, StoreFuture, StoreHandle};
pub use null::NullStoreHandle;
pub use records::{
    CodeVerifier, Conversation, CustomerAccountUrl, CustomerToken, Message, MessageRole,
};
pub use sqlite::SqliteStoreHandle;

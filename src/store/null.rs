//! No-op backing store used when no database can be opened.

use chrono::{DateTime, Utc};

use crate::store::errors::StoreResult;
use crate::store::handle::{StoreBackend, StoreFuture, StoreHandle};
use crate::store::ids::PLACEHOLDER_ID;
use crate::store::records::{
    CodeVerifier, Conversation, CustomerAccountUrl, CustomerToken, Message,
};

/// Store handle that persists nothing.
///
/// Reads come back empty. Writes echo the submitted record under
/// [`PLACEHOLDER_ID`] so callers can still render a provisional result.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStoreHandle;

impl NullStoreHandle {
    /// Create the null handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StoreHandle for NullStoreHandle {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Null
    }

    fn ping(&self) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn find_latest_customer_token(
        &self,
        _conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerToken>>> {
        Box::pin(async { Ok(None) })
    }

    fn insert_customer_token(
        &self,
        token: CustomerToken,
    ) -> StoreFuture<'_, StoreResult<CustomerToken>> {
        Box::pin(async move {
            Ok(CustomerToken {
                id: PLACEHOLDER_ID.to_string(),
                ..token
            })
        })
    }

    fn insert_code_verifier(
        &self,
        verifier: CodeVerifier,
    ) -> StoreFuture<'_, StoreResult<CodeVerifier>> {
        Box::pin(async move {
            Ok(CodeVerifier {
                id: PLACEHOLDER_ID.to_string(),
                ..verifier
            })
        })
    }

    fn find_code_verifier(
        &self,
        _state: String,
    ) -> StoreFuture<'_, StoreResult<Option<CodeVerifier>>> {
        Box::pin(async { Ok(None) })
    }

    fn upsert_conversation(
        &self,
        conversation_id: String,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            Ok(Conversation {
                id: conversation_id,
                created_at: now,
                updated_at: now,
            })
        })
    }

    fn find_conversation(
        &self,
        _conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
        Box::pin(async { Ok(None) })
    }

    fn insert_message(&self, message: Message) -> StoreFuture<'_, StoreResult<Message>> {
        Box::pin(async move {
            Ok(Message {
                id: PLACEHOLDER_ID.to_string(),
                ..message
            })
        })
    }

    fn list_messages(
        &self,
        _conversation_id: String,
        _limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<Message>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn upsert_customer_account_url(
        &self,
        record: CustomerAccountUrl,
    ) -> StoreFuture<'_, StoreResult<CustomerAccountUrl>> {
        Box::pin(async move {
            Ok(CustomerAccountUrl {
                id: PLACEHOLDER_ID.to_string(),
                ..record
            })
        })
    }

    fn find_customer_account_url(
        &self,
        _conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerAccountUrl>>> {
        Box::pin(async { Ok(None) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::MessageRole;

    #[tokio::test]
    async fn test_reads_are_empty() {
        let store = NullStoreHandle::new();
        assert!(store.ping().await.is_ok());
        assert!(
            store
                .find_latest_customer_token("c1".to_string())
                .await
                .unwrap()
                .is_none()
        );
        assert!(store.find_code_verifier("s1".to_string()).await.unwrap().is_none());
        assert!(store.list_messages("c1".to_string(), 50).await.unwrap().is_empty());
        assert!(
            store
                .find_customer_account_url("c1".to_string())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_writes_echo_placeholder_records() {
        let store = NullStoreHandle::new();
        let message = Message {
            id: "real-id".to_string(),
            conversation_id: "c1".to_string(),
            role: MessageRole::User,
            content: "hi".to_string(),
            created_at: Utc::now(),
        };

        let echoed = store.insert_message(message).await.unwrap();
        assert!(echoed.is_placeholder());
        assert_eq!(echoed.content, "hi");

        // Nothing was kept.
        assert!(store.list_messages("c1".to_string(), 50).await.unwrap().is_empty());
        assert_eq!(store.backend(), StoreBackend::Null);
    }
}

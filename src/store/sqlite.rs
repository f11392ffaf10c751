//! `SQLite` backing store.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::store::errors::{StoreError, StoreResult};
use crate::store::handle::{StoreBackend, StoreFuture, StoreHandle};
use crate::store::records::{
    CodeVerifier, Conversation, CustomerAccountUrl, CustomerToken, Message, MessageRole,
};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS customer_tokens (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        access_token TEXT NOT NULL,
        refresh_token TEXT,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_customer_tokens_conversation
        ON customer_tokens (conversation_id, created_at);
    CREATE TABLE IF NOT EXISTS code_verifiers (
        id TEXT PRIMARY KEY,
        state TEXT NOT NULL UNIQUE,
        verifier TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations (id),
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages (conversation_id, created_at);
    CREATE TABLE IF NOT EXISTS customer_account_urls (
        id TEXT NOT NULL,
        conversation_id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );";

type TokenRow = (String, String, String, Option<String>, i64, i64);
type VerifierRow = (String, String, String, i64, i64);
type MessageRow = (String, String, String, String, i64);
type AccountUrlRow = (String, String, String, i64, i64);

/// `SQLite` implementation of the store handle.
pub struct SqliteStoreHandle {
    conn: Connection,
}

impl SqliteStoreHandle {
    /// Open (or create) the database file and make sure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl StoreHandle for SqliteStoreHandle {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Sqlite
    }

    fn ping(&self) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.conn
                .call(|conn| {
                    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn find_latest_customer_token(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerToken>>> {
        Box::pin(async move {
            let row: Option<TokenRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, conversation_id, access_token, refresh_token, expires_at, created_at
                             FROM customer_tokens
                             WHERE conversation_id = ?1
                             ORDER BY created_at DESC, rowid DESC
                             LIMIT 1",
                            rusqlite::params![conversation_id],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                    row.get(5)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(token_from_row).transpose()
        })
    }

    fn insert_customer_token(
        &self,
        token: CustomerToken,
    ) -> StoreFuture<'_, StoreResult<CustomerToken>> {
        Box::pin(async move {
            let row = token.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO customer_tokens
                         (id, conversation_id, access_token, refresh_token, expires_at, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        rusqlite::params![
                            row.id,
                            row.conversation_id,
                            row.access_token,
                            row.refresh_token,
                            row.expires_at.timestamp_millis(),
                            row.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(token)
        })
    }

    fn insert_code_verifier(
        &self,
        verifier: CodeVerifier,
    ) -> StoreFuture<'_, StoreResult<CodeVerifier>> {
        Box::pin(async move {
            let row = verifier.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO code_verifiers (id, state, verifier, expires_at, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![
                            row.id,
                            row.state,
                            row.verifier,
                            row.expires_at.timestamp_millis(),
                            row.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(verifier)
        })
    }

    fn find_code_verifier(
        &self,
        state: String,
    ) -> StoreFuture<'_, StoreResult<Option<CodeVerifier>>> {
        Box::pin(async move {
            let row: Option<VerifierRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, state, verifier, expires_at, created_at
                             FROM code_verifiers WHERE state = ?1",
                            rusqlite::params![state],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(|(id, state, verifier, expires_at, created_at)| {
                Ok(CodeVerifier {
                    id,
                    state,
                    verifier,
                    expires_at: from_millis(expires_at)?,
                    created_at: from_millis(created_at)?,
                })
            })
            .transpose()
        })
    }

    fn upsert_conversation(
        &self,
        conversation_id: String,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            let now_ms = now.timestamp_millis();
            let (id, created_at, updated_at) = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO conversations (id, created_at, updated_at)
                         VALUES (?1, ?2, ?2)
                         ON CONFLICT (id) DO UPDATE SET updated_at = excluded.updated_at",
                        rusqlite::params![conversation_id, now_ms],
                    )?;
                    let row = conn.query_row(
                        "SELECT id, created_at, updated_at FROM conversations WHERE id = ?1",
                        rusqlite::params![conversation_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, i64>(1)?,
                                row.get::<_, i64>(2)?,
                            ))
                        },
                    )?;
                    Ok(row)
                })
                .await?;

            Ok(Conversation {
                id,
                created_at: from_millis(created_at)?,
                updated_at: from_millis(updated_at)?,
            })
        })
    }

    fn find_conversation(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<Conversation>>> {
        Box::pin(async move {
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, created_at, updated_at FROM conversations WHERE id = ?1",
                            rusqlite::params![conversation_id],
                            |row| {
                                Ok((
                                    row.get::<_, String>(0)?,
                                    row.get::<_, i64>(1)?,
                                    row.get::<_, i64>(2)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(|(id, created_at, updated_at)| {
                Ok(Conversation {
                    id,
                    created_at: from_millis(created_at)?,
                    updated_at: from_millis(updated_at)?,
                })
            })
            .transpose()
        })
    }

    fn insert_message(&self, message: Message) -> StoreFuture<'_, StoreResult<Message>> {
        Box::pin(async move {
            let row = message.clone();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO messages (id, conversation_id, role, content, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![
                            row.id,
                            row.conversation_id,
                            row.role.as_str(),
                            row.content,
                            row.created_at.timestamp_millis()
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(message)
        })
    }

    fn list_messages(
        &self,
        conversation_id: String,
        limit: usize,
    ) -> StoreFuture<'_, StoreResult<Vec<Message>>> {
        Box::pin(async move {
            // SQLite limits are signed; anything larger means "all rows".
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows: Vec<MessageRow> = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT id, conversation_id, role, content, created_at
                         FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at ASC, rowid ASC
                         LIMIT ?2",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![conversation_id, limit], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter().map(message_from_row).collect()
        })
    }

    fn upsert_customer_account_url(
        &self,
        record: CustomerAccountUrl,
    ) -> StoreFuture<'_, StoreResult<CustomerAccountUrl>> {
        Box::pin(async move {
            let row: AccountUrlRow = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO customer_account_urls
                         (id, conversation_id, url, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT (conversation_id) DO UPDATE
                         SET url = excluded.url, updated_at = excluded.updated_at",
                        rusqlite::params![
                            record.id,
                            record.conversation_id,
                            record.url,
                            record.created_at.timestamp_millis(),
                            record.updated_at.timestamp_millis()
                        ],
                    )?;
                    let row = conn.query_row(
                        "SELECT id, conversation_id, url, created_at, updated_at
                         FROM customer_account_urls WHERE conversation_id = ?1",
                        rusqlite::params![record.conversation_id],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        },
                    )?;
                    Ok(row)
                })
                .await?;

            account_url_from_row(row)
        })
    }

    fn find_customer_account_url(
        &self,
        conversation_id: String,
    ) -> StoreFuture<'_, StoreResult<Option<CustomerAccountUrl>>> {
        Box::pin(async move {
            let row: Option<AccountUrlRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, conversation_id, url, created_at, updated_at
                             FROM customer_account_urls WHERE conversation_id = ?1",
                            rusqlite::params![conversation_id],
                            |row| {
                                Ok((
                                    row.get(0)?,
                                    row.get(1)?,
                                    row.get(2)?,
                                    row.get(3)?,
                                    row.get(4)?,
                                ))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.map(account_url_from_row).transpose()
        })
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::InvalidRecord(format!("invalid timestamp: {ms}")))
}

fn token_from_row(row: TokenRow) -> StoreResult<CustomerToken> {
    let (id, conversation_id, access_token, refresh_token, expires_at, created_at) = row;
    Ok(CustomerToken {
        id,
        conversation_id,
        access_token,
        refresh_token,
        expires_at: from_millis(expires_at)?,
        created_at: from_millis(created_at)?,
    })
}

fn message_from_row(row: MessageRow) -> StoreResult<Message> {
    let (id, conversation_id, role, content, created_at) = row;
    let role = MessageRole::from_str(&role)
        .map_err(|err| StoreError::InvalidRecord(format!("invalid role: {err}")))?;
    Ok(Message {
        id,
        conversation_id,
        role,
        content,
        created_at: from_millis(created_at)?,
    })
}

fn account_url_from_row(row: AccountUrlRow) -> StoreResult<CustomerAccountUrl> {
    let (id, conversation_id, url, created_at, updated_at) = row;
    Ok(CustomerAccountUrl {
        id,
        conversation_id,
        url,
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(conversation_id: &str, id: &str, role: MessageRole, content: &str) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_messages_keep_insertion_order_within_same_millisecond() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        store
            .upsert_conversation("c1".to_string(), Utc::now())
            .await
            .unwrap();

        let now = Utc::now();
        for (idx, content) in ["first", "second", "third"].into_iter().enumerate() {
            let mut msg = message("c1", &format!("m{idx}"), MessageRole::User, content);
            msg.created_at = now;
            store.insert_message(msg).await.unwrap();
        }

        let listed = store.list_messages("c1".to_string(), 10).await.unwrap();
        let contents: Vec<&str> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        let limited = store.list_messages("c1".to_string(), 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].content, "first");
    }

    #[tokio::test]
    async fn test_message_requires_conversation_row() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        let result = store
            .insert_message(message("orphan", "m1", MessageRole::User, "hi"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upsert_conversation_keeps_created_at() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        let first = Utc::now();
        let later = first + Duration::seconds(30);

        let created = store
            .upsert_conversation("c1".to_string(), first)
            .await
            .unwrap();
        let touched = store
            .upsert_conversation("c1".to_string(), later)
            .await
            .unwrap();

        assert_eq!(created.created_at, touched.created_at);
        assert_eq!(touched.updated_at.timestamp_millis(), later.timestamp_millis());
    }

    #[tokio::test]
    async fn test_duplicate_state_is_rejected() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        let now = Utc::now();
        let verifier = CodeVerifier {
            id: "verifier_1_a".to_string(),
            state: "s1".to_string(),
            verifier: "v1".to_string(),
            expires_at: now,
            created_at: now,
        };
        store.insert_code_verifier(verifier.clone()).await.unwrap();

        let duplicate = CodeVerifier {
            id: "verifier_2_b".to_string(),
            ..verifier
        };
        assert!(store.insert_code_verifier(duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_account_url_upsert_keeps_row_id() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        let now = Utc::now();
        let first = CustomerAccountUrl {
            id: "url-1".to_string(),
            conversation_id: "c1".to_string(),
            url: "https://a".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.upsert_customer_account_url(first).await.unwrap();

        let second = CustomerAccountUrl {
            id: "url-2".to_string(),
            conversation_id: "c1".to_string(),
            url: "https://b".to_string(),
            created_at: now,
            updated_at: now,
        };
        let stored = store.upsert_customer_account_url(second).await.unwrap();

        assert_eq!(stored.id, "url-1");
        assert_eq!(stored.url, "https://b");
    }

    async fn account_url_rows(store: &SqliteStoreHandle, conversation_id: &str) -> i64 {
        let conversation_id = conversation_id.to_string();
        store
            .conn
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM customer_account_urls WHERE conversation_id = ?1",
                    rusqlite::params![conversation_id],
                    |row| row.get::<_, i64>(0),
                )?;
                Ok(count)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_account_url_keeps_one_row_per_conversation() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        let now = Utc::now();
        for (idx, url) in ["https://a", "https://b", "https://c"].into_iter().enumerate() {
            let record = CustomerAccountUrl {
                id: format!("url-{idx}"),
                conversation_id: "c1".to_string(),
                url: url.to_string(),
                created_at: now,
                updated_at: now,
            };
            store.upsert_customer_account_url(record).await.unwrap();
        }

        assert_eq!(account_url_rows(&store, "c1").await, 1);
        assert_eq!(account_url_rows(&store, "c2").await, 0);
        let stored = store
            .find_customer_account_url("c1".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.url, "https://c");
    }

    #[tokio::test]
    async fn test_list_messages_accepts_unbounded_limit() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        store
            .upsert_conversation("c1".to_string(), Utc::now())
            .await
            .unwrap();
        store
            .insert_message(message("c1", "m1", MessageRole::User, "hi"))
            .await
            .unwrap();

        let listed = store.list_messages("c1".to_string(), usize::MAX).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_and_backend() {
        let store = SqliteStoreHandle::open_in_memory().await.unwrap();
        assert!(store.ping().await.is_ok());
        assert_eq!(store.backend(), StoreBackend::Sqlite);
    }
}

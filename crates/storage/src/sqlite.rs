//! SQLite persistent store.
//!
//! One database file under the data directory holds the conversation
//! journal (`messages` table). Opened once per process and shared by every
//! agent; `close()` drains the pool and is the only supported way to
//! release the handle.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use troupe_core::error::StorageError;
use troupe_core::message::StoredMessage;

/// Persistent storage handle. Exposes `init()` and `close()` plus the
/// conversation journal operations the runtime uses.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at `<data_dir>/troupe.db`.
    ///
    /// The data directory is created if absent. Pass `":memory:"` via
    /// [`SqliteStore::open_path`] for an ephemeral database in tests.
    pub async fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StorageError::OpenFailed(format!("create {}: {e}", data_dir.display())))?;
        let db_path = data_dir.join("troupe.db");
        Self::open_path(&db_path.display().to_string()).await
    }

    /// Open a store at an explicit SQLite path string.
    pub async fn open_path(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::OpenFailed(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::OpenFailed(format!("failed to open SQLite: {e}")))?;

        info!(path, "SQLite store opened");
        Ok(Self { pool })
    }

    /// Run schema migrations. Idempotent.
    pub async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         TEXT PRIMARY KEY,
                agent_id   TEXT NOT NULL,
                sender     TEXT NOT NULL,
                text       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_agent_created
             ON messages(agent_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("agent index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Append one message to an agent's journal.
    pub async fn append_message(
        &self,
        agent_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<StoredMessage, StorageError> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            sender: sender.into(),
            text: text.into(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages (id, agent_id, sender, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&message.id)
        .bind(&message.agent_id)
        .bind(&message.sender)
        .bind(&message.text)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("insert message: {e}")))?;

        Ok(message)
    }

    /// Most recent messages for one agent, newest first.
    pub async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, agent_id, sender, text, created_at
             FROM messages WHERE agent_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("recent messages: {e}")))?;

        rows.iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| StorageError::QueryFailed(format!("bad timestamp: {e}")))?
                    .with_timezone(&Utc);
                Ok(StoredMessage {
                    id: row.get("id"),
                    agent_id: row.get("agent_id"),
                    sender: row.get("sender"),
                    text: row.get("text"),
                    created_at,
                })
            })
            .collect()
    }

    /// Close the store, draining the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite store closed");
    }
}

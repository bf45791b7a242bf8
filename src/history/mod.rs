//! Relational store for conversations, messages and feedback.
//!
//! Conversations own their messages (cascade delete); feedback references
//! messages the same way. Messages are ordered by (timestamp, rowid), so
//! concurrent writers against one conversation may interleave; the store's
//! write order is the only guarantee.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub source_chunks: Vec<String>,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(database_url: &str) -> Result<Self, ApiError> {
        // Set on the connect options so every pooled connection enforces
        // foreign keys, not just the one that runs a PRAGMA.
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| ApiError::internal(format!("Invalid database url: {}", e)))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to database: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init conversations table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                source_chunks TEXT,
                FOREIGN KEY(conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init messages table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feedback (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                rating INTEGER NOT NULL,
                comment TEXT,
                timestamp TEXT NOT NULL,
                FOREIGN KEY(message_id) REFERENCES messages(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init feedback table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_id
             ON messages(conversation_id)",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get the conversation row, creating it lazily on first use.
    /// Idempotent: calling twice with one id returns the same row.
    pub async fn get_or_create_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationRow, ApiError> {
        let now = chrono::Utc::now();
        let expires_at = now
            .date_naive()
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);

        sqlx::query(
            "INSERT OR IGNORE INTO conversations (id, created_at, expires_at) VALUES (?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let row = sqlx::query("SELECT id, created_at, expires_at FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(ConversationRow {
            id: row.try_get("id").unwrap_or_default(),
            created_at: row.try_get("created_at").unwrap_or_default(),
            expires_at: row.try_get("expires_at").unwrap_or_default(),
        })
    }

    pub async fn conversation_exists(&self, conversation_id: &str) -> Result<bool, ApiError> {
        let row = sqlx::query("SELECT id FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(row.is_some())
    }

    pub async fn save_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        source_chunks: &[String],
    ) -> Result<StoredMessage, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();
        let chunks_json =
            serde_json::to_string(source_chunks).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, timestamp, source_chunks)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(&timestamp)
        .bind(&chunks_json)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(StoredMessage {
            id,
            conversation_id: conversation_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp,
            source_chunks: source_chunks.to_vec(),
        })
    }

    /// Full message history in insertion order.
    pub async fn get_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, timestamp, source_chunks
             FROM messages WHERE conversation_id = ?
             ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    /// The `limit` most recent messages, oldest first.
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM (
                 SELECT id, conversation_id, role, content, timestamp, source_chunks, rowid
                 FROM messages WHERE conversation_id = ?
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?
             ) ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn save_feedback(
        &self,
        message_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<String, ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO feedback (id, message_id, rating, comment, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(message_id)
        .bind(rating)
        .bind(comment)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Could not record feedback: {}", e)))?;

        Ok(id)
    }

    pub async fn message_count(&self) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get(0))
            .unwrap_or(0);
        Ok(count)
    }

    pub async fn health(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> StoredMessage {
    let chunks_json: Option<String> = row.try_get("source_chunks").unwrap_or(None);
    let source_chunks = chunks_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    StoredMessage {
        id: row.try_get("id").unwrap_or_default(),
        conversation_id: row.try_get("conversation_id").unwrap_or_default(),
        role: row.try_get("role").unwrap_or_default(),
        content: row.try_get("content").unwrap_or_default(),
        timestamp: row.try_get("timestamp").unwrap_or_default(),
        source_chunks,
    }
}

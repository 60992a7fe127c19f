//! Repository for message data access operations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::{format_timestamp, Message, MessageContent, NewMessage};
use crate::store::MessageStore;
use crate::types::{DatabaseError, DatabaseResult};

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Move `reader`'s read cursor for the conversation with `peer` to the newest
    /// message `peer` has sent them, or to the newest one at or below `up_to`
    /// when given. The cursor never moves backwards.
    ///
    /// Returns the cursor position after the update.
    pub async fn mark_conversation_read(
        &self,
        reader: &str,
        peer: &str,
        up_to: Option<i64>,
    ) -> DatabaseResult<i64> {
        let newest: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(id) FROM messages
             WHERE sender_id = ? AND receiver_id = ? AND (? IS NULL OR id <= ?)",
        )
        .bind(peer)
        .bind(reader)
        .bind(up_to)
        .bind(up_to)
        .fetch_one(&self.pool)
        .await?;

        let Some(newest) = newest else {
            return Ok(self.read_cursor(reader, peer).await?);
        };

        let now = format_timestamp(&Utc::now());
        sqlx::query(
            r#"
            INSERT INTO conversation_reads (reader_id, peer_id, last_read_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(reader_id, peer_id) DO UPDATE SET
                last_read_id = MAX(conversation_reads.last_read_id, excluded.last_read_id),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(reader)
        .bind(peer)
        .bind(newest)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(reader, peer, last_read_id = newest, "conversation marked read");
        self.read_cursor(reader, peer).await
    }

    /// Current read cursor, 0 when `reader` never opened the conversation.
    pub async fn read_cursor(&self, reader: &str, peer: &str) -> DatabaseResult<i64> {
        let cursor: Option<i64> = sqlx::query_scalar(
            "SELECT last_read_id FROM conversation_reads WHERE reader_id = ? AND peer_id = ?",
        )
        .bind(reader)
        .bind(peer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor.unwrap_or(0))
    }

    /// Number of unread messages per sender for `reader`. Senders with nothing
    /// unread are absent from the map.
    pub async fn unseen_counts(&self, reader: &str) -> DatabaseResult<HashMap<String, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT m.sender_id AS sender_id, COUNT(*) AS unseen
            FROM messages m
            LEFT JOIN conversation_reads r
                ON r.reader_id = m.receiver_id AND r.peer_id = m.sender_id
            WHERE m.receiver_id = ? AND m.id > COALESCE(r.last_read_id, 0)
            GROUP BY m.sender_id
            "#,
        )
        .bind(reader)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok((row.try_get("sender_id")?, row.try_get("unseen")?)))
            .collect()
    }

    fn map_row(row: SqliteRow) -> DatabaseResult<Message> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| DatabaseError::InvalidRecord(format!("bad created_at {created_at}: {e}")))?
            .with_timezone(&Utc);

        let message = Message {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            text: row.try_get("text")?,
            image_url: row.try_get("image_url")?,
            created_at,
        };

        if message.content().is_none() {
            return Err(DatabaseError::InvalidRecord(format!(
                "message {} has neither or both of text and image_url",
                message.id
            )));
        }

        Ok(message)
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append(&self, mut message: NewMessage) -> DatabaseResult<Message> {
        // Stored with microsecond precision; keep the returned copy identical.
        message.created_at = message.created_at.trunc_subsecs(6);
        let created_at = format_timestamp(&message.created_at);

        let result = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, text, image_url, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(message.content.text())
        .bind(message.content.image_url())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();

        info!(
            message_id = id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            image = matches!(message.content, MessageContent::ImageUrl(_)),
            "stored message"
        );

        Ok(message.into_message(id))
    }

    async fn query_conversation(&self, a: &str, b: &str) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender_id, receiver_id, text, image_url, created_at
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::map_row).collect()
    }
}

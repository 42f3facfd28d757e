use crate::domain::message::{Container, Message, MessageDto, MessageState, NewMessage};
use crate::domain::pagination::PageRequest;
use crate::error::{AppError, Result};
use crate::storage::records::{MessageDtoRecord, MessageRecord};
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = r#"
    m.id,
    m.sender_id,
    s.username AS sender_username,
    (SELECT p.url FROM photos p WHERE p.user_id = s.id AND p.is_main LIMIT 1) AS sender_photo_url,
    m.recipient_id,
    r.username AS recipient_username,
    (SELECT p.url FROM photos p WHERE p.user_id = r.id AND p.is_main LIMIT 1) AS recipient_photo_url,
    m.content,
    m.message_sent,
    m.date_read"#;

const MESSAGE_JOINS: &str = r#"
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.recipient_id"#;

/// Filter for a mailbox view; `$1` is the username.
const fn container_filter(container: Container) -> &'static str {
    match container {
        Container::Inbox => "r.username = $1 AND m.recipient_deleted = FALSE",
        Container::Outbox => "s.username = $1 AND m.sender_deleted = FALSE",
        Container::Unread => "r.username = $1 AND m.recipient_deleted = FALSE AND m.date_read IS NULL",
    }
}

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a new message.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the sender or recipient does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, message), fields(message.id = %message.id))]
    pub(crate) async fn insert(&self, conn: &mut PgConnection, message: &NewMessage) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, content, message_sent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.content)
        .bind(message.message_sent)
        .execute(conn)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: sender or recipient does not exist
                Err(AppError::NotFound)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Writes the read timestamp and deletion flags of a message.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(message.id = %state.id))]
    pub(crate) async fn update_state(&self, conn: &mut PgConnection, state: &MessageState) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET date_read = $2, sender_deleted = $3, recipient_deleted = $4
            WHERE id = $1
            "#,
        )
        .bind(state.id)
        .bind(state.date_read)
        .bind(state.sender_deleted)
        .bind(state.recipient_deleted)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Removes a message row.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete(&self, conn: &mut PgConnection, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1").bind(id).execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Fetches a message with both parties resolved.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: Uuid) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS}, m.sender_deleted, m.recipient_deleted {MESSAGE_JOINS} WHERE m.id = $1"
        );
        let record = sqlx::query_as::<_, MessageRecord>(&sql).bind(id).fetch_optional(conn).await?;
        Ok(record.map(Into::into))
    }

    /// Counts the messages `username` sees in `container`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_for_user(
        &self,
        conn: &mut PgConnection,
        username: &str,
        container: Container,
    ) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) {MESSAGE_JOINS} WHERE {}", container_filter(container));
        let count = sqlx::query_scalar::<_, i64>(&sql).bind(username).fetch_one(conn).await?;
        Ok(count)
    }

    /// Fetches one page of a mailbox view, newest first, projected to DTOs.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn page_for_user(
        &self,
        conn: &mut PgConnection,
        username: &str,
        container: Container,
        page: PageRequest,
    ) -> Result<Vec<MessageDto>> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            {MESSAGE_JOINS}
            WHERE {}
            ORDER BY m.message_sent DESC, m.id DESC
            LIMIT $2 OFFSET $3
            "#,
            container_filter(container)
        );
        let records = sqlx::query_as::<_, MessageDtoRecord>(&sql)
            .bind(username)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(conn)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Fetches the conversation between two users, oldest first. Each direction is
    /// filtered by the deletion flag on `current_user`'s side. The message rows stay
    /// locked until the caller's transaction ends.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_thread(
        &self,
        conn: &mut PgConnection,
        current_user: &str,
        other_user: &str,
    ) -> Result<Vec<Message>> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}, m.sender_deleted, m.recipient_deleted
            {MESSAGE_JOINS}
            WHERE (r.username = $1 AND s.username = $2 AND m.recipient_deleted = FALSE)
               OR (s.username = $1 AND r.username = $2 AND m.sender_deleted = FALSE)
            ORDER BY m.message_sent ASC, m.id ASC
            FOR UPDATE OF m
            "#
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(current_user)
            .bind(other_user)
            .fetch_all(conn)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Stamps the read time on the given messages that are still unread and returns
    /// the stored `(id, date_read)` of every row it changed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn, ids), fields(count = ids.len()))]
    pub(crate) async fn mark_read(
        &self,
        conn: &mut PgConnection,
        ids: &[Uuid],
        at: OffsetDateTime,
    ) -> Result<Vec<(Uuid, OffsetDateTime)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stamped = sqlx::query_as::<_, (Uuid, OffsetDateTime)>(
            r#"
            UPDATE messages SET date_read = $2
            WHERE id = ANY($1) AND date_read IS NULL
            RETURNING id, date_read
            "#,
        )
        .bind(ids)
        .bind(at)
        .fetch_all(conn)
        .await?;
        Ok(stamped)
    }
}

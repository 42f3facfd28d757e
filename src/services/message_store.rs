use crate::domain::message::{Container, DeleteOutcome, Message, MessageDto, MessageState, NewMessage, now_utc};
use crate::domain::pagination::{PageRequest, PagedList};
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use crate::storage::unit_of_work::{ChangeSet, PendingChange};
use crate::storage::user_repo::UserRepository;
use opentelemetry::{global, metrics::Counter};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    marked_read_total: Counter<u64>,
    purged_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("dm-store");
        Self {
            sent_total: meter
                .u64_counter("dm_messages_sent_total")
                .with_description("Total messages committed by a save")
                .build(),
            marked_read_total: meter
                .u64_counter("dm_messages_marked_read_total")
                .with_description("Total messages stamped read by thread retrieval")
                .build(),
            purged_total: meter
                .u64_counter("dm_messages_purged_total")
                .with_description("Total messages physically removed")
                .build(),
        }
    }
}

/// Listing parameters for [`MessageStore::get_for_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParams {
    pub username: String,
    pub container: Container,
    pub page: PageRequest,
}

impl MessageParams {
    #[must_use]
    pub fn new(username: impl Into<String>, container: Container, page: PageRequest) -> Self {
        Self { username: username.into(), container, page }
    }
}

/// Read/write access to direct messages for one unit of work.
///
/// Reads go straight to the database. Writes are staged with the `stage_*`
/// methods, can be inspected through [`MessageStore::pending_changes`], and are
/// written in a single transaction by [`MessageStore::save_changes`].
#[derive(Debug)]
pub struct MessageStore {
    pool: DbPool,
    repo: MessageRepository,
    user_repo: UserRepository,
    changes: ChangeSet,
    metrics: Metrics,
}

impl MessageStore {
    #[must_use]
    pub fn new(pool: DbPool, repo: MessageRepository, user_repo: UserRepository) -> Self {
        Self { pool, repo, user_repo, changes: ChangeSet::new(), metrics: Metrics::new() }
    }

    pub fn stage_add(&mut self, message: NewMessage) {
        self.changes.insert(message);
    }

    /// Stages the read timestamp and deletion flags of `message`.
    pub fn stage_update(&mut self, message: &Message) {
        self.changes.update(MessageState::from(message));
    }

    /// Stages physical removal of `message`.
    pub fn stage_delete(&mut self, message: &Message) {
        self.changes.delete(message.id);
    }

    #[must_use]
    pub fn pending_changes(&self) -> &[PendingChange] {
        self.changes.pending()
    }

    /// Resolves both usernames and stages a new message between them.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for a message to oneself or empty content.
    /// Returns `AppError::NotFound` if either user does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, content))]
    pub async fn stage_send(&mut self, sender: &str, recipient: &str, content: &str) -> Result<NewMessage> {
        if sender == recipient {
            return Err(AppError::BadRequest("You cannot send messages to yourself".into()));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("Message content must not be empty".into()));
        }

        let mut conn = self.pool.acquire().await?;
        let sender = self.user_repo.find_by_username(&mut conn, sender).await?.ok_or(AppError::NotFound)?;
        let recipient = self.user_repo.find_by_username(&mut conn, recipient).await?.ok_or(AppError::NotFound)?;

        let message = NewMessage::new(sender.id, recipient.id, content);
        self.stage_add(message.clone());
        Ok(message)
    }

    /// Applies a delete request from one party: the caller's flag is set, and once
    /// both parties have deleted the message it is staged for removal.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::Forbidden` if `username` is not a party to it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn stage_delete_for_user(&mut self, id: Uuid, username: &str) -> Result<DeleteOutcome> {
        let mut message = self.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        let outcome = message.delete_for(username)?;
        match outcome {
            DeleteOutcome::SoftDeleted => self.stage_update(&message),
            DeleteOutcome::Purged => self.stage_delete(&message),
        }
        Ok(outcome)
    }

    /// Fetches a message with sender and recipient resolved.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure. Absence is `Ok(None)`.
    #[tracing::instrument(level = "debug", err, skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Message>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_by_id(&mut conn, id).await
    }

    /// Lists one page of a mailbox view, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure.
    #[tracing::instrument(
        level = "debug",
        err,
        skip(self, params),
        fields(container = %params.container, page = params.page.number(), total = tracing::field::Empty)
    )]
    pub async fn get_for_user(&self, params: &MessageParams) -> Result<PagedList<MessageDto>> {
        let mut conn = self.pool.acquire().await?;

        let total = self.repo.count_for_user(&mut conn, &params.username, params.container).await?;
        tracing::Span::current().record("total", total);

        let items = if total > params.page.offset() {
            self.repo.page_for_user(&mut conn, &params.username, params.container, params.page).await?
        } else {
            Vec::new()
        };

        Ok(PagedList::new(items, u64::try_from(total).unwrap_or_default(), params.page))
    }

    /// Returns the conversation between `current_user` and `other_user`, oldest
    /// first. Messages addressed to `current_user` that were unread are stamped
    /// read and persisted before returning; staged changes are left untouched.
    /// The thread rows are locked for the duration, so concurrent readers see the
    /// stamp written by whichever call committed first.
    ///
    /// # Errors
    /// Returns `AppError::Database` on storage failure; nothing is marked read then.
    #[tracing::instrument(err, skip(self), fields(marked_read = tracing::field::Empty))]
    pub async fn get_thread(&self, current_user: &str, other_user: &str) -> Result<Vec<MessageDto>> {
        let mut tx = self.pool.begin().await?;

        let mut messages = self.repo.fetch_thread(&mut tx, current_user, other_user).await?;
        debug_assert!(messages.iter().all(|m| m.is_visible_in_thread(current_user, other_user)));

        let unread: Vec<Uuid> =
            messages.iter().filter(|m| m.is_addressed_to(current_user) && m.is_unread()).map(|m| m.id).collect();

        if !unread.is_empty() {
            let stamped = self.repo.mark_read(&mut tx, &unread, now_utc()).await?;
            for (id, read_at) in &stamped {
                if let Some(message) = messages.iter_mut().find(|m| m.id == *id) {
                    message.mark_read(*read_at);
                }
            }
            let marked = stamped.len() as u64;
            tracing::Span::current().record("marked_read", marked);
            self.metrics.marked_read_total.add(marked, &[]);
        }

        tx.commit().await?;

        Ok(messages.iter().map(MessageDto::from).collect())
    }

    /// Writes every staged change in one transaction. Returns whether any row was
    /// affected. On failure nothing is written and the changes stay staged.
    ///
    /// # Errors
    /// Returns the storage error that aborted the transaction.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(pending = self.changes.len()))]
    pub async fn save_changes(&mut self) -> Result<bool> {
        if self.changes.is_empty() {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        let affected = self.changes.apply(&mut tx, &self.repo).await?;
        tx.commit().await?;

        let (inserted, deleted) = self.changes.pending().iter().fold((0, 0), |(i, d), change| match change {
            PendingChange::Insert(_) => (i + 1, d),
            PendingChange::Delete(_) => (i, d + 1),
            PendingChange::Update(_) => (i, d),
        });
        self.metrics.sent_total.add(inserted, &[]);
        self.metrics.purged_total.add(deleted, &[]);
        self.changes.clear();

        tracing::debug!(affected = affected, "Changes saved");
        Ok(affected > 0)
    }
}

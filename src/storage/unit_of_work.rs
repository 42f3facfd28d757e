use crate::domain::message::{MessageState, NewMessage};
use crate::error::Result;
use crate::storage::message_repo::MessageRepository;
use sqlx::PgConnection;
use uuid::Uuid;

/// A write waiting for the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    Insert(NewMessage),
    Update(MessageState),
    Delete(Uuid),
}

impl PendingChange {
    #[must_use]
    pub const fn message_id(&self) -> Uuid {
        match self {
            Self::Insert(message) => message.id,
            Self::Update(state) => state.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Ordered list of staged writes.
///
/// Staging the same message twice keeps only the latest intent: a later update
/// replaces an earlier one, and a delete supersedes any update. An update of a
/// message staged for insertion is applied after the insert.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<PendingChange>,
}

impl ChangeSet {
    #[must_use]
    pub const fn new() -> Self {
        Self { changes: Vec::new() }
    }

    pub fn insert(&mut self, message: NewMessage) {
        self.changes.push(PendingChange::Insert(message));
    }

    pub fn update(&mut self, state: MessageState) {
        let id = state.id;
        if self.changes.iter().any(|c| matches!(c, PendingChange::Delete(d) if *d == id)) {
            return;
        }
        self.changes.retain(|c| !matches!(c, PendingChange::Update(s) if s.id == id));
        self.changes.push(PendingChange::Update(state));
    }

    pub fn delete(&mut self, id: Uuid) {
        // An insert that never reached the database can simply be dropped.
        let staged_insert = self.changes.iter().any(|c| matches!(c, PendingChange::Insert(m) if m.id == id));
        self.changes.retain(|c| c.message_id() != id);
        if !staged_insert {
            self.changes.push(PendingChange::Delete(id));
        }
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingChange] {
        &self.changes
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Executes every staged change in order on `conn`, returning the rows affected.
    /// The caller owns the transaction.
    ///
    /// # Errors
    /// Returns the first storage error; later changes are not attempted.
    pub(crate) async fn apply(&self, conn: &mut PgConnection, repo: &MessageRepository) -> Result<u64> {
        let mut affected = 0;
        for change in &self.changes {
            affected += match change {
                PendingChange::Insert(message) => repo.insert(&mut *conn, message).await?,
                PendingChange::Update(state) => repo.update_state(&mut *conn, state).await?,
                PendingChange::Delete(id) => repo.delete(&mut *conn, *id).await?,
            };
        }
        Ok(affected)
    }
}

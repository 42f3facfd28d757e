use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Resolved identity of one side of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub sender: Participant,
    pub recipient: Participant,
    pub content: String,
    pub message_sent: OffsetDateTime,
    pub date_read: Option<OffsetDateTime>,
    pub sender_deleted: bool,
    pub recipient_deleted: bool,
}

/// What a party's delete request did to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    /// Hidden from the requesting party only.
    SoftDeleted,
    /// Both parties deleted it; the row is removed.
    Purged,
}

impl Message {
    #[must_use]
    pub const fn is_unread(&self) -> bool {
        self.date_read.is_none()
    }

    #[must_use]
    pub fn is_addressed_to(&self, username: &str) -> bool {
        self.recipient.username == username
    }

    /// Whether this message belongs to the thread `current_user` has with `other_user`,
    /// honouring the deletion flag of the side `current_user` is on.
    #[must_use]
    pub fn is_visible_in_thread(&self, current_user: &str, other_user: &str) -> bool {
        let incoming = self.recipient.username == current_user
            && self.sender.username == other_user
            && !self.recipient_deleted;
        let outgoing = self.sender.username == current_user
            && self.recipient.username == other_user
            && !self.sender_deleted;
        incoming || outgoing
    }

    /// Stamps the read time. Returns false when the message was already read.
    pub fn mark_read(&mut self, at: OffsetDateTime) -> bool {
        if self.date_read.is_some() {
            return false;
        }
        self.date_read = Some(at);
        true
    }

    /// Sets the deletion flag belonging to `username`.
    ///
    /// # Errors
    /// Returns `AppError::Forbidden` if `username` is neither sender nor recipient.
    pub fn delete_for(&mut self, username: &str) -> Result<DeleteOutcome> {
        let is_sender = self.sender.username == username;
        let is_recipient = self.recipient.username == username;
        if !is_sender && !is_recipient {
            return Err(AppError::Forbidden);
        }

        if is_sender {
            self.sender_deleted = true;
        }
        if is_recipient {
            self.recipient_deleted = true;
        }

        if self.sender_deleted && self.recipient_deleted {
            Ok(DeleteOutcome::Purged)
        } else {
            Ok(DeleteOutcome::SoftDeleted)
        }
    }
}

/// A message that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub message_sent: OffsetDateTime,
}

impl NewMessage {
    #[must_use]
    pub fn new(sender_id: Uuid, recipient_id: Uuid, content: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), sender_id, recipient_id, content: content.into(), message_sent: now_utc() }
    }
}

/// Mutable columns of a stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    pub id: Uuid,
    pub date_read: Option<OffsetDateTime>,
    pub sender_deleted: bool,
    pub recipient_deleted: bool,
}

impl From<&Message> for MessageState {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            date_read: message.date_read,
            sender_deleted: message.sender_deleted,
            recipient_deleted: message.recipient_deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_photo_url: Option<String>,
    pub recipient_id: Uuid,
    pub recipient_username: String,
    pub recipient_photo_url: Option<String>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub date_read: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub message_sent: OffsetDateTime,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender.id,
            sender_username: message.sender.username.clone(),
            sender_photo_url: message.sender.photo_url.clone(),
            recipient_id: message.recipient.id,
            recipient_username: message.recipient.username.clone(),
            recipient_photo_url: message.recipient.photo_url.clone(),
            content: message.content.clone(),
            date_read: message.date_read,
            message_sent: message.message_sent,
        }
    }
}

/// Mailbox view requested by a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Container {
    Inbox,
    Outbox,
    #[default]
    Unread,
}

impl Container {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Outbox => "Outbox",
            Self::Unread => "Unread",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Container {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "outbox" => Ok(Self::Outbox),
            "unread" => Ok(Self::Unread),
            other => Err(AppError::BadRequest(format!("unknown container '{other}'"))),
        }
    }
}

/// Current UTC time truncated to the microsecond precision Postgres stores.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000).unwrap_or(now)
}

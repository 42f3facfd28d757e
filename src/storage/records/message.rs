use crate::domain::message::{Message, MessageDto, Participant};
use time::OffsetDateTime;
use uuid::Uuid;

/// A message row joined with both parties and their main photos.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) sender_username: String,
    pub(crate) sender_photo_url: Option<String>,
    pub(crate) recipient_id: Uuid,
    pub(crate) recipient_username: String,
    pub(crate) recipient_photo_url: Option<String>,
    pub(crate) content: String,
    pub(crate) message_sent: OffsetDateTime,
    pub(crate) date_read: Option<OffsetDateTime>,
    pub(crate) sender_deleted: bool,
    pub(crate) recipient_deleted: bool,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            sender: Participant {
                id: record.sender_id,
                username: record.sender_username,
                photo_url: record.sender_photo_url,
            },
            recipient: Participant {
                id: record.recipient_id,
                username: record.recipient_username,
                photo_url: record.recipient_photo_url,
            },
            content: record.content,
            message_sent: record.message_sent,
            date_read: record.date_read,
            sender_deleted: record.sender_deleted,
            recipient_deleted: record.recipient_deleted,
        }
    }
}

/// Projection row selected straight into the DTO shape.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MessageDtoRecord {
    pub(crate) id: Uuid,
    pub(crate) sender_id: Uuid,
    pub(crate) sender_username: String,
    pub(crate) sender_photo_url: Option<String>,
    pub(crate) recipient_id: Uuid,
    pub(crate) recipient_username: String,
    pub(crate) recipient_photo_url: Option<String>,
    pub(crate) content: String,
    pub(crate) message_sent: OffsetDateTime,
    pub(crate) date_read: Option<OffsetDateTime>,
}

impl From<MessageDtoRecord> for MessageDto {
    fn from(record: MessageDtoRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            sender_username: record.sender_username,
            sender_photo_url: record.sender_photo_url,
            recipient_id: record.recipient_id,
            recipient_username: record.recipient_username,
            recipient_photo_url: record.recipient_photo_url,
            content: record.content,
            date_read: record.date_read,
            message_sent: record.message_sent,
        }
    }
}

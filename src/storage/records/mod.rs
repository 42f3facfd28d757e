pub(crate) mod message;
pub(crate) mod user;

pub(crate) use message::{MessageDtoRecord, MessageRecord};
pub(crate) use user::UserRecord;

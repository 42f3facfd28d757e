pub mod message;
pub mod pagination;
pub mod user;

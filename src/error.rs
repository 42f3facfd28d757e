use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Process exit code used by the CLI when an operation fails with this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Database(_) | Self::Migration(_) => 1,
            Self::NotFound => 3,
            Self::Forbidden => 4,
            Self::BadRequest(_) => 2,
        }
    }
}

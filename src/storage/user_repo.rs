use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::records::UserRecord;
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Creates a user with no photos.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the username is taken.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn create(&self, conn: &mut PgConnection, username: &str) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (username)
            VALUES ($1)
            RETURNING id, username, NULL::TEXT AS photo_url
            "#,
        )
        .bind(username)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(AppError::BadRequest(format!("username '{username}' is taken")))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Attaches a photo to a user. A main photo replaces any previous main photo.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, url))]
    pub async fn add_photo(&self, conn: &mut PgConnection, user_id: Uuid, url: &str, is_main: bool) -> Result<()> {
        if is_main {
            sqlx::query("UPDATE photos SET is_main = FALSE WHERE user_id = $1 AND is_main")
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
        }

        let result = sqlx::query("INSERT INTO photos (user_id, url, is_main) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(url)
            .bind(is_main)
            .execute(conn)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Looks a user up by username, resolving the main photo.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub async fn find_by_username(&self, conn: &mut PgConnection, username: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.username, p.url AS photo_url
            FROM users u
            LEFT JOIN photos p ON p.user_id = u.id AND p.is_main
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }
}

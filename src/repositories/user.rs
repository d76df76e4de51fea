use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;

use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// Credential storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by their email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Creates a new user. Fails with `DuplicateUser` when the email is
    /// already registered.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User>;
}

/// `UserRepository` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, password_hash, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        Ok(row.as_ref().map(User::from))
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (email, password_hash)
                VALUES ($1, $2)
                RETURNING id, email, password_hash, created_at, updated_at
                "#,
                &[&email, &password_hash],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::DuplicateUser
                } else {
                    AppError::from(e)
                }
            })?;

        let user = User::from(&row);
        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }
}

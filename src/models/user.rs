use chrono::{DateTime, Utc};
use tokio_postgres::Row;

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: i64,
    /// The user's email address, unique across users.
    pub email: String,
    /// The user's Argon2 password hash in PHC format.
    pub password_hash: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for User {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

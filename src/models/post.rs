use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// Represents a blog post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// The unique identifier for the post.
    pub id: i64,
    /// The ID of the user who owns the post.
    pub user_id: i64,
    /// The post title.
    pub title: String,
    /// The post body.
    pub body: String,
    /// Web path of the attached image, if any.
    pub image_url: Option<String>,
    /// The timestamp when the post was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the post was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for Post {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            body: row.get("body"),
            image_url: row.get("image_url"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// The fields needed to insert a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
}

/// A partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
}

impl Post {
    /// Applies `changes` in place.
    pub fn apply(&mut self, changes: PostChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(body) = changes.body {
            self.body = body;
        }
        if let Some(image_url) = changes.image_url {
            self.image_url = Some(image_url);
        }
    }
}

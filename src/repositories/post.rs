use async_trait::async_trait;
use deadpool_postgres::Pool;

use crate::{
    error::{AppError, Result},
    models::post::{NewPost, Post},
};

/// Post storage.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Inserts a post.
    async fn insert(&self, post: NewPost) -> Result<Post>;

    /// Finds a post by its ID.
    async fn find_by_id(&self, post_id: i64) -> Result<Option<Post>>;

    /// The most recent posts across all users, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Post>>;

    /// All posts of one user, newest first.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Post>>;

    /// Persists title, body and image of an existing post.
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Deletes a post. Fails with `NotFound` if it does not exist.
    async fn delete(&self, post_id: i64) -> Result<()>;
}

/// `PostRepository` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgPostRepository {
    pool: Pool,
}

impl PgPostRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO posts (user_id, title, body, image_url)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, title, body, image_url, created_at, updated_at
                "#,
                &[&post.user_id, &post.title, &post.body, &post.image_url],
            )
            .await?;
        Ok(Post::from(&row))
    }

    async fn find_by_id(&self, post_id: i64) -> Result<Option<Post>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, user_id, title, body, image_url, created_at, updated_at
                FROM posts
                WHERE id = $1
                "#,
                &[&post_id],
            )
            .await?;
        Ok(row.as_ref().map(Post::from))
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Post>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, user_id, title, body, image_url, created_at, updated_at
                FROM posts
                ORDER BY created_at DESC, id DESC
                LIMIT $1
                "#,
                &[&limit],
            )
            .await?;
        Ok(rows.iter().map(Post::from).collect())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Post>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, user_id, title, body, image_url, created_at, updated_at
                FROM posts
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(Post::from).collect())
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE posts
                SET title = $1, body = $2, image_url = $3, updated_at = NOW()
                WHERE id = $4
                RETURNING id, user_id, title, body, image_url, created_at, updated_at
                "#,
                &[&post.title, &post.body, &post.image_url, &post.id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(Post::from(&row))
    }

    async fn delete(&self, post_id: i64) -> Result<()> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM posts WHERE id = $1", &[&post_id])
            .await?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

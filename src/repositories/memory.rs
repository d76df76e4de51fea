//! In-process stores. Used by the test suite and for running the server
//! without Redis; nothing here survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        post::{NewPost, Post},
        session::Session,
        user::User,
    },
    repositories::{post::PostRepository, session::SessionStore, user::UserRepository},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    next_user_id: i64,
    next_post_id: i64,
}

/// Users and posts held in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(AppError::DuplicateUser);
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let mut tables = self.tables.write().await;
        if !tables.users.iter().any(|u| u.id == post.user_id) {
            return Err(AppError::Persistence(format!(
                "user {} does not exist",
                post.user_id
            )));
        }

        tables.next_post_id += 1;
        let now = Utc::now();
        let post = Post {
            id: tables.next_post_id,
            user_id: post.user_id,
            title: post.title,
            body: post.body,
            image_url: post.image_url,
            created_at: now,
            updated_at: now,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, post_id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts = tables.posts.clone();
        newest_first(&mut posts);
        posts.truncate(limit.max(0) as usize);
        Ok(posts)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut posts);
        Ok(posts)
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(AppError::NotFound)?;

        stored.title = post.title.clone();
        stored.body = post.body.clone();
        stored.image_url = post.image_url.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, post_id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != post_id);
        if tables.posts.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

/// Sessions held in memory. Expired records are dropped when read, and
/// every save sweeps out the rest.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &Uuid) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        let session = match sessions.get(session_id) {
            Some(session) => session.clone(),
            None => return Ok(None),
        };

        if Utc::now() >= session.expires_at {
            sessions.remove(session_id);
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn save(&self, session_id: &Uuid, session: &Session) -> Result<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        // Records nobody reads again would otherwise stay forever.
        sessions.retain(|_, stored| now < stored.expires_at);
        sessions.insert(*session_id, session.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &Uuid) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

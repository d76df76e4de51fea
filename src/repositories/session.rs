use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::{error::Result, models::session::Session};

/// Server-side session records keyed by the id carried in the cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session. Unknown ids and unreadable records yield `None`.
    async fn load(&self, session_id: &Uuid) -> Result<Option<Session>>;

    /// Writes the whole record in one operation; it expires with the
    /// session.
    async fn save(&self, session_id: &Uuid, session: &Session) -> Result<()>;

    /// Drops a record.
    async fn remove(&self, session_id: &Uuid) -> Result<()>;
}

fn session_key(session_id: &Uuid) -> String {
    format!("session:{}", session_id)
}

/// `SessionStore` backed by Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    /// Connects to the Redis server at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &Uuid) -> Result<Option<Session>> {
        let mut redis = self.redis.clone();
        let raw: Option<String> = redis.get(session_key(session_id)).await?;
        Ok(raw.as_deref().and_then(Session::decode))
    }

    async fn save(&self, session_id: &Uuid, session: &Session) -> Result<()> {
        let session_json = session.encode()?;
        let mut redis = self.redis.clone();
        let _: () = redis
            .set_ex(
                session_key(session_id),
                &session_json,
                session.ttl_secs(Utc::now()),
            )
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis set_ex failed: {}", e);
                e
            })?;

        tracing::debug!("✅ Session saved to Redis: session:{}", session_id);
        Ok(())
    }

    async fn remove(&self, session_id: &Uuid) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(session_key(session_id)).await?;
        Ok(())
    }
}

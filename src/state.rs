use std::sync::Arc;

use sha2::{Digest, Sha512};
use tower_cookies::Key;

use crate::config::Config;
use crate::crypto::password::Hasher;
use crate::error::Result;
use crate::repositories::{
    memory::MemorySessionStore,
    post::{PgPostRepository, PostRepository},
    session::{RedisSessionStore, SessionStore},
    user::{PgUserRepository, UserRepository},
};

/// Derives the 64-byte cookie signing key from the configured secret.
pub fn cookie_key(secret: &[u8]) -> Key {
    let digest = Sha512::digest(secret);
    Key::from(digest.as_slice())
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The credential store.
    pub users: Arc<dyn UserRepository>,
    /// The post store.
    pub posts: Arc<dyn PostRepository>,
    /// The session store.
    pub sessions: Arc<dyn SessionStore>,
    /// The password hasher.
    pub hasher: Hasher,
    /// The key session cookies are signed with.
    pub cookie_key: Key,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL and, when configured,
    /// Redis.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        crate::db::migrate(&db).await?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let sessions: Arc<dyn SessionStore> = match &config.redis_url {
            Some(redis_url) => {
                let store = RedisSessionStore::connect(redis_url).await?;
                tracing::info!("✅ Redis session store initialized");
                Arc::new(store)
            }
            None => {
                tracing::warn!("⚠️ REDIS_URL not set, sessions are kept in process memory");
                Arc::new(MemorySessionStore::new())
            }
        };

        Self::with_stores(
            config,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgPostRepository::new(db)),
            sessions,
        )
    }

    /// Creates an `AppState` around the given stores.
    pub fn with_stores(
        config: &Config,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let hasher = Hasher::new(config.hash_cost)?;
        tracing::info!("✅ Password hasher initialized");

        Ok(AppState {
            users,
            posts,
            sessions,
            hasher,
            cookie_key: cookie_key(&config.session_secret),
            config: config.clone(),
        })
    }
}

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use crate::error::{AppError, Result};
use std::time::Duration;

/// Tables and indexes, created idempotently at startup.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS posts (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    image_url TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS posts_user_id_idx ON posts (user_id);
CREATE INDEX IF NOT EXISTS posts_created_at_idx ON posts (created_at DESC);
"#;

/// Creates a new database connection pool.
///
/// # Arguments
///
/// * `database_url` - The URL of the PostgreSQL database.
///
/// # Returns
///
/// A `Result` containing the `Pool`.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let mut cfg = Config::new();
    let pg_config: tokio_postgres::Config = database_url.parse()?;

    if let Some(host) = pg_config.get_hosts().first() {
        if let tokio_postgres::config::Host::Tcp(hostname) = host {
            cfg.host = Some(hostname.to_string());
        }
    }

    if let Some(port) = pg_config.get_ports().first() {
        cfg.port = Some(*port);
    }

    if let Some(dbname) = pg_config.get_dbname() {
        cfg.dbname = Some(dbname.to_string());
    }

    if let Some(user) = pg_config.get_user() {
        cfg.user = Some(user.to_string());
    }

    if let Some(password) = pg_config.get_password() {
        cfg.password = Some(String::from_utf8_lossy(password).to_string());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.pool = Some(PoolConfig {
        max_size: 32,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(2)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(AppError::from)
}

/// Creates the tables the application needs if they are missing.
pub async fn migrate(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("✅ Database schema is up to date");
    Ok(())
}

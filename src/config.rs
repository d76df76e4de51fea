use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Longest accepted session lifetime, in days.
pub const MAX_SESSION_DURATION_DAYS: i64 = 3650;

/// The deployment mode selected by `APP_ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    /// Local development: fixed port, public database URL.
    Dev,
    /// Production: cookies are marked `Secure`.
    Production,
    /// Anything else.
    Default,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("dev") => AppEnv::Dev,
            Some("production") => AppEnv::Production,
            _ => AppEnv::Default,
        }
    }
}

/// Who may delete a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Only the post's owner, same as edit and update.
    #[default]
    Owner,
    /// Any authenticated user.
    AnyAuthenticated,
}

impl FromStr for DeletePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "owner" => Ok(DeletePolicy::Owner),
            "any" => Ok(DeletePolicy::AnyAuthenticated),
            other => anyhow::bail!("unknown delete policy '{}' (expected 'owner' or 'any')", other),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 6,
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The deployment mode.
    pub app_env: AppEnv,
    /// The address to bind the listener to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server holding sessions, if any.
    pub redis_url: Option<String>,
    /// The secret the session cookie is signed with.
    pub session_secret: Zeroizing<Vec<u8>>,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The directory served under `/public`; uploads live below it.
    pub public_dir: PathBuf,
    /// The maximum accepted request body size.
    pub max_upload_bytes: usize,
    /// Who may delete a post.
    pub delete_policy: DeletePolicy,
    /// Password hashing cost.
    pub hash_cost: HashCost,
    /// Seconds between replenished login/register attempts.
    pub auth_rate_replenish_secs: u64,
    /// Burst size of the login/register limiter.
    pub auth_rate_burst: u32,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let database_url = if app_env == AppEnv::Dev {
            lookup("DATABASE_PUBLIC_URL")
                .context("DATABASE_PUBLIC_URL must be set when APP_ENV=dev")?
        } else {
            lookup("DATABASE_URL").context("DATABASE_URL must be set")?
        };

        let port = if app_env == AppEnv::Dev {
            8080
        } else {
            parse_var(&lookup, "PORT", 8080)?
        };

        let session_secret = match lookup("SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => Zeroizing::new(secret.into_bytes()),
            None if app_env == AppEnv::Dev => {
                tracing::warn!("⚠️ SESSION_SECRET not set, using a random secret (sessions reset on restart)");
                let mut secret = Zeroizing::new(vec![0u8; 64]);
                OsRng.fill_bytes(secret.as_mut_slice());
                secret
            }
            None => anyhow::bail!("SESSION_SECRET must be set (generate with: openssl rand -hex 32)"),
        };

        let session_duration_days: i64 = parse_var(&lookup, "SESSION_DURATION_DAYS", 7)?;
        if !(1..=MAX_SESSION_DURATION_DAYS).contains(&session_duration_days) {
            anyhow::bail!("SESSION_DURATION_DAYS must be between 1 and {}", MAX_SESSION_DURATION_DAYS);
        }

        let delete_policy = match lookup("POST_DELETE_POLICY") {
            Some(raw) => raw.parse().context("Invalid POST_DELETE_POLICY")?,
            None => DeletePolicy::default(),
        };

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_var(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var(&lookup, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var(&lookup, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            app_env,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            session_secret,
            session_duration_days,
            public_dir: lookup("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            delete_policy,
            hash_cost,
            auth_rate_replenish_secs: parse_var(&lookup, "AUTH_RATE_REPLENISH_SECS", 1)?,
            auth_rate_burst: parse_var(&lookup, "AUTH_RATE_BURST", 10)?,
        })
    }

    /// Session lifetime in seconds.
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_duration_days * 86400
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    /// The `host:port` the server listens on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

/// A dev-mode configuration with a fixed secret and a cheap hash cost.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    let mut config = Config::from_lookup(|key| match key {
        "APP_ENV" => Some("dev".to_string()),
        "DATABASE_PUBLIC_URL" => Some("postgres://localhost/blog".to_string()),
        "SESSION_SECRET" => Some("test-secret".to_string()),
        _ => None,
    })
    .unwrap();
    config.hash_cost = HashCost {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    config
}

use chrono::Duration;
use uuid::Uuid;

use crate::crypto::password::Hasher;
use crate::error::{AppError, Result};
use crate::models::session::{Identity, Session};
use crate::models::user::User;
use crate::repositories::{session::SessionStore, user::UserRepository};
use crate::validation::auth::validate_registration;

/// Registers a new user.
///
/// # Arguments
///
/// * `users` - The credential store.
/// * `hasher` - The password hasher.
/// * `email` - The user's email; surrounding whitespace is ignored.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn register(
    users: &dyn UserRepository,
    hasher: &Hasher,
    email: &str,
    password: &str,
) -> Result<User> {
    let email = email.trim();
    tracing::debug!("🔐 Creating user: {}", email);
    validate_registration(email, password)?;

    if users.find_by_email(email).await?.is_some() {
        return Err(AppError::DuplicateUser);
    }

    let password_hash = hasher.hash_blocking(password).await?;
    users.create(email, &password_hash).await
}

/// Authenticates a user.
///
/// An unknown email and a wrong password fail with the same
/// `InvalidCredentials` error.
pub async fn authenticate(
    users: &dyn UserRepository,
    hasher: &Hasher,
    email: &str,
    password: &str,
) -> Result<User> {
    let email = email.trim();
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = users
        .find_by_email(email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !hasher.verify_blocking(password, &user.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(user)
}

/// Writes an authenticated session for `user` under a fresh id and drops
/// the caller's previous session record, if any.
pub async fn open_session(
    sessions: &dyn SessionStore,
    user: &User,
    lifetime: Duration,
    previous: Option<Uuid>,
) -> Result<Uuid> {
    let session_id = Uuid::new_v4();
    let session = Session::authenticated(
        Identity {
            user_id: user.id,
            email: user.email.clone(),
        },
        lifetime,
    );
    sessions.save(&session_id, &session).await?;

    if let Some(previous) = previous {
        if let Err(e) = sessions.remove(&previous).await {
            tracing::warn!("⚠️ Could not drop previous session {}: {}", previous, e);
        }
    }

    tracing::info!("✅ Session opened for user: {}", user.id);
    Ok(session_id)
}

/// Clears the identity from a session record. The record itself stays
/// until it expires.
pub async fn close_session(sessions: &dyn SessionStore, session_id: &Uuid) -> Result<()> {
    if let Some(session) = sessions.load(session_id).await? {
        sessions.save(session_id, &session.cleared()).await?;
        tracing::info!("✅ Session cleared: {}", session_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::password::cheap_hasher;
    use crate::repositories::memory::{MemorySessionStore, MemoryStore};
    use chrono::Utc;

    #[tokio::test]
    async fn register_then_authenticate() {
        let users = MemoryStore::new();
        let hasher = cheap_hasher();

        let user = register(&users, &hasher, " a@x.com ", "pw1").await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_ne!(user.password_hash, "pw1");

        let logged_in = authenticate(&users, &hasher, "a@x.com", "pw1").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let users = MemoryStore::new();
        let hasher = cheap_hasher();
        register(&users, &hasher, "a@x.com", "pw1").await.unwrap();

        let err = register(&users, &hasher, "a@x.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUser));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let users = MemoryStore::new();
        let hasher = cheap_hasher();
        register(&users, &hasher, "a@x.com", "pw1").await.unwrap();

        let unknown = authenticate(&users, &hasher, "b@x.com", "pw1").await.unwrap_err();
        let wrong = authenticate(&users, &hasher, "a@x.com", "nope").await.unwrap_err();

        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn sessions_rotate_on_login_and_clear_on_logout() {
        let users = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let hasher = cheap_hasher();
        let user = register(&users, &hasher, "a@x.com", "pw1").await.unwrap();

        let first = open_session(&sessions, &user, Duration::days(7), None).await.unwrap();
        let second = open_session(&sessions, &user, Duration::days(7), Some(first)).await.unwrap();
        assert_ne!(first, second);
        assert!(sessions.load(&first).await.unwrap().is_none());

        let stored = sessions.load(&second).await.unwrap().unwrap();
        let identity = stored.identity_at(Utc::now()).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.email, "a@x.com");

        close_session(&sessions, &second).await.unwrap();
        let cleared = sessions.load(&second).await.unwrap().unwrap();
        assert!(cleared.identity_at(Utc::now()).is_none());
    }
}

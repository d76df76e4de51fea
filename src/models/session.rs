use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// The layout version of [`Session`]. Records written with any other
/// version are treated as anonymous.
pub const SESSION_VERSION: u16 = 1;

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The ID of the logged-in user.
    pub user_id: i64,
    /// The email the user logged in with.
    pub email: String,
}

/// Represents a user session as stored server-side.
///
/// A session is authenticated exactly when it carries an [`Identity`], is
/// unexpired and has the current layout version; there is no separate
/// `authenticated` flag that could disagree with the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Layout version, see [`SESSION_VERSION`].
    pub version: u16,
    /// The logged-in user, `None` once logged out.
    pub identity: Option<Identity>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A freshly authenticated session living for `lifetime`.
    pub fn authenticated(identity: Identity, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            version: SESSION_VERSION,
            identity: Some(identity),
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// The same session with its identity removed. Expiry is kept.
    pub fn cleared(&self) -> Self {
        Self {
            version: SESSION_VERSION,
            identity: None,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Whether the record can still be trusted at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.version == SESSION_VERSION && now < self.expires_at
    }

    /// The identity, if the session is authenticated at `now`.
    pub fn identity_at(&self, now: DateTime<Utc>) -> Option<&Identity> {
        if self.is_live(now) {
            self.identity.as_ref()
        } else {
            None
        }
    }

    /// Seconds left until expiry, at least one.
    pub fn ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }

    /// Serializes the session for storage.
    pub fn encode(&self) -> Result<String> {
        sonic_rs::to_string(self)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))
    }

    /// Parses a stored session. Malformed records and records of another
    /// layout version yield `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        match sonic_rs::from_str::<Session>(raw) {
            Ok(session) if session.version == SESSION_VERSION => Some(session),
            Ok(session) => {
                tracing::warn!("❌ Discarding session with layout version {}", session.version);
                None
            }
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            user_id: 7,
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn authenticated_session_exposes_identity_until_expiry() {
        let session = Session::authenticated(alice(), Duration::days(7));
        let now = Utc::now();

        assert_eq!(session.identity_at(now), Some(&alice()));
        assert_eq!(session.identity_at(now + Duration::days(8)), None);
        assert!(session.ttl_secs(now) > 6 * 86400);
    }

    #[test]
    fn cleared_session_keeps_expiry_but_drops_identity() {
        let session = Session::authenticated(alice(), Duration::days(7));
        let cleared = session.cleared();

        assert_eq!(cleared.expires_at, session.expires_at);
        assert!(cleared.is_live(Utc::now()));
        assert_eq!(cleared.identity_at(Utc::now()), None);
    }

    #[test]
    fn decode_round_trips_current_version() {
        let session = Session::authenticated(alice(), Duration::hours(1));
        let decoded = Session::decode(&session.encode().unwrap()).unwrap();

        assert_eq!(decoded.identity, Some(alice()));
        assert_eq!(decoded.expires_at, session.expires_at);
    }

    #[test]
    fn decode_rejects_other_versions_and_garbage() {
        let mut session = Session::authenticated(alice(), Duration::hours(1));
        session.version = SESSION_VERSION + 1;

        assert!(Session::decode(&session.encode().unwrap()).is_none());
        assert!(Session::decode("{\"authenticated\":true}").is_none());
        assert!(Session::decode("not json").is_none());
    }
}

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{models::session::Identity, state::AppState};

/// Name of the signed cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// The session resolved for the current request.
///
/// Only toggles UI affordances on public pages; protected handlers get an
/// [`Identity`] from [`require_auth`] instead.
#[derive(Clone, Debug, Default)]
pub struct CurrentSession {
    /// The id from a validly signed cookie, if any.
    pub session_id: Option<Uuid>,
    /// The logged-in user, if the session is authenticated.
    pub identity: Option<Identity>,
}

impl CurrentSession {
    /// Whether the caller is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extracts the session id from the signed session cookie. Tampered or
/// malformed cookies count as absent.
fn extract_session_id(state: &AppState, cookies: &Cookies) -> Option<Uuid> {
    cookies
        .signed(&state.cookie_key)
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

async fn resolve_session(state: &AppState, cookies: &Cookies) -> CurrentSession {
    let Some(session_id) = extract_session_id(state, cookies) else {
        return CurrentSession::default();
    };

    let identity = match state.sessions.load(&session_id).await {
        Ok(Some(session)) => session.identity_at(Utc::now()).cloned(),
        Ok(None) => {
            tracing::debug!("🔑 Unknown or expired session: {}", session_id);
            None
        }
        Err(e) => {
            tracing::warn!("❌ Session store error, treating request as anonymous: {}", e);
            None
        }
    };

    CurrentSession {
        session_id: Some(session_id),
        identity,
    }
}

/// Resolves the caller's session once per request and stores it in the
/// request extensions.
pub async fn load_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let current = resolve_session(&state, &cookies).await;
    request.extensions_mut().insert(current);
    next.run(request).await
}

/// A middleware that requires an authenticated session.
///
/// Anonymous callers are redirected (303) to the login page. Otherwise the
/// request passes through untouched apart from the [`Identity`] added to
/// its extensions; the session itself is never modified.
pub async fn require_auth(
    current: CurrentSession,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match current.identity {
        Some(identity) => {
            tracing::debug!("✅ User authenticated: {}", identity.user_id);
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => {
            tracing::debug!("🔐 Anonymous request to {}, redirecting to login", request.uri().path());
            Redirect::to("/login").into_response()
        }
    }
}

use axum::{
    extract::{rejection::FormRejection, State},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, ErrorPage, PageResult},
    middleware_layer::auth::{CurrentSession, SESSION_COOKIE},
    services::auth as auth_service,
    state::AppState,
    views,
};

/// The form posted by both the register and login pages.
#[derive(Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialsForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Creates the session cookie. `Secure` is only set in production so the
/// app stays usable over plain HTTP locally.
pub fn session_cookie(session_id: Uuid, config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());

    cookie.set_http_only(true);
    if config.secure_cookies() {
        cookie.set_secure(true);
    }
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(config.session_max_age_secs()));
    cookie.set_path("/");

    cookie
}

fn credentials(
    form: Result<Form<CredentialsForm>, FormRejection>,
    authenticated: bool,
) -> Result<CredentialsForm, ErrorPage> {
    form.map(|Form(form)| form)
        .map_err(|e| AppError::Validation(format!("Invalid form submission: {}", e.body_text())))
        .on_page(authenticated)
}

/// `GET /register`
pub async fn show_register_form(current: CurrentSession) -> Html<String> {
    Html(views::register_form(current.is_authenticated()))
}

/// Handles user registration.
pub async fn register(
    State(state): State<AppState>,
    current: CurrentSession,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Result<Redirect, ErrorPage> {
    let authenticated = current.is_authenticated();
    let form = credentials(form, authenticated)?;
    tracing::info!("📝 Register attempt: {}", form.email.trim());

    let user = auth_service::register(state.users.as_ref(), &state.hasher, &form.email, &form.password)
        .await
        .on_page(authenticated)?;

    tracing::info!("✅ User registered: {}", user.id);
    Ok(Redirect::to("/login"))
}

/// `GET /login`
pub async fn show_login_form(current: CurrentSession) -> Html<String> {
    Html(views::login_form(current.is_authenticated()))
}

/// Handles user login.
///
/// On success the caller gets a fresh session id in a signed cookie; the
/// session they arrived with, if any, is dropped.
pub async fn login(
    State(state): State<AppState>,
    current: CurrentSession,
    cookies: Cookies,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Result<Redirect, ErrorPage> {
    let authenticated = current.is_authenticated();
    let form = credentials(form, authenticated)?;

    let user = auth_service::authenticate(state.users.as_ref(), &state.hasher, &form.email, &form.password)
        .await
        .on_page(authenticated)?;

    let lifetime = chrono::Duration::days(state.config.session_duration_days);
    let session_id = auth_service::open_session(state.sessions.as_ref(), &user, lifetime, current.session_id)
        .await
        .on_page(authenticated)?;

    cookies
        .signed(&state.cookie_key)
        .add(session_cookie(session_id, &state.config));
    tracing::debug!("🍪 Session cookie set for user: {}", user.id);

    Ok(Redirect::to("/dashboard"))
}

/// Handles user logout.
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentSession,
    cookies: Cookies,
) -> Result<Redirect, ErrorPage> {
    if let Some(session_id) = current.session_id {
        auth_service::close_session(state.sessions.as_ref(), &session_id)
            .await
            .on_page(current.is_authenticated())?;
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    cookies.signed(&state.cookie_key).remove(removal);

    Ok(Redirect::to("/"))
}

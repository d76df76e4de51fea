use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    services::ServeDir,
    set_header::SetResponseHeader,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::Result,
    handlers,
    middleware_layer::{
        auth::{load_session, require_auth, CurrentSession},
        rate_limit::limit_credential_attempts,
    },
    services::uploads::PUBLIC_URL_PREFIX,
    state::AppState,
    views,
};

async fn not_found(current: CurrentSession) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(views::error_page("Page not found", current.is_authenticated())),
    )
}

/// Builds the application router.
///
/// Every request first resolves its session from the signed cookie;
/// protected routes additionally go through [`require_auth`].
pub fn build_router(state: AppState) -> Result<Router> {
    let credential_routes = limit_credential_attempts(
        Router::new()
            .route("/register", post(handlers::auth::register))
            .route("/login", post(handlers::auth::login)),
        &state.config,
    )?;

    let public_routes = Router::new()
        .route("/", get(handlers::posts::home))
        .route("/register", get(handlers::auth::show_register_form))
        .route("/login", get(handlers::auth::show_login_form))
        .route("/logout", get(handlers::auth::logout))
        .route("/posts/{id}", get(handlers::posts::show_post));

    let protected_routes = Router::new()
        .route("/dashboard", get(handlers::posts::dashboard))
        .route("/posts/create", get(handlers::posts::show_create_form))
        .route("/posts", post(handlers::posts::create_post))
        .route(
            "/posts/{id}/edit",
            get(handlers::posts::show_edit_form).post(handlers::posts::update_post),
        )
        .route("/posts/{id}/delete", post(handlers::posts::delete_post))
        .route_layer(from_fn(require_auth));

    // Uploads are served as their stored type only; browsers must not sniff.
    let public_files = SetResponseHeader::overriding(
        ServeDir::new(&state.config.public_dir),
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    let app = Router::new()
        .merge(public_routes)
        .merge(credential_routes)
        .merge(protected_routes)
        .nest_service(PUBLIC_URL_PREFIX, public_files)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), load_session))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state);

    Ok(app)
}

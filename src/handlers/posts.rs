use std::io;

use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, Path, State,
    },
    response::{Html, Redirect},
    Extension,
};
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::io::StreamReader;

use crate::{
    error::{AppError, ErrorPage, PageResult, Result},
    models::session::Identity,
    middleware_layer::auth::CurrentSession,
    services::{
        posts::{self as posts_service, PostAction, PostSubmission, RECENT_POSTS_LIMIT},
        uploads,
    },
    state::AppState,
    views,
};

/// `GET /`
pub async fn home(
    State(state): State<AppState>,
    current: CurrentSession,
) -> std::result::Result<Html<String>, ErrorPage> {
    let authenticated = current.is_authenticated();
    let posts = state
        .posts
        .list_recent(RECENT_POSTS_LIMIT)
        .await
        .on_page(authenticated)?;
    Ok(Html(views::home(&posts, authenticated)))
}

/// `GET /dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> std::result::Result<Html<String>, ErrorPage> {
    let posts = state.posts.list_by_user(identity.user_id).await.on_page(true)?;
    Ok(Html(views::dashboard(&identity.email, &posts)))
}

/// `GET /posts/create`
pub async fn show_create_form() -> Html<String> {
    Html(views::create_post_form())
}

/// Handles the new-post form.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Redirect, ErrorPage> {
    let multipart = multipart
        .map_err(|e| AppError::Multipart(e.body_text()))
        .on_page(true)?;
    let submission = read_submission(&state, identity.user_id, multipart)
        .await
        .on_page(true)?;

    posts_service::create_post(state.posts.as_ref(), &identity, submission)
        .await
        .on_page(true)?;

    Ok(Redirect::to("/dashboard"))
}

/// `GET /posts/{id}`
pub async fn show_post(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(raw_id): Path<String>,
) -> std::result::Result<Html<String>, ErrorPage> {
    let authenticated = current.is_authenticated();
    let post_id = posts_service::parse_post_id(&raw_id).on_page(authenticated)?;
    let post = posts_service::get_post(state.posts.as_ref(), post_id)
        .await
        .on_page(authenticated)?;

    let is_owner = current
        .identity
        .as_ref()
        .is_some_and(|identity| identity.user_id == post.user_id);

    Ok(Html(views::show_post(&post, authenticated, is_owner)))
}

/// `GET /posts/{id}/edit`
pub async fn show_edit_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
) -> std::result::Result<Html<String>, ErrorPage> {
    let post_id = posts_service::parse_post_id(&raw_id).on_page(true)?;
    let post = posts_service::authorize(
        state.posts.as_ref(),
        state.config.delete_policy,
        &identity,
        post_id,
        PostAction::Edit,
    )
    .await
    .on_page(true)?;

    Ok(Html(views::edit_post_form(&post)))
}

/// Handles the edit form.
///
/// Ownership is checked before the body is read, so a rejected request
/// never writes an upload to disk.
pub async fn update_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Redirect, ErrorPage> {
    let post_id = posts_service::parse_post_id(&raw_id).on_page(true)?;
    let post = posts_service::authorize(
        state.posts.as_ref(),
        state.config.delete_policy,
        &identity,
        post_id,
        PostAction::Update,
    )
    .await
    .on_page(true)?;

    let multipart = multipart
        .map_err(|e| AppError::Multipart(e.body_text()))
        .on_page(true)?;
    let submission = read_submission(&state, identity.user_id, multipart)
        .await
        .on_page(true)?;

    let updated = posts_service::update_post(
        state.posts.as_ref(),
        &state.config.public_dir,
        post,
        submission,
    )
    .await
    .on_page(true)?;

    Ok(Redirect::to(&format!("/posts/{}", updated.id)))
}

/// `POST /posts/{id}/delete`
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
) -> std::result::Result<Redirect, ErrorPage> {
    let post_id = posts_service::parse_post_id(&raw_id).on_page(true)?;
    let post = posts_service::authorize(
        state.posts.as_ref(),
        state.config.delete_policy,
        &identity,
        post_id,
        PostAction::Delete,
    )
    .await
    .on_page(true)?;

    posts_service::delete_post(state.posts.as_ref(), &state.config.public_dir, &post)
        .await
        .on_page(true)?;

    Ok(Redirect::to("/dashboard"))
}

/// Reads the `title`, `body` and `image` fields of a post form, streaming
/// the image straight to disk. If anything fails after the image was
/// stored, the file is removed again.
async fn read_submission(state: &AppState, user_id: i64, mut multipart: Multipart) -> Result<PostSubmission> {
    let mut submission = PostSubmission::default();

    if let Err(e) = read_fields(state, user_id, &mut multipart, &mut submission).await {
        if let Some(image) = submission.image.take() {
            uploads::discard(&image.path).await;
        }
        return Err(e);
    }

    Ok(submission)
}

async fn read_fields(
    state: &AppState,
    user_id: i64,
    multipart: &mut Multipart,
    submission: &mut PostSubmission,
) -> Result<()> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" => submission.title = Some(field.text().await?),
            "body" => submission.body = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                // Browsers send an empty, unnamed part when no file was chosen.
                // An unnamed part that does carry bytes is still an upload.
                let mut leading = None;
                if file_name.is_empty() {
                    leading = first_chunk(&mut field).await?;
                    if leading.is_none() {
                        continue;
                    }
                }
                if submission.image.is_some() {
                    return Err(AppError::Validation("Only one image per post".to_string()));
                }

                let chunks = stream::iter(leading.map(Ok)).chain(field.map_err(io::Error::other));
                let reader = StreamReader::new(chunks);
                tokio::pin!(reader);
                let stored = uploads::store_image(&state.config.public_dir, user_id, &file_name, &mut reader).await?;

                tracing::debug!("📦 Stored {} bytes at {}", stored.size, stored.url);
                submission.image = Some(stored);
            }
            other => tracing::debug!("Ignoring unexpected form field: {}", other),
        }
    }

    Ok(())
}

async fn first_chunk(field: &mut Field<'_>) -> Result<Option<Bytes>> {
    while let Some(chunk) = field.chunk().await? {
        if !chunk.is_empty() {
            return Ok(Some(chunk));
        }
    }
    Ok(None)
}

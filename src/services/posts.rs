use std::path::Path;

use crate::{
    config::DeletePolicy,
    error::{AppError, Result},
    models::{
        post::{NewPost, Post, PostChanges},
        session::Identity,
    },
    repositories::post::PostRepository,
    services::uploads::{self, StoredImage},
    validation::post::validate_post,
};

/// How many posts the home page shows.
pub const RECENT_POSTS_LIMIT: i64 = 5;

/// A mutation a user attempts on a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostAction {
    /// Opening the edit form.
    Edit,
    /// Saving changes.
    Update,
    /// Deleting the post.
    Delete,
}

/// Whether `actor` may perform `action` on `post`.
///
/// Edit and update always require ownership; delete follows `policy`.
pub fn may_mutate(post: &Post, actor: &Identity, action: PostAction, policy: DeletePolicy) -> bool {
    match (action, policy) {
        (PostAction::Delete, DeletePolicy::AnyAuthenticated) => true,
        _ => post.user_id == actor.user_id,
    }
}

/// Loads a post and checks that `actor` may perform `action` on it.
///
/// Every mutation path goes through here.
pub async fn authorize(
    posts: &dyn PostRepository,
    policy: DeletePolicy,
    actor: &Identity,
    post_id: i64,
    action: PostAction,
) -> Result<Post> {
    let post = posts.find_by_id(post_id).await?.ok_or(AppError::NotFound)?;

    if !may_mutate(&post, actor, action, policy) {
        tracing::warn!(
            "❌ User {} may not {:?} post {} owned by {}",
            actor.user_id,
            action,
            post.id,
            post.user_id
        );
        return Err(AppError::Forbidden);
    }

    Ok(post)
}

/// Parses a post id from the URL. Anything that is not an id is simply
/// a post that does not exist.
pub fn parse_post_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound)
}

/// Finds a post for public display.
pub async fn get_post(posts: &dyn PostRepository, post_id: i64) -> Result<Post> {
    posts.find_by_id(post_id).await?.ok_or(AppError::NotFound)
}

/// The fields of a submitted post form. `None` means the field was not
/// sent at all.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub title: Option<String>,
    pub body: Option<String>,
    pub image: Option<StoredImage>,
}

/// Creates a post owned by `actor`.
///
/// If the post cannot be saved, the uploaded image is removed again so no
/// file outlives a failed request.
pub async fn create_post(
    posts: &dyn PostRepository,
    actor: &Identity,
    submission: PostSubmission,
) -> Result<Post> {
    let PostSubmission { title, body, image } = submission;
    let new_post = NewPost {
        user_id: actor.user_id,
        title: title.unwrap_or_default(),
        body: body.unwrap_or_default(),
        image_url: image.as_ref().map(|image| image.url.clone()),
    };

    let result = match validate_post(&new_post.title, &new_post.body) {
        Ok(()) => posts.insert(new_post).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(post) => {
            tracing::info!("✅ Post {} created by user {}", post.id, actor.user_id);
            Ok(post)
        }
        Err(e) => {
            if let Some(image) = image {
                uploads::discard(&image.path).await;
            }
            Err(e)
        }
    }
}

/// Applies a submission to an authorized post.
///
/// Fields that were not sent keep their stored value. A new image replaces
/// the old one, whose file is then removed.
pub async fn update_post(
    posts: &dyn PostRepository,
    public_dir: &Path,
    mut post: Post,
    submission: PostSubmission,
) -> Result<Post> {
    let PostSubmission { title, body, image } = submission;
    let previous_image = post.image_url.clone();

    post.apply(PostChanges {
        title,
        body,
        image_url: image.as_ref().map(|image| image.url.clone()),
    });

    let result = match validate_post(&post.title, &post.body) {
        Ok(()) => posts.update(&post).await,
        Err(e) => Err(e),
    };

    match (result, image) {
        (Ok(updated), Some(_)) => {
            if let Some(previous) = previous_image {
                uploads::discard_url(public_dir, &previous).await;
            }
            tracing::info!("✅ Post {} updated with a new image", updated.id);
            Ok(updated)
        }
        (Ok(updated), None) => {
            tracing::info!("✅ Post {} updated", updated.id);
            Ok(updated)
        }
        (Err(e), Some(image)) => {
            uploads::discard(&image.path).await;
            Err(e)
        }
        (Err(e), None) => Err(e),
    }
}

/// Deletes an authorized post and, best-effort, its image file.
pub async fn delete_post(posts: &dyn PostRepository, public_dir: &Path, post: &Post) -> Result<()> {
    posts.delete(post.id).await?;
    if let Some(image_url) = &post.image_url {
        uploads::discard_url(public_dir, image_url).await;
    }
    tracing::info!("✅ Post {} deleted", post.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::user::UserRepository;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct Fixture {
        store: MemoryStore,
        alice: Identity,
        bob: Identity,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let alice = store.create("alice@x.com", "h").await.unwrap();
        let bob = store.create("bob@x.com", "h").await.unwrap();
        Fixture {
            store,
            alice: Identity {
                user_id: alice.id,
                email: alice.email,
            },
            bob: Identity {
                user_id: bob.id,
                email: bob.email,
            },
        }
    }

    fn submission(title: &str, body: &str) -> PostSubmission {
        PostSubmission {
            title: Some(title.to_string()),
            body: Some(body.to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn owner_passes_every_check() {
        let f = fixture().await;
        let post = create_post(&f.store, &f.alice, submission("Hello", "World")).await.unwrap();

        for action in [PostAction::Edit, PostAction::Update, PostAction::Delete] {
            let found = authorize(&f.store, DeletePolicy::Owner, &f.alice, post.id, action)
                .await
                .unwrap();
            assert_eq!(found.id, post.id);
        }
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let f = fixture().await;
        let post = create_post(&f.store, &f.alice, submission("Hello", "World")).await.unwrap();

        for action in [PostAction::Edit, PostAction::Update, PostAction::Delete] {
            let err = authorize(&f.store, DeletePolicy::Owner, &f.bob, post.id, action)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Forbidden), "{:?}", action);
        }
    }

    #[tokio::test]
    async fn permissive_policy_only_loosens_delete() {
        let f = fixture().await;
        let post = create_post(&f.store, &f.alice, submission("Hello", "World")).await.unwrap();
        let policy = DeletePolicy::AnyAuthenticated;

        assert!(authorize(&f.store, policy, &f.bob, post.id, PostAction::Delete).await.is_ok());
        assert!(matches!(
            authorize(&f.store, policy, &f.bob, post.id, PostAction::Update).await.unwrap_err(),
            AppError::Forbidden
        ));
    }

    #[tokio::test]
    async fn missing_post_is_not_found() {
        let f = fixture().await;
        let err = authorize(&f.store, DeletePolicy::Owner, &f.alice, 99, PostAction::Edit)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert!(matches!(parse_post_id("abc").unwrap_err(), AppError::NotFound));
        assert_eq!(parse_post_id("12").unwrap(), 12);
    }

    #[tokio::test]
    async fn update_keeps_fields_that_were_not_sent() {
        let f = fixture().await;
        let public = tempfile::tempdir().unwrap();
        let mut post = create_post(&f.store, &f.alice, submission("Hello", "World")).await.unwrap();
        post.image_url = Some("/public/uploads/user/1/1_a.png".to_string());
        let post = f.store.update(&post).await.unwrap();

        let updated = update_post(
            &f.store,
            public.path(),
            post,
            PostSubmission {
                title: Some("Hello2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Hello2");
        assert_eq!(updated.body, "World");
        assert_eq!(updated.image_url.as_deref(), Some("/public/uploads/user/1/1_a.png"));
    }

    #[tokio::test]
    async fn rejected_post_discards_its_upload() {
        let f = fixture().await;
        let public = tempfile::tempdir().unwrap();
        let image = uploads::store_image(public.path(), f.alice.user_id, "a.png", &mut &PNG[..])
            .await
            .unwrap();
        let path = image.path.clone();

        let err = create_post(
            &f.store,
            &f.alice,
            PostSubmission {
                title: Some(String::new()),
                body: Some("body".to_string()),
                image: Some(image),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(!path.exists());
        assert!(f.store.list_by_user(f.alice.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replacing_an_image_removes_the_old_file() {
        let f = fixture().await;
        let public = tempfile::tempdir().unwrap();
        let old = uploads::store_image(public.path(), f.alice.user_id, "old.png", &mut &PNG[..])
            .await
            .unwrap();
        let post = create_post(
            &f.store,
            &f.alice,
            PostSubmission {
                image: Some(old.clone()),
                ..submission("Hello", "World")
            },
        )
        .await
        .unwrap();

        let new = uploads::store_image(public.path(), f.alice.user_id, "new.png", &mut &PNG[..])
            .await
            .unwrap();
        let updated = update_post(
            &f.store,
            public.path(),
            post,
            PostSubmission {
                image: Some(new.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.image_url.as_deref(), Some(new.url.as_str()));
        assert!(!old.path.exists());
        assert!(new.path.exists());

        delete_post(&f.store, public.path(), &updated).await.unwrap();
        assert!(!new.path.exists());
        assert!(matches!(
            get_post(&f.store, updated.id).await.unwrap_err(),
            AppError::NotFound
        ));
    }
}

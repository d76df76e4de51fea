#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use inkwell::{
    config::{Config, HashCost},
    models::{post::Post, user::User},
    repositories::{
        memory::{MemorySessionStore, MemoryStore},
        post::PostRepository,
        user::UserRepository,
    },
    routes,
    state::AppState,
};
use reqwest::{multipart, redirect, Client, Response};
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery staple";

// A running server plus handles on its stores.
pub struct TestContext {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub public_dir: TempDir,
}

impl TestContext {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut Config)) -> Self {
        let public_dir = tempfile::tempdir().unwrap();

        let mut config = Config::from_lookup(|key| match key {
            "APP_ENV" => Some("dev".to_string()),
            "DATABASE_PUBLIC_URL" => Some("postgres://unused/blog".to_string()),
            "SESSION_SECRET" => Some("integration-test-secret".to_string()),
            _ => None,
        })
        .unwrap();
        config.public_dir = public_dir.path().to_path_buf();
        config.hash_cost = HashCost {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config.auth_rate_burst = 1000;
        configure(&mut config);

        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_stores(
            &config,
            store.clone(),
            store.clone(),
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap();
        let app = routes::build_router(state).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
            public_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .unwrap()
    }

    pub async fn register(&self, client: &Client, email: &str, password: &str) -> Response {
        client
            .post(self.url("/register"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, client: &Client, email: &str, password: &str) -> Response {
        client
            .post(self.url("/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .unwrap()
    }

    /// Registers and logs in a fresh user on its own client.
    pub async fn signed_in(&self, email: &str) -> (Client, User) {
        let client = Self::client();
        assert_eq!(self.register(&client, email, PASSWORD).await.status(), 303);
        assert_eq!(self.login(&client, email, PASSWORD).await.status(), 303);
        let user = self.store.find_by_email(email).await.unwrap().unwrap();
        (client, user)
    }

    pub async fn create_post(
        &self,
        client: &Client,
        title: &str,
        body: &str,
        image: Option<(&str, &[u8])>,
    ) -> Response {
        let mut form = multipart::Form::new()
            .text("title", title.to_string())
            .text("body", body.to_string());
        if let Some((file_name, bytes)) = image {
            form = form.part(
                "image",
                multipart::Part::bytes(bytes.to_vec())
                    .file_name(file_name.to_string())
                    .mime_str("image/png")
                    .unwrap(),
            );
        }

        client
            .post(self.url("/posts"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn edit_post(&self, client: &Client, post_id: i64, form: multipart::Form) -> Response {
        client
            .post(self.url(&format!("/posts/{}/edit", post_id)))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn posts_of(&self, user: &User) -> Vec<Post> {
        self.store.list_by_user(user.id).await.unwrap()
    }

    /// Number of files under the public directory's upload tree.
    pub fn uploaded_files(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            match std::fs::read_dir(dir) {
                Ok(entries) => entries
                    .flatten()
                    .map(|entry| {
                        let path = entry.path();
                        if path.is_dir() { count(&path) } else { 1 }
                    })
                    .sum(),
                Err(_) => 0,
            }
        }
        count(&self.public_dir.path().join("uploads"))
    }
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

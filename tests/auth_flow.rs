mod common;

use common::{location, TestContext, PASSWORD};
use inkwell::repositories::user::UserRepository;
use reqwest::{header, Client};

#[tokio::test]
async fn register_login_and_reach_dashboard() {
    let context = TestContext::spawn().await;
    let client = TestContext::client();

    let response = context.register(&client, "alice@example.com", PASSWORD).await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/login");

    let response = context.login(&client, "alice@example.com", PASSWORD).await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/dashboard");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let dashboard = client.get(context.url("/dashboard")).send().await.unwrap();
    assert_eq!(dashboard.status(), 200);
    assert!(dashboard.text().await.unwrap().contains("alice@example.com"));

    let stored = context.store.find_by_email("alice@example.com").await.unwrap().unwrap();
    assert_ne!(stored.password_hash, PASSWORD);
    assert!(stored.password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let context = TestContext::spawn().await;
    let client = TestContext::client();
    context.register(&client, "alice@example.com", PASSWORD).await;

    let response = context.register(&client, "alice@example.com", "another password").await;
    assert_eq!(response.status(), 409);
    assert!(response.text().await.unwrap().contains("User already exists"));
}

#[tokio::test]
async fn invalid_registration_is_rejected() {
    let context = TestContext::spawn().await;
    let client = TestContext::client();

    let response = context.register(&client, "not-an-email", PASSWORD).await;
    assert_eq!(response.status(), 400);

    let response = context.register(&client, "bob@example.com", "").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_get_the_same_page() {
    let context = TestContext::spawn().await;
    let client = TestContext::client();
    context.register(&client, "alice@example.com", PASSWORD).await;

    let unknown = context.login(&client, "nobody@example.com", PASSWORD).await;
    let wrong = context.login(&client, "alice@example.com", "wrong password").await;

    assert_eq!(unknown.status(), 401);
    assert_eq!(wrong.status(), 401);
    assert!(unknown.headers().get(header::SET_COOKIE).is_none());
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());

    let unknown_body = unknown.text().await.unwrap();
    assert!(unknown_body.contains("Invalid credentials"));
    assert_eq!(unknown_body, wrong.text().await.unwrap());

    let dashboard = client.get(context.url("/dashboard")).send().await.unwrap();
    assert_eq!(dashboard.status(), 303);
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login() {
    let context = TestContext::spawn().await;
    let client = TestContext::client();

    for path in ["/dashboard", "/posts/create"] {
        let response = client.get(context.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 303, "{}", path);
        assert_eq!(location(&response), "/login", "{}", path);
    }

    let home = client.get(context.url("/")).send().await.unwrap();
    assert_eq!(home.status(), 200);
    assert!(home.text().await.unwrap().contains("href=\"/login\""));
}

#[tokio::test]
async fn logged_out_cookie_cannot_be_replayed() {
    let context = TestContext::spawn().await;
    let (client, _) = context.signed_in("alice@example.com").await;

    // Grab the signed cookie as a browser would have stored it.
    let login = context.login(&client, "alice@example.com", PASSWORD).await;
    let session = login
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(|cookie| format!("session={}", cookie.value()))
        .unwrap();

    let logout = client.get(context.url("/logout")).send().await.unwrap();
    assert_eq!(logout.status(), 303);
    assert_eq!(location(&logout), "/");
    let removal = logout
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(removal.starts_with("session="));
    assert!(removal.contains("Max-Age=0"));

    let after = client.get(context.url("/dashboard")).send().await.unwrap();
    assert_eq!(after.status(), 303);

    let replay = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
        .get(context.url("/dashboard"))
        .header(header::COOKIE, session)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 303);
    assert_eq!(location(&replay), "/login");
}

#[tokio::test]
async fn login_rotates_the_session_id() {
    let context = TestContext::spawn().await;
    let (client, _) = context.signed_in("alice@example.com").await;

    let first = context.login(&client, "alice@example.com", PASSWORD).await;
    let first = first.cookies().find(|c| c.name() == "session").map(|c| c.value().to_string());
    let second = context.login(&client, "alice@example.com", PASSWORD).await;
    let second = second.cookies().find(|c| c.name() == "session").map(|c| c.value().to_string());

    assert!(first.is_some());
    assert_ne!(first, second);
}

#[tokio::test]
async fn credential_posts_are_rate_limited() {
    let context = TestContext::spawn_with(|config| {
        config.auth_rate_replenish_secs = 60;
        config.auth_rate_burst = 2;
    })
    .await;
    let client = TestContext::client();

    assert_eq!(context.login(&client, "a@example.com", "x").await.status(), 401);
    assert_eq!(context.login(&client, "a@example.com", "x").await.status(), 401);
    assert_eq!(context.login(&client, "a@example.com", "x").await.status(), 429);

    // Viewing the form is not limited.
    let form = client.get(context.url("/login")).send().await.unwrap();
    assert_eq!(form.status(), 200);
}

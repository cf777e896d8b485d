use std::sync::Arc;

use indoc::indoc;
use integration_tests::{CountingStrategy, RecordingRepository, TestServer, TokenResponse, UnreliableRepository};
use reqwest::{Response, StatusCode};

const CONFIG: &str = indoc! {r#"
    [server.login]
    enabled = true

    [[server.login.users]]
    username = "user"
    password = "password"
"#};

fn location(response: &Response) -> &str {
    response.headers()["location"].to_str().unwrap()
}

async fn login(server: &TestServer, token: &TokenResponse, password: &str) -> Response {
    server
        .client
        .post_form(
            "/login",
            &[
                ("username", "user"),
                ("password", password),
                ("_csrf", token.token.as_str()),
            ],
        )
        .await
}

#[tokio::test]
async fn login_requires_a_token() {
    let server = TestServer::start(CONFIG).await;

    let response = server
        .client
        .post_form("/login", &[("username", "user"), ("password", "password")])
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn successful_login() {
    let server = TestServer::start(CONFIG).await;
    let token = server.client.csrf_token().await;

    let response = login(&server, &token, "password").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert!(response.headers().get("set-cookie").is_some());

    let body = server.client.get("/").await.text().await.unwrap();
    insta::assert_snapshot!(body, @"Hello, user");
}

#[tokio::test]
async fn failed_login() {
    let server = TestServer::start(CONFIG).await;
    let token = server.client.csrf_token().await;

    let response = login(&server, &token, "wrong").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login?error");

    let body = server.client.get("/").await.text().await.unwrap();
    insta::assert_snapshot!(body, @"Hello, anonymous");

    // the session was kept, so the token still works
    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_rotates_the_token() {
    let server = TestServer::start(CONFIG).await;
    let before = server.client.csrf_token().await;

    login(&server, &before, "password").await;

    let response = server
        .client
        .post_with_header("/test1", &before.header_name, &before.token)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let after = server.client.csrf_token().await;

    let response = server
        .client
        .post_with_header("/test1", &after.header_name, &after.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn custom_strategy_replaces_rotation() {
    let repository = Arc::new(RecordingRepository::default());
    let strategy = Arc::new(CountingStrategy::default());

    let server = TestServer::builder()
        .token_repository(repository.clone())
        .session_authentication_strategy(strategy.clone())
        .build(CONFIG)
        .await;

    let token = server.client.csrf_token().await;
    assert_eq!(repository.generates(), 1);
    assert_eq!(repository.saves(), 1);

    let response = login(&server, &token, "password").await;
    assert_eq!(response.status(), StatusCode::FOUND);

    assert_eq!(strategy.calls(), 1);
    assert_eq!(strategy.last_principal().as_deref(), Some("user"));

    // no new token was generated, the pre-login one moved to the new session
    assert_eq!(repository.generates(), 1);

    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_protection_uses_no_strategy() {
    let config = indoc! {r#"
        [server.csrf]
        enabled = false

        [server.login]
        enabled = true

        [[server.login.users]]
        username = "user"
        password = "password"
    "#};

    let strategy = Arc::new(CountingStrategy::default());

    let server = TestServer::builder()
        .session_authentication_strategy(strategy.clone())
        .build(config)
        .await;

    let response = server
        .client
        .post_form("/login", &[("username", "user"), ("password", "password")])
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
    assert_eq!(strategy.calls(), 0);
}

#[tokio::test]
async fn strategy_can_be_turned_off_in_config() {
    let config = indoc! {r#"
        [server.csrf]
        session_authentication = "none"

        [server.login]
        enabled = true

        [[server.login.users]]
        username = "user"
        password = "password"
    "#};

    let repository = Arc::new(RecordingRepository::default());

    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build(config)
        .await;

    let token = server.client.csrf_token().await;
    let response = login(&server, &token, "password").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(repository.generates(), 1);

    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = server.client.get("/").await.text().await.unwrap();
    insta::assert_snapshot!(body, @"Hello, user");
}

#[tokio::test]
async fn logout_clears_the_token() {
    let server = TestServer::start(CONFIG).await;

    let token = server.client.csrf_token().await;
    login(&server, &token, "password").await;

    let token = server.client.csrf_token().await;

    let response = server
        .client
        .post_form("/logout", &[("_csrf", token.token.as_str())])
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login?logout");

    let cookie = response.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = server.client.get("/").await.text().await.unwrap();
    insta::assert_snapshot!(body, @"Hello, anonymous");
}

#[tokio::test]
async fn logout_requires_a_token() {
    let server = TestServer::start(CONFIG).await;

    let token = server.client.csrf_token().await;
    login(&server, &token, "password").await;

    let response = server.client.post("/logout").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = server.client.get("/").await.text().await.unwrap();
    insta::assert_snapshot!(body, @"Hello, user");
}

#[tokio::test]
async fn logout_fails_when_the_token_cannot_be_cleared() {
    let repository = Arc::new(UnreliableRepository::default());

    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build(CONFIG)
        .await;

    let token = server.client.csrf_token().await;
    login(&server, &token, "password").await;

    let token = server.client.csrf_token().await;
    repository.fail_saves();

    let response = server
        .client
        .post_form("/logout", &[("_csrf", token.token.as_str())])
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // the session is dropped regardless
    let cookie = response.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

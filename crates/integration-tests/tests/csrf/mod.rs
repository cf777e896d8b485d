use std::sync::Arc;

use axum::http;
use csrf::{CsrfRequest, Denial};
use indoc::indoc;
use integration_tests::{FailingRepository, RecordingRepository, TestServer};
use reqwest::{Method, StatusCode};

#[tokio::test]
async fn enabled_by_default() {
    let server = TestServer::start("").await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["content-type"], "text/plain");

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @"No CSRF token is associated with the session");
}

#[tokio::test]
async fn safe_methods_pass_without_token() {
    let server = TestServer::start("").await;

    let response = server.client.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.client.request(Method::HEAD, "/").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn valid_token_in_header() {
    let server = TestServer::start("").await;
    let token = server.client.csrf_token().await;

    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "test1");
}

#[tokio::test]
async fn valid_token_in_form_field() {
    let server = TestServer::start("").await;
    let token = server.client.csrf_token().await;

    let response = server
        .client
        .post_form("/test1", &[("amount", "10"), (token.parameter_name.as_str(), token.token.as_str())])
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_rendered_into_a_page() {
    let server = TestServer::start("").await;

    let page = server.client.get("/form").await.text().await.unwrap();
    let value = page
        .split(r#"value=""#)
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();

    let response = server.client.post_form("/test1", &[("_csrf", value.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_endpoint_shape() {
    let server = TestServer::start("").await;
    let token = server.client.csrf_token().await;

    assert_eq!(token.header_name, "x-csrf-token");
    assert_eq!(token.parameter_name, "_csrf");
    assert!(!token.token.is_empty());
}

#[tokio::test]
async fn masked_token_changes_on_every_exposure() {
    let server = TestServer::start("").await;

    let first = server.client.csrf_token().await;
    let second = server.client.csrf_token().await;

    assert_ne!(first.token, second.token);

    for token in [first, second] {
        let response = server
            .client
            .post_with_header("/test1", &token.header_name, &token.token)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}

/// Sends clients without a session token back to the start, and answers tampering with JSON.
fn denied(request: &CsrfRequest<'_>, denial: Denial) -> http::Response<String> {
    let response = match denial {
        Denial::MissingToken => http::Response::builder()
            .status(http::StatusCode::FOUND)
            .header(http::header::LOCATION, "/session-expired")
            .body(String::new()),
        Denial::InvalidToken => http::Response::builder()
            .status(http::StatusCode::BAD_REQUEST)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(format!(r#"{{"error":"invalid_csrf_token","path":"{}"}}"#, request.path())),
    };

    response.unwrap()
}

#[tokio::test]
async fn custom_access_denied_handler() {
    let server = TestServer::builder()
        .access_denied_handler(Arc::new(denied))
        .build("")
        .await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/session-expired");

    let token = server.client.csrf_token().await;

    let response = server.client.post_with_header("/test1", &token.header_name, "forged").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @r#"{"error":"invalid_csrf_token","path":"/test1"}"#);

    let response = server
        .client
        .post_with_header("/test1", &token.header_name, &token.token)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let server = TestServer::start("").await;
    server.client.csrf_token().await;

    let response = server.client.post_with_header("/test1", "x-csrf-token", "forged").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @"Invalid CSRF token found in the request");

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn token_of_another_session_is_rejected() {
    let server = TestServer::start("").await;
    let token = server.client.csrf_token().await;

    let other = server.client.fresh();
    other.csrf_token().await;

    let response = other.post_with_header("/test1", &token.header_name, &token.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn disabled() {
    let config = indoc! {r#"
        [server.csrf]
        enabled = false
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::OK);

    // no token endpoint without protection
    let response = server.client.get("/csrf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_never_touches_custom_repository() {
    let config = indoc! {r#"
        [server.csrf]
        enabled = false
    "#};

    let repository = Arc::new(RecordingRepository::default());
    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build(config)
        .await;

    server.client.get("/").await;
    server.client.post("/test1").await;

    assert_eq!(repository.loads(), 0);
    assert_eq!(repository.saves(), 0);
}

#[tokio::test]
async fn custom_repository_loaded_once_per_get() {
    let repository = Arc::new(RecordingRepository::default());
    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build("")
        .await;

    let response = server.client.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(repository.loads(), 1);

    server.client.get("/").await;
    assert_eq!(repository.loads(), 2);

    // the first request created the token, the second reused it
    assert_eq!(repository.generates(), 1);
    assert_eq!(repository.saves(), 1);
}

#[tokio::test]
async fn rejection_has_no_side_effects() {
    let repository = Arc::new(RecordingRepository::default());
    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build("")
        .await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(repository.loads(), 1);
    assert_eq!(repository.generates(), 0);
    assert_eq!(repository.saves(), 0);
}

#[tokio::test]
async fn require_protection_matcher() {
    let config = indoc! {r#"
        [server.csrf]
        require_protection = "/test1"
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.client.post("/test2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ignoring_request_matcher() {
    let config = indoc! {r#"
        [server.csrf]
        require_protection = "/**"
        ignoring = [{ path = "/test2" }]
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.client.post("/test2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ignoring_path_shorthand() {
    let config = indoc! {r#"
        [server.csrf]
        require_protection = "/**"
        ignoring = ["/test2"]
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.post("/test1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.client.post("/test2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ignoring_with_methods() {
    let config = indoc! {r#"
        [server.csrf]
        ignoring = [{ path = "/test2", methods = ["PUT"] }]
    "#};

    let server = TestServer::start(config).await;

    // POST is not among the ignored methods
    let response = server.client.post("/test2").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn custom_header_and_parameter_names() {
    let config = indoc! {r#"
        [server.csrf]
        header_name = "X-XSRF-TOKEN"
        parameter_name = "_token"
    "#};

    let server = TestServer::start(config).await;
    let token = server.client.csrf_token().await;

    assert_eq!(token.header_name, "x-xsrf-token");
    assert_eq!(token.parameter_name, "_token");

    let response = server.client.post_with_header("/test1", "x-csrf-token", &token.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.client.post_with_header("/test1", "X-XSRF-TOKEN", &token.token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.client.post_form("/test1", &[("_token", token.token.as_str())]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn custom_token_endpoint() {
    let config = indoc! {r#"
        [server.csrf]
        token_endpoint = "/api/csrf"
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.get("/api/csrf").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.client.get("/csrf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_form_is_refused() {
    let config = indoc! {r#"
        [server.csrf]
        max_form_size = 16
    "#};

    let server = TestServer::start(config).await;
    let token = server.client.csrf_token().await;

    let response = server.client.post_form("/test1", &[("_csrf", token.token.as_str())]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn repository_failure_is_a_server_error() {
    let server = TestServer::builder()
        .token_repository(Arc::new(FailingRepository))
        .build("")
        .await;

    let response = server.client.get("/").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = server.client.post_with_header("/test1", "x-csrf-token", "anything").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_bypasses_protection() {
    let repository = Arc::new(RecordingRepository::default());
    let server = TestServer::builder()
        .token_repository(repository.clone())
        .build("")
        .await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("set-cookie").is_none());
    assert_eq!(repository.loads(), 0);
}

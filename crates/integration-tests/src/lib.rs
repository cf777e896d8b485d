use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{Extension, Router, routing::{get, post}};
use config::Config;
use csrf::{AccessDeniedHandler, CsrfToken, SessionAuthenticationStrategy, TokenRepository};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use server::{ServeConfig, Session};
use tokio::net::{TcpListener, TcpStream};

mod recording;

pub use recording::{CountingStrategy, FailingRepository, RecordingRepository, UnreliableRepository};

static INIT: Once = Once::new();

fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

/// Test client for making HTTP requests to the test server.
///
/// Keeps cookies between requests, like a browser, and never follows redirects so tests can
/// inspect them.
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

/// The body of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub header_name: String,
    pub parameter_name: String,
    pub token: String,
}

impl TestClient {
    /// Create a new test client for the given base URL, with an empty cookie store.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self { base_url, client }
    }

    /// A second client against the same server, without the cookies of this one.
    pub fn fresh(&self) -> Self {
        Self::new(self.base_url.clone())
    }

    /// Start a request to the given path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(Method::GET, path).send().await.unwrap()
    }

    /// Send a POST request without a body
    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.request(Method::POST, path).send().await.unwrap()
    }

    /// Send a POST request carrying the token in the given header
    pub async fn post_with_header(&self, path: &str, header: &str, token: &str) -> reqwest::Response {
        self.request(Method::POST, path)
            .header(header, token)
            .send()
            .await
            .unwrap()
    }

    /// Send a urlencoded form
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.request(Method::POST, path).form(form).send().await.unwrap()
    }

    /// Fetch the masked token of the current session from the token endpoint
    pub async fn csrf_token(&self) -> TokenResponse {
        let response = self.get("/csrf").await;
        assert_eq!(response.status(), 200);

        response.json().await.unwrap()
    }
}

/// Builder for [`TestServer`] instances with optional custom CSRF components.
#[derive(Default)]
pub struct TestServerBuilder {
    token_repository: Option<Arc<dyn TokenRepository>>,
    session_authentication_strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    access_denied_handler: Option<Arc<dyn AccessDeniedHandler>>,
}

impl TestServerBuilder {
    /// Replace the in-memory token repository.
    pub fn token_repository(mut self, repository: Arc<dyn TokenRepository>) -> Self {
        self.token_repository = Some(repository);
        self
    }

    /// Replace the strategy run after form login.
    pub fn session_authentication_strategy(mut self, strategy: Arc<dyn SessionAuthenticationStrategy>) -> Self {
        self.session_authentication_strategy = Some(strategy);
        self
    }

    /// Replace the response sent for rejected requests.
    pub fn access_denied_handler(mut self, handler: Arc<dyn AccessDeniedHandler>) -> Self {
        self.access_denied_handler = Some(handler);
        self
    }

    /// Start the server with the given TOML configuration.
    pub async fn build(self, config_toml: &str) -> TestServer {
        init_crypto_provider();

        let config: Config = toml::from_str(config_toml).unwrap();
        config.validate().unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let mut serve_config = ServeConfig::new(address, config);
        serve_config.routes = routes();
        serve_config.token_repository = self.token_repository;
        serve_config.session_authentication_strategy = self.session_authentication_strategy;
        serve_config.access_denied_handler = self.access_denied_handler;

        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            if let Err(e) = server::serve(serve_config).await {
                eprintln!("Server failed to start: {e}");
            }
        });

        // Wait until the port accepts connections. Plain TCP, so no session or token is created.
        for _ in 0..50 {
            if TcpStream::connect(address).await.is_ok() {
                break;
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestServer {
            client: TestClient::new(format!("http://{address}")),
            address,
            _handle: handle,
        }
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::default()
    }

    /// Start a server with default components.
    pub async fn start(config_toml: &str) -> Self {
        Self::builder().build(config_toml).await
    }
}

/// The application routes every test server exposes.
fn routes() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/form", get(form))
        .route("/test1", post(|| async { "test1" }))
        .route("/test2", post(|| async { "test2" }))
}

async fn home(Extension(session): Extension<Session>) -> String {
    match session.principal().await {
        Some(principal) => format!("Hello, {principal}"),
        None => "Hello, anonymous".to_string(),
    }
}

async fn form(token: Option<Extension<CsrfToken>>) -> String {
    match token {
        Some(Extension(token)) => format!(
            r#"<form method="post" action="/test1"><input type="hidden" name="{}" value="{}"></form>"#,
            token.parameter_name(),
            token.value()
        ),
        None => r#"<form method="post" action="/test1"></form>"#.to_string(),
    }
}

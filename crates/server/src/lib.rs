//! Bulwark server library.
//!
//! Serves application routes behind cookie sessions and CSRF protection, either for the
//! binary or for the integration tests.

#![deny(missing_docs)]

mod health;
mod login;
mod protection;
mod session;

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use csrf::{AccessDeniedHandler, CsrfProtectionBuilder, SessionAuthenticationStrategy, TokenRepository};
use protection::CsrfLayer;
use session::{SessionLayer, SessionStore};
use tokio::net::TcpListener;

pub use session::Session;

/// Configuration for serving Bulwark.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Bulwark TOML configuration.
    pub config: Config,
    /// Application routes, served behind the session and CSRF layers.
    pub routes: Router,
    /// Replaces the in-memory token repository.
    pub token_repository: Option<Arc<dyn TokenRepository>>,
    /// Replaces the strategy run after a successful login.
    pub session_authentication_strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    /// Replaces the plain text `403 Forbidden` sent for rejected requests.
    pub access_denied_handler: Option<Arc<dyn AccessDeniedHandler>>,
}

impl ServeConfig {
    /// Creates a configuration without application routes or custom components.
    pub fn new(listen_address: SocketAddr, config: Config) -> Self {
        Self {
            listen_address,
            config,
            routes: Router::new(),
            token_repository: None,
            session_authentication_strategy: None,
            access_denied_handler: None,
        }
    }
}

/// Assembles the application: session layer outermost, CSRF protection inside it, then the
/// application, token, login and logout routes. The health endpoint bypasses both layers.
pub fn router(config: &ServeConfig) -> anyhow::Result<Router> {
    let server = &config.config.server;

    let mut builder = CsrfProtectionBuilder::from_config(&server.csrf, &server.session)?;

    if let Some(repository) = &config.token_repository {
        builder = builder.token_repository(repository.clone());
    }

    if let Some(strategy) = &config.session_authentication_strategy {
        builder = builder.session_authentication_strategy(strategy.clone());
    }

    if let Some(handler) = &config.access_denied_handler {
        builder = builder.access_denied_handler(handler.clone());
    }

    let protection = builder.build()?;
    let mut app = config.routes.clone();

    if protection.is_enabled()
        && let Some(path) = &server.csrf.token_endpoint
    {
        log::debug!("Exposing the CSRF token at {path}");
        app = app.route(path, get(protection::token));
    }

    if server.login.enabled {
        app = app.merge(login::router(&server.login, protection.clone()));
    }

    if protection.is_enabled() {
        app = app.layer(CsrfLayer::new(protection, server.csrf.max_form_size));
    }

    app = app.layer(SessionLayer::new(SessionStore::new(&server.session)));

    if server.health.enabled {
        app = app.merge(health::router(&server.health));
    }

    Ok(app)
}

/// Starts and runs the Bulwark server with the provided configuration.
pub async fn serve(serve_config: ServeConfig) -> anyhow::Result<()> {
    let app = router(&serve_config)?;
    let ServeConfig {
        listen_address, config, ..
    } = serve_config;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Bulwark listening on https://{listen_address}");

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("Bulwark listening on http://{listen_address}");

            axum::serve(listener, app)
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
    }

    Ok(())
}

//! Form login and logout.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Form, Router,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use config::LoginConfig;
use csrf::{AuthenticationEvent, CsrfProtection};
use http::{StatusCode, header::LOCATION};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

use crate::{protection::plain_text, session::Session};

struct LoginState {
    config: LoginConfig,
    protection: CsrfProtection,
}

pub(crate) fn router(config: &LoginConfig, protection: CsrfProtection) -> Router {
    let state = Arc::new(LoginState {
        config: config.clone(),
        protection,
    });

    Router::new()
        .route(&config.path, post(login))
        .route(&config.logout_path, post(logout))
        .with_state(state)
}

async fn login(
    State(state): State<Arc<LoginState>>,
    Extension(session): Extension<Session>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let config = &state.config;

    let username = form.get(&config.username_parameter).map(String::as_str).unwrap_or_default();
    let password = form.get(&config.password_parameter).map(String::as_str).unwrap_or_default();

    if !authenticate(config, username, password) {
        log::debug!("Rejected login attempt for '{username}'");
        return found(&config.failure_url);
    }

    let (previous, current) = session.rotate().await;

    if let Err(e) = state.protection.on_session_rotated(&previous, &current).await {
        log::error!("Failed to carry the CSRF token over to the new session: {e}");
        session.invalidate().await;

        return internal_server_error();
    }

    session.set_principal(username).await;

    let event = AuthenticationEvent {
        principal: username.to_string(),
        previous_session: Some(previous),
        session: current,
    };

    if let Err(e) = state.protection.on_authentication(&event).await {
        log::error!("Session authentication failed for '{username}': {e}");
        session.invalidate().await;

        return internal_server_error();
    }

    log::info!("User '{username}' logged in");

    found(&config.success_url)
}

async fn logout(State(state): State<Arc<LoginState>>, Extension(session): Extension<Session>) -> Response {
    let id = session.id().await;
    let cleared = state.protection.on_logout(&id).await;

    let principal = session.principal().await;
    session.invalidate().await;

    if let Err(e) = cleared {
        log::error!("Failed to clear the CSRF token on logout: {e}");
        return internal_server_error();
    }

    if let Some(principal) = principal {
        log::info!("User '{principal}' logged out");
    }

    found(&state.config.logout_success_url)
}

fn authenticate(config: &LoginConfig, username: &str, password: &str) -> bool {
    let Some(user) = config.users.iter().find(|user| user.username == username) else {
        return false;
    };

    user.password.expose_secret().as_bytes().ct_eq(password.as_bytes()).into()
}

fn internal_server_error() -> Response {
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn found(location: &str) -> Response {
    match Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(Body::empty())
    {
        Ok(response) => response,
        Err(e) => {
            log::error!("Invalid redirect target '{location}': {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

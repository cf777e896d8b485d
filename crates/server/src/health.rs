use axum::{Json, Router, routing::get};
use config::HealthConfig;
use http::StatusCode;

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// The server accepts requests.
    Healthy,
}

/// Reports the server as healthy. Served outside the session and CSRF layers.
pub(crate) async fn health() -> (StatusCode, Json<HealthState>) {
    (StatusCode::OK, Json(HealthState::Healthy))
}

pub(crate) fn router(config: &HealthConfig) -> Router {
    Router::new().route(&config.path, get(health))
}

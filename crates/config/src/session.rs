//! Session cookie and store configuration.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Session configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
    /// Sessions unused for this long are dropped, together with their CSRF token.
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
    /// Upper bound of sessions kept in memory.
    pub max_sessions: u64,
    /// Whether the session cookie carries the `Secure` attribute.
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "BULWARK_SESSION".into(),
            idle_timeout: Duration::from_secs(30 * 60),
            max_sessions: 100_000,
            secure_cookie: false,
        }
    }
}

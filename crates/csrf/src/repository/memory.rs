//! In-memory, session-keyed token storage using the mini-moka cache.

use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;

use super::{RepositoryError, TokenRepository};
use crate::{
    session::SessionId,
    token::{CsrfToken, TokenSettings},
};

/// Keeps one token per session in memory.
///
/// Entries follow the lifetime of their session: they are dropped once unused for the
/// session idle timeout, or when the cache reaches its capacity.
pub struct SessionTokenRepository {
    settings: TokenSettings,
    tokens: Cache<SessionId, CsrfToken>,
}

impl SessionTokenRepository {
    /// Creates a repository bounded by `max_sessions` entries and `idle_timeout`.
    pub fn new(settings: TokenSettings, max_sessions: u64, idle_timeout: Duration) -> Self {
        let tokens = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_idle(idle_timeout)
            .build();

        Self { settings, tokens }
    }

    /// Creates a repository sized after the session configuration.
    pub fn from_config(settings: TokenSettings, config: &config::SessionConfig) -> Self {
        Self::new(settings, config.max_sessions, config.idle_timeout)
    }
}

impl Default for SessionTokenRepository {
    fn default() -> Self {
        Self::from_config(TokenSettings::default(), &config::SessionConfig::default())
    }
}

#[async_trait]
impl TokenRepository for SessionTokenRepository {
    async fn load_token(&self, session: &SessionId) -> Result<Option<CsrfToken>, RepositoryError> {
        Ok(self.tokens.get(session))
    }

    fn generate_token(&self, _: &SessionId) -> CsrfToken {
        CsrfToken::generate(&self.settings)
    }

    async fn save_token(&self, token: Option<CsrfToken>, session: &SessionId) -> Result<(), RepositoryError> {
        match token {
            Some(token) => {
                log::debug!("Storing CSRF token for session {session:?}");
                self.tokens.insert(session.clone(), token);
            }
            None => {
                log::debug!("Clearing CSRF token for session {session:?}");
                self.tokens.invalidate(session);
            }
        }

        Ok(())
    }
}

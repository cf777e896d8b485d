//! Hooks run after a successful authentication.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{error::CsrfError, repository::TokenRepository, session::SessionId};

/// A successful authentication, as seen by session authentication strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationEvent {
    /// Name of the authenticated principal.
    pub principal: String,
    /// Session the client used before logging in, if any.
    pub previous_session: Option<SessionId>,
    /// Session the client continues with.
    pub session: SessionId,
}

/// Reacts to a successful authentication, typically to rotate session-bound state.
///
/// Exactly one strategy runs per authentication. Configuring a custom strategy replaces the
/// default token rotation entirely.
#[async_trait]
pub trait SessionAuthenticationStrategy: Send + Sync {
    /// Called once after the credentials were accepted and the session was established.
    async fn on_authentication(&self, event: &AuthenticationEvent) -> Result<(), CsrfError>;
}

/// Replaces the token on login, so tokens seen before authentication stop working.
pub struct CsrfAuthenticationStrategy {
    repository: Arc<dyn TokenRepository>,
}

impl CsrfAuthenticationStrategy {
    /// Creates a strategy rotating tokens in the given repository.
    pub fn new(repository: Arc<dyn TokenRepository>) -> Self {
        Self { repository }
    }
}

impl fmt::Debug for CsrfAuthenticationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfAuthenticationStrategy").finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionAuthenticationStrategy for CsrfAuthenticationStrategy {
    async fn on_authentication(&self, event: &AuthenticationEvent) -> Result<(), CsrfError> {
        if let Some(previous) = &event.previous_session {
            self.repository.save_token(None, previous).await?;
        }

        self.repository.save_token(None, &event.session).await?;

        let token = self.repository.generate_token(&event.session);
        self.repository.save_token(Some(token), &event.session).await?;

        log::debug!("Rotated CSRF token after authentication of '{}'", event.principal);

        Ok(())
    }
}

/// Does nothing. Used when protection is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuthenticatedSessionStrategy;

#[async_trait]
impl SessionAuthenticationStrategy for NullAuthenticatedSessionStrategy {
    async fn on_authentication(&self, _: &AuthenticationEvent) -> Result<(), CsrfError> {
        Ok(())
    }
}

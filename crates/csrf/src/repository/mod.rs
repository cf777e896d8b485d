//! Storage of the token associated with each session.

use async_trait::async_trait;

use crate::{session::SessionId, token::CsrfToken};

pub mod memory;

pub use memory::SessionTokenRepository;

/// Issues, stores and retrieves the token of a session.
///
/// At most one token is live per session. Saving a token replaces the previous one, and
/// concurrent saves for the same session resolve as last writer wins.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Returns the current token of the session without creating one.
    async fn load_token(&self, session: &SessionId) -> Result<Option<CsrfToken>, RepositoryError>;

    /// Creates a fresh token. It is not associated with the session until saved.
    fn generate_token(&self, session: &SessionId) -> CsrfToken;

    /// Associates the token with the session, or clears the association on `None`.
    async fn save_token(&self, token: Option<CsrfToken>, session: &SessionId) -> Result<(), RepositoryError>;
}

/// Errors that can occur in token repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The backing store cannot be reached or failed.
    #[error("Token store unavailable: {0}")]
    Unavailable(String),
}

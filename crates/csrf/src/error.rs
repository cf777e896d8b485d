//! Error types for CSRF protection.

use crate::repository::RepositoryError;

/// Errors that can occur while enforcing CSRF protection.
#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    /// The token store could not be read or written.
    #[error("Token repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The protection settings are inconsistent. Reported before serving.
    #[error("Invalid CSRF configuration: {0}")]
    Configuration(String),

    /// A session authentication strategy failed after a successful login.
    #[error("Session authentication failed: {0}")]
    SessionAuthentication(String),
}

/// Why a request needing protection was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// The session holds no token, so nothing the client sends can be valid.
    #[error("No CSRF token is associated with the session")]
    MissingToken,

    /// The submitted token is absent, malformed or different from the stored one.
    #[error("Invalid CSRF token found in the request")]
    InvalidToken,
}

//! Per-request CSRF validation.

use std::{borrow::Cow, sync::Arc};

use crate::{
    error::{CsrfError, Denial},
    matcher::{ProtectionMatcher, RequestMatcher},
    repository::TokenRepository,
    request::CsrfRequest,
    session::SessionId,
    token::CsrfToken,
};

/// Result of checking a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The request may continue down the chain.
    Proceed {
        /// Masked token to expose to the client, `None` when protection is disabled.
        token: Option<CsrfToken>,
    },
    /// The request must be answered with 403 and not forwarded.
    Reject(Denial),
}

/// Validates requests against the token stored for their session.
///
/// Stateless across requests. The repository is consulted exactly once per request.
#[derive(Clone)]
pub struct CsrfFilter {
    repository: Arc<dyn TokenRepository>,
    matcher: ProtectionMatcher,
}

impl CsrfFilter {
    /// Creates a filter from a repository and the combined require/ignore matcher.
    pub fn new(repository: Arc<dyn TokenRepository>, matcher: ProtectionMatcher) -> Self {
        Self { repository, matcher }
    }

    /// Checks a request belonging to `session`.
    ///
    /// Requests that need no protection proceed and get a token created lazily, so a following
    /// page render can embed it. Requests that need protection are rejected, without touching
    /// the store, when the session holds no token or the submitted one does not match.
    pub async fn check(&self, request: &CsrfRequest<'_>, session: &SessionId) -> Result<FilterOutcome, CsrfError> {
        let stored = self.repository.load_token(session).await?;

        if !self.matcher.matches(request) {
            let token = match stored {
                Some(token) => token,
                None => {
                    let token = self.repository.generate_token(session);
                    self.repository.save_token(Some(token.clone()), session).await?;
                    token
                }
            };

            return Ok(FilterOutcome::Proceed {
                token: Some(token.masked()),
            });
        }

        let Some(stored) = stored else {
            log::debug!(
                "Missing CSRF token for {} {}: session has none",
                request.method(),
                request.path()
            );

            return Ok(FilterOutcome::Reject(Denial::MissingToken));
        };

        let submitted = request
            .header(stored.header_name())
            .map(Cow::Borrowed)
            .or_else(|| request.parameter(stored.parameter_name()));

        match submitted {
            Some(submitted) if stored.matches_submitted(&submitted) => Ok(FilterOutcome::Proceed {
                token: Some(stored.masked()),
            }),
            _ => {
                log::debug!("Invalid CSRF token found for {} {}", request.method(), request.path());

                Ok(FilterOutcome::Reject(Denial::InvalidToken))
            }
        }
    }
}

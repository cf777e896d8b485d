//! Cross-site request forgery protection for session-based web applications.
//!
//! Every session owns one secret token. State-changing requests must echo it back, masked,
//! in a header or a form parameter. Which requests need the token is decided by a require
//! matcher minus any number of ignore matchers, and what happens to the token on login is
//! decided by a [`SessionAuthenticationStrategy`].

#![deny(missing_docs)]

mod denied;
mod error;
mod filter;
mod matcher;
mod protection;
pub mod repository;
mod request;
mod session;
mod strategy;
mod token;

pub use denied::{AccessDeniedHandler, ForbiddenHandler};
pub use error::{CsrfError, Denial};
pub use filter::{CsrfFilter, FilterOutcome};
pub use matcher::{AnyRequest, PathPattern, ProtectionMatcher, RequestMatcher, StateChangingMethods};
pub use protection::{CsrfProtection, CsrfProtectionBuilder};
pub use repository::{RepositoryError, SessionTokenRepository, TokenRepository};
pub use request::{CsrfRequest, is_form_content_type};
pub use session::SessionId;
pub use strategy::{
    AuthenticationEvent, CsrfAuthenticationStrategy, NullAuthenticatedSessionStrategy, SessionAuthenticationStrategy,
};
pub use token::{CsrfToken, TokenSettings, mask, tokens_match, unmask};

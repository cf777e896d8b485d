//! CSRF (Cross-Site Request Forgery) protection configuration.

use std::borrow::Cow;

use serde::Deserialize;

use crate::{http_method::HttpMethod, http_types::HeaderName};

/// CSRF (Cross-Site Request Forgery) protection configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsrfConfig {
    /// Whether CSRF protection is enabled.
    pub enabled: bool,
    /// The header a client sends the token in.
    pub header_name: HeaderName,
    /// The form or query parameter used when the header is absent.
    pub parameter_name: String,
    /// Path of the endpoint exposing the current token as JSON. `None` disables it.
    pub token_endpoint: Option<Cow<'static, str>>,
    /// Which strategy runs after a successful login.
    pub session_authentication: SessionAuthenticationConfig,
    /// Largest urlencoded form body, in bytes, searched for the token parameter.
    pub max_form_size: usize,
    /// Replaces the default "every state-changing method" matcher.
    pub require_protection: Option<RequestMatcherConfig>,
    /// Requests matching any of these never require a token.
    pub ignoring: Vec<RequestMatcherConfig>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: HeaderName::from_static("x-csrf-token"),
            parameter_name: "_csrf".into(),
            token_endpoint: Some(Cow::Borrowed("/csrf")),
            session_authentication: SessionAuthenticationConfig::default(),
            max_form_size: 64 * 1024,
            require_protection: None,
            ignoring: Vec::new(),
        }
    }
}

/// The strategy invoked once per successful login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAuthenticationConfig {
    /// Discard the pre-login token and issue a fresh one for the new session.
    #[default]
    Csrf,
    /// Leave tokens untouched.
    None,
}

/// A request matcher, either a bare ant-style path or a path with methods.
///
/// ```toml
/// ignoring = ["/webhooks/**", { path = "/api/public", methods = ["PUT"] }]
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RequestMatcherConfig {
    /// Shorthand matching any method on the given pattern.
    Path(String),
    /// A pattern restricted to a set of methods.
    Pattern {
        /// Ant-style path pattern.
        path: String,
        /// Methods the pattern applies to. Empty means any method.
        #[serde(default)]
        methods: Vec<HttpMethod>,
    },
}

impl RequestMatcherConfig {
    /// The ant-style path pattern.
    pub fn path(&self) -> &str {
        match self {
            RequestMatcherConfig::Path(path) => path,
            RequestMatcherConfig::Pattern { path, .. } => path,
        }
    }

    /// The methods this matcher is restricted to, empty for any.
    pub fn methods(&self) -> &[HttpMethod] {
        match self {
            RequestMatcherConfig::Path(_) => &[],
            RequestMatcherConfig::Pattern { methods, .. } => methods,
        }
    }
}

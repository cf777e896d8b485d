//! Request matchers deciding which requests need a valid token.

use std::{fmt, sync::Arc};

use http::Method;

use crate::{error::CsrfError, request::CsrfRequest};

/// A predicate over a request.
pub trait RequestMatcher: Send + Sync {
    /// Whether the request matches.
    fn matches(&self, request: &CsrfRequest<'_>) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&CsrfRequest<'_>) -> bool + Send + Sync,
{
    fn matches(&self, request: &CsrfRequest<'_>) -> bool {
        self(request)
    }
}

/// The default require matcher: every method except GET, HEAD, TRACE and OPTIONS.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateChangingMethods;

impl RequestMatcher for StateChangingMethods {
    fn matches(&self, request: &CsrfRequest<'_>) -> bool {
        let method = request.method();

        !(method == Method::GET || method == Method::HEAD || method == Method::TRACE || method == Method::OPTIONS)
    }
}

/// Matches every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyRequest;

impl RequestMatcher for AnyRequest {
    fn matches(&self, _: &CsrfRequest<'_>) -> bool {
        true
    }
}

/// An ant-style path pattern, optionally limited to some methods.
///
/// `*` matches within one path segment and `**` across segments. `/**` matches every path,
/// and `/api/**` also matches `/api` itself. Literal patterns match exactly.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    methods: Vec<Method>,
}

impl PathPattern {
    /// Creates a matcher for any method.
    pub fn new(pattern: impl Into<String>) -> Result<Self, CsrfError> {
        let pattern = pattern.into();

        if !pattern.starts_with('/') {
            return Err(CsrfError::Configuration(format!(
                "path pattern '{pattern}' must start with '/'"
            )));
        }

        Ok(Self {
            pattern,
            methods: Vec::new(),
        })
    }

    /// Restricts the matcher to the given methods.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// The pattern as configured.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn matches_path(&self, path: &str) -> bool {
        if self.pattern == "/**" {
            return true;
        }

        if let Some(prefix) = self.pattern.strip_suffix("/**")
            && path == prefix
        {
            return true;
        }

        fast_glob::glob_match(&self.pattern, path)
    }
}

impl TryFrom<&config::RequestMatcherConfig> for PathPattern {
    type Error = CsrfError;

    fn try_from(config: &config::RequestMatcherConfig) -> Result<Self, Self::Error> {
        let methods = config.methods().iter().map(|method| Method::from(*method));

        Ok(PathPattern::new(config.path())?.with_methods(methods))
    }
}

impl RequestMatcher for PathPattern {
    fn matches(&self, request: &CsrfRequest<'_>) -> bool {
        if !self.methods.is_empty() && !self.methods.contains(request.method()) {
            return false;
        }

        self.matches_path(request.path())
    }
}

/// Combines a require matcher with ignore matchers.
///
/// A request needs protection when the require matcher matches and no ignore matcher does.
/// Ignore matchers always win.
#[derive(Clone)]
pub struct ProtectionMatcher {
    require: Arc<dyn RequestMatcher>,
    ignoring: Vec<Arc<dyn RequestMatcher>>,
}

impl ProtectionMatcher {
    /// Creates a combined matcher.
    pub fn new(require: Arc<dyn RequestMatcher>, ignoring: Vec<Arc<dyn RequestMatcher>>) -> Self {
        Self { require, ignoring }
    }
}

impl Default for ProtectionMatcher {
    fn default() -> Self {
        Self::new(Arc::new(StateChangingMethods), Vec::new())
    }
}

impl fmt::Debug for ProtectionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionMatcher")
            .field("ignoring", &self.ignoring.len())
            .finish_non_exhaustive()
    }
}

impl RequestMatcher for ProtectionMatcher {
    fn matches(&self, request: &CsrfRequest<'_>) -> bool {
        self.require.matches(request) && !self.ignoring.iter().any(|matcher| matcher.matches(request))
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, Uri};

    use super::*;

    fn matches(matcher: &dyn RequestMatcher, method: Method, path: &'static str) -> bool {
        let uri = Uri::from_static(path);
        let headers = HeaderMap::new();

        matcher.matches(&CsrfRequest::new(&method, &uri, &headers))
    }

    #[test]
    fn default_matcher_skips_safe_methods() {
        for method in [Method::GET, Method::HEAD, Method::TRACE, Method::OPTIONS] {
            assert!(!matches(&StateChangingMethods, method, "/test1"));
        }

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(matches(&StateChangingMethods, method, "/test1"));
        }
    }

    #[test]
    fn literal_pattern_is_exact() {
        let matcher = PathPattern::new("/test1").unwrap();

        assert!(matches(&matcher, Method::POST, "/test1"));
        assert!(matches(&matcher, Method::GET, "/test1?x=1"));
        assert!(!matches(&matcher, Method::POST, "/test2"));
        assert!(!matches(&matcher, Method::POST, "/test1/nested"));
        assert!(!matches(&matcher, Method::POST, "/test10"));
    }

    #[test]
    fn double_star_patterns() {
        let everything = PathPattern::new("/**").unwrap();
        assert!(matches(&everything, Method::POST, "/"));
        assert!(matches(&everything, Method::POST, "/a/b/c"));

        let api = PathPattern::new("/api/**").unwrap();
        assert!(matches(&api, Method::POST, "/api"));
        assert!(matches(&api, Method::POST, "/api/users/1"));
        assert!(!matches(&api, Method::POST, "/apis"));

        let single = PathPattern::new("/api/*/edit").unwrap();
        assert!(matches(&single, Method::POST, "/api/users/edit"));
        assert!(!matches(&single, Method::POST, "/api/users/1/edit"));
    }

    #[test]
    fn method_restriction() {
        let matcher = PathPattern::new("/test1").unwrap().with_methods([Method::PUT]);

        assert!(matches(&matcher, Method::PUT, "/test1"));
        assert!(!matches(&matcher, Method::POST, "/test1"));
    }

    #[test]
    fn relative_pattern_is_rejected() {
        let error = PathPattern::new("test1").unwrap_err();

        assert_eq!(
            error.to_string(),
            "Invalid CSRF configuration: path pattern 'test1' must start with '/'"
        );
    }

    #[test]
    fn ignore_wins_over_require() {
        let matcher = ProtectionMatcher::new(
            Arc::new(PathPattern::new("/**").unwrap()),
            vec![Arc::new(PathPattern::new("/test2").unwrap())],
        );

        assert!(matches(&matcher, Method::POST, "/test1"));
        assert!(!matches(&matcher, Method::POST, "/test2"));
        // the explicit require matcher replaced the method-based default
        assert!(matches(&matcher, Method::GET, "/test1"));
    }

    #[test]
    fn closures_are_matchers() {
        let matcher = ProtectionMatcher::new(
            Arc::new(StateChangingMethods),
            vec![Arc::new(|request: &CsrfRequest<'_>| request.path().starts_with("/hooks"))],
        );

        assert!(matches(&matcher, Method::POST, "/test1"));
        assert!(!matches(&matcher, Method::POST, "/hooks/github"));
        assert!(!matches(&matcher, Method::GET, "/test1"));
    }

    #[test]
    fn from_config() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            matcher: config::RequestMatcherConfig,
        }

        let wrapper: Wrapper = toml::from_str(r#"matcher = { path = "/a", methods = ["DELETE"] }"#).unwrap();
        let matcher = PathPattern::try_from(&wrapper.matcher).unwrap();

        assert!(matches(&matcher, Method::DELETE, "/a"));
        assert!(!matches(&matcher, Method::POST, "/a"));
    }
}

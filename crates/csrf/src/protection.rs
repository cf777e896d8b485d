//! The assembled CSRF protection and its builder.

use std::{fmt, sync::Arc};

use config::{CsrfConfig, SessionAuthenticationConfig, SessionConfig};
use http::Response;

use crate::{
    denied::{AccessDeniedHandler, ForbiddenHandler},
    error::{CsrfError, Denial},
    filter::{CsrfFilter, FilterOutcome},
    matcher::{PathPattern, ProtectionMatcher, RequestMatcher, StateChangingMethods},
    repository::{SessionTokenRepository, TokenRepository},
    request::CsrfRequest,
    session::SessionId,
    strategy::{
        AuthenticationEvent, CsrfAuthenticationStrategy, NullAuthenticatedSessionStrategy,
        SessionAuthenticationStrategy,
    },
    token::TokenSettings,
};

/// CSRF protection for one server. Immutable once built and cheap to clone.
#[derive(Clone)]
pub struct CsrfProtection {
    enabled: bool,
    settings: TokenSettings,
    filter: CsrfFilter,
    repository: Arc<dyn TokenRepository>,
    strategy: Arc<dyn SessionAuthenticationStrategy>,
    access_denied: Arc<dyn AccessDeniedHandler>,
}

impl CsrfProtection {
    /// Starts a builder with protection enabled and every default in place.
    pub fn builder() -> CsrfProtectionBuilder {
        CsrfProtectionBuilder::default()
    }

    /// Builds protection from the `[server.csrf]` and `[server.session]` sections.
    pub fn from_config(csrf: &CsrfConfig, session: &SessionConfig) -> Result<Self, CsrfError> {
        CsrfProtectionBuilder::from_config(csrf, session)?.build()
    }

    /// Whether requests are checked at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Names under which tokens are submitted.
    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Checks one request. Disabled protection lets everything through without touching the
    /// repository.
    pub async fn check(&self, request: &CsrfRequest<'_>, session: &SessionId) -> Result<FilterOutcome, CsrfError> {
        if !self.enabled {
            return Ok(FilterOutcome::Proceed { token: None });
        }

        self.filter.check(request, session).await
    }

    /// The response for a request that [`Self::check`] rejected.
    pub fn access_denied(&self, request: &CsrfRequest<'_>, denial: Denial) -> Response<String> {
        self.access_denied.handle(request, denial)
    }

    /// Carries the token over when a session moves to a new id, as session data does.
    ///
    /// Login calls this before [`Self::on_authentication`], so replacing the token is left
    /// to the strategy alone.
    pub async fn on_session_rotated(&self, previous: &SessionId, current: &SessionId) -> Result<(), CsrfError> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(token) = self.repository.load_token(previous).await? {
            self.repository.save_token(Some(token), current).await?;
            self.repository.save_token(None, previous).await?;
        }

        Ok(())
    }

    /// Runs the configured session authentication strategy once.
    pub async fn on_authentication(&self, event: &AuthenticationEvent) -> Result<(), CsrfError> {
        self.strategy.on_authentication(event).await
    }

    /// Forgets the token of a session that is being logged out.
    pub async fn on_logout(&self, session: &SessionId) -> Result<(), CsrfError> {
        if self.enabled {
            self.repository.save_token(None, session).await?;
        }

        Ok(())
    }
}

impl fmt::Debug for CsrfProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfProtection")
            .field("enabled", &self.enabled)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Configures a [`CsrfProtection`].
///
/// ```
/// use csrf::{CsrfProtection, PathPattern};
///
/// let protection = CsrfProtection::builder()
///     .require_protection_matcher(PathPattern::new("/**").unwrap())
///     .ignoring_paths(["/test2"])
///     .build()
///     .unwrap();
///
/// assert!(protection.is_enabled());
/// ```
pub struct CsrfProtectionBuilder {
    enabled: bool,
    settings: TokenSettings,
    repository: Option<Arc<dyn TokenRepository>>,
    require: Option<Arc<dyn RequestMatcher>>,
    ignoring: Vec<Arc<dyn RequestMatcher>>,
    ignoring_paths: Vec<String>,
    strategy: Option<Arc<dyn SessionAuthenticationStrategy>>,
    access_denied: Option<Arc<dyn AccessDeniedHandler>>,
}

impl Default for CsrfProtectionBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: TokenSettings::default(),
            repository: None,
            require: None,
            ignoring: Vec::new(),
            ignoring_paths: Vec::new(),
            strategy: None,
            access_denied: None,
        }
    }
}

impl CsrfProtectionBuilder {
    /// Starts from configuration. Further builder calls override what the configuration set.
    pub fn from_config(csrf: &CsrfConfig, session: &SessionConfig) -> Result<Self, CsrfError> {
        let settings = TokenSettings::from(csrf);
        let repository = SessionTokenRepository::from_config(settings.clone(), session);

        let mut builder = Self::default()
            .token_settings(settings)
            .token_repository(Arc::new(repository));

        if !csrf.enabled {
            builder = builder.disable();
        }

        if let Some(require) = &csrf.require_protection {
            builder = builder.require_protection_matcher(PathPattern::try_from(require)?);
        }

        for ignoring in &csrf.ignoring {
            builder = builder.ignoring_request_matchers(PathPattern::try_from(ignoring)?);
        }

        if csrf.session_authentication == SessionAuthenticationConfig::None {
            builder = builder.session_authentication_strategy(Arc::new(NullAuthenticatedSessionStrategy));
        }

        Ok(builder)
    }

    /// Turns protection off. Every request proceeds and login uses the null strategy.
    pub fn disable(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Replaces the default in-memory repository.
    pub fn token_repository(mut self, repository: Arc<dyn TokenRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Replaces the default matcher, which requires protection for state-changing methods.
    pub fn require_protection_matcher(mut self, matcher: impl RequestMatcher + 'static) -> Self {
        self.require = Some(Arc::new(matcher));
        self
    }

    /// Exempts matching requests, whatever the require matcher says.
    pub fn ignoring_request_matchers(mut self, matcher: impl RequestMatcher + 'static) -> Self {
        self.ignoring.push(Arc::new(matcher));
        self
    }

    /// Exempts requests whose path matches one of the patterns.
    pub fn ignoring_paths<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignoring_paths.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Replaces the default token rotation run after login.
    pub fn session_authentication_strategy(mut self, strategy: Arc<dyn SessionAuthenticationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replaces the plain text `403 Forbidden` sent for rejected requests.
    pub fn access_denied_handler(mut self, handler: Arc<dyn AccessDeniedHandler>) -> Self {
        self.access_denied = Some(handler);
        self
    }

    /// Sets the header and parameter names used for submission.
    pub fn token_settings(mut self, settings: TokenSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validates the settings and assembles the protection.
    pub fn build(self) -> Result<CsrfProtection, CsrfError> {
        if self.settings.parameter_name.trim().is_empty() {
            return Err(CsrfError::Configuration("parameter name must not be empty".into()));
        }

        let mut ignoring = self.ignoring;

        for path in self.ignoring_paths {
            ignoring.push(Arc::new(PathPattern::new(path)?));
        }

        let settings = self.settings.clone();
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(SessionTokenRepository::from_config(settings, &SessionConfig::default())));

        let require = self.require.unwrap_or_else(|| Arc::new(StateChangingMethods));
        let filter = CsrfFilter::new(repository.clone(), ProtectionMatcher::new(require, ignoring));

        let strategy: Arc<dyn SessionAuthenticationStrategy> = match (self.enabled, self.strategy) {
            (false, _) => Arc::new(NullAuthenticatedSessionStrategy),
            (true, Some(strategy)) => strategy,
            (true, None) => Arc::new(CsrfAuthenticationStrategy::new(repository.clone())),
        };

        if !self.enabled {
            log::debug!("CSRF protection is disabled");
        }

        Ok(CsrfProtection {
            enabled: self.enabled,
            settings: self.settings,
            filter,
            repository,
            strategy,
            access_denied: self.access_denied.unwrap_or_else(|| Arc::new(ForbiddenHandler)),
        })
    }
}

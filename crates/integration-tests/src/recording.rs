//! Token repositories and strategies that record how they are used.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use csrf::{
    AuthenticationEvent, CsrfError, CsrfToken, RepositoryError, SessionAuthenticationStrategy, SessionId,
    SessionTokenRepository, TokenRepository,
};

/// Delegates to the in-memory repository and counts every call.
#[derive(Default)]
pub struct RecordingRepository {
    inner: SessionTokenRepository,
    loads: AtomicUsize,
    generates: AtomicUsize,
    saves: AtomicUsize,
}

impl RecordingRepository {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn generates(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRepository for RecordingRepository {
    async fn load_token(&self, session: &SessionId) -> Result<Option<CsrfToken>, RepositoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_token(session).await
    }

    fn generate_token(&self, session: &SessionId) -> CsrfToken {
        self.generates.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_token(session)
    }

    async fn save_token(&self, token: Option<CsrfToken>, session: &SessionId) -> Result<(), RepositoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_token(token, session).await
    }
}

/// A repository whose backing store is always down.
#[derive(Default)]
pub struct FailingRepository;

#[async_trait]
impl TokenRepository for FailingRepository {
    async fn load_token(&self, _: &SessionId) -> Result<Option<CsrfToken>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    fn generate_token(&self, _: &SessionId) -> CsrfToken {
        CsrfToken::generate(&Default::default())
    }

    async fn save_token(&self, _: Option<CsrfToken>, _: &SessionId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }
}

/// The in-memory repository, until [`UnreliableRepository::fail_saves`] makes every write fail.
#[derive(Default)]
pub struct UnreliableRepository {
    inner: SessionTokenRepository,
    failing: AtomicBool,
}

impl UnreliableRepository {
    pub fn fail_saves(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenRepository for UnreliableRepository {
    async fn load_token(&self, session: &SessionId) -> Result<Option<CsrfToken>, RepositoryError> {
        self.inner.load_token(session).await
    }

    fn generate_token(&self, session: &SessionId) -> CsrfToken {
        self.inner.generate_token(session)
    }

    async fn save_token(&self, token: Option<CsrfToken>, session: &SessionId) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("read-only replica".into()));
        }

        self.inner.save_token(token, session).await
    }
}

/// Counts authentications and remembers the last principal.
#[derive(Default)]
pub struct CountingStrategy {
    calls: AtomicUsize,
    principal: std::sync::Mutex<Option<String>>,
}

impl CountingStrategy {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_principal(&self) -> Option<String> {
        self.principal.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionAuthenticationStrategy for CountingStrategy {
    async fn on_authentication(&self, event: &AuthenticationEvent) -> Result<(), CsrfError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.principal.lock().unwrap() = Some(event.principal.clone());

        Ok(())
    }
}

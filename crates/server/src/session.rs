//! Cookie-backed sessions kept in memory.

use std::{
    convert::Infallible,
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use config::SessionConfig;
use csrf::SessionId;
use http::{HeaderValue, Request, Response, header::SET_COOKIE};
use mini_moka::sync::Cache;
use tokio::sync::Mutex;
use tower::Layer;

#[derive(Clone, Default)]
struct SessionData {
    principal: Option<String>,
}

/// Server-side session storage, bounded in size and idle time.
#[derive(Clone)]
pub(crate) struct SessionStore {
    sessions: Cache<SessionId, SessionData>,
    config: Arc<SessionConfig>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let sessions = Cache::builder()
            .max_capacity(config.max_sessions)
            .time_to_idle(config.idle_timeout)
            .build();

        Self {
            sessions,
            config: Arc::new(config.clone()),
        }
    }

    /// Resumes the session named by the client, or starts a new one under a fresh id.
    ///
    /// Unknown ids are never adopted, so clients cannot choose their own session id.
    fn resume_or_create(&self, id: Option<&str>) -> (SessionId, bool) {
        if let Some(id) = id.map(SessionId::from)
            && self.sessions.get(&id).is_some()
        {
            return (id, false);
        }

        let id = SessionId::generate();
        self.sessions.insert(id.clone(), SessionData::default());

        (id, true)
    }
}

struct SessionState {
    id: SessionId,
    changed: bool,
    invalidated: bool,
}

/// Handle to the current request's session, available as a request extension.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    store: SessionStore,
}

impl Session {
    fn new(id: SessionId, created: bool, store: SessionStore) -> Self {
        let state = SessionState {
            id,
            changed: created,
            invalidated: false,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
        }
    }

    /// The current session id.
    pub async fn id(&self) -> SessionId {
        self.state.lock().await.id.clone()
    }

    /// Moves the session data under a new id and returns `(previous, current)`.
    pub async fn rotate(&self) -> (SessionId, SessionId) {
        let mut state = self.state.lock().await;

        let previous = state.id.clone();
        let current = SessionId::generate();

        let data = self.store.sessions.get(&previous).unwrap_or_default();
        self.store.sessions.invalidate(&previous);
        self.store.sessions.insert(current.clone(), data);

        state.id = current.clone();
        state.changed = true;

        log::debug!("Rotated session {previous:?} to {current:?}");

        (previous, current)
    }

    /// Records the authenticated principal.
    pub async fn set_principal(&self, principal: impl Into<String>) {
        let state = self.state.lock().await;
        let mut data = self.store.sessions.get(&state.id).unwrap_or_default();

        data.principal = Some(principal.into());
        self.store.sessions.insert(state.id.clone(), data);
    }

    /// The authenticated principal, if any.
    pub async fn principal(&self) -> Option<String> {
        let state = self.state.lock().await;

        self.store.sessions.get(&state.id).and_then(|data| data.principal)
    }

    /// Drops the session. The client is told to forget its cookie.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;

        self.store.sessions.invalidate(&state.id);
        state.invalidated = true;
    }

    async fn set_cookie(&self) -> Option<Cookie<'static>> {
        let state = self.state.lock().await;
        let config = &self.store.config;

        let mut cookie = Cookie::build((config.cookie_name.clone(), state.id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(config.secure_cookie)
            .build();

        if state.invalidated {
            cookie.make_removal();
            return Some(cookie);
        }

        state.changed.then_some(cookie)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) struct SessionLayer(SessionStore);

impl SessionLayer {
    pub fn new(store: SessionStore) -> Self {
        Self(store)
    }
}

impl<Service> Layer<Service> for SessionLayer
where
    Service: Send + Clone,
{
    type Service = SessionService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        SessionService {
            next,
            store: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct SessionService<Service> {
    next: Service,
    store: SessionStore,
}

impl<Service> tower::Service<Request<Body>> for SessionService<Service>
where
    Service: tower::Service<Request<Body>, Response = Response<Body>, Error = Infallible> + Send + Clone + 'static,
    Service::Future: Send,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut next = self.next.clone();
        let store = self.store.clone();

        Box::pin(async move {
            let jar = CookieJar::from_headers(req.headers());
            let cookie_value = jar.get(&store.config.cookie_name).map(|cookie| cookie.value());

            let (id, created) = store.resume_or_create(cookie_value);

            if created {
                log::debug!("Started session {id:?}");
            }

            let session = Session::new(id, created, store);
            req.extensions_mut().insert(session.clone());

            let mut response = next.call(req).await?;

            if let Some(cookie) = session.set_cookie().await {
                match HeaderValue::from_str(&cookie.to_string()) {
                    Ok(value) => {
                        response.headers_mut().append(SET_COOKIE, value);
                    }
                    Err(e) => log::error!("Failed to encode session cookie: {e}"),
                }
            }

            Ok(response)
        })
    }
}

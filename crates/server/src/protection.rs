//! CSRF protection middleware and the token endpoint.

use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{Extension, Json, body::Body};
use csrf::{CsrfProtection, CsrfRequest, CsrfToken, FilterOutcome, is_form_content_type};
use http::{Request, Response, StatusCode};
use tower::Layer;

use crate::session::Session;

#[derive(Clone)]
pub(crate) struct CsrfLayer {
    protection: CsrfProtection,
    max_form_size: usize,
}

impl CsrfLayer {
    pub fn new(protection: CsrfProtection, max_form_size: usize) -> Self {
        Self {
            protection,
            max_form_size,
        }
    }
}

impl<Service> Layer<Service> for CsrfLayer
where
    Service: Send + Clone,
{
    type Service = CsrfService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        CsrfService {
            next,
            protection: self.protection.clone(),
            max_form_size: self.max_form_size,
        }
    }
}

#[derive(Clone)]
pub(crate) struct CsrfService<Service> {
    next: Service,
    protection: CsrfProtection,
    max_form_size: usize,
}

impl<Service> tower::Service<Request<Body>> for CsrfService<Service>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut next = self.next.clone();
        let protection = self.protection.clone();
        let max_form_size = self.max_form_size;

        Box::pin(async move {
            let Some(session) = req.extensions().get::<Session>().cloned() else {
                log::error!("CSRF protection requires the session layer to run first");
                return Ok(plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"));
            };

            let session_id = session.id().await;
            let (mut parts, body) = req.into_parts();

            // The token may arrive as a form field, so urlencoded bodies are read up front
            // and handed on unchanged.
            let (form, body) = if is_form_content_type(&parts.headers) {
                match axum::body::to_bytes(body, max_form_size).await {
                    Ok(bytes) => (Some(bytes.clone()), Body::from(bytes)),
                    Err(e) => {
                        log::debug!("Failed to read form body: {e}");
                        return Ok(plain_text(StatusCode::PAYLOAD_TOO_LARGE, "Form body too large"));
                    }
                }
            } else {
                (None, body)
            };

            let token = {
                let mut request = CsrfRequest::new(&parts.method, &parts.uri, &parts.headers);

                if let Some(form) = &form {
                    request = request.with_form(form);
                }

                match protection.check(&request, &session_id).await {
                    Ok(FilterOutcome::Proceed { token }) => token,
                    Ok(FilterOutcome::Reject(denial)) => {
                        return Ok(protection.access_denied(&request, denial).map(Body::from));
                    }
                    Err(e) => {
                        log::error!("CSRF check failed for {} {}: {e}", parts.method, parts.uri.path());
                        return Ok(plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"));
                    }
                }
            };

            if let Some(token) = token {
                parts.extensions.insert(token);
            }

            next.call(Request::from_parts(parts, body)).await
        })
    }
}

/// Exposes the session's masked token, for clients that cannot read it from a rendered page.
pub(crate) async fn token(token: Option<Extension<CsrfToken>>) -> Result<Json<CsrfToken>, StatusCode> {
    match token {
        Some(Extension(token)) => Ok(Json(token)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

pub(crate) fn plain_text(status: StatusCode, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Body::from(message.to_string()))
        .unwrap()
}

//! Responses for requests turned away by the filter.

use http::{HeaderValue, Response, StatusCode, header::CONTENT_TYPE};

use crate::{error::Denial, request::CsrfRequest};

/// Builds the response sent instead of forwarding a rejected request.
///
/// The handler learns why the request was denied, so a missing token (typically an expired
/// session) can be answered differently from a wrong one. Closures taking the request and the
/// denial implement this trait.
pub trait AccessDeniedHandler: Send + Sync {
    /// The response for `request`, denied for `denial`.
    fn handle(&self, request: &CsrfRequest<'_>, denial: Denial) -> Response<String>;
}

impl<F> AccessDeniedHandler for F
where
    F: Fn(&CsrfRequest<'_>, Denial) -> Response<String> + Send + Sync,
{
    fn handle(&self, request: &CsrfRequest<'_>, denial: Denial) -> Response<String> {
        self(request, denial)
    }
}

/// Answers `403 Forbidden` with the denial as a plain text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForbiddenHandler;

impl AccessDeniedHandler for ForbiddenHandler {
    fn handle(&self, _: &CsrfRequest<'_>, denial: Denial) -> Response<String> {
        let mut response = Response::new(denial.to_string());

        *response.status_mut() = StatusCode::FORBIDDEN;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        response
    }
}

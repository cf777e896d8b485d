//! Request information for CSRF checks.

use std::borrow::Cow;

use http::{HeaderMap, Method, Uri, header::CONTENT_TYPE};

/// The parts of an inbound request CSRF protection looks at.
#[derive(Debug, Clone, Copy)]
pub struct CsrfRequest<'a> {
    method: &'a Method,
    path: &'a str,
    query: Option<&'a str>,
    headers: &'a HeaderMap,
    form: Option<&'a [u8]>,
}

impl<'a> CsrfRequest<'a> {
    /// Creates a view over a request's method, URI and headers.
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path: uri.path(),
            query: uri.query(),
            headers,
            form: None,
        }
    }

    /// Attaches an `application/x-www-form-urlencoded` body for parameter lookups.
    pub fn with_form(mut self, body: &'a [u8]) -> Self {
        self.form = Some(body);
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        self.method
    }

    /// The request path, without the query.
    pub fn path(&self) -> &str {
        self.path
    }

    /// The first value of a header, if it is valid UTF-8.
    pub fn header(&self, name: &http::HeaderName) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The first value of a query or form parameter. The query string is searched first.
    pub fn parameter(&self, name: &str) -> Option<Cow<'a, str>> {
        let query = self.query.map(str::as_bytes).into_iter();

        query
            .chain(self.form)
            .flat_map(url::form_urlencoded::parse)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Whether a content type announces a urlencoded form body.
pub fn is_form_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

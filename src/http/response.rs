//! Transport-neutral response value produced by handlers and pipeline stages.
//!
//! Notes:
//! - Headers set by earlier stages (CORS) live on `HttpContext::response` and are carried
//!   over onto whatever the handler returns via [`HttpResponse::inherit_headers`].

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::http::problem::ProblemDetail;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// Serialize `body` as JSON. A serialization failure degrades to a 500 problem.
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::new(status)
                .with_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )
                .with_body(bytes),
            Err(e) => {
                error!(error = %e, "failed to serialize response body");
                ProblemDetail::internal_server_error().to_response()
            }
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Copy every header from `pending` whose name is not already present.
    pub fn inherit_headers(&mut self, pending: &HeaderMap) {
        for name in pending.keys() {
            if self.headers.contains_key(name) {
                continue;
            }
            for value in pending.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
    }

    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

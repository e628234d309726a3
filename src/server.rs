//! axum adapter: every request goes through the handler registry.
//!
//! Responsibility:
//! - Convert an axum request into an `HttpContext` (bounded body, query, connection info)
//! - Run the dispatcher off the async runtime (password hashing is CPU bound)
//! - Convert the `HttpResponse` back
//!
//! Notes:
//! - Without a usable `Host` header the server address is unknown and no request counts as
//!   same-origin.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::http::context::{ConnectionInfo, HttpContext, HttpRequest};
use crate::http::problem::ProblemDetail;
use crate::middleware;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let rest = state.rest.clone();
    let router = Router::new().fallback(dispatch).with_state(state);
    middleware::http::apply(router, &rest)
}

fn payload_too_large() -> ProblemDetail {
    ProblemDetail::new(StatusCode::PAYLOAD_TOO_LARGE, "payload-too-large", "Payload Too Large")
        .detail("The request body exceeds the configured maximum content length.")
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.rest.max_content_length).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "failed to read request body");
            return payload_too_large().to_response().into_response();
        }
    };

    let mut connection = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|host| ConnectionInfo::from_host_header(&state.rest.scheme, host))
        .unwrap_or_else(|| ConnectionInfo::new(&state.rest.scheme, "", 0));
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        connection = connection.with_client_addr(*addr);
    }

    let mut request = HttpRequest::new(parts.method, parts.uri.path()).with_body(body);
    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
    }
    request.headers = parts.headers;

    let dispatcher = state.dispatcher.clone();
    let ctx = HttpContext::new(request, connection);
    match tokio::task::spawn_blocking(move || dispatcher.dispatch(ctx)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            // a panicking handler ends up here
            error!(error = %e, "request dispatch failed");
            ProblemDetail::internal_server_error().to_response().into_response()
        }
    }
}

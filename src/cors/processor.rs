//! CORS negotiation for preflight and actual requests.
//!
//! Responsibility:
//! - Detect preflight requests
//! - Validate origin / method / headers against a handler's `CorsConfig`
//! - Write the negotiated `Access-Control-*` headers (or a 403) onto `ctx.response`
//!
//! Notes:
//! - Same-origin requests are left alone; no CORS headers are added for them.
//! - Requested headers are only checked on preflight. Actual requests carry many headers
//!   (Host, User-Agent, ...) that a browser never asks permission for.

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use tracing::debug;
use url::Url;

use crate::cors::config::{CorsConfig, UNSET_MAX_AGE};
use crate::http::context::{ConnectionInfo, HttpContext, HttpRequest, default_port};
use crate::http::handler::HandlerConfig;
use crate::http::problem::ProblemDetail;
use crate::http::response::HttpResponse;

pub const ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-request-private-network");
pub const ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightInfo {
    pub origin: String,
    pub requested_method: String,
    pub requested_headers: Vec<String>,
}

pub fn extract_preflight_info(request: &HttpRequest) -> Option<PreflightInfo> {
    if request.method != Method::OPTIONS {
        return None;
    }

    let origin = request.header_str(&header::ORIGIN)?;
    let requested_method = request.header_str(&header::ACCESS_CONTROL_REQUEST_METHOD)?;
    let requested_headers = request
        .header_str(&header::ACCESS_CONTROL_REQUEST_HEADERS)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(PreflightInfo {
        origin: origin.to_string(),
        requested_method: requested_method.to_string(),
        requested_headers,
    })
}

/// Answer a preflight for the handler bound to the requested method.
///
/// Returns `false` when the request was rejected (status 403 is set on `ctx.response`).
pub fn process_preflight_request(ctx: &mut HttpContext, info: &PreflightInfo, config: &HandlerConfig) -> bool {
    if is_same_origin(&info.origin, &ctx.connection) {
        return true;
    }

    let Some(cors) = config.cors.as_ref() else {
        reject(&mut ctx.response);
        return false;
    };

    let private_network_requested = ctx
        .request
        .headers
        .contains_key(ACCESS_CONTROL_REQUEST_PRIVATE_NETWORK);
    negotiate(
        &mut ctx.response,
        cors,
        Negotiation {
            origin: &info.origin,
            method: &info.requested_method,
            allowed_method: &config.method,
            requested_headers: Some(&info.requested_headers),
            private_network_requested,
        },
    )
}

/// Validate an actual (non-preflight) request. Returns `false` when it must not proceed.
pub fn process_normal_request(ctx: &mut HttpContext, config: &HandlerConfig) -> bool {
    let Some(origin) = ctx.request.header_str(&header::ORIGIN).map(str::to_string) else {
        return true;
    };
    if is_same_origin(&origin, &ctx.connection) {
        return true;
    }
    let Some(cors) = config.cors.as_ref() else {
        return true;
    };

    let method = ctx.request.method.to_string();
    negotiate(
        &mut ctx.response,
        cors,
        Negotiation {
            origin: &origin,
            method: &method,
            allowed_method: &config.method,
            requested_headers: None,
            private_network_requested: false,
        },
    )
}

/// Whether `origin` names the server itself (scheme, host and port).
pub fn is_same_origin(origin: &str, connection: &ConnectionInfo) -> bool {
    let Ok(parsed) = Url::parse(origin) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    let scheme = parsed.scheme();
    let port = parsed.port().unwrap_or_else(|| default_port(scheme));
    scheme.eq_ignore_ascii_case(&connection.scheme)
        && host.eq_ignore_ascii_case(&connection.host)
        && port == connection.port
}

struct Negotiation<'a> {
    origin: &'a str,
    method: &'a str,
    allowed_method: &'a Method,
    /// `Some` on preflight.
    requested_headers: Option<&'a [String]>,
    private_network_requested: bool,
}

fn negotiate(response: &mut HttpResponse, cors: &CorsConfig, request: Negotiation<'_>) -> bool {
    for varying in ["Origin", "Access-Control-Request-Method", "Access-Control-Request-Headers"] {
        response
            .headers
            .append(header::VARY, HeaderValue::from_static(varying));
    }

    let Some(origin) = cors.find_matching_origin(request.origin) else {
        debug!(origin = request.origin, "cors origin not allowed");
        reject(response);
        return false;
    };

    if !request
        .method
        .eq_ignore_ascii_case(request.allowed_method.as_str())
    {
        debug!(method = request.method, "cors method not allowed");
        reject(response);
        return false;
    }

    if let Some(requested_headers) = request.requested_headers {
        let Some(allowed) = cors.filter_headers(requested_headers) else {
            debug!(headers = ?requested_headers, "cors headers not allowed");
            reject(response);
            return false;
        };

        if !allowed.is_empty() {
            set_header(response, header::ACCESS_CONTROL_ALLOW_HEADERS, &allowed.join(", "));
        }
        set_header(
            response,
            header::ACCESS_CONTROL_ALLOW_METHODS,
            request.allowed_method.as_str(),
        );
        if cors.max_age() != UNSET_MAX_AGE {
            set_header(
                response,
                header::ACCESS_CONTROL_MAX_AGE,
                &cors.max_age().to_string(),
            );
        }
        if request.private_network_requested {
            let allowed = cors.allow_private_networks() == Some(true);
            set_header(
                response,
                ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK,
                if allowed { "true" } else { "false" },
            );
        }

        response.status = StatusCode::NO_CONTENT;
    }

    set_header(response, header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    if !cors.exposed_headers().is_empty() {
        set_header(
            response,
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            &cors.exposed_headers().join(", "),
        );
    }
    if cors.allow_credentials() == Some(true) {
        set_header(response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
    }

    true
}

fn set_header(response: &mut HttpResponse, name: HeaderName, value: &str) {
    // values come from configuration or request headers that were valid header values
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers.insert(name, value);
    }
}

fn reject(response: &mut HttpResponse) {
    let rejected = ProblemDetail::new(StatusCode::FORBIDDEN, "cors-rejected", "CORS Rejected")
        .detail("Provided information does not match CORS rules")
        .to_response();

    response.status = rejected.status;
    response.body = rejected.body;
    for (name, value) in &rejected.headers {
        response.headers.insert(name.clone(), value.clone());
    }
}

//! Request-scoped state threaded through lookup, CORS, authentication and the handler.
//!
//! Responsibility:
//! - `HttpRequest`: method, path, headers, query and captured path parameters
//! - `ConnectionInfo`: the server side of the connection (used for same-origin checks)
//! - `HttpContext`: request + pending response + authentication outcome
//!
//! Notes:
//! - Nothing here is shared between requests; the handler tree is never mutated by a lookup.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::http::response::HttpResponse;
use crate::services::auth::user::AuthenticatedUser;

/// Default port of a scheme when an origin or host omits it.
pub fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("ws") {
        80
    } else {
        443
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub client_addr: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
            client_addr: None,
        }
    }

    /// Resolve the server address from a `Host` header value (`host[:port]`).
    pub fn from_host_header(scheme: &str, host: &str) -> Option<Self> {
        let parsed = Url::parse(&format!("{}://{}", scheme, host.trim())).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port().unwrap_or_else(|| default_port(scheme));
        Some(Self::new(scheme, host, port))
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    query: HashMap<String, Vec<String>>,
    path_params: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            query: HashMap::new(),
            path_params: HashMap::new(),
        }
    }

    /// Parse a raw (still percent-encoded) query string; repeated keys keep every value.
    pub fn with_query(mut self, raw: &str) -> Self {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            self.query
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, if it is valid visible ASCII.
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn query_params(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub(crate) fn commit_path_params(&mut self, params: impl IntoIterator<Item = (String, String)>) {
        self.path_params.extend(params);
    }
}

/// Outcome of a successful authentication, stored for the handler.
#[derive(Debug, Clone)]
pub struct Authentication {
    pub user: AuthenticatedUser,
    pub token_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpContext {
    pub request: HttpRequest,
    /// Status and headers prepared by pipeline stages before the handler runs.
    pub response: HttpResponse,
    pub connection: ConnectionInfo,
    authentication: Option<Authentication>,
}

impl HttpContext {
    pub fn new(request: HttpRequest, connection: ConnectionInfo) -> Self {
        Self {
            request,
            response: HttpResponse::default(),
            connection,
            authentication: None,
        }
    }

    pub fn authenticate(&mut self, user: AuthenticatedUser, token_id: Option<String>) {
        self.authentication = Some(Authentication { user, token_id });
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.authentication.as_ref().map(|a| &a.user)
    }
}

//! Shared fixtures for the integration tests: app state with fresh keys, users, requests.
#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, Method, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cluster_rest::api;
use cluster_rest::config::RestConfig;
use cluster_rest::http::context::{ConnectionInfo, HttpContext, HttpRequest};
use cluster_rest::http::response::HttpResponse;
use cluster_rest::services::auth::keys::KeyMaterial;
use cluster_rest::services::auth::management::InMemoryUserManagement;
use cluster_rest::services::auth::user::RestUser;
use cluster_rest::state::AppState;
use std::sync::Arc;

/// Cheap hashing; the cost factor is irrelevant for behaviour.
pub fn rest_config() -> RestConfig {
    RestConfig {
        password_memory_kib: 64,
        password_iterations: 1,
        ..RestConfig::default()
    }
}

pub fn state_with(rest: RestConfig) -> AppState {
    let keys = KeyMaterial::generate().expect("key generation");
    let state = AppState::new(rest, &keys, Arc::new(InMemoryUserManagement::new())).expect("state");
    api::v3::register(&state).expect("v3 routes");
    state
}

pub fn state() -> AppState {
    state_with(rest_config())
}

pub fn add_user(state: &AppState, username: &str, password: &str, scopes: &[&str]) -> RestUser {
    let user = RestUser::builder(username)
        .scopes(scopes.iter().copied())
        .password(password, state.password_hasher())
        .expect("hash password")
        .build()
        .expect("valid user");
    state.users().save_user(user.clone()).expect("save user");
    user
}

pub fn connection() -> ConnectionInfo {
    ConnectionInfo::new("http", "127.0.0.1", 2812)
}

pub fn request(method: Method, path: &str) -> HttpContext {
    request_with(method, path, &[], "")
}

pub fn request_with(method: Method, path: &str, headers: &[(HeaderName, HeaderValue)], body: &str) -> HttpContext {
    let (path, query) = path.split_once('?').unwrap_or((path, ""));
    let mut request = HttpRequest::new(method, path)
        .with_query(query)
        .with_body(body.to_string());
    for (name, value) in headers {
        request = request.with_header(name.clone(), value.clone());
    }
    HttpContext::new(request, connection())
}

pub fn basic(username: &str, password: &str) -> (HeaderName, HeaderValue) {
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {}", encoded)).expect("header value"),
    )
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("header value"),
    )
}

pub fn json(response: &HttpResponse) -> serde_json::Value {
    serde_json::from_slice(&response.body).expect("json body")
}

/// `type` of an `application/problem+json` body.
pub fn problem_type(response: &HttpResponse) -> String {
    json(response)["type"].as_str().unwrap_or_default().to_string()
}

/*
 * Responsibility
 * - RFC 7807 problem documents (application/problem+json)
 * - HandleError: the only error that crosses the request pipeline, carrying a finished response
 */
use axum::http::{HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::response::HttpResponse;

pub const PROBLEM_JSON: &str = "application/problem+json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProblemDetail {
    pub fn new(status: StatusCode, problem_type: &str, title: &str) -> Self {
        Self {
            problem_type: problem_type.to_string(),
            title: title.to_string(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            extensions: Map::new(),
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.to_string(), value.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn internal_server_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal-server-error",
            "Internal Server Error",
        )
        .detail("An internal error occurred while processing the request.")
    }

    pub fn route_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "route-not-found", "Route Not Found")
            .detail("No handler is registered for the requested path and method.")
    }

    pub fn to_response(&self) -> HttpResponse {
        let body = match serde_json::to_vec(self) {
            Ok(body) => body,
            // only non-string map keys can fail here, which this type never has
            Err(_) => Vec::new(),
        };

        HttpResponse::new(self.status_code())
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON))
            .with_body(body)
    }
}

/// Short-circuits request handling with a pre-built response.
#[derive(Debug, Clone, Error)]
#[error("request handling aborted with status {}", .response.status)]
pub struct HandleError {
    response: HttpResponse,
}

impl HandleError {
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn into_response(self) -> HttpResponse {
        self.response
    }

    pub fn internal() -> Self {
        ProblemDetail::internal_server_error().into()
    }
}

impl From<ProblemDetail> for HandleError {
    fn from(problem: ProblemDetail) -> Self {
        Self::new(problem.to_response())
    }
}

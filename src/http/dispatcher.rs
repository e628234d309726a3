//! Per-request pipeline: lookup, CORS, interceptors, handler.
//!
//! Responsibility:
//! - Resolve the path in the handler registry and pick the binding for the method
//! - Answer preflights and validate actual requests against the binding's CORS config
//! - Run interceptors around the handler and turn errors into problem responses
//!
//! Notes:
//! - A missing route and a missing method on an existing route both answer 404.
//! - Headers prepared on `ctx.response` (CORS) survive into whatever response is sent.

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, warn};

use crate::cors::processor::{extract_preflight_info, process_normal_request, process_preflight_request};
use crate::http::context::HttpContext;
use crate::http::handler::{HandlerBinding, HandlerResult};
use crate::http::problem::ProblemDetail;
use crate::http::response::HttpResponse;
use crate::routing::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn dispatch(&self, mut ctx: HttpContext) -> HttpResponse {
        let path = ctx.request.path.clone();
        let Some(route) = self.registry.find(&path, &mut ctx) else {
            debug!(path = %path, "no route");
            return finish(&ctx, ProblemDetail::route_not_found().to_response());
        };

        if let Some(preflight) = extract_preflight_info(&ctx.request) {
            let Some(binding) = route
                .bindings
                .iter()
                .find(|b| b.method().as_str().eq_ignore_ascii_case(&preflight.requested_method))
            else {
                debug!(path = %path, method = %preflight.requested_method, "no handler for preflight method");
                return finish(&ctx, ProblemDetail::route_not_found().to_response());
            };

            if process_preflight_request(&mut ctx, &preflight, &binding.config) {
                ctx.response.status = StatusCode::NO_CONTENT;
            }
            return ctx.response;
        }

        let Some(binding) = route.binding_for(&ctx.request.method) else {
            debug!(path = %path, method = %ctx.request.method, "no handler for method");
            return finish(&ctx, ProblemDetail::route_not_found().to_response());
        };

        if !process_normal_request(&mut ctx, &binding.config) {
            return ctx.response;
        }

        match invoke(binding, &mut ctx) {
            Ok(response) => finish(&ctx, response),
            Err(err) => {
                for interceptor in &binding.config.interceptors {
                    interceptor.post_process_exceptionally(&ctx, &err, &binding.config);
                }
                if err.status().is_server_error() {
                    warn!(path = %path, status = %err.status(), "request failed");
                }
                finish(&ctx, err.into_response())
            }
        }
    }
}

fn invoke(binding: &HandlerBinding, ctx: &mut HttpContext) -> HandlerResult {
    let config = &binding.config;
    for interceptor in &config.interceptors {
        if !interceptor.pre_process(ctx, config)? {
            return Ok(ctx.response.clone());
        }
    }

    let mut response = binding.handler.handle(ctx)?;
    for interceptor in &config.interceptors {
        interceptor.post_process(ctx, &mut response, config)?;
    }
    Ok(response)
}

fn finish(ctx: &HttpContext, mut response: HttpResponse) -> HttpResponse {
    response.inherit_headers(&ctx.response.headers);
    response
}

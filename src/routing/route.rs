use std::sync::Arc;

use axum::http::Method;

use crate::cors::config::CorsConfig;
use crate::http::handler::{HandlerConfig, HttpHandler, HttpHandlerInterceptor};
use crate::services::auth::interceptor::AuthenticationInterceptor;

/// A route ready for [`HandlerRegistry::register_route`](crate::routing::registry::HandlerRegistry::register_route).
///
/// ```ignore
/// registry.register_route(
///     Route::post("/api/v3/auth/ticket")
///         .authenticate(authenticator.require(&["jwt"], &["cluster_rest:ticket_create"])?)
///         .handler(issue_ticket),
/// )?;
/// ```
pub struct Route {
    path: String,
    handler: Arc<dyn HttpHandler>,
    config: HandlerConfig,
}

impl Route {
    pub fn new(method: Method, path: &str) -> RouteBuilder {
        RouteBuilder {
            path: path.to_string(),
            config: HandlerConfig::new(method),
            authentication: None,
        }
    }

    pub fn get(path: &str) -> RouteBuilder {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> RouteBuilder {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> RouteBuilder {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> RouteBuilder {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> RouteBuilder {
        Self::new(Method::DELETE, path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub(crate) fn into_parts(self) -> (String, Arc<dyn HttpHandler>, HandlerConfig) {
        (self.path, self.handler, self.config)
    }
}

pub struct RouteBuilder {
    path: String,
    config: HandlerConfig,
    authentication: Option<AuthenticationInterceptor>,
}

impl RouteBuilder {
    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.config.cors = Some(cors);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.config.owner = Some(owner.into());
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn HttpHandlerInterceptor>) -> Self {
        self.config.interceptors.push(interceptor);
        self
    }

    /// Authentication always runs before any other interceptor.
    pub fn authenticate(mut self, authentication: AuthenticationInterceptor) -> Self {
        self.authentication = Some(authentication);
        self
    }

    pub fn handler(self, handler: impl HttpHandler + 'static) -> Route {
        self.handler_arc(Arc::new(handler))
    }

    /// Keep a clone of `handler` to unregister it later.
    pub fn handler_arc(mut self, handler: Arc<dyn HttpHandler>) -> Route {
        if let Some(authentication) = self.authentication {
            self.config.interceptors.insert(0, Arc::new(authentication));
        }

        Route {
            path: self.path,
            handler,
            config: self.config,
        }
    }
}

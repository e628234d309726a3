/*
 * Responsibility
 * - HttpHandler: the typed handler value bound to (path, method)
 * - HttpHandlerInterceptor: pre / post / error hooks run around a handler
 * - HandlerConfig + HandlerBinding: what the route tree stores per method
 */
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::cors::config::CorsConfig;
use crate::http::context::HttpContext;
use crate::http::problem::HandleError;
use crate::http::response::HttpResponse;

pub type HandlerResult = Result<HttpResponse, HandleError>;

pub trait HttpHandler: Send + Sync {
    fn handle(&self, ctx: &mut HttpContext) -> HandlerResult;
}

impl<F> HttpHandler for F
where
    F: Fn(&mut HttpContext) -> HandlerResult + Send + Sync,
{
    fn handle(&self, ctx: &mut HttpContext) -> HandlerResult {
        self(ctx)
    }
}

pub trait HttpHandlerInterceptor: Send + Sync {
    /// Returning `Ok(false)` stops processing and sends `ctx.response` as it stands.
    fn pre_process(&self, _ctx: &mut HttpContext, _config: &HandlerConfig) -> Result<bool, HandleError> {
        Ok(true)
    }

    fn post_process(
        &self,
        _ctx: &mut HttpContext,
        _response: &mut HttpResponse,
        _config: &HandlerConfig,
    ) -> Result<(), HandleError> {
        Ok(())
    }

    fn post_process_exceptionally(&self, _ctx: &HttpContext, _error: &HandleError, _config: &HandlerConfig) {}
}

#[derive(Clone)]
pub struct HandlerConfig {
    pub method: Method,
    pub cors: Option<CorsConfig>,
    pub interceptors: Vec<Arc<dyn HttpHandlerInterceptor>>,
    /// Module that registered the handler; used to unregister everything it owns at once.
    pub owner: Option<String>,
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("method", &self.method)
            .field("cors", &self.cors)
            .field("interceptors", &self.interceptors.len())
            .field("owner", &self.owner)
            .finish()
    }
}

impl HandlerConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            cors: None,
            interceptors: Vec::new(),
            owner: None,
        }
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn HttpHandlerInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

#[derive(Clone)]
pub struct HandlerBinding {
    pub handler: Arc<dyn HttpHandler>,
    pub config: Arc<HandlerConfig>,
}

impl fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HandlerBinding {
    pub fn new(handler: Arc<dyn HttpHandler>, config: HandlerConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }

    pub fn method(&self) -> &Method {
        &self.config.method
    }

    /// Identity comparison on the handler allocation (vtables are ignored).
    pub fn is_handler(&self, handler: &Arc<dyn HttpHandler>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.handler), Arc::as_ptr(handler))
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.config.owner.as_deref() == Some(owner)
    }
}

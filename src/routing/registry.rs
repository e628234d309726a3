/*
 * Responsibility
 * - Owns the handler tree shared by every request
 * - register / find / unregister / clear, plus introspection
 * - Readers clone the current snapshot out of a short read lock; writers serialize, copy, mutate
 *   and publish
 */
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use axum::http::Method;
use tracing::{debug, info};

use crate::cors::config::CorsConfig;
use crate::error::RegistrationError;
use crate::http::context::HttpContext;
use crate::http::handler::{HandlerBinding, HandlerConfig, HttpHandler};
use crate::routing::route::Route;
use crate::routing::tree::HandlerTree;

/// Bindings of the node a path resolved to.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub tree_path: String,
    pub bindings: Vec<HandlerBinding>,
}

impl RouteMatch {
    pub fn binding_for(&self, method: &Method) -> Option<&HandlerBinding> {
        self.bindings.iter().find(|b| b.method() == method)
    }
}

/// Summary of one registration, as returned by [`HandlerRegistry::registered_handlers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredHandler {
    pub path: String,
    pub method: Method,
    pub owner: Option<String>,
}

pub struct HandlerRegistry {
    tree: RwLock<Arc<HandlerTree>>,
    write_lock: Mutex<()>,
    default_cors: CorsConfig,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("default_cors", &self.default_cors)
            .finish_non_exhaustive()
    }
}

impl HandlerRegistry {
    pub fn new(default_cors: CorsConfig) -> Self {
        Self {
            tree: RwLock::new(Arc::new(HandlerTree::new())),
            write_lock: Mutex::new(()),
            default_cors,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // the guarded data is `()`, a poisoned lock carries no broken state
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<HandlerTree> {
        // published trees are never mutated in place
        self.tree.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, tree: HandlerTree) {
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(tree);
    }

    pub fn register(
        &self,
        path: &str,
        handler: Arc<dyn HttpHandler>,
        mut config: HandlerConfig,
    ) -> Result<(), RegistrationError> {
        config.cors = Some(self.default_cors.combine(config.cors.as_ref()));
        let method = config.method.clone();
        let binding = HandlerBinding::new(handler, config);

        let _guard = self.lock();
        let mut next = HandlerTree::clone(&self.snapshot());
        next.register(path, binding)?;
        self.publish(next);

        debug!(path, method = %method, "registered http handler");
        Ok(())
    }

    pub fn register_route(&self, route: Route) -> Result<(), RegistrationError> {
        let (path, handler, config) = route.into_parts();
        self.register(&path, handler, config)
    }

    /// Resolve `path`, committing captured path parameters to `ctx` only on a match.
    pub fn find(&self, path: &str, ctx: &mut HttpContext) -> Option<RouteMatch> {
        let tree = self.snapshot();
        let found = tree.find(path)?;

        let route = RouteMatch {
            tree_path: found.tree_path(),
            bindings: found.node.bindings().to_vec(),
        };
        ctx.request.commit_path_params(found.into_path_params());
        Some(route)
    }

    fn remove_where(&self, predicate: impl Fn(&HandlerBinding) -> bool) -> usize {
        let _guard = self.lock();
        let mut next = HandlerTree::clone(&self.snapshot());
        let removed = next.remove_where(predicate);
        if removed > 0 {
            self.publish(next);
        }
        removed
    }

    /// Remove every binding of `handler`. Returns the number of removed bindings.
    pub fn unregister(&self, handler: &Arc<dyn HttpHandler>) -> usize {
        let removed = self.remove_where(|b| b.is_handler(handler));
        debug!(removed, "unregistered http handler");
        removed
    }

    /// Remove every binding registered by `owner`.
    pub fn unregister_owner(&self, owner: &str) -> usize {
        let removed = self.remove_where(|b| b.is_owned_by(owner));
        info!(owner, removed, "unregistered http handlers of owner");
        removed
    }

    pub fn clear(&self) {
        let _guard = self.lock();
        self.publish(HandlerTree::new());
    }

    pub fn registered_handlers(&self) -> Vec<RegisteredHandler> {
        let tree = self.snapshot();
        tree.bindings()
            .into_iter()
            .map(|(path, binding)| RegisteredHandler {
                path,
                method: binding.method().clone(),
                owner: binding.config.owner.clone(),
            })
            .collect()
    }

    pub fn default_cors(&self) -> &CorsConfig {
        &self.default_cors
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::http::context::{ConnectionInfo, HttpRequest};
    use crate::http::handler::HandlerResult;
    use crate::http::response::HttpResponse;

    fn handler(status: StatusCode) -> Arc<dyn HttpHandler> {
        Arc::new(move |_: &mut HttpContext| -> HandlerResult { Ok(HttpResponse::new(status)) })
    }

    fn ctx(path: &str) -> HttpContext {
        HttpContext::new(
            HttpRequest::new(Method::GET, path),
            ConnectionInfo::new("http", "127.0.0.1", 2812),
        )
    }

    #[test]
    fn test_find_commits_path_params() {
        let registry = HandlerRegistry::new(CorsConfig::default());
        registry
            .register("api/test/{name}", handler(StatusCode::OK), HandlerConfig::new(Method::GET))
            .unwrap();

        let mut found_ctx = ctx("/api/test/playo");
        let found = registry.find("/api/test/playo", &mut found_ctx).unwrap();
        assert!(found.binding_for(&Method::GET).is_some());
        assert_eq!(found_ctx.request.path_param("name"), Some("playo"));

        let mut missed_ctx = ctx("/api/test/playo/other");
        assert!(registry.find("/api/test/playo/other", &mut missed_ctx).is_none());
        assert!(missed_ctx.request.path_params().is_empty());
    }

    #[test]
    fn test_registration_merges_default_cors() {
        let default = CorsConfig::builder()
            .allowed_origin("*")
            .allow_credentials(true)
            .build();
        let registry = HandlerRegistry::new(default);
        registry
            .register(
                "/cors",
                handler(StatusCode::OK),
                HandlerConfig::new(Method::GET)
                    .with_cors(CorsConfig::builder().exposed_header("X-Trace").build()),
            )
            .unwrap();

        let found = registry.find("/cors", &mut ctx("/cors")).unwrap();
        let cors = found.bindings[0].config.cors.clone().unwrap();
        assert!(cors.allows_any_origin());
        assert_eq!(cors.exposed_headers(), ["X-Trace"]);
        assert_eq!(cors.allow_credentials(), Some(true));
    }

    #[test]
    fn test_unregister_by_handler_and_owner() {
        let registry = HandlerRegistry::new(CorsConfig::default());
        let shared = handler(StatusCode::OK);
        registry
            .register("/a/one", Arc::clone(&shared), HandlerConfig::new(Method::GET))
            .unwrap();
        registry
            .register("/a/one", Arc::clone(&shared), HandlerConfig::new(Method::POST))
            .unwrap();
        registry
            .register(
                "/b/two",
                handler(StatusCode::OK),
                HandlerConfig::new(Method::GET).with_owner("module-b"),
            )
            .unwrap();

        assert_eq!(registry.unregister(&shared), 2);
        assert!(registry.find("/a/one", &mut ctx("/a/one")).is_none());
        assert_eq!(registry.registered_handlers().len(), 1);

        assert_eq!(registry.unregister_owner("module-b"), 1);
        assert!(registry.registered_handlers().is_empty());
        assert_eq!(registry.unregister_owner("module-b"), 0);
    }

    #[test]
    fn test_failed_registration_keeps_tree() {
        let registry = HandlerRegistry::new(CorsConfig::default());
        registry
            .register("/x/{id}", handler(StatusCode::OK), HandlerConfig::new(Method::GET))
            .unwrap();

        let err = registry
            .register("/x/{other}/y", handler(StatusCode::OK), HandlerConfig::new(Method::GET))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ConflictingParameter { .. }));
        assert_eq!(registry.registered_handlers().len(), 1);

        registry.clear();
        assert!(registry.registered_handlers().is_empty());
    }

    #[test]
    fn test_concurrent_readers_during_writes() {
        let registry = Arc::new(HandlerRegistry::new(CorsConfig::default()));
        registry
            .register("/stable/{id}", handler(StatusCode::OK), HandlerConfig::new(Method::GET))
            .unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let mut c = ctx("/stable/7");
                        let found = registry.find("/stable/7", &mut c).unwrap();
                        assert_eq!(found.tree_path, "/stable/{id}");
                        assert_eq!(c.request.path_param("id"), Some("7"));
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let path = format!("/dynamic/route{}", i);
            registry
                .register(&path, handler(StatusCode::OK), HandlerConfig::new(Method::GET))
                .unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.registered_handlers().len(), 51);
    }
}

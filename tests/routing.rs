mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use cluster_rest::cors::config::CorsConfig;
use cluster_rest::error::RegistrationError;
use cluster_rest::http::context::HttpContext;
use cluster_rest::http::dispatcher::Dispatcher;
use cluster_rest::http::handler::{HandlerResult, HttpHandler};
use cluster_rest::http::response::HttpResponse;
use cluster_rest::routing::registry::HandlerRegistry;
use cluster_rest::routing::route::Route;

fn echo(label: &'static str) -> impl Fn(&mut HttpContext) -> HandlerResult + Send + Sync + 'static {
    move |ctx: &mut HttpContext| {
        let body = serde_json::json!({
            "handler": label,
            "params": ctx.request.path_params(),
        });
        Ok(HttpResponse::json(StatusCode::OK, &body))
    }
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(HandlerRegistry::new(CorsConfig::default())))
}

#[test]
fn test_end_to_end_lookup() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    registry
        .register_route(Route::get("/api/test/{name}").handler(echo("dynamic")))
        .unwrap();
    registry
        .register_route(Route::get("/api/test/wildcard/*").handler(echo("wildcard")))
        .unwrap();

    let found = dispatcher.dispatch(common::request(Method::GET, "/api/test/playo"));
    assert_eq!(found.status, StatusCode::OK);
    let body = common::json(&found);
    assert_eq!(body["handler"], "dynamic");
    assert_eq!(body["params"]["name"], "playo");

    let missing = dispatcher.dispatch(common::request(Method::GET, "/api/test/playo/other"));
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(common::problem_type(&missing), "route-not-found");

    let deep = dispatcher.dispatch(common::request(Method::GET, "/api/test/wildcard/anything/deep"));
    assert_eq!(common::json(&deep)["handler"], "wildcard");
}

#[test]
fn test_static_beats_dynamic_beats_wildcard() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    registry.register_route(Route::get("/users/me").handler(echo("static"))).unwrap();
    registry.register_route(Route::get("/users/{id}").handler(echo("dynamic"))).unwrap();
    registry.register_route(Route::get("/users/*").handler(echo("wildcard"))).unwrap();

    let handler_of = |path: &str| {
        let response = dispatcher.dispatch(common::request(Method::GET, path));
        common::json(&response)["handler"].as_str().unwrap().to_string()
    };

    assert_eq!(handler_of("/users/me"), "static");
    assert_eq!(handler_of("/users/42"), "dynamic");
    assert_eq!(handler_of("/users/42/posts"), "wildcard");
}

#[test]
fn test_wildcard_fallback_drops_deeper_captures() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    registry.register_route(Route::get("/files/*").handler(echo("files"))).unwrap();
    registry
        .register_route(Route::get("/files/{bucket}/meta").handler(echo("meta")))
        .unwrap();

    let response = dispatcher.dispatch(common::request(Method::GET, "/files/docs/other"));
    let body = common::json(&response);
    assert_eq!(body["handler"], "files");
    assert!(body["params"].as_object().unwrap().is_empty());

    let meta = dispatcher.dispatch(common::request(Method::GET, "/files/docs/meta"));
    assert_eq!(common::json(&meta)["params"]["bucket"], "docs");
}

#[test]
fn test_configuration_errors() {
    let registry = HandlerRegistry::new(CorsConfig::default());
    registry.register_route(Route::get("/a/{id}").handler(echo("a"))).unwrap();

    assert!(matches!(
        registry.register_route(Route::get("/a/{id}").handler(echo("again"))),
        Err(RegistrationError::DuplicateHandler { .. })
    ));
    assert!(matches!(
        registry.register_route(Route::get("/a/{name}/x").handler(echo("conflict"))),
        Err(RegistrationError::ConflictingParameter { .. })
    ));
    assert!(matches!(
        registry.register_route(Route::get("/b/*/c").handler(echo("wild"))),
        Err(RegistrationError::WildcardNotLast { .. })
    ));

    // a different method on the same path is fine
    registry.register_route(Route::post("/a/{id}").handler(echo("post"))).unwrap();
}

#[test]
fn test_unregister_prunes_and_keeps_siblings() {
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    let leaf: Arc<dyn HttpHandler> = Arc::new(echo("leaf"));
    registry
        .register_route(Route::get("/tree/branch/leaf").handler_arc(leaf.clone()))
        .unwrap();
    registry
        .register_route(Route::get("/tree/sibling").handler(echo("sibling")))
        .unwrap();

    assert_eq!(registry.unregister(&leaf), 1);

    let paths: Vec<String> = registry.registered_handlers().into_iter().map(|h| h.path).collect();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].contains("sibling"));
    assert_eq!(
        dispatcher.dispatch(common::request(Method::GET, "/tree/branch/leaf")).status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        dispatcher.dispatch(common::request(Method::GET, "/tree/sibling")).status,
        StatusCode::OK
    );
}

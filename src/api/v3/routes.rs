/*
 * Responsibility
 * - URL structure of v3, registered on the handler registry through the Route builder
 * - Which routes need which auth providers / scopes is decided here
 */
use crate::api::v3::handlers::auth::{
    create_ticket, create_token_pair, refresh_token_pair, revoke_token, verify_token,
};
use crate::error::RegistrationError;
use crate::http::context::HttpContext;
use crate::http::handler::HandlerResult;
use crate::routing::route::Route;
use crate::services::auth::basic::BASIC_PROVIDER;
use crate::services::auth::jwt::provider::JWT_PROVIDER;
use crate::state::AppState;

/// Owner tag of every v3 binding; `HandlerRegistry::unregister_owner(OWNER)` removes them.
pub const OWNER: &str = "api.v3";

pub const TICKET_SCOPES: [&str; 2] = ["cluster_rest:ticket_create", "cluster_rest:ticket_write"];

type StateHandler = fn(&AppState, &mut HttpContext) -> HandlerResult;

fn bind(state: &AppState, handler: StateHandler) -> impl Fn(&mut HttpContext) -> HandlerResult + Send + Sync + 'static {
    let state = state.clone();
    move |ctx: &mut HttpContext| handler(&state, ctx)
}

pub fn register(state: &AppState) -> Result<(), RegistrationError> {
    let auth = &state.authenticator;
    let routes = [
        Route::post("/api/v3/auth")
            .owner(OWNER)
            .authenticate(auth.require(&[BASIC_PROVIDER], &[])?)
            .handler(bind(state, create_token_pair)),
        Route::post("/api/v3/auth/ticket")
            .owner(OWNER)
            .authenticate(auth.require(&[JWT_PROVIDER], &TICKET_SCOPES)?)
            .handler(bind(state, create_ticket)),
        Route::post("/api/v3/auth/refresh")
            .owner(OWNER)
            .handler(bind(state, refresh_token_pair)),
        Route::post("/api/v3/auth/verify")
            .owner(OWNER)
            .handler(bind(state, verify_token)),
        Route::post("/api/v3/auth/revoke")
            .owner(OWNER)
            .handler(bind(state, revoke_token)),
    ];

    for route in routes {
        state.registry.register_route(route)?;
    }
    Ok(())
}

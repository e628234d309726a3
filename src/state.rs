/*
 * Responsibility
 * - Shared application context (AppState), built once at startup
 *   - handler registry + dispatcher, user store, auth providers and loader
 * - Clone is cheap (everything behind Arc)
 */
use std::sync::Arc;

use crate::config::RestConfig;
use crate::error::AppError;
use crate::http::dispatcher::Dispatcher;
use crate::routing::registry::HandlerRegistry;
use crate::services::auth::basic::BasicAuthProvider;
use crate::services::auth::interceptor::Authenticator;
use crate::services::auth::jwt::provider::JwtAuthProvider;
use crate::services::auth::keys::KeyMaterial;
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::password::{Argon2Hasher, PasswordHasher};
use crate::services::auth::provider::AuthProviderLoader;
use crate::services::auth::user::UserError;
use crate::services::auth::ticket::TicketAuthProvider;

#[derive(Clone, Debug)]
pub struct AppState {
    pub rest: Arc<RestConfig>,
    pub registry: Arc<HandlerRegistry>,
    pub dispatcher: Dispatcher,
    pub authenticator: Authenticator,
    pub jwt: Arc<JwtAuthProvider>,
    pub ticket: Arc<TicketAuthProvider>,
    pub hasher: Arc<Argon2Hasher>,
}

impl AppState {
    /// Wire providers and the registry. Routes are registered separately (see `api::v3`).
    pub fn new(rest: RestConfig, keys: &KeyMaterial, users: Arc<dyn RestUserManagement>) -> Result<Self, AppError> {
        let hasher = Arc::new(
            Argon2Hasher::new(rest.password_memory_kib, rest.password_iterations).map_err(UserError::from)?,
        );
        let jwt = Arc::new(JwtAuthProvider::new(
            &keys.jwt_private_pem,
            &keys.jwt_public_pem,
            rest.jwt.clone(),
        )?);
        let ticket = Arc::new(TicketAuthProvider::new(&keys.ticket_key, rest.ticket_lifetime)?);

        let loader = AuthProviderLoader::new()
            .with(Arc::new(BasicAuthProvider::new(hasher.clone())))
            .with(jwt.clone())
            .with(ticket.clone());
        tracing::debug!(providers = ?loader.names(), "auth providers loaded");

        let registry = Arc::new(HandlerRegistry::new(rest.default_cors.clone()));
        Ok(Self {
            rest: Arc::new(rest),
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            authenticator: Authenticator::new(Arc::new(loader), users),
            jwt,
            ticket,
            hasher,
        })
    }

    pub fn users(&self) -> &Arc<dyn RestUserManagement> {
        self.authenticator.users()
    }

    pub fn password_hasher(&self) -> &dyn PasswordHasher {
        self.hasher.as_ref()
    }
}

//! Authentication providers and the name -> provider registry.
//!
//! Notes:
//! - Several providers may be registered under one name; the highest `priority` is used.
//!   Equal priorities resolve to the one registered last, so an embedding application can
//!   replace a built-in provider by registering its own.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::RegistrationError;
use crate::http::context::HttpContext;
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::result::{AuthTokenError, AuthTokenGenerationResult, AuthenticationResult};
use crate::services::auth::user::AuthenticatedUser;

pub const DEFAULT_PRIORITY: i32 = 0;

pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Only compared between providers registered under the same name.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn supports_token_generation(&self) -> bool {
        false
    }

    fn try_authenticate(
        &self,
        ctx: &HttpContext,
        users: &dyn RestUserManagement,
        required_scopes: &BTreeSet<String>,
    ) -> AuthenticationResult;

    /// Issue a token for `user`, rendered as the JSON document sent to the client.
    fn generate_auth_token(
        &self,
        _users: &dyn RestUserManagement,
        _user: &AuthenticatedUser,
        _scopes: &BTreeSet<String>,
    ) -> Result<AuthTokenGenerationResult<Value>, AuthTokenError> {
        Err(AuthTokenError::Unsupported(self.name().to_string()))
    }
}

#[derive(Default)]
pub struct AuthProviderLoader {
    providers: HashMap<String, Vec<Arc<dyn AuthProvider>>>,
}

impl fmt::Debug for AuthProviderLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("AuthProviderLoader").field("providers", &names).finish()
    }
}

impl AuthProviderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn AuthProvider>) {
        let name = provider.name().to_ascii_lowercase();
        debug!(provider = %name, priority = provider.priority(), "registering auth provider");

        let candidates = self.providers.entry(name).or_default();
        candidates.push(provider);
        // stable: equal priorities keep registration order
        candidates.sort_by_key(|p| p.priority());
    }

    pub fn with(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AuthProvider>, RegistrationError> {
        self.providers
            .get(&name.to_ascii_lowercase())
            .and_then(|candidates| candidates.last())
            .cloned()
            .ok_or_else(|| RegistrationError::UnknownAuthProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

/*
 * Responsibility
 * - Run a handler's auth providers (in declared order) before the handler
 * - Map the outcome to 400 / 401 / 403 problems or store the user on the context
 * - Missing scopes answer 403 whether the provider or the interceptor notices
 * - Authenticator: builds interceptors from provider names (resolved once, at registration)
 */
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::debug;

use crate::error::RegistrationError;
use crate::http::context::HttpContext;
use crate::http::handler::{HandlerConfig, HttpHandlerInterceptor};
use crate::http::problem::{HandleError, ProblemDetail};
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::provider::{AuthProvider, AuthProviderLoader};
use crate::services::auth::result::AuthenticationResult;

pub fn auth_method_unknown() -> ProblemDetail {
    ProblemDetail::new(StatusCode::BAD_REQUEST, "auth-method-unknown", "Auth Method Unknown")
        .detail("Requested authentication method is unavailable.")
}

pub fn auth_invalid() -> ProblemDetail {
    ProblemDetail::new(StatusCode::UNAUTHORIZED, "auth-invalid", "Auth Invalid")
        .detail("The provided auth information is invalid.")
}

pub fn auth_required_scope_missing() -> ProblemDetail {
    ProblemDetail::new(
        StatusCode::FORBIDDEN,
        "auth-required-scope-missing",
        "Auth Required Scope Missing",
    )
    .detail("The authenticated user misses a required scope to access the resource.")
}

#[derive(Clone)]
pub struct AuthenticationInterceptor {
    providers: Vec<Arc<dyn AuthProvider>>,
    scopes: BTreeSet<String>,
    users: Arc<dyn RestUserManagement>,
}

impl fmt::Debug for AuthenticationInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("AuthenticationInterceptor")
            .field("providers", &names)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl AuthenticationInterceptor {
    pub fn new(
        providers: Vec<Arc<dyn AuthProvider>>,
        scopes: BTreeSet<String>,
        users: Arc<dyn RestUserManagement>,
    ) -> Result<Self, RegistrationError> {
        if providers.is_empty() {
            return Err(RegistrationError::NoAuthProviders);
        }
        Ok(Self {
            providers,
            scopes,
            users,
        })
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn authenticate(&self, ctx: &mut HttpContext) -> Result<(), ProblemDetail> {
        for provider in &self.providers {
            match provider.try_authenticate(ctx, self.users.as_ref(), &self.scopes) {
                AuthenticationResult::Proceed => continue,
                AuthenticationResult::Success { user, token_id } => {
                    if !user.has_one_scope_of(&self.scopes) {
                        debug!(user_id = %user.id(), provider = provider.name(), "required scope missing");
                        return Err(auth_required_scope_missing());
                    }
                    ctx.authenticate(user, token_id);
                    return Ok(());
                }
                AuthenticationResult::MissingRequiredScopes => {
                    debug!(provider = provider.name(), "credentials lack a required scope");
                    return Err(auth_required_scope_missing());
                }
                other => {
                    debug!(provider = provider.name(), result = ?other, "authentication failed");
                    return Err(auth_invalid());
                }
            }
        }

        Err(auth_method_unknown())
    }
}

impl HttpHandlerInterceptor for AuthenticationInterceptor {
    fn pre_process(&self, ctx: &mut HttpContext, _config: &HandlerConfig) -> Result<bool, HandleError> {
        self.authenticate(ctx).map_err(HandleError::from)?;
        Ok(true)
    }
}

/// Resolves provider names once and hands out interceptors for routes.
#[derive(Clone)]
pub struct Authenticator {
    loader: Arc<AuthProviderLoader>,
    users: Arc<dyn RestUserManagement>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(loader: Arc<AuthProviderLoader>, users: Arc<dyn RestUserManagement>) -> Self {
        Self { loader, users }
    }

    pub fn users(&self) -> &Arc<dyn RestUserManagement> {
        &self.users
    }

    pub fn loader(&self) -> &AuthProviderLoader {
        &self.loader
    }

    /// Providers are tried in the given order; a user needs one of `scopes` (none = any user).
    pub fn require(&self, providers: &[&str], scopes: &[&str]) -> Result<AuthenticationInterceptor, RegistrationError> {
        let providers = providers
            .iter()
            .map(|name| self.loader.resolve(name))
            .collect::<Result<Vec<_>, _>>()?;
        let scopes = scopes.iter().map(|s| s.to_ascii_lowercase()).collect();

        AuthenticationInterceptor::new(providers, scopes, self.users.clone())
    }
}

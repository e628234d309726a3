use std::collections::BTreeSet;

use thiserror::Error;

use crate::services::auth::user::{AuthenticatedUser, RestUser};

/// Outcome of one provider looking at a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationResult {
    /// The provider found no credentials it understands; the next provider may try.
    Proceed,
    Success {
        user: AuthenticatedUser,
        token_id: Option<String>,
    },
    UserNotFound,
    InvalidCredentials,
    /// A valid token of the wrong kind (a refresh token where an access token is required).
    InvalidTokenType {
        user: RestUser,
        token_id: String,
        actual_type: String,
        scopes: BTreeSet<String>,
    },
    MissingRequiredScopes,
}

impl AuthenticationResult {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTokenGenerationResult<T> {
    Success(T),
    RequestedInvalidScopes,
}

impl<T> AuthTokenGenerationResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AuthTokenGenerationResult<U> {
        match self {
            Self::Success(token) => AuthTokenGenerationResult::Success(f(token)),
            Self::RequestedInvalidScopes => AuthTokenGenerationResult::RequestedInvalidScopes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthTokenError {
    #[error("auth provider '{0}' does not issue tokens")]
    Unsupported(String),

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("failed to render token: {0}")]
    Serialization(String),

    #[error("user {0} vanished while issuing a token")]
    UserGone(uuid::Uuid),
}

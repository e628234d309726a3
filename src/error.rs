/*
 * Responsibility
 * - AppError: start-up failures surfaced from app::run (config, key material, IO, route setup, password hashing, admin user)
 * - RegistrationError: configuration-time route errors, returned to whoever registers a handler
 * - Request-time failures never use these; see http::problem::HandleError
 */
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::user::UserError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("user setup failed: {0}")]
    User(#[from] UserError),

    #[error("invalid key material: {0}")]
    KeyMaterial(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("segment {index} of path '{path}' is blank")]
    BlankSegment { path: String, index: usize },

    #[error("dynamic segment {index} of path '{path}' has a blank parameter name")]
    BlankParameter { path: String, index: usize },

    #[error("wildcard must be the last segment of path '{path}'")]
    WildcardNotLast { path: String },

    #[error("parameter '{name}' is declared more than once in path '{path}'")]
    DuplicateParameter { path: String, name: String },

    #[error("parameter '{name}' of path '{path}' conflicts with parameter '{existing}' at the same level")]
    ConflictingParameter {
        path: String,
        name: String,
        existing: String,
    },

    #[error("a {method} handler is already registered for path '{path}'")]
    DuplicateHandler { path: String, method: String },

    #[error("unknown auth provider '{0}'")]
    UnknownAuthProvider(String),

    #[error("authentication requires at least one provider")]
    NoAuthProviders,
}

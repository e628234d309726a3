/*
 * Responsibility
 * - `Authorization: Basic <base64(username:password)>` against the user store
 * - Password check is delegated to a PasswordHasher
 */
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use axum::http::header;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use regex::Regex;
use tracing::debug;

use crate::http::context::HttpContext;
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::password::PasswordHasher;
use crate::services::auth::provider::{AuthProvider, DEFAULT_PRIORITY};
use crate::services::auth::result::AuthenticationResult;
use crate::services::auth::user::AuthenticatedUser;

pub const BASIC_PROVIDER: &str = "basic";

static BASIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Basic ([a-zA-Z0-9\-_=+/]+)$").expect("basic pattern compiles"));

pub struct BasicAuthProvider {
    hasher: Arc<dyn PasswordHasher>,
}

impl fmt::Debug for BasicAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthProvider").finish_non_exhaustive()
    }
}

impl BasicAuthProvider {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }
}

impl AuthProvider for BasicAuthProvider {
    fn name(&self) -> &str {
        BASIC_PROVIDER
    }

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY + 10
    }

    fn try_authenticate(
        &self,
        ctx: &HttpContext,
        users: &dyn RestUserManagement,
        _required_scopes: &BTreeSet<String>,
    ) -> AuthenticationResult {
        let Some(value) = ctx.request.header_str(&header::AUTHORIZATION) else {
            return AuthenticationResult::Proceed;
        };
        let Some(encoded) = BASIC_PATTERN.captures(value).and_then(|c| c.get(1)) else {
            return AuthenticationResult::Proceed;
        };

        // clients differ on the alphabet; accept both
        let Ok(mut decoded) = STANDARD
            .decode(encoded.as_str())
            .or_else(|_| URL_SAFE.decode(encoded.as_str()))
        else {
            return AuthenticationResult::InvalidCredentials;
        };

        let result = match decoded.iter().position(|b| *b == b':') {
            None => AuthenticationResult::InvalidCredentials,
            Some(delimiter) => {
                let (username, password) = decoded.split_at(delimiter);
                match std::str::from_utf8(username) {
                    Err(_) => AuthenticationResult::InvalidCredentials,
                    Ok(username) => match users.find_user_by_name(username) {
                        None => {
                            debug!(username, "basic auth for unknown user");
                            AuthenticationResult::UserNotFound
                        }
                        Some(user) if user.verify_password(&password[1..], self.hasher.as_ref()) => {
                            AuthenticationResult::Success {
                                user: AuthenticatedUser::Full(user),
                                token_id: None,
                            }
                        }
                        Some(user) => {
                            debug!(user_id = %user.id(), "basic auth password mismatch");
                            AuthenticationResult::InvalidCredentials
                        }
                    },
                }
            }
        };

        decoded.fill(0);
        result
    }
}

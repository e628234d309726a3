/*
 * Responsibility
 * - Authenticate `Authorization: Bearer <jwt>` (EdDSA / Ed25519, issuer checked)
 * - Issue access + refresh token pairs and record their ids on the user
 * - Refresh / inspect / revoke helpers for the token endpoints
 *
 * A token is only accepted while its id is listed in the user's `jwt_token_pair` property,
 * so removing the id revokes both tokens of the pair before they expire.
 */
use std::collections::BTreeSet;
use std::fmt;

use axum::http::header;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::http::context::HttpContext;
use crate::services::auth::jwt::store::{
    JWT_TOKEN_PAIR_PROPERTY, StoredToken, compact_stored_tokens, parse_stored_tokens,
};
use crate::services::auth::jwt::token::{JwtClaims, JwtTokenHolder, JwtTokenPair, JwtTokenType};
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::provider::AuthProvider;
use crate::services::auth::result::{AuthTokenError, AuthTokenGenerationResult, AuthenticationResult};
use crate::services::auth::user::{AuthenticatedUser, RestUser, ScopedRestUser};

pub const JWT_PROVIDER: &str = "jwt";
pub const DEFAULT_ISSUER: &str = "Cluster Rest";

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub issuer: String,
    pub access_lifetime: TimeDelta,
    pub refresh_lifetime: TimeDelta,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_lifetime: TimeDelta::hours(12),
            refresh_lifetime: TimeDelta::days(3),
        }
    }
}

/// A verified token presented by the client, whatever its type.
#[derive(Debug, Clone)]
pub struct PresentedToken {
    pub user: RestUser,
    pub token_id: String,
    pub token_type: JwtTokenType,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Issued(JwtTokenPair),
    /// The refresh token carries scopes the user no longer holds.
    InvalidScopes,
    AccessTokenUsed,
    InvalidToken,
}

#[derive(Clone)]
pub struct JwtAuthProvider {
    settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtAuthProvider")
            .field("settings", &self.settings)
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtAuthProvider {
    /// Keys are Ed25519 in PEM form: PKCS#8 private key, SPKI public key.
    pub fn new(private_key_pem: &str, public_key_pem: &str, settings: JwtSettings) -> Result<Self, AppError> {
        let encoding_key = EncodingKey::from_ed_pem(private_key_pem.as_bytes()).map_err(|e| {
            warn!(error = %e, "failed to parse jwt private key PEM (expected Ed25519 PKCS#8 PEM)");
            AppError::KeyMaterial(format!("jwt private key: {}", e))
        })?;
        let decoding_key = DecodingKey::from_ed_pem(public_key_pem.as_bytes()).map_err(|e| {
            warn!(error = %e, "failed to parse jwt public key PEM");
            AppError::KeyMaterial(format!("jwt public key: {}", e))
        })?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[&settings.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            settings,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    fn sign(&self, claims: &JwtClaims) -> Result<String, AuthTokenError> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            AuthTokenError::Signing(e.to_string())
        })
    }

    fn issue(
        &self,
        user_id: Uuid,
        token_id: &str,
        token_type: JwtTokenType,
        now: DateTime<Utc>,
        scopes: &BTreeSet<String>,
    ) -> Result<JwtTokenHolder, AuthTokenError> {
        let lifetime = match token_type {
            JwtTokenType::Access => self.settings.access_lifetime,
            JwtTokenType::Refresh => self.settings.refresh_lifetime,
        };
        let expires_at = now + lifetime;

        let claims = JwtClaims {
            iss: self.settings.issuer.clone(),
            sub: user_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type: token_type.as_str().to_string(),
            scopes: scopes.clone(),
        };

        Ok(JwtTokenHolder {
            token: self.sign(&claims)?,
            token_id: token_id.to_string(),
            expires_at,
            token_type,
        })
    }

    /// Issue a new pair for `user`, dropping expired ids and (optionally) the pair being replaced.
    pub fn issue_token_pair(
        &self,
        users: &dyn RestUserManagement,
        user: &AuthenticatedUser,
        scopes: &BTreeSet<String>,
        replacing: Option<&str>,
    ) -> Result<AuthTokenGenerationResult<JwtTokenPair>, AuthTokenError> {
        if !scopes.iter().all(|s| user.has_scope(s)) {
            return Ok(AuthTokenGenerationResult::RequestedInvalidScopes);
        }

        let user_id = user.id();
        let now = Utc::now();
        let token_id = Uuid::new_v4().to_string();
        let access = self.issue(user_id, &token_id, JwtTokenType::Access, now, scopes)?;
        let refresh = self.issue(user_id, &token_id, JwtTokenType::Refresh, now, scopes)?;

        let stored = users.update_user(user_id, &mut |stored| {
            let mut tokens = parse_stored_tokens(stored.property(JWT_TOKEN_PAIR_PROPERTY));
            tokens.retain(|t| !t.is_expired(now) && Some(t.token_id.as_str()) != replacing);
            for holder in [&access, &refresh] {
                tokens.push(StoredToken {
                    token_id: holder.token_id.clone(),
                    token_type: holder.token_type,
                    expires_at: holder.expires_at,
                });
            }
            stored.set_property(JWT_TOKEN_PAIR_PROPERTY, compact_stored_tokens(&tokens));
        });
        if stored.is_none() {
            return Err(AuthTokenError::UserGone(user_id));
        }

        debug!(user_id = %user_id, token_id = %token_id, "issued jwt token pair");
        Ok(AuthTokenGenerationResult::Success(JwtTokenPair {
            creation_time: now,
            access,
            refresh,
        }))
    }

    /// Verified token regardless of its type; `None` for anything that does not authenticate.
    pub fn inspect(&self, ctx: &HttpContext, users: &dyn RestUserManagement) -> Option<PresentedToken> {
        match self.try_authenticate(ctx, users, &BTreeSet::new()) {
            AuthenticationResult::Success {
                user,
                token_id: Some(token_id),
            } => Some(PresentedToken {
                user: user.user().clone(),
                token_id,
                token_type: JwtTokenType::Access,
            }),
            AuthenticationResult::InvalidTokenType { user, token_id, .. } => Some(PresentedToken {
                user,
                token_id,
                token_type: JwtTokenType::Refresh,
            }),
            _ => None,
        }
    }

    /// Exchange a refresh token for a new pair; the used pair is revoked.
    pub fn refresh(
        &self,
        ctx: &HttpContext,
        users: &dyn RestUserManagement,
    ) -> Result<RefreshOutcome, AuthTokenError> {
        match self.try_authenticate(ctx, users, &BTreeSet::new()) {
            AuthenticationResult::Success { .. } => Ok(RefreshOutcome::AccessTokenUsed),
            AuthenticationResult::InvalidTokenType {
                user,
                token_id,
                scopes,
                ..
            } => {
                let user = AuthenticatedUser::Full(user);
                match self.issue_token_pair(users, &user, &scopes, Some(&token_id))? {
                    AuthTokenGenerationResult::Success(pair) => Ok(RefreshOutcome::Issued(pair)),
                    AuthTokenGenerationResult::RequestedInvalidScopes => {
                        // the pair cannot be renewed, so it is of no further use
                        self.revoke(users, user.id(), &token_id);
                        Ok(RefreshOutcome::InvalidScopes)
                    }
                }
            }
            _ => Ok(RefreshOutcome::InvalidToken),
        }
    }

    /// Remove a pair id from the user. Returns whether the id was known.
    pub fn revoke(&self, users: &dyn RestUserManagement, user_id: Uuid, token_id: &str) -> bool {
        let mut removed = false;
        users.update_user(user_id, &mut |stored| {
            let mut tokens = parse_stored_tokens(stored.property(JWT_TOKEN_PAIR_PROPERTY));
            let before = tokens.len();
            tokens.retain(|t| t.token_id != token_id);
            removed = tokens.len() != before;
            stored.set_property(JWT_TOKEN_PAIR_PROPERTY, compact_stored_tokens(&tokens));
        });

        debug!(user_id = %user_id, token_id, removed, "revoked jwt token pair");
        removed
    }

    pub fn token_expiry(user: &RestUser, token_id: &str, token_type: JwtTokenType) -> Option<DateTime<Utc>> {
        parse_stored_tokens(user.property(JWT_TOKEN_PAIR_PROPERTY))
            .into_iter()
            .find(|t| t.token_id == token_id && t.token_type == token_type)
            .map(|t| t.expires_at)
    }
}

fn bearer_token(ctx: &HttpContext) -> Option<&str> {
    ctx.request
        .header_str(&header::AUTHORIZATION)?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl AuthProvider for JwtAuthProvider {
    fn name(&self) -> &str {
        JWT_PROVIDER
    }

    fn supports_token_generation(&self) -> bool {
        true
    }

    fn try_authenticate(
        &self,
        ctx: &HttpContext,
        users: &dyn RestUserManagement,
        _required_scopes: &BTreeSet<String>,
    ) -> AuthenticationResult {
        let Some(token) = bearer_token(ctx) else {
            return AuthenticationResult::Proceed;
        };

        let claims = match jsonwebtoken::decode::<JwtClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "rejected jwt");
                return AuthenticationResult::InvalidCredentials;
            }
        };

        let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
            return AuthenticationResult::InvalidCredentials;
        };
        let Some(user) = users.find_user(user_id) else {
            return AuthenticationResult::UserNotFound;
        };

        let now = Utc::now();
        let known = parse_stored_tokens(user.property(JWT_TOKEN_PAIR_PROPERTY))
            .iter()
            .any(|t| t.token_id == claims.jti && !t.is_expired(now));
        if !known {
            debug!(user_id = %user_id, token_id = %claims.jti, "jwt was revoked or never issued");
            return AuthenticationResult::InvalidCredentials;
        }

        match claims.token_type.parse::<JwtTokenType>() {
            Ok(JwtTokenType::Access) => {
                let user = if claims.scopes.is_empty() {
                    AuthenticatedUser::Full(user)
                } else {
                    AuthenticatedUser::Scoped(ScopedRestUser::new(user, claims.scopes))
                };
                AuthenticationResult::Success {
                    user,
                    token_id: Some(claims.jti),
                }
            }
            _ => AuthenticationResult::InvalidTokenType {
                user,
                token_id: claims.jti,
                actual_type: claims.token_type,
                scopes: claims.scopes,
            },
        }
    }

    fn generate_auth_token(
        &self,
        users: &dyn RestUserManagement,
        user: &AuthenticatedUser,
        scopes: &BTreeSet<String>,
    ) -> Result<AuthTokenGenerationResult<Value>, AuthTokenError> {
        match self.issue_token_pair(users, user, scopes, None)? {
            AuthTokenGenerationResult::Success(pair) => serde_json::to_value(pair.to_body())
                .map(AuthTokenGenerationResult::Success)
                .map_err(|e| AuthTokenError::Serialization(e.to_string())),
            AuthTokenGenerationResult::RequestedInvalidScopes => {
                Ok(AuthTokenGenerationResult::RequestedInvalidScopes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Method};

    use super::*;
    use crate::http::context::{ConnectionInfo, HttpRequest};
    use crate::services::auth::keys::KeyMaterial;
    use crate::services::auth::management::InMemoryUserManagement;
    use crate::services::auth::user::{PASSWORD_PROPERTY, SALT_PROPERTY};

    fn provider() -> JwtAuthProvider {
        let keys = KeyMaterial::generate().unwrap();
        JwtAuthProvider::new(&keys.jwt_private_pem, &keys.jwt_public_pem, JwtSettings::default()).unwrap()
    }

    fn store_user(users: &InMemoryUserManagement, scopes: &[&str]) -> RestUser {
        let user = RestUser::builder("alice")
            .scopes(scopes.iter().copied())
            .property(PASSWORD_PROPERTY, "00")
            .property(SALT_PROPERTY, "00")
            .build()
            .unwrap();
        users.save_user(user.clone()).unwrap();
        user
    }

    fn bearer(token: &str) -> HttpContext {
        let request = HttpRequest::new(Method::GET, "/").with_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        HttpContext::new(request, ConnectionInfo::new("http", "localhost", 80))
    }

    fn set(scopes: &[&str]) -> BTreeSet<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    fn issue(provider: &JwtAuthProvider, users: &InMemoryUserManagement, user: &RestUser, scopes: &[&str]) -> JwtTokenPair {
        match provider
            .issue_token_pair(users, &AuthenticatedUser::Full(user.clone()), &set(scopes), None)
            .unwrap()
        {
            AuthTokenGenerationResult::Success(pair) => pair,
            AuthTokenGenerationResult::RequestedInvalidScopes => panic!("scopes rejected"),
        }
    }

    #[test]
    fn test_access_token_authenticates() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &["cluster_rest:read"]);
        let pair = issue(&provider, &users, &user, &[]);

        assert_eq!(pair.access.token_id, pair.refresh.token_id);
        match provider.try_authenticate(&bearer(&pair.access.token), &users, &BTreeSet::new()) {
            AuthenticationResult::Success { user: authenticated, token_id } => {
                assert_eq!(authenticated, AuthenticatedUser::Full(users.find_user(user.id()).unwrap()));
                assert_eq!(token_id, Some(pair.access.token_id.clone()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_refresh_token_is_reported_as_wrong_type() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &["cluster_rest:read"]);
        let pair = issue(&provider, &users, &user, &["cluster_rest:read"]);

        match provider.try_authenticate(&bearer(&pair.refresh.token), &users, &BTreeSet::new()) {
            AuthenticationResult::InvalidTokenType {
                actual_type, scopes, ..
            } => {
                assert_eq!(actual_type, "refresh");
                assert_eq!(scopes, set(&["cluster_rest:read"]));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_scoped_access_token_restricts_user() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &["cluster_rest:read", "cluster_rest:write"]);
        let pair = issue(&provider, &users, &user, &["cluster_rest:read"]);

        let AuthenticationResult::Success { user, .. } =
            provider.try_authenticate(&bearer(&pair.access.token), &users, &BTreeSet::new())
        else {
            panic!("expected success");
        };
        assert!(user.has_scope("cluster_rest:read"));
        assert!(!user.has_scope("cluster_rest:write"));
    }

    #[test]
    fn test_requested_scopes_must_be_held() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &["cluster_rest:read"]);

        let result = provider
            .issue_token_pair(&users, &AuthenticatedUser::Full(user), &set(&["cluster_rest:write"]), None)
            .unwrap();
        assert_eq!(result, AuthTokenGenerationResult::RequestedInvalidScopes);
    }

    #[test]
    fn test_revoked_token_is_rejected() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &[]);
        let first = issue(&provider, &users, &user, &[]);
        let second = issue(&provider, &users, &user, &[]);

        assert!(provider.revoke(&users, user.id(), &first.access.token_id));
        assert!(!provider.revoke(&users, user.id(), &first.access.token_id));

        assert_eq!(
            provider.try_authenticate(&bearer(&first.access.token), &users, &BTreeSet::new()),
            AuthenticationResult::InvalidCredentials
        );
        assert!(matches!(
            provider.try_authenticate(&bearer(&second.access.token), &users, &BTreeSet::new()),
            AuthenticationResult::Success { .. }
        ));

        // revoking the last pair removes the property entirely
        provider.revoke(&users, user.id(), &second.access.token_id);
        assert!(users.find_user(user.id()).unwrap().property(JWT_TOKEN_PAIR_PROPERTY).is_none());
    }

    #[test]
    fn test_refresh_replaces_pair() {
        let provider = provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &[]);
        let pair = issue(&provider, &users, &user, &[]);

        assert!(matches!(
            provider.refresh(&bearer(&pair.access.token), &users).unwrap(),
            RefreshOutcome::AccessTokenUsed
        ));

        let RefreshOutcome::Issued(renewed) = provider.refresh(&bearer(&pair.refresh.token), &users).unwrap() else {
            panic!("expected a new pair");
        };
        assert_ne!(renewed.access.token_id, pair.access.token_id);
        assert!(matches!(
            provider.refresh(&bearer(&pair.refresh.token), &users).unwrap(),
            RefreshOutcome::InvalidToken
        ));

        let stored = users.find_user(user.id()).unwrap();
        assert!(JwtAuthProvider::token_expiry(&stored, &renewed.refresh.token_id, JwtTokenType::Refresh).is_some());
        assert!(JwtAuthProvider::token_expiry(&stored, &pair.refresh.token_id, JwtTokenType::Refresh).is_none());
    }

    #[test]
    fn test_foreign_tokens() {
        let provider = provider();
        let other = self::provider();
        let users = InMemoryUserManagement::new();
        let user = store_user(&users, &[]);
        let pair = issue(&other, &users, &user, &[]);

        assert_eq!(
            provider.try_authenticate(&bearer(&pair.access.token), &users, &BTreeSet::new()),
            AuthenticationResult::InvalidCredentials
        );
        assert_eq!(
            provider.try_authenticate(&bearer("not-a-jwt"), &users, &BTreeSet::new()),
            AuthenticationResult::InvalidCredentials
        );

        users.delete_user(user.id());
        assert_eq!(
            other.try_authenticate(&bearer(&pair.access.token), &users, &BTreeSet::new()),
            AuthenticationResult::UserNotFound
        );
    }
}

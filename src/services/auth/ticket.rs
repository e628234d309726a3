//! Short-lived, stateless tickets passed as the `ticket` query parameter.
//!
//! Responsibility:
//! - Issue signed tickets for an authenticated user, restricted to requested scopes
//! - Authenticate requests carrying a ticket
//!
//! Notes:
//! - Format: `base64url(epochSecs:userId[:scope;scope]) + "." + hex(HMAC-SHA256(base64 part))`.
//! - Nothing is stored server side; a ticket is valid until it expires.
//! - Signatures are compared in constant time.

use std::collections::BTreeSet;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::http::context::HttpContext;
use crate::services::auth::management::RestUserManagement;
use crate::services::auth::provider::{AuthProvider, DEFAULT_PRIORITY};
use crate::services::auth::result::{AuthTokenError, AuthTokenGenerationResult, AuthenticationResult};
use crate::services::auth::user::{AuthenticatedUser, ScopedRestUser};

type HmacSha256 = Hmac<Sha256>;

pub const TICKET_PROVIDER: &str = "ticket";
pub const TICKET_QUERY_PARAMETER: &str = "ticket";

const PROPERTY_DELIMITER: char = ':';
const SCOPE_DELIMITER: char = ';';

pub fn default_ticket_lifetime() -> TimeDelta {
    TimeDelta::seconds(15)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketAuthToken {
    pub user_id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub token: String,
    pub scopes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketBody {
    pub creation_time: i64,
    pub secret: String,
    pub scopes: BTreeSet<String>,
}

impl TicketAuthToken {
    pub fn to_body(&self) -> TicketBody {
        TicketBody {
            creation_time: self.creation_time.timestamp_millis(),
            secret: self.token.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

pub struct TicketAuthProvider {
    mac: HmacSha256,
    lifetime: TimeDelta,
}

impl fmt::Debug for TicketAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketAuthProvider")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TicketAuthProvider {
    pub fn new(key: &[u8], lifetime: TimeDelta) -> Result<Self, AppError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| AppError::KeyMaterial(format!("ticket key: {}", e)))?;
        Ok(Self { mac, lifetime })
    }

    pub fn lifetime(&self) -> TimeDelta {
        self.lifetime
    }

    /// Compared in whole seconds, the precision the creation time is stored with.
    fn is_expired(&self, creation_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.timestamp() > creation_time.timestamp() + self.lifetime.num_seconds()
    }

    fn keyed_mac(&self, data: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(data.as_bytes());
        mac
    }

    fn sign(&self, data: &str) -> String {
        let encoded = URL_SAFE.encode(data.as_bytes());
        let signature = hex::encode(self.keyed_mac(&encoded).finalize().into_bytes());
        format!("{}.{}", encoded, signature)
    }

    /// The signed payload, if the signature is intact.
    fn verify(&self, ticket: &str) -> Option<String> {
        let (encoded, signature) = ticket.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.keyed_mac(encoded).verify_slice(&signature).ok()?;

        let payload = URL_SAFE.decode(encoded).ok()?;
        String::from_utf8(payload).ok()
    }

    pub fn issue_ticket(
        &self,
        user: &AuthenticatedUser,
        scopes: &BTreeSet<String>,
    ) -> AuthTokenGenerationResult<TicketAuthToken> {
        if !scopes.iter().all(|s| user.has_scope(s)) {
            return AuthTokenGenerationResult::RequestedInvalidScopes;
        }

        let creation_time = Utc::now();
        let mut payload = format!("{}{}{}", creation_time.timestamp(), PROPERTY_DELIMITER, user.id());
        if !scopes.is_empty() {
            let joined: Vec<&str> = scopes.iter().map(String::as_str).collect();
            payload.push(PROPERTY_DELIMITER);
            payload.push_str(&joined.join(&SCOPE_DELIMITER.to_string()));
        }

        debug!(user_id = %user.id(), scopes = ?scopes, "issued ticket");
        AuthTokenGenerationResult::Success(TicketAuthToken {
            user_id: user.id(),
            creation_time,
            token: self.sign(&payload),
            scopes: scopes.clone(),
        })
    }
}

struct TicketPayload {
    creation_time: DateTime<Utc>,
    user_id: Uuid,
    scopes: BTreeSet<String>,
}

fn parse_payload(payload: &str) -> Option<TicketPayload> {
    let mut parts = payload.splitn(3, PROPERTY_DELIMITER);
    let creation_secs: i64 = parts.next()?.parse().ok()?;
    let user_id = Uuid::parse_str(parts.next()?).ok()?;
    let scopes = parts
        .next()
        .map(|s| {
            s.split(SCOPE_DELIMITER)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(TicketPayload {
        creation_time: DateTime::from_timestamp(creation_secs, 0)?,
        user_id,
        scopes,
    })
}

impl AuthProvider for TicketAuthProvider {
    fn name(&self) -> &str {
        TICKET_PROVIDER
    }

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn supports_token_generation(&self) -> bool {
        true
    }

    fn try_authenticate(
        &self,
        ctx: &HttpContext,
        users: &dyn RestUserManagement,
        required_scopes: &BTreeSet<String>,
    ) -> AuthenticationResult {
        let Some(ticket) = ctx.request.query_param(TICKET_QUERY_PARAMETER) else {
            return AuthenticationResult::Proceed;
        };

        let Some(payload) = self.verify(ticket) else {
            debug!("ticket signature mismatch");
            return AuthenticationResult::InvalidCredentials;
        };
        let Some(payload) = parse_payload(&payload) else {
            return AuthenticationResult::InvalidCredentials;
        };

        let Some(user) = users.find_user(payload.user_id) else {
            return AuthenticationResult::UserNotFound;
        };

        if self.is_expired(payload.creation_time, Utc::now()) {
            debug!(user_id = %payload.user_id, "ticket expired");
            return AuthenticationResult::InvalidCredentials;
        }

        let scoped = ScopedRestUser::new(user, payload.scopes);
        if !scoped.has_one_scope_of(required_scopes) {
            return AuthenticationResult::MissingRequiredScopes;
        }

        AuthenticationResult::Success {
            user: AuthenticatedUser::Scoped(scoped),
            token_id: None,
        }
    }

    fn generate_auth_token(
        &self,
        _users: &dyn RestUserManagement,
        user: &AuthenticatedUser,
        scopes: &BTreeSet<String>,
    ) -> Result<AuthTokenGenerationResult<Value>, AuthTokenError> {
        match self.issue_ticket(user, scopes) {
            AuthTokenGenerationResult::Success(ticket) => serde_json::to_value(ticket.to_body())
                .map(AuthTokenGenerationResult::Success)
                .map_err(|e| AuthTokenError::Serialization(e.to_string())),
            AuthTokenGenerationResult::RequestedInvalidScopes => {
                Ok(AuthTokenGenerationResult::RequestedInvalidScopes)
            }
        }
    }
}

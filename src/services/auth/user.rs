//! REST users and the scope model.
//!
//! Responsibility:
//! - `RestUser`: identity, scopes and free-form properties (password hash, stored token ids, ...)
//! - `ScopedRestUser`: a user restricted to a subset of its scopes (tickets, scoped JWTs)
//! - `AuthenticatedUser`: what an authentication provider hands to the handler
//!
//! Notes:
//! - A user holding `global:admin` has every scope.
//! - Scopes are stored lowercase; lookups lowercase the requested scope.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::services::auth::password::{PasswordError, PasswordHasher};

pub const GLOBAL_ADMIN_SCOPE: &str = "global:admin";
pub const PASSWORD_PROPERTY: &str = "password";
pub const SALT_PROPERTY: &str = "salt";

static SCOPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]{4,39}:[a-z0-9.\-_]+$").expect("scope pattern compiles")
});

pub fn is_valid_scope(scope: &str) -> bool {
    SCOPE_PATTERN.is_match(scope)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("scope '{0}' does not follow the scope naming rules")]
    InvalidScope(String),

    #[error("username must not be blank")]
    BlankUsername,

    #[error("user '{0}' has no password")]
    MissingPassword(String),

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordError),
}

#[derive(Clone, PartialEq, Eq)]
pub struct RestUser {
    id: Uuid,
    username: String,
    scopes: BTreeSet<String>,
    properties: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    created_by: String,
    modified_at: DateTime<Utc>,
    modified_by: String,
}

// Properties hold password hashes and token ids; keep them out of logs.
impl fmt::Debug for RestUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("scopes", &self.scopes)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RestUser {
    pub fn builder(username: &str) -> RestUserBuilder {
        RestUserBuilder {
            id: None,
            username: username.trim().to_string(),
            scopes: BTreeSet::new(),
            properties: BTreeMap::new(),
            created: None,
            actor: "system".to_string(),
        }
    }

    /// Start a modification of this user, keeping id and creation audit data.
    pub fn to_builder(&self) -> RestUserBuilder {
        RestUserBuilder {
            id: Some(self.id),
            username: self.username.clone(),
            scopes: self.scopes.clone(),
            properties: self.properties.clone(),
            created: Some((self.created_at, self.created_by.clone())),
            actor: self.modified_by.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// `None` removes the property.
    pub fn set_property(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.properties.insert(key.to_string(), value);
            }
            None => {
                self.properties.remove(key);
            }
        }
    }

    pub fn touch(&mut self, modified_by: &str) {
        self.modified_at = Utc::now();
        self.modified_by = modified_by.to_string();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn modified_by(&self) -> &str {
        &self.modified_by
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(GLOBAL_ADMIN_SCOPE) || self.scopes.contains(&scope.to_ascii_lowercase())
    }

    /// An empty set is always satisfied.
    pub fn has_one_scope_of(&self, scopes: &BTreeSet<String>) -> bool {
        scopes.is_empty() || scopes.iter().any(|s| self.has_scope(s))
    }

    pub fn verify_password(&self, password: &[u8], hasher: &dyn PasswordHasher) -> bool {
        match (self.property(PASSWORD_PROPERTY), self.property(SALT_PROPERTY)) {
            (Some(hash), Some(salt)) => hasher.verify(password, hash, salt),
            _ => false,
        }
    }
}

pub struct RestUserBuilder {
    id: Option<Uuid>,
    username: String,
    scopes: BTreeSet<String>,
    properties: BTreeMap<String, String>,
    created: Option<(DateTime<Utc>, String)>,
    actor: String,
}

impl RestUserBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scopes.insert(scope.to_string());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn remove_scope(mut self, scope: &str) -> Self {
        self.scopes.remove(scope);
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn password(mut self, password: &str, hasher: &dyn PasswordHasher) -> Result<Self, UserError> {
        let hashed = hasher.hash(password.as_bytes())?;
        self.properties.insert(PASSWORD_PROPERTY.to_string(), hashed.hash);
        self.properties.insert(SALT_PROPERTY.to_string(), hashed.salt);
        Ok(self)
    }

    /// Who creates (or modifies) the user.
    pub fn actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn build(self) -> Result<RestUser, UserError> {
        if self.username.is_empty() {
            return Err(UserError::BlankUsername);
        }
        if let Some(invalid) = self.scopes.iter().find(|s| !is_valid_scope(s)) {
            return Err(UserError::InvalidScope(invalid.clone()));
        }
        if !self.properties.contains_key(PASSWORD_PROPERTY) || !self.properties.contains_key(SALT_PROPERTY) {
            return Err(UserError::MissingPassword(self.username));
        }

        let now = Utc::now();
        let (created_at, created_by) = self.created.unwrap_or_else(|| (now, self.actor.clone()));
        Ok(RestUser {
            id: self.id.unwrap_or_else(Uuid::now_v7),
            username: self.username,
            scopes: self.scopes,
            properties: self.properties,
            created_at,
            created_by,
            modified_at: now,
            modified_by: self.actor,
        })
    }
}

/// A user limited to `scopes`. An empty subset means no restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedRestUser {
    delegate: RestUser,
    scopes: BTreeSet<String>,
}

impl ScopedRestUser {
    pub fn new(delegate: RestUser, scopes: BTreeSet<String>) -> Self {
        Self { delegate, scopes }
    }

    pub fn delegate(&self) -> &RestUser {
        &self.delegate
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        (self.scopes.is_empty() || self.scopes.contains(&scope.to_ascii_lowercase()))
            && self.delegate.has_scope(scope)
    }

    pub fn has_one_scope_of(&self, scopes: &BTreeSet<String>) -> bool {
        scopes.is_empty() || scopes.iter().any(|s| self.has_scope(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatedUser {
    Full(RestUser),
    Scoped(ScopedRestUser),
}

impl AuthenticatedUser {
    /// The underlying stored user.
    pub fn user(&self) -> &RestUser {
        match self {
            Self::Full(user) => user,
            Self::Scoped(scoped) => scoped.delegate(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.user().id()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        match self {
            Self::Full(user) => user.has_scope(scope),
            Self::Scoped(scoped) => scoped.has_scope(scope),
        }
    }

    pub fn has_one_scope_of(&self, scopes: &BTreeSet<String>) -> bool {
        match self {
            Self::Full(user) => user.has_one_scope_of(scopes),
            Self::Scoped(scoped) => scoped.has_one_scope_of(scopes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::password::Argon2Hasher;

    fn user(scopes: &[&str]) -> RestUser {
        RestUser::builder("alice")
            .scopes(scopes.iter().copied())
            .property(PASSWORD_PROPERTY, "00")
            .property(SALT_PROPERTY, "00")
            .build()
            .unwrap()
    }

    fn set(scopes: &[&str]) -> BTreeSet<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scope_naming() {
        assert!(is_valid_scope("cluster_rest:ticket_create"));
        assert!(is_valid_scope(GLOBAL_ADMIN_SCOPE));
        assert!(!is_valid_scope("abc:read"));
        assert!(!is_valid_scope("Cluster_rest:read"));
        assert!(!is_valid_scope("cluster_rest:"));
        assert!(!is_valid_scope("cluster_rest:read write"));
    }

    #[test]
    fn test_build_rejects_invalid_scope_and_missing_password() {
        let invalid = RestUser::builder("bob")
            .scope("nope")
            .property(PASSWORD_PROPERTY, "00")
            .property(SALT_PROPERTY, "00")
            .build();
        assert_eq!(invalid, Err(UserError::InvalidScope("nope".to_string())));

        let no_password = RestUser::builder("bob").build();
        assert_eq!(no_password, Err(UserError::MissingPassword("bob".to_string())));

        assert_eq!(RestUser::builder("  ").build(), Err(UserError::BlankUsername));
    }

    #[test]
    fn test_has_scope_lowercases_and_honors_admin() {
        let regular = user(&["cluster_rest:read"]);
        assert!(regular.has_scope("CLUSTER_REST:READ"));
        assert!(!regular.has_scope("cluster_rest:write"));
        assert!(regular.has_one_scope_of(&set(&[])));
        assert!(regular.has_one_scope_of(&set(&["cluster_rest:write", "cluster_rest:read"])));

        let admin = user(&[GLOBAL_ADMIN_SCOPE]);
        assert!(admin.has_scope("anything_at_all:x"));
    }

    #[test]
    fn test_scoped_user_needs_both() {
        let delegate = user(&["cluster_rest:read", "cluster_rest:write"]);
        let scoped = ScopedRestUser::new(delegate.clone(), set(&["cluster_rest:read", "service_rest:read"]));
        assert!(scoped.has_scope("cluster_rest:read"));
        assert!(!scoped.has_scope("cluster_rest:write"));
        assert!(!scoped.has_scope("service_rest:read"));

        let unrestricted = ScopedRestUser::new(delegate, BTreeSet::new());
        assert!(unrestricted.has_scope("cluster_rest:write"));
    }

    #[test]
    fn test_modification_keeps_identity() {
        let original = user(&[]);
        let modified = original
            .to_builder()
            .scope("cluster_rest:read")
            .actor("admin")
            .build()
            .unwrap();

        assert_eq!(modified.id(), original.id());
        assert_eq!(modified.created_at(), original.created_at());
        assert_eq!(modified.modified_by(), "admin");
        assert!(modified.has_scope("cluster_rest:read"));
    }

    #[test]
    fn test_password_roundtrip() {
        let hasher = Argon2Hasher::new(64, 1).unwrap();
        let user = RestUser::builder("carol")
            .password("secret", &hasher)
            .unwrap()
            .build()
            .unwrap();

        assert!(user.verify_password(b"secret", &hasher));
        assert!(!user.verify_password(b"Secret", &hasher));
        assert!(!format!("{:?}", user).contains(user.property(PASSWORD_PROPERTY).unwrap()));
    }
}

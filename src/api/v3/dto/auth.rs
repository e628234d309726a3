/*
 * Responsibility
 * - Request/response bodies of /api/v3/auth
 * - Token pair and ticket bodies are rendered by the providers themselves
 */
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::services::auth::user::is_valid_scope;

/// Body of `POST /api/v3/auth` and `POST /api/v3/auth/ticket`.
///
/// An empty body is the same as `{"scopes": []}`: the token carries every scope of the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopesRequest {
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl ScopesRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    /// Lowercased scopes; the first malformed one is returned as error.
    pub fn normalized(self) -> Result<BTreeSet<String>, String> {
        self.scopes
            .into_iter()
            .map(|scope| {
                let scope = scope.trim().to_ascii_lowercase();
                if is_valid_scope(&scope) { Ok(scope) } else { Err(scope) }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVerificationResponse {
    /// `access` or `refresh`
    #[serde(rename = "type")]
    pub token_type: &'static str,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_means_no_scopes() {
        assert!(ScopesRequest::from_body(b"").unwrap().scopes.is_empty());
        assert!(ScopesRequest::from_body(b" \n").unwrap().scopes.is_empty());
        assert!(ScopesRequest::from_body(b"{}").unwrap().scopes.is_empty());
        assert!(ScopesRequest::from_body(b"{\"scopes\":").is_err());
    }

    #[test]
    fn test_scopes_are_normalized() {
        let request = ScopesRequest::from_body(br#"{"scopes":["Cluster_Rest:Read"]}"#).unwrap();
        assert_eq!(
            request.normalized().unwrap(),
            BTreeSet::from(["cluster_rest:read".to_string()])
        );

        let bad = ScopesRequest::from_body(br#"{"scopes":["nope"]}"#).unwrap();
        assert_eq!(bad.normalized().unwrap_err(), "nope");
    }
}

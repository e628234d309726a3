use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwtTokenType {
    Access,
    Refresh,
}

impl JwtTokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for JwtTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JwtTokenType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            _ => Err(()),
        }
    }
}

/// Claims carried by both token kinds. `scopes` empty means "all scopes of the user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtTokenHolder {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: JwtTokenType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtTokenBody {
    pub token: String,
    pub token_type: &'static str,
    /// Milliseconds until expiry, relative to rendering time.
    pub expires_in: i64,
}

impl JwtTokenHolder {
    pub fn to_body(&self, now: DateTime<Utc>) -> JwtTokenBody {
        JwtTokenBody {
            token: self.token.clone(),
            token_type: self.token_type.as_str(),
            expires_in: (self.expires_at - now).num_milliseconds().max(0),
        }
    }
}

/// An access token and the refresh token that can renew it; both share `token_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtTokenPair {
    pub creation_time: DateTime<Utc>,
    pub access: JwtTokenHolder,
    pub refresh: JwtTokenHolder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtTokenPairBody {
    pub access_token: JwtTokenBody,
    pub refresh_token: JwtTokenBody,
    pub creation_time: i64,
}

impl JwtTokenPair {
    pub fn to_body(&self) -> JwtTokenPairBody {
        let now = Utc::now();
        JwtTokenPairBody {
            access_token: self.access.to_body(now),
            refresh_token: self.refresh.to_body(now),
            creation_time: self.creation_time.timestamp_millis(),
        }
    }
}

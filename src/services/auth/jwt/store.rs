//! Token ids issued to a user, persisted in the `jwt_token_pair` user property.
//!
//! Format: `id,type,expiresAtEpochMillis` records joined by `;`. Malformed records are
//! skipped on read so one bad entry never locks a user out.

use chrono::{DateTime, Utc};

use crate::services::auth::jwt::token::JwtTokenType;

pub const JWT_TOKEN_PAIR_PROPERTY: &str = "jwt_token_pair";

const RECORD_DELIMITER: char = ';';
const FIELD_DELIMITER: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub token_id: String,
    pub token_type: JwtTokenType,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub fn parse_stored_tokens(raw: Option<&str>) -> Vec<StoredToken> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };

    raw.split(RECORD_DELIMITER)
        .filter_map(|record| {
            let fields: Vec<&str> = record.splitn(4, FIELD_DELIMITER).collect();
            let [token_id, token_type, expires_at] = fields.as_slice() else {
                return None;
            };
            Some(StoredToken {
                token_id: token_id.to_string(),
                token_type: token_type.parse().ok()?,
                expires_at: DateTime::from_timestamp_millis(expires_at.parse().ok()?)?,
            })
        })
        .collect()
}

/// `None` when there is nothing to store (the property should be removed).
pub fn compact_stored_tokens(tokens: &[StoredToken]) -> Option<String> {
    if tokens.is_empty() {
        return None;
    }

    let records: Vec<String> = tokens
        .iter()
        .map(|t| {
            format!(
                "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
                t.token_id,
                t.token_type,
                t.expires_at.timestamp_millis()
            )
        })
        .collect();
    Some(records.join(&RECORD_DELIMITER.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_malformed_records() {
        let raw = "a,access,1700000000000;broken;b,refresh,1700000001000;c,other,1;d,access,x;e,access,1,extra";
        let tokens = parse_stored_tokens(Some(raw));

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token_id, "a");
        assert_eq!(tokens[0].token_type, JwtTokenType::Access);
        assert_eq!(tokens[1].expires_at.timestamp_millis(), 1_700_000_001_000);

        assert!(parse_stored_tokens(None).is_empty());
        assert!(parse_stored_tokens(Some("  ")).is_empty());
    }

    #[test]
    fn test_compact() {
        let tokens = parse_stored_tokens(Some("a,access,1000;a,refresh,2000"));
        assert_eq!(
            compact_stored_tokens(&tokens).as_deref(),
            Some("a,access,1000;a,refresh,2000")
        );
        assert_eq!(compact_stored_tokens(&[]), None);
    }
}

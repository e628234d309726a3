//! CORS policy of a handler (or of the whole component, as the registration default).
//!
//! Notes:
//! - Origins are matched in full against compiled patterns. Plain origins are exact
//!   matches, `*` allows any origin, raw regular expressions can be added explicitly.
//! - `max_age` uses `-1` for "not configured".

use regex::Regex;

pub const WILDCARD: &str = "*";
pub const UNSET_MAX_AGE: i64 = -1;

#[derive(Debug, Clone)]
pub enum OriginPattern {
    Any,
    Exact(String),
    Pattern(Regex),
}

impl OriginPattern {
    /// `*` allows any origin, everything else must match exactly.
    pub fn parse(origin: &str) -> Self {
        let origin = origin.trim();
        if origin == WILDCARD {
            Self::Any
        } else {
            Self::Exact(origin.to_string())
        }
    }

    /// Compile a regular expression that has to match the whole origin.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{})$", pattern)).map(Self::Pattern)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => ".*",
            Self::Exact(origin) => origin,
            Self::Pattern(regex) => regex.as_str(),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == origin,
            Self::Pattern(regex) => regex.is_match(origin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    allowed_origins: Vec<OriginPattern>,
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
    allow_credentials: Option<bool>,
    allow_private_networks: Option<bool>,
    max_age: i64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: None,
            allow_private_networks: None,
            max_age: UNSET_MAX_AGE,
        }
    }
}

impl CorsConfig {
    pub fn builder() -> CorsConfigBuilder {
        CorsConfigBuilder::default()
    }

    pub fn to_builder(&self) -> CorsConfigBuilder {
        CorsConfigBuilder {
            config: self.clone(),
        }
    }

    pub fn allowed_origins(&self) -> &[OriginPattern] {
        &self.allowed_origins
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(OriginPattern::is_any)
    }

    pub fn allowed_headers(&self) -> &[String] {
        &self.allowed_headers
    }

    pub fn exposed_headers(&self) -> &[String] {
        &self.exposed_headers
    }

    pub fn allow_credentials(&self) -> Option<bool> {
        self.allow_credentials
    }

    pub fn allow_private_networks(&self) -> Option<bool> {
        self.allow_private_networks
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    /// Merge `other` into `self`. Lists are unioned (a wildcard on either side wins outright);
    /// single values keep `self` when it is set and fall back to `other`.
    pub fn combine(&self, other: Option<&CorsConfig>) -> CorsConfig {
        let Some(other) = other else {
            return self.clone();
        };

        let allowed_origins = if self.allows_any_origin() || other.allows_any_origin() {
            vec![OriginPattern::Any]
        } else {
            let mut merged = self.allowed_origins.clone();
            for pattern in &other.allowed_origins {
                if !merged.iter().any(|p| p.as_str() == pattern.as_str()) {
                    merged.push(pattern.clone());
                }
            }
            merged
        };

        CorsConfig {
            allowed_origins,
            allowed_headers: union_with_wildcard(&self.allowed_headers, &other.allowed_headers),
            exposed_headers: union_with_wildcard(&self.exposed_headers, &other.exposed_headers),
            allow_credentials: self.allow_credentials.or(other.allow_credentials),
            allow_private_networks: self.allow_private_networks.or(other.allow_private_networks),
            max_age: if self.max_age != UNSET_MAX_AGE {
                self.max_age
            } else {
                other.max_age
            },
        }
    }

    /// The origin (without one trailing slash) if any allowed pattern matches it.
    pub fn find_matching_origin<'a>(&self, origin: &'a str) -> Option<&'a str> {
        if self.allowed_origins.is_empty() || origin.is_empty() {
            return None;
        }

        let trimmed = origin.strip_suffix('/').unwrap_or(origin);
        self.allowed_origins
            .iter()
            .any(|p| p.matches(trimmed))
            .then_some(trimmed)
    }

    /// The requested headers, trimmed, if every one of them is allowed.
    ///
    /// `Some(empty)` when nothing was requested; `None` as soon as one requested header is not
    /// allowed.
    pub fn filter_headers<S: AsRef<str>>(&self, requested: &[S]) -> Option<Vec<String>> {
        let requested: Vec<&str> = requested
            .iter()
            .map(|h| h.as_ref().trim())
            .filter(|h| !h.is_empty())
            .collect();
        if requested.is_empty() {
            return Some(Vec::new());
        }

        let allow_all = self.allowed_headers.iter().any(|h| h == WILDCARD);
        let all_allowed = allow_all
            || requested.iter().all(|h| {
                self.allowed_headers
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(h))
            });

        all_allowed.then(|| requested.into_iter().map(str::to_string).collect())
    }
}

fn union_with_wildcard(left: &[String], right: &[String]) -> Vec<String> {
    if left.iter().chain(right).any(|h| h == WILDCARD) {
        return vec![WILDCARD.to_string()];
    }

    let mut merged: Vec<String> = Vec::with_capacity(left.len() + right.len());
    for header in left.iter().chain(right) {
        if !merged.contains(header) {
            merged.push(header.clone());
        }
    }
    merged
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfigBuilder {
    config: CorsConfig,
}

impl CorsConfigBuilder {
    pub fn allowed_origin(mut self, origin: &str) -> Self {
        self.config.allowed_origins.push(OriginPattern::parse(origin));
        self
    }

    pub fn allowed_origin_pattern(mut self, pattern: OriginPattern) -> Self {
        self.config.allowed_origins.push(pattern);
        self
    }

    pub fn allowed_header(mut self, header: &str) -> Self {
        self.config.allowed_headers.push(header.to_string());
        self
    }

    pub fn exposed_header(mut self, header: &str) -> Self {
        self.config.exposed_headers.push(header.to_string());
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = Some(allow);
        self
    }

    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.config.allow_private_networks = Some(allow);
        self
    }

    /// Seconds a preflight answer may be cached.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.config.max_age = seconds;
        self
    }

    pub fn build(self) -> CorsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_origin_trims_one_trailing_slash() {
        let config = CorsConfig::builder()
            .allowed_origin("https://panel.example.com")
            .build();

        assert_eq!(
            config.find_matching_origin("https://panel.example.com/"),
            Some("https://panel.example.com")
        );
        assert_eq!(config.find_matching_origin("https://panel.example.com//"), None);
        assert_eq!(config.find_matching_origin("https://PANEL.example.com"), None);
        assert_eq!(config.find_matching_origin(""), None);
    }

    #[test]
    fn test_regex_origin_must_match_fully() {
        let config = CorsConfig::builder()
            .allowed_origin_pattern(OriginPattern::regex(r"https://[a-z]+\.example\.com").unwrap())
            .build();

        assert!(config.find_matching_origin("https://node.example.com").is_some());
        assert!(config.find_matching_origin("https://node.example.com.evil").is_none());
    }

    #[test]
    fn test_filter_headers_case_insensitive() {
        let config = CorsConfig::builder()
            .allowed_header("Authorization")
            .allowed_header("Content-Type")
            .build();

        assert_eq!(
            config.filter_headers(&["authorization", " content-type ", ""]),
            Some(vec!["authorization".to_string(), "content-type".to_string()])
        );
        assert_eq!(config.filter_headers(&["authorization", "X-Other"]), None);
        assert_eq!(config.filter_headers(&["X-Other"]), None);
        assert_eq!(config.filter_headers::<&str>(&[]), Some(Vec::new()));
        assert_eq!(CorsConfig::default().filter_headers(&["a"]), None);

        let wildcard = CorsConfig::builder().allowed_header("*").build();
        assert_eq!(wildcard.filter_headers(&["X-Any"]), Some(vec!["X-Any".to_string()]));
    }

    #[test]
    fn test_combine_collapses_wildcards_and_prefers_self() {
        let global = CorsConfig::builder()
            .allowed_origin("https://a.example")
            .allowed_header("X-One")
            .allow_credentials(true)
            .max_age(600)
            .build();
        let specific = CorsConfig::builder()
            .allowed_origin("*")
            .allowed_header("X-Two")
            .allow_credentials(false)
            .allow_private_networks(true)
            .build();

        let merged = specific.combine(Some(&global));
        assert!(merged.allows_any_origin());
        assert_eq!(merged.allowed_origins().len(), 1);
        assert_eq!(merged.allowed_headers(), ["X-Two", "X-One"]);
        assert_eq!(merged.allow_credentials(), Some(false));
        assert_eq!(merged.allow_private_networks(), Some(true));
        assert_eq!(merged.max_age(), 600);

        let with_header_wildcard = global.combine(Some(&CorsConfig::builder().allowed_header("*").build()));
        assert_eq!(with_header_wildcard.allowed_headers(), ["*"]);
        assert_eq!(global.combine(None).max_age(), 600);
    }
}

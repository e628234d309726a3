/*
 * Responsibility
 * - Read environment variables (.env via dotenvy) into Config
 * - RestConfig: what the request core needs (default CORS, token lifetimes, limits, admin bootstrap)
 * - Validate values up front (bad values fail startup)
 */
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::TimeDelta;

use crate::cors::config::CorsConfig;
use crate::services::auth::jwt::provider::{DEFAULT_ISSUER, JwtSettings};
use crate::services::auth::password::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB};
use crate::services::auth::ticket::default_ticket_lifetime;

pub const DEFAULT_PORT: u16 = 2812;
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings of the request core itself, independent of how the process is launched.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// `http` or `https`; used for same-origin checks.
    pub scheme: String,
    pub max_content_length: usize,
    pub default_cors: CorsConfig,
    pub jwt: JwtSettings,
    pub ticket_lifetime: TimeDelta,
    /// Argon2id cost of newly hashed passwords.
    pub password_memory_kib: u32,
    pub password_iterations: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            default_cors: CorsConfig::builder()
                .allowed_origin("*")
                .allowed_header("*")
                .allow_credentials(true)
                .build(),
            jwt: JwtSettings::default(),
            ticket_lifetime: default_ticket_lifetime(),
            password_memory_kib: DEFAULT_MEMORY_KIB,
            password_iterations: DEFAULT_ITERATIONS,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub rest: RestConfig,
    pub key_dir: PathBuf,
    // created on first start when no user with this name exists
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the admin password
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("rest", &self.rest)
            .field("key_dir", &self.key_dir)
            .field("admin_username", &self.admin_username)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let host: IpAddr = parse_or(&lookup, "REST_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let addr = SocketAddr::new(host, port);

        let app_env = AppEnv::from_env();

        let scheme = lookup("REST_SCHEME")
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "http".to_string());
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::Invalid("REST_SCHEME"));
        }

        let max_content_length = parse_or(&lookup, "REST_MAX_CONTENT_LENGTH", DEFAULT_MAX_CONTENT_LENGTH)?;
        if max_content_length == 0 {
            return Err(ConfigError::Invalid("REST_MAX_CONTENT_LENGTH"));
        }

        let default_cors = {
            let origins = list_or(&lookup, "REST_CORS_ALLOWED_ORIGINS", "*");
            let headers = list_or(&lookup, "REST_CORS_ALLOWED_HEADERS", "*");
            let credentials: bool = parse_or(&lookup, "REST_CORS_ALLOW_CREDENTIALS", true)?;

            let mut builder = CorsConfig::builder().allow_credentials(credentials);
            for origin in &origins {
                builder = builder.allowed_origin(origin);
            }
            for header in &headers {
                builder = builder.allowed_header(header);
            }
            builder.build()
        };

        let jwt = JwtSettings {
            issuer: lookup("REST_JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            access_lifetime: lifetime_or(
                &lookup,
                "REST_JWT_ACCESS_LIFETIME_SECONDS",
                JwtSettings::default().access_lifetime,
            )?,
            refresh_lifetime: lifetime_or(
                &lookup,
                "REST_JWT_REFRESH_LIFETIME_SECONDS",
                JwtSettings::default().refresh_lifetime,
            )?,
        };
        let ticket_lifetime = lifetime_or(&lookup, "REST_TICKET_LIFETIME_SECONDS", default_ticket_lifetime())?;

        // argon2 rejects less than 8 KiB of memory or zero passes
        let password_memory_kib: u32 = parse_or(&lookup, "REST_PASSWORD_MEMORY_KIB", DEFAULT_MEMORY_KIB)?;
        if password_memory_kib < 8 {
            return Err(ConfigError::Invalid("REST_PASSWORD_MEMORY_KIB"));
        }
        let password_iterations: u32 = parse_or(&lookup, "REST_PASSWORD_ITERATIONS", DEFAULT_ITERATIONS)?;
        if password_iterations == 0 {
            return Err(ConfigError::Invalid("REST_PASSWORD_ITERATIONS"));
        }

        let key_dir = PathBuf::from(lookup("REST_KEY_DIR").unwrap_or_else(|| ".keys".to_string()));
        let admin_username = lookup("REST_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        let admin_password = lookup("REST_ADMIN_PASSWORD").filter(|p| !p.is_empty());

        Ok(Self {
            addr,
            app_env,
            rest: RestConfig {
                scheme,
                max_content_length,
                default_cors,
                jwt,
                ticket_lifetime,
                password_memory_kib,
                password_iterations,
            },
            key_dir,
            admin_username,
            admin_password,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn list_or(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: &str) -> Vec<String> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn lifetime_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: TimeDelta,
) -> Result<TimeDelta, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let seconds: i64 = raw.trim().parse().map_err(|_| ConfigError::Invalid(key))?;
    if seconds <= 0 {
        return Err(ConfigError::Invalid(key));
    }
    TimeDelta::try_seconds(seconds).ok_or(ConfigError::Invalid(key))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.addr, "127.0.0.1:2812".parse().unwrap());
        assert_eq!(config.rest.max_content_length, 5 * 1024 * 1024);
        assert!(config.rest.default_cors.allows_any_origin());
        assert_eq!(config.rest.default_cors.allow_credentials(), Some(true));
        assert_eq!(config.rest.jwt.access_lifetime, TimeDelta::hours(12));
        assert_eq!(config.rest.jwt.refresh_lifetime, TimeDelta::days(3));
        assert_eq!(config.rest.ticket_lifetime, TimeDelta::seconds(15));
        assert_eq!(config.admin_username, "admin");
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("REST_HOST", "0.0.0.0"),
            ("REST_CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("REST_CORS_ALLOW_CREDENTIALS", "false"),
            ("REST_TICKET_LIFETIME_SECONDS", "30"),
            ("REST_ADMIN_PASSWORD", "secret"),
        ])
        .unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.rest.default_cors.allowed_origins().len(), 2);
        assert_eq!(config.rest.default_cors.allow_credentials(), Some(false));
        assert_eq!(config.rest.ticket_lifetime, TimeDelta::seconds(30));
        assert_eq!(config.admin_password.as_deref(), Some("secret"));
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            config(&[("PORT", "not-a-port")]).unwrap_err(),
            ConfigError::Invalid("PORT")
        );
        assert_eq!(
            config(&[("REST_JWT_ACCESS_LIFETIME_SECONDS", "0")]).unwrap_err(),
            ConfigError::Invalid("REST_JWT_ACCESS_LIFETIME_SECONDS")
        );
        assert_eq!(
            config(&[("REST_SCHEME", "ftp")]).unwrap_err(),
            ConfigError::Invalid("REST_SCHEME")
        );
        assert_eq!(
            config(&[("REST_PASSWORD_MEMORY_KIB", "4")]).unwrap_err(),
            ConfigError::Invalid("REST_PASSWORD_MEMORY_KIB")
        );
    }
}

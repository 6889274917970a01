//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HMAC key for access tokens (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOCKROOM_HOST` - Bind address (default: 127.0.0.1)
//! - `STOCKROOM_PORT` - Listen port (default: 8080)
//! - `JWT_ISSUER` - `iss` claim of issued tokens (default: stockroom)
//! - `ACCESS_TOKEN_TTL_SECS` - Access token lifetime (default: 900)
//! - `REFRESH_TOKEN_TTL_SECS` - Refresh token lifetime (default: 604800)
//! - `REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Token signing and lifetime settings.
///
/// Implements `Debug` manually to redact the signing key.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub db_max_connections: u32,
    pub request_timeout: Duration,
    pub auth: AuthConfig,
    pub log_format: LogFormat,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = parse_env_or_default("STOCKROOM_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("STOCKROOM_PORT", "8080")?;
        let db_max_connections = parse_env_or_default("DB_MAX_CONNECTIONS", "10")?;
        let request_timeout =
            Duration::from_secs(parse_env_or_default("REQUEST_TIMEOUT_SECS", "30")?);

        let auth = AuthConfig {
            jwt_secret: load_signing_secret("JWT_SECRET")?,
            issuer: get_env_or_default("JWT_ISSUER", "stockroom"),
            access_token_ttl: ttl_from_env("ACCESS_TOKEN_TTL_SECS", "900")?,
            refresh_token_ttl: ttl_from_env("REFRESH_TOKEN_TTL_SECS", "604800")?,
        };

        let log_format = match get_optional_env("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            host,
            port,
            db_max_connections,
            request_timeout,
            auth,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Environment access
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// A lifetime in whole seconds. Zero would mint tokens that are born expired.
fn ttl_from_env(key: &str, default: &str) -> Result<Duration, ConfigError> {
    match parse_env_or_default::<u64>(key, default)? {
        0 => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        secs => Ok(Duration::from_secs(secs)),
    }
}

// =============================================================================
// Signing secret checks
// =============================================================================

/// Shannon entropy of the byte distribution, in bits per byte.
fn secret_entropy(secret: &str) -> f64 {
    let bytes = secret.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &b in bytes {
        if let Some(slot) = counts.get_mut(usize::from(b)) {
            *slot += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let total = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            #[allow(clippy::cast_precision_loss)]
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject signing keys that are short, look like a template value, or are
/// too repetitive to be random.
fn check_signing_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(var_name.to_string(), reason));

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return insecure(format!(
            "must be at least {MIN_JWT_SECRET_LENGTH} characters (got {})",
            secret.len()
        ));
    }

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return insecure(format!("appears to be a placeholder (contains '{pattern}')"));
    }

    let entropy = secret_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
        ));
    }
    Ok(())
}

fn load_signing_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    check_signing_secret(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RANDOM_SECRET: &str = "Qm7#vR2!kP9@wX4$zL8^nB3&hT6*cD1%";

    #[test]
    fn test_secret_entropy_bounds() {
        assert!(secret_entropy("").abs() < f64::EPSILON);
        assert!(secret_entropy("zzzzzz").abs() < f64::EPSILON);
        assert!((secret_entropy("ab") - 1.0).abs() < 0.01);
        assert!(secret_entropy(RANDOM_SECRET) > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = check_signing_secret("Qm7#vR2!kP9@", "JWT_SECRET").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_placeholder_secrets_rejected() {
        for value in [
            "your-jwt-key-here-0123456789abcdefgh",
            "changeme-please-now-0123456789abcdef",
            "my-example-signing-key-0123456789abc",
        ] {
            let err = check_signing_secret(value, "JWT_SECRET").unwrap_err();
            assert!(err.to_string().contains("placeholder"));
        }
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        let err = check_signing_secret(&"ab".repeat(20), "JWT_SECRET").unwrap_err();
        assert!(err.to_string().contains("entropy too low"));
    }

    #[test]
    fn test_random_secret_accepted() {
        assert!(check_signing_secret(RANDOM_SECRET, "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let auth = AuthConfig {
            jwt_secret: SecretString::from("Qm7#vR2!kP9@wX4$zL8^nB3&hT6*cD1%"),
            issuer: "stockroom".to_string(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(3600),
        };
        let debug_output = format!("{auth:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("Qm7#vR2"));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/stockroom"),
            host: "0.0.0.0".parse().unwrap(),
            port: 8080,
            db_max_connections: 10,
            request_timeout: Duration::from_secs(30),
            auth: AuthConfig {
                jwt_secret: SecretString::from("k".repeat(32)),
                issuer: "stockroom".to_string(),
                access_token_ttl: Duration::from_secs(900),
                refresh_token_ttl: Duration::from_secs(3600),
            },
            log_format: LogFormat::Json,
            sentry_dsn: None,
            sentry_environment: None,
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }
}

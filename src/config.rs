/// Configuration management for murmur
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub google: GoogleConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used in confirmation links sent by email
    pub public_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Token signing configuration
///
/// Four distinct secrets: (user, admin) x (access, refresh). The verifier
/// picks one from the account role and the token class, never from the
/// transport prefix alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub user_access_secret: String,
    pub user_refresh_secret: String,
    pub admin_access_secret: String,
    pub admin_refresh_secret: String,
    /// Access token lifetime in seconds (default 1 hour)
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds (default 365 days)
    pub refresh_ttl_secs: i64,
}

/// Credential hashing and PII encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (work factor)
    pub hash_memory_kib: u32,
    /// Argon2 iteration count
    pub hash_iterations: u32,
    /// AES-256 key for phone numbers at rest, hex-encoded (32 bytes)
    pub phone_key_hex: String,
}

/// Google sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth web client id; id tokens must carry this audience
    pub client_id: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub global_requests_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("MURMUR_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("MURMUR_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;

        let public_url = env::var("MURMUR_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env::var("MURMUR_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("MURMUR_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("MURMUR_ACCOUNT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("murmur.sqlite"));

        let user_access_secret = env::var("MURMUR_USER_ACCESS_SECRET")
            .map_err(|_| ApiError::Validation("User access secret required".to_string()))?;
        let user_refresh_secret = env::var("MURMUR_USER_REFRESH_SECRET")
            .map_err(|_| ApiError::Validation("User refresh secret required".to_string()))?;
        let admin_access_secret = env::var("MURMUR_ADMIN_ACCESS_SECRET")
            .map_err(|_| ApiError::Validation("Admin access secret required".to_string()))?;
        let admin_refresh_secret = env::var("MURMUR_ADMIN_REFRESH_SECRET")
            .map_err(|_| ApiError::Validation("Admin refresh secret required".to_string()))?;

        let access_ttl_secs = env::var("MURMUR_ACCESS_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let refresh_ttl_secs = env::var("MURMUR_REFRESH_TTL_SECS")
            .unwrap_or_else(|_| "31536000".to_string())
            .parse()
            .unwrap_or(31_536_000);

        let hash_memory_kib = env::var("MURMUR_HASH_MEMORY_KIB")
            .unwrap_or_else(|_| "19456".to_string())
            .parse()
            .unwrap_or(19_456);
        let hash_iterations = env::var("MURMUR_HASH_ITERATIONS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);
        let phone_key_hex = env::var("MURMUR_PHONE_KEY_HEX")
            .map_err(|_| ApiError::Validation("Phone encryption key required".to_string()))?;

        let google_client_id = env::var("MURMUR_GOOGLE_CLIENT_ID").unwrap_or_default();

        let email = if let Ok(smtp_url) = env::var("MURMUR_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("MURMUR_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let rate_limit_enabled = env::var("MURMUR_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let rate_limit_requests = env::var("MURMUR_RATE_LIMIT_GLOBAL_REQUESTS_PER_MINUTE")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            auth: AuthConfig {
                user_access_secret,
                user_refresh_secret,
                admin_access_secret,
                admin_refresh_secret,
                access_ttl_secs,
                refresh_ttl_secs,
            },
            security: SecurityConfig {
                hash_memory_kib,
                hash_iterations,
                phone_key_hex,
            },
            google: GoogleConfig {
                client_id: google_client_id,
            },
            email,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                global_requests_per_minute: rate_limit_requests,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        for (name, secret) in [
            ("user access", &self.auth.user_access_secret),
            ("user refresh", &self.auth.user_refresh_secret),
            ("admin access", &self.auth.admin_access_secret),
            ("admin refresh", &self.auth.admin_refresh_secret),
        ] {
            if secret.len() < 32 {
                return Err(ApiError::Validation(format!(
                    "{} secret must be at least 32 characters",
                    name
                )));
            }
        }

        let key = hex::decode(self.security.phone_key_hex.trim())
            .map_err(|_| ApiError::Validation("Phone key must be hex".to_string()))?;
        if key.len() != 32 {
            return Err(ApiError::Validation(
                "Phone key must be 32 bytes (64 hex characters)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Row models for the user and revoked-token tables
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account role, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Sign-in provider; google accounts have no usable local password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
        }
    }
}

/// User record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    /// AES-256-GCM ciphertext, hex-encoded nonce || ct
    pub phone_enc: Option<String>,
    pub role: Role,
    pub provider: Provider,
    pub confirmed: bool,

    // email confirmation OTP sub-state; code and expiry are set and cleared
    // together
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_attempts: i64,
    pub otp_ban_expires_at: Option<DateTime<Utc>>,

    // login throttle sub-state, independent of the confirmation sub-state
    pub login_attempts: i64,
    pub login_ban_expires_at: Option<DateTime<Utc>>,

    // presence of the hash means a password reset is pending
    pub reset_otp_hash: Option<String>,

    pub deleted: bool,
    pub deleted_by: Option<String>,
    pub version: i64,

    pub profile_image_url: Option<String>,
    pub profile_image_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Revoked token record (jti + original expiry)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RevokedToken {
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

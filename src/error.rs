/// Unified error types for the murmur backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Main error type for the service
///
/// Throttle outcomes (locked accounts, wrong-password countdowns, resend
/// cooldowns) are ordinary variants here because they are expected, frequent
/// results of the abuse policy, not faults. They render as structured 4xx
/// bodies; only Database/Internal/Io reach a 500 and those never leak details.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or rejected input, caught before a flow runs
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing/invalid credentials or token
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authorization header prefix is neither `Bearer` nor `admin`
    #[error("Invalid token prefix")]
    InvalidTokenPrefix,

    /// Sign-in attempted before the email was confirmed
    #[error("Email not verified")]
    NeedsEmailVerification,

    /// Password mismatch with attempts still remaining
    #[error("Incorrect password")]
    WrongPassword { attempts_left: u32, total_attempts: u32 },

    /// Login throttle ban is active (or was just triggered)
    #[error("Account locked after too many failed login attempts")]
    LoginLocked {
        ban_expires_at: DateTime<Utc>,
        minutes_left: i64,
    },

    /// Confirmation OTP throttle ban is active (or was just triggered)
    #[error("Too many failed verification attempts")]
    OtpLocked {
        ban_expires_at: DateTime<Utc>,
        minutes_left: i64,
    },

    /// Wrong confirmation code with attempts still remaining
    #[error("Invalid verification code")]
    OtpInvalid { attempts_left: u32, total_attempts: u32 },

    /// The stored confirmation code passed its validity window
    #[error("Verification code has expired")]
    OtpExpired,

    /// No confirmation code on record
    #[error("No verification code found")]
    OtpMissing,

    /// A still-fresh OTP blocks a resend request
    #[error("Resend requested too soon")]
    ResendCooldown { seconds_left: i64 },

    /// Role mismatch on admin-gated operations
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Email/id/token target absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate email on sign-up or profile update
    #[error("Conflict: {0}")]
    Conflict(String),

    /// HTTP-level rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: std::time::Duration },

    /// Email transport, identity provider, or object storage failure
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "InvalidRequest", "message": self.to_string() }),
            ),
            ApiError::InvalidTokenPrefix => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "InvalidTokenPrefix", "message": self.to_string() }),
            ),
            ApiError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "AuthenticationRequired", "message": self.to_string() }),
            ),
            ApiError::NeedsEmailVerification => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "EmailNotVerified",
                    "message": "Please verify your email before signing in",
                    "needsEmailVerification": true,
                }),
            ),
            ApiError::WrongPassword { attempts_left, total_attempts } => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "IncorrectPassword",
                    "message": "Incorrect password",
                    "attemptsLeft": attempts_left,
                    "totalAttempts": total_attempts,
                }),
            ),
            ApiError::LoginLocked { ban_expires_at, minutes_left } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "AccountLocked",
                    "message": format!(
                        "Too many failed login attempts. Try again in {} minutes.",
                        minutes_left
                    ),
                    "attemptsLeft": 0,
                    "banExpiresAt": ban_expires_at,
                }),
            ),
            ApiError::OtpLocked { ban_expires_at, minutes_left } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "VerificationLocked",
                    "message": format!(
                        "Too many failed attempts. Try again in {} minutes.",
                        minutes_left
                    ),
                    "attemptsLeft": 0,
                    "banExpiresAt": ban_expires_at,
                }),
            ),
            ApiError::OtpInvalid { attempts_left, total_attempts } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "InvalidVerificationCode",
                    "message": "Invalid verification code",
                    "attemptsLeft": attempts_left,
                    "totalAttempts": total_attempts,
                }),
            ),
            ApiError::OtpExpired => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "VerificationCodeExpired",
                    "message": "Verification code has expired. Please request a new one.",
                    "expired": true,
                }),
            ),
            ApiError::OtpMissing => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "NoVerificationCode",
                    "message": "No verification code found. Please request a new one.",
                }),
            ),
            ApiError::ResendCooldown { seconds_left } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "ResendCooldown",
                    "message": format!(
                        "Please wait {} seconds before requesting a new code.",
                        seconds_left
                    ),
                    "timeLeft": seconds_left,
                }),
            ),
            ApiError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "Forbidden", "message": self.to_string() }),
            ),
            ApiError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "NotFound", "message": self.to_string() }),
            ),
            ApiError::Conflict(_) => (
                StatusCode::CONFLICT,
                json!({ "error": "Conflict", "message": self.to_string() }),
            ),
            ApiError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": "RateLimitExceeded", "message": "Rate limit exceeded" }),
            ),
            ApiError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "UpstreamFailure", "message": self.to_string() }),
            ),
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                // Don't leak details
                json!({ "error": "InternalServerError", "message": "Internal server error" }),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for service operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Account management
///
/// The directory owns all user-table access; the flows orchestrate the
/// credential lifecycle on top of it.

mod directory;
mod flows;

pub use directory::AccountDirectory;
pub use flows::AuthFlows;

use crate::db::models::{Role, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sign-up request
///
/// The profile image handle comes from the upload collaborator; sign-up
/// without one is rejected.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    pub profile_image_url: Option<String>,
    pub profile_image_id: Option<String>,
}

/// Sign-in request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Google sign-in request; the id token comes from the frontend
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

/// OTP confirmation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub otp: String,
}

/// OTP resend request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResendOtpRequest {
    #[validate(email)]
    pub email: String,
}

/// Password change request (authenticated)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Start of the password reset path
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgetPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Completion of the password reset path
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 5))]
    pub otp: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Profile update request; a changed email re-enters the unconfirmed state
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
}

/// Minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// User as returned to its owner
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub confirmed: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            confirmed: user.confirmed,
        }
    }
}

/// Public profile projection: no credentials, no PII
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub profile_image_url: Option<String>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

/// Diagnostic snapshot of the confirmation and throttle sub-states
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub email: String,
    pub confirmed: bool,
    pub is_deleted: bool,
    pub email_verification: VerificationStatus,
    pub login: ThrottleStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub attempts: i64,
    pub is_banned: bool,
    pub ban_expires_at: Option<DateTime<Utc>>,
    pub has_active_otp: bool,
    pub otp_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
    pub attempts: i64,
    pub is_banned: bool,
    pub ban_expires_at: Option<DateTime<Utc>>,
}

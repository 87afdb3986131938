/// Credential lifecycle orchestration
///
/// Sign-up, sign-in, email confirmation, OTP resend, token refresh, logout,
/// password change/reset, and freeze/unfreeze. Flows read and write accounts
/// only through the directory, consult the attempt-ledger policies for
/// allow/deny, and mint tokens on success.
use crate::{
    account::{
        AccountDirectory, AccountStatus, PublicProfile, SignUpRequest, ThrottleStatus, TokenPair,
        UpdateProfileRequest, UserView, VerificationStatus,
    },
    account::directory::NewUser,
    crypto::{PasswordHasher, PhoneCipher},
    db::models::{Provider, Role, User},
    error::{ApiError, ApiResult},
    guard::{FailureVerdict, LOGIN_POLICY, OTP_POLICY},
    identity::GoogleVerifier,
    mailer::{EmailJob, EmailOutbox},
    token::{revocation::RevocationStore, Claims, TokenClass, TokenPrefix, TokenService},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Confirmation OTPs stay valid for five minutes
const OTP_TTL_SECS: i64 = 5 * 60;
/// A fresh OTP blocks resends for one minute
const RESEND_COOLDOWN_SECS: i64 = 60;
const CONFIRM_OTP_LEN: usize = 6;
const RESET_OTP_LEN: usize = 5;

/// Generate a numeric one-time code
fn generate_otp(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
}

/// Random password for google-provider accounts; never usable because local
/// sign-in is rejected for them before any comparison
fn unusable_password() -> String {
    use rand::distributions::Alphanumeric;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn minutes_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (expires_at - now).num_seconds();
    (secs + 59) / 60
}

fn exp_to_datetime(exp: i64) -> ApiResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(exp, 0)
        .ok_or_else(|| ApiError::Internal("Token carries an invalid expiry".to_string()))
}

/// Auth flow service
#[derive(Clone)]
pub struct AuthFlows {
    directory: AccountDirectory,
    tokens: TokenService,
    revocations: RevocationStore,
    hasher: PasswordHasher,
    cipher: PhoneCipher,
    outbox: EmailOutbox,
    google: GoogleVerifier,
    public_url: String,
}

impl AuthFlows {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: AccountDirectory,
        tokens: TokenService,
        revocations: RevocationStore,
        hasher: PasswordHasher,
        cipher: PhoneCipher,
        outbox: EmailOutbox,
        google: GoogleVerifier,
        public_url: String,
    ) -> Self {
        Self {
            directory,
            tokens,
            revocations,
            hasher,
            cipher,
            outbox,
            google,
            public_url,
        }
    }

    fn confirm_link_for(&self, token: &str) -> String {
        format!("{}/users/confirm-email/{}", self.public_url, token)
    }

    /// Register a new account and queue the confirmation email
    pub async fn sign_up(&self, req: SignUpRequest) -> ApiResult<UserView> {
        let (image_url, image_id) = match (req.profile_image_url, req.profile_image_id) {
            (Some(url), id) => (url, id),
            (None, _) => {
                return Err(ApiError::Validation("Profile image is required".to_string()));
            }
        };

        if self.directory.email_taken(&req.email).await? {
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let phone_enc = self.cipher.encrypt(&req.phone)?;

        let otp = generate_otp(CONFIRM_OTP_LEN);
        let otp_expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECS);

        let user = self
            .directory
            .create(NewUser {
                email: req.email,
                name: req.name,
                password_hash,
                phone_enc: Some(phone_enc),
                role: Role::User,
                provider: Provider::Local,
                confirmed: false,
                otp_code: Some(otp.clone()),
                otp_expires_at: Some(otp_expires_at),
                profile_image_url: Some(image_url),
                profile_image_id: image_id,
            })
            .await?;

        tracing::info!("Account created: {}", user.id);

        // Account creation and email dispatch are decoupled: a failed send
        // becomes a dead letter, never a failed sign-up
        let link_token = self.tokens.issue_confirm_link(&user.email)?;
        self.outbox.enqueue(EmailJob::Confirmation {
            to: user.email.clone(),
            name: user.name.clone(),
            otp,
            confirm_link: self.confirm_link_for(&link_token),
        });

        Ok(UserView::from(&user))
    }

    /// Password sign-in, throttled per account
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<(TokenPair, UserView)> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))?;

        let now = Utc::now();

        // An open ban window rejects without touching the counter
        if let Err(ban) = LOGIN_POLICY.check_ban(user.login_ban_expires_at, now) {
            return Err(ApiError::LoginLocked {
                ban_expires_at: ban.expires_at,
                minutes_left: ban.minutes_left,
            });
        }

        // Unconfirmed accounts do not consume a login attempt
        if !user.confirmed {
            return Err(ApiError::NeedsEmailVerification);
        }

        // Google accounts have no usable local password
        if user.provider == Provider::Google {
            return Err(ApiError::Validation(
                "This account signs in with Google".to_string(),
            ));
        }

        if !self.hasher.verify(password, &user.password_hash)? {
            return match LOGIN_POLICY.register_failure(user.login_attempts as u32, now) {
                FailureVerdict::Banned { until } => {
                    self.directory
                        .record_login_failure(&user.id, user.login_attempts + 1, Some(until))
                        .await?;
                    tracing::warn!("Login ban triggered for {}", user.id);
                    Err(ApiError::LoginLocked {
                        ban_expires_at: until,
                        minutes_left: minutes_until(until, now),
                    })
                }
                FailureVerdict::Retry {
                    attempts_left,
                    total_attempts,
                } => {
                    self.directory
                        .record_login_failure(&user.id, total_attempts as i64, None)
                        .await?;
                    Err(ApiError::WrongPassword {
                        attempts_left,
                        total_attempts,
                    })
                }
            };
        }

        if user.login_attempts > 0 {
            self.directory.reset_login_throttle(&user.id).await?;
        }

        let pair = self.mint_pair(&user)?;
        Ok((pair, UserView::from(&user)))
    }

    /// Sign in with a Google id token, creating the account on first use
    pub async fn sign_in_with_google(&self, id_token: &str) -> ApiResult<(TokenPair, UserView)> {
        if !self.google.is_configured() {
            return Err(ApiError::Validation(
                "Google sign-in is not configured".to_string(),
            ));
        }

        let identity = self.google.verify(id_token).await?;

        let user = match self.directory.find_by_email(&identity.email).await? {
            Some(user) => user,
            None => {
                let password_hash = self.hasher.hash(&unusable_password())?;
                self.directory
                    .create(NewUser {
                        email: identity.email.clone(),
                        name: identity.name.unwrap_or_else(|| identity.email.clone()),
                        password_hash,
                        phone_enc: None,
                        role: Role::User,
                        provider: Provider::Google,
                        confirmed: identity.email_verified,
                        otp_code: None,
                        otp_expires_at: None,
                        profile_image_url: identity.picture,
                        profile_image_id: None,
                    })
                    .await?
            }
        };

        // Credential-method confusion guard
        if user.provider != Provider::Google {
            return Err(ApiError::Validation(
                "You can not log in with Google".to_string(),
            ));
        }

        let pair = self.mint_pair(&user)?;
        Ok((pair, UserView::from(&user)))
    }

    /// Confirm the email with the 6-digit code
    pub async fn confirm_otp(&self, email: &str, otp: &str) -> ApiResult<UserView> {
        let user = self
            .directory
            .find_unconfirmed_by_email(email)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("User not found or already confirmed".to_string())
            })?;

        let now = Utc::now();

        if let Err(ban) = OTP_POLICY.check_ban(user.otp_ban_expires_at, now) {
            return Err(ApiError::OtpLocked {
                ban_expires_at: ban.expires_at,
                minutes_left: ban.minutes_left,
            });
        }

        let (code, expires_at) = match (&user.otp_code, user.otp_expires_at) {
            (Some(code), Some(expires_at)) => (code, expires_at),
            _ => return Err(ApiError::OtpMissing),
        };

        if expires_at < now {
            // Expired codes are cleared on detection
            self.directory.clear_otp(&user.id).await?;
            return Err(ApiError::OtpExpired);
        }

        if otp != code.as_str() {
            return match OTP_POLICY.register_failure(user.otp_attempts as u32, now) {
                FailureVerdict::Banned { until } => {
                    self.directory
                        .record_otp_failure(&user.id, user.otp_attempts + 1, Some(until))
                        .await?;
                    tracing::warn!("Verification ban triggered for {}", user.id);
                    Err(ApiError::OtpLocked {
                        ban_expires_at: until,
                        minutes_left: minutes_until(until, now),
                    })
                }
                FailureVerdict::Retry {
                    attempts_left,
                    total_attempts,
                } => {
                    self.directory
                        .record_otp_failure(&user.id, total_attempts as i64, None)
                        .await?;
                    Err(ApiError::OtpInvalid {
                        attempts_left,
                        total_attempts,
                    })
                }
            };
        }

        self.directory.confirm(&user.id).await?;
        tracing::info!("Email confirmed for {}", user.id);

        let mut view = UserView::from(&user);
        view.confirmed = true;
        Ok(view)
    }

    /// Confirm the email via the signed link token; independent of the OTP
    /// counters
    pub async fn confirm_link(&self, token: &str) -> ApiResult<()> {
        let email = self.tokens.verify_confirm_link(token)?;

        let user = self
            .directory
            .find_unconfirmed_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        self.directory.confirm(&user.id).await?;
        tracing::info!("Email confirmed via link for {}", user.id);

        Ok(())
    }

    /// Issue a fresh confirmation OTP, rate-limited while the current one
    /// is still young
    pub async fn resend_otp(&self, email: &str) -> ApiResult<DateTime<Utc>> {
        let user = self
            .directory
            .find_unconfirmed_by_email(email)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("User not found or already confirmed".to_string())
            })?;

        let now = Utc::now();

        if let Err(ban) = OTP_POLICY.check_ban(user.otp_ban_expires_at, now) {
            return Err(ApiError::OtpLocked {
                ban_expires_at: ban.expires_at,
                minutes_left: ban.minutes_left,
            });
        }

        // The current code must have burned through its first minute before
        // a new one can be requested
        if let Some(expires_at) = user.otp_expires_at {
            let threshold_ms = (OTP_TTL_SECS - RESEND_COOLDOWN_SECS) * 1000;
            let remaining_ms = (expires_at - now).num_milliseconds();
            if remaining_ms > threshold_ms {
                let seconds_left = (remaining_ms - threshold_ms + 999) / 1000;
                return Err(ApiError::ResendCooldown { seconds_left });
            }
        }

        let otp = generate_otp(CONFIRM_OTP_LEN);
        let expires_at = now + Duration::seconds(OTP_TTL_SECS);
        self.directory.set_otp(&user.id, &otp, expires_at).await?;

        let link_token = self.tokens.issue_confirm_link(&user.email)?;
        self.outbox.enqueue(EmailJob::Confirmation {
            to: user.email.clone(),
            name: user.name.clone(),
            otp,
            confirm_link: self.confirm_link_for(&link_token),
        });

        Ok(expires_at)
    }

    /// Revoke the presented access token
    pub async fn logout(&self, claims: &Claims) -> ApiResult<()> {
        self.revocations
            .revoke(&claims.jti, exp_to_datetime(claims.exp)?)
            .await?;

        Ok(())
    }

    /// Exchange a refresh token for a fresh access/refresh pair
    ///
    /// The presented refresh token stays valid until logout; only its jti
    /// revocation retires it.
    pub async fn refresh(&self, prefix: TokenPrefix, token: &str) -> ApiResult<TokenPair> {
        let claims = self
            .tokens
            .verify_with_prefix(prefix, token, TokenClass::Refresh)?;

        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(ApiError::Unauthorized(
                "Token has been revoked, please log in again".to_string(),
            ));
        }

        let user = self
            .directory
            .find_by_email(&claims.email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        self.mint_pair(&user)
    }

    /// Change the password and retire the current access token
    pub async fn update_password(
        &self,
        user: &User,
        claims: &Claims,
        old_password: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        if !self.hasher.verify(old_password, &user.password_hash)? {
            return Err(ApiError::Unauthorized("Invalid old password".to_string()));
        }

        let password_hash = self.hasher.hash(new_password)?;
        self.directory.update_password(&user.id, &password_hash).await?;

        self.revocations
            .revoke(&claims.jti, exp_to_datetime(claims.exp)?)
            .await?;

        tracing::info!("Password updated for {}", user.id);
        Ok(())
    }

    /// Stage a hashed reset code and queue the email
    pub async fn forget_password(&self, email: &str) -> ApiResult<()> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let otp = generate_otp(RESET_OTP_LEN);
        let otp_hash = self.hasher.hash(&otp)?;
        self.directory.set_reset_otp(&user.id, &otp_hash).await?;

        self.outbox.enqueue(EmailJob::PasswordReset {
            to: user.email.clone(),
            name: user.name.clone(),
            otp,
        });

        Ok(())
    }

    /// Complete the reset path with email + code + new password
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        let user = self
            .directory
            .find_reset_pending(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let otp_hash = user
            .reset_otp_hash
            .as_deref()
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        if !self.hasher.verify(otp, otp_hash)? {
            return Err(ApiError::Validation("Invalid OTP".to_string()));
        }

        let password_hash = self.hasher.hash(new_password)?;
        self.directory.reset_password(&user.id, &password_hash).await?;

        tracing::info!("Password reset for {}", user.id);
        Ok(())
    }

    /// Soft-delete an account. Freezing someone else requires the admin
    /// role; self-freeze passes no id.
    pub async fn freeze(&self, actor: &User, target_id: Option<&str>) -> ApiResult<()> {
        if target_id.is_some() && actor.role != Role::Admin {
            return Err(ApiError::Forbidden(
                "You are not authorized to freeze this profile".to_string(),
            ));
        }

        let id = target_id.unwrap_or(&actor.id);
        let frozen = self.directory.freeze(id, &actor.id).await?;

        if !frozen {
            return Err(ApiError::NotFound(
                "Profile not found or already frozen".to_string(),
            ));
        }

        tracing::info!("Profile {} frozen by {}", id, actor.id);
        Ok(())
    }

    /// Structural inverse of freeze
    pub async fn unfreeze(&self, actor: &User, target_id: Option<&str>) -> ApiResult<()> {
        if target_id.is_some() && actor.role != Role::Admin {
            return Err(ApiError::Forbidden(
                "You are not authorized to unfreeze this profile".to_string(),
            ));
        }

        let id = target_id.unwrap_or(&actor.id);
        let unfrozen = self.directory.unfreeze(id).await?;

        if !unfrozen {
            return Err(ApiError::NotFound(
                "Profile not found or not frozen".to_string(),
            ));
        }

        tracing::info!("Profile {} unfrozen by {}", id, actor.id);
        Ok(())
    }

    /// Decrypt the owner's phone number for their profile view
    pub fn decrypt_phone(&self, user: &User) -> ApiResult<Option<String>> {
        match &user.phone_enc {
            Some(enc) => Ok(Some(self.cipher.decrypt(enc)?)),
            None => Ok(None),
        }
    }

    /// Public profile projection; frozen accounts are hidden
    pub async fn public_profile(&self, id: &str) -> ApiResult<PublicProfile> {
        let user = self
            .directory
            .find_by_id(id)
            .await?
            .filter(|u| !u.deleted)
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(PublicProfile::from(&user))
    }

    /// Update name/phone/email; a changed email re-enters the unconfirmed
    /// state and triggers a fresh confirmation email
    pub async fn update_profile(
        &self,
        user: &User,
        req: UpdateProfileRequest,
    ) -> ApiResult<UserView> {
        let phone_enc = match &req.phone {
            Some(phone) => Some(self.cipher.encrypt(phone)?),
            None => None,
        };

        self.directory
            .update_profile(&user.id, req.name.as_deref(), phone_enc.as_deref())
            .await?;

        if let Some(email) = req.email {
            if email != user.email {
                if self.directory.email_taken(&email).await? {
                    return Err(ApiError::Conflict("Email already exists".to_string()));
                }

                let otp = generate_otp(CONFIRM_OTP_LEN);
                let expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECS);
                self.directory
                    .change_email(&user.id, &email, &otp, expires_at)
                    .await?;

                let link_token = self.tokens.issue_confirm_link(&email)?;
                self.outbox.enqueue(EmailJob::Confirmation {
                    to: email,
                    name: req.name.unwrap_or_else(|| user.name.clone()),
                    otp,
                    confirm_link: self.confirm_link_for(&link_token),
                });
            }
        }

        let updated = self
            .directory
            .find_by_id(&user.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(UserView::from(&updated))
    }

    /// Replace the external profile-image handle
    pub async fn update_profile_image(
        &self,
        user: &User,
        url: &str,
        image_id: &str,
    ) -> ApiResult<()> {
        self.directory.update_profile_image(&user.id, url, image_id).await
    }

    /// Diagnostic snapshot of both throttle sub-states
    pub async fn account_status(&self, email: &str) -> ApiResult<AccountStatus> {
        let user = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let now = Utc::now();

        Ok(AccountStatus {
            email: user.email.clone(),
            confirmed: user.confirmed,
            is_deleted: user.deleted,
            email_verification: VerificationStatus {
                attempts: user.otp_attempts,
                is_banned: user
                    .otp_ban_expires_at
                    .map(|t| t > now)
                    .unwrap_or(false),
                ban_expires_at: user.otp_ban_expires_at,
                has_active_otp: user.otp_code.is_some()
                    && user.otp_expires_at.map(|t| t > now).unwrap_or(false),
                otp_expires_at: user.otp_expires_at,
            },
            login: ThrottleStatus {
                attempts: user.login_attempts,
                is_banned: user
                    .login_ban_expires_at
                    .map(|t| t > now)
                    .unwrap_or(false),
                ban_expires_at: user.login_ban_expires_at,
            },
        })
    }

    fn mint_pair(&self, user: &User) -> ApiResult<TokenPair> {
        let (access_token, _) = self.tokens.mint(user, TokenClass::Access)?;
        let (refresh_token, _) = self.tokens.mint(user, TokenClass::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

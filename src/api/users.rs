/// User and auth endpoints
use crate::{
    account::{
        ConfirmOtpRequest, ForgetPasswordRequest, GoogleSignInRequest, ResendOtpRequest,
        ResetPasswordRequest, SignInRequest, SignUpRequest, UpdatePasswordRequest,
        UpdateProfileRequest,
    },
    api::middleware::{AdminUser, AuthUser},
    context::AppContext,
    error::{ApiError, ApiResult},
    token::parse_auth_header,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use validator::Validate;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/users/signup", post(sign_up))
        .route("/users/signin", post(sign_in))
        .route("/users/signin/google", post(sign_in_with_google))
        .route("/users/confirm-email/:token", get(confirm_email_link))
        .route("/users/confirm-otp", post(confirm_otp))
        .route("/users/resend-otp", post(resend_otp))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/logout", post(logout))
        .route("/users/password", patch(update_password))
        .route("/users/forget-password", post(forget_password))
        .route("/users/reset-password", post(reset_password))
        .route("/users/freeze", delete(freeze_self))
        .route("/users/freeze/:id", delete(freeze_other))
        .route("/users/unfreeze", patch(unfreeze_self))
        .route("/users/unfreeze/:id", patch(unfreeze_other))
        .route("/users/profile", get(get_profile).patch(update_profile))
        .route("/users/profile/:id", get(get_public_profile))
        .route("/users/profile-image", patch(update_profile_image))
        .route("/users/status/:email", get(account_status))
}

/// Reject malformed input before any flow runs
fn validated<T: Validate>(req: T) -> ApiResult<T> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(req)
}

/// Sign-up endpoint
async fn sign_up(
    State(ctx): State<AppContext>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let req = validated(req)?;
    let user = ctx.flows.sign_up(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully. Please check your email for the verification code.",
            "user": user,
        })),
    ))
}

/// Password sign-in endpoint
async fn sign_in(
    State(ctx): State<AppContext>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    let (pair, user) = ctx.flows.sign_in(&req.email, &req.password).await?;

    Ok(Json(json!({
        "message": "User signed in successfully",
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "user": user,
    })))
}

/// Google sign-in endpoint
async fn sign_in_with_google(
    State(ctx): State<AppContext>,
    Json(req): Json<GoogleSignInRequest>,
) -> ApiResult<Json<Value>> {
    let (pair, user) = ctx.flows.sign_in_with_google(&req.id_token).await?;

    Ok(Json(json!({
        "message": "User signed in successfully",
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "user": user,
    })))
}

/// Confirmation-link endpoint, hit from the emailed URL
async fn confirm_email_link(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    ctx.flows.confirm_link(&token).await?;

    Ok(Json(json!({ "message": "Email confirmed successfully" })))
}

/// OTP confirmation endpoint
async fn confirm_otp(
    State(ctx): State<AppContext>,
    Json(req): Json<ConfirmOtpRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    let user = ctx.flows.confirm_otp(&req.email, &req.otp).await?;

    Ok(Json(json!({
        "message": "Email verified successfully",
        "user": user,
    })))
}

/// OTP resend endpoint
async fn resend_otp(
    State(ctx): State<AppContext>,
    Json(req): Json<ResendOtpRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    let expires_at = ctx.flows.resend_otp(&req.email).await?;

    Ok(Json(json!({
        "message": "New verification code sent to your email",
        "expiresAt": expires_at,
    })))
}

/// Token refresh endpoint; the refresh token travels in the Authorization
/// header under the same prefix convention as access tokens
async fn refresh_token(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let (prefix, token) = parse_auth_header(header)?;
    let pair = ctx.flows.refresh(prefix, token).await?;

    Ok(Json(json!({
        "message": "Token refreshed successfully",
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
    })))
}

/// Logout endpoint: revokes the presented access token
async fn logout(State(ctx): State<AppContext>, auth: AuthUser) -> ApiResult<Json<Value>> {
    ctx.flows.logout(&auth.claims).await?;

    Ok(Json(json!({ "message": "Logout successful" })))
}

/// Password change endpoint (authenticated)
async fn update_password(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    ctx.flows
        .update_password(&auth.user, &auth.claims, &req.old_password, &req.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// Start of the password reset path
async fn forget_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ForgetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    ctx.flows.forget_password(&req.email).await?;

    Ok(Json(json!({ "message": "Reset code sent to your email" })))
}

/// Completion of the password reset path
async fn reset_password(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    ctx.flows
        .reset_password(&req.email, &req.otp, &req.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password reset successfully" })))
}

/// Self-freeze endpoint
async fn freeze_self(State(ctx): State<AppContext>, auth: AuthUser) -> ApiResult<Json<Value>> {
    ctx.flows.freeze(&auth.user, None).await?;

    Ok(Json(json!({ "message": "Profile frozen successfully" })))
}

/// Admin freeze of another account
async fn freeze_other(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ctx.flows.freeze(&auth.user, Some(&id)).await?;

    Ok(Json(json!({ "message": "Profile frozen successfully" })))
}

/// Self-unfreeze endpoint
async fn unfreeze_self(State(ctx): State<AppContext>, auth: AuthUser) -> ApiResult<Json<Value>> {
    ctx.flows.unfreeze(&auth.user, None).await?;

    Ok(Json(json!({ "message": "Profile unfrozen successfully" })))
}

/// Admin unfreeze of another account
async fn unfreeze_other(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ctx.flows.unfreeze(&auth.user, Some(&id)).await?;

    Ok(Json(json!({ "message": "Profile unfrozen successfully" })))
}

/// Owner profile view with the phone number decrypted
async fn get_profile(State(ctx): State<AppContext>, auth: AuthUser) -> ApiResult<Json<Value>> {
    let phone = ctx.flows.decrypt_phone(&auth.user)?;

    Ok(Json(json!({
        "user": {
            "id": auth.user.id,
            "name": auth.user.name,
            "email": auth.user.email,
            "phone": phone,
            "role": auth.user.role,
            "confirmed": auth.user.confirmed,
            "profileImageUrl": auth.user.profile_image_url,
        }
    })))
}

/// Profile update endpoint
async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Value>> {
    let req = validated(req)?;
    let user = ctx.flows.update_profile(&auth.user, req).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}

/// Public profile endpoint: no credentials, no PII
async fn get_public_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let profile = ctx.flows.public_profile(&id).await?;

    Ok(Json(json!({ "user": profile })))
}

/// Profile image handle replacement; the upload itself happens at the
/// object-storage collaborator
#[derive(serde::Deserialize)]
struct UpdateProfileImageRequest {
    url: String,
    public_id: String,
}

async fn update_profile_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileImageRequest>,
) -> ApiResult<Json<Value>> {
    ctx.flows
        .update_profile_image(&auth.user, &req.url, &req.public_id)
        .await?;

    Ok(Json(json!({ "message": "Profile image updated successfully" })))
}

/// Diagnostic account-status endpoint (admin only)
async fn account_status(
    State(ctx): State<AppContext>,
    AdminUser(_admin): AdminUser,
    Path(email): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = ctx.flows.account_status(&email).await?;

    Ok(Json(json!({
        "message": "Account status retrieved successfully",
        "status": status,
    })))
}

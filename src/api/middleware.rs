/// Authentication extractors
///
/// An authenticated request carries `Authorization: <prefix> <token>` where
/// the prefix declares the key family (`Bearer` for user, `admin` for
/// admin). Verification checks the signature, the role-vs-prefix agreement,
/// the revocation list, and the account's confirmation/freeze state.
use crate::{
    context::AppContext,
    db::models::{Role, User},
    error::{ApiError, ApiResult},
    token::{parse_auth_header, Claims, TokenClass},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

/// Authenticated account plus the claims of the token that proved it
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

/// Resolve and vet the account behind an Authorization header
pub async fn authenticate(ctx: &AppContext, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let (prefix, token) = parse_auth_header(header)?;
    let claims = ctx
        .tokens
        .verify_with_prefix(prefix, token, TokenClass::Access)?;

    if ctx.revocations.is_revoked(&claims.jti).await? {
        return Err(ApiError::Unauthorized(
            "Token has been revoked, please log in again".to_string(),
        ));
    }

    let user = ctx
        .directory
        .find_by_email(&claims.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !user.confirmed || user.deleted {
        return Err(ApiError::NotFound("Account is unavailable".to_string()));
    }

    Ok(AuthUser { user, claims })
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await
    }
}

/// Authenticated account holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = authenticate(state, &parts.headers).await?;

        if auth.user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }

        Ok(AdminUser(auth))
    }
}

/// Signed identity tokens
///
/// Four distinct signing secrets exist: (user, admin) x (access, refresh).
/// The secret is resolved from the account role and the token class, never
/// from the client-supplied header prefix alone; after verification the
/// decoded role claim must also match the prefix that was used.
pub mod revocation;

use crate::{
    config::AuthConfig,
    db::models::{Role, User},
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access tokens are short-lived; refresh tokens live up to a year and are
/// only accepted by the refresh endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Access,
    Refresh,
}

/// Transport prefix from the Authorization header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPrefix {
    /// `Bearer <token>` - user-keyed tokens
    Bearer,
    /// `admin <token>` - admin-keyed tokens
    Admin,
}

impl TokenPrefix {
    pub fn role(&self) -> Role {
        match self {
            TokenPrefix::Bearer => Role::User,
            TokenPrefix::Admin => Role::Admin,
        }
    }
}

/// Split an Authorization header into its prefix and token parts
///
/// An unrecognized prefix fails before any verification is attempted.
pub fn parse_auth_header(header: &str) -> ApiResult<(TokenPrefix, &str)> {
    let mut parts = header.splitn(2, ' ');
    let prefix = parts.next().unwrap_or_default();
    let token = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Malformed authorization header".to_string()))?;

    match prefix {
        "Bearer" => Ok((TokenPrefix::Bearer, token)),
        "admin" => Ok((TokenPrefix::Admin, token)),
        _ => Err(ApiError::InvalidTokenPrefix),
    }
}

/// Claims embedded in identity tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Unique token id, the revocation key
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims for the emailed confirmation-link token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkClaims {
    pub email: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Confirmation links stay valid for one hour
const CONFIRM_LINK_TTL_SECS: i64 = 3600;

/// Issues and verifies signed, expiring identity tokens
#[derive(Clone)]
pub struct TokenService {
    config: AuthConfig,
}

impl TokenService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn secret(&self, role: Role, class: TokenClass) -> &str {
        match (role, class) {
            (Role::User, TokenClass::Access) => &self.config.user_access_secret,
            (Role::User, TokenClass::Refresh) => &self.config.user_refresh_secret,
            (Role::Admin, TokenClass::Access) => &self.config.admin_access_secret,
            (Role::Admin, TokenClass::Refresh) => &self.config.admin_refresh_secret,
        }
    }

    fn ttl(&self, class: TokenClass) -> i64 {
        match class {
            TokenClass::Access => self.config.access_ttl_secs,
            TokenClass::Refresh => self.config.refresh_ttl_secs,
        }
    }

    /// Issue a token for a user, keyed by their role and the token class
    pub fn issue(&self, user: &User, class: TokenClass) -> ApiResult<Claims> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.ttl(class),
        };

        Ok(claims)
    }

    /// Sign previously built claims
    pub fn sign(&self, claims: &Claims, class: TokenClass) -> ApiResult<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret(claims.role, class).as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Issue and sign in one step, returning the wire token and its claims
    pub fn mint(&self, user: &User, class: TokenClass) -> ApiResult<(String, Claims)> {
        let claims = self.issue(user, class)?;
        let token = self.sign(&claims, class)?;
        Ok((token, claims))
    }

    /// Verify a token against the key for `(role, class)`
    pub fn verify(&self, token: &str, role: Role, class: TokenClass) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(role, class).as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::Unauthorized("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::Unauthorized("Invalid token signature".to_string())
            }
            _ => ApiError::Unauthorized(format!("Invalid token: {}", e)),
        })?;

        Ok(data.claims)
    }

    /// Verify a token whose key was selected by the transport prefix
    ///
    /// The decoded role claim must match the prefix the client declared;
    /// a user token presented under the `admin` prefix is rejected even if
    /// its signature happens to check out.
    pub fn verify_with_prefix(
        &self,
        prefix: TokenPrefix,
        token: &str,
        class: TokenClass,
    ) -> ApiResult<Claims> {
        let claims = self.verify(token, prefix.role(), class)?;

        if claims.role != prefix.role() {
            return Err(ApiError::Unauthorized(
                "Token role does not match authorization prefix".to_string(),
            ));
        }

        Ok(claims)
    }

    /// Issue the signed token embedded in confirmation-link emails
    pub fn issue_confirm_link(&self, email: &str) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = LinkClaims {
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + CONFIRM_LINK_TTL_SECS,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.user_access_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to sign link token: {}", e)))
    }

    /// Verify a confirmation-link token and return the embedded email
    pub fn verify_confirm_link(&self, token: &str) -> ApiResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<LinkClaims>(
            token,
            &DecodingKey::from_secret(self.config.user_access_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::Unauthorized("Confirmation link has expired".to_string())
            }
            _ => ApiError::Unauthorized(format!("Invalid confirmation link: {}", e)),
        })?;

        Ok(data.claims.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Provider;
    use chrono::Utc;

    fn test_config() -> AuthConfig {
        AuthConfig {
            user_access_secret: "user-access-secret-0123456789abcdef".to_string(),
            user_refresh_secret: "user-refresh-secret-0123456789abcdef".to_string(),
            admin_access_secret: "admin-access-secret-0123456789abcdef".to_string(),
            admin_refresh_secret: "admin-refresh-secret-0123456789abcdef".to_string(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 86400,
        }
    }

    fn test_user(role: Role) -> User {
        User {
            id: "u-1".to_string(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            password_hash: String::new(),
            phone_enc: None,
            role,
            provider: Provider::Local,
            confirmed: true,
            otp_code: None,
            otp_expires_at: None,
            otp_attempts: 0,
            otp_ban_expires_at: None,
            login_attempts: 0,
            login_ban_expires_at: None,
            reset_otp_hash: None,
            deleted: false,
            deleted_by: None,
            version: 0,
            profile_image_url: None,
            profile_image_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_auth_header() {
        let (prefix, token) = parse_auth_header("Bearer abc.def.ghi").unwrap();
        assert_eq!(prefix, TokenPrefix::Bearer);
        assert_eq!(token, "abc.def.ghi");

        let (prefix, _) = parse_auth_header("admin abc.def.ghi").unwrap();
        assert_eq!(prefix, TokenPrefix::Admin);

        assert!(matches!(
            parse_auth_header("Basic abc"),
            Err(ApiError::InvalidTokenPrefix)
        ));
        assert!(parse_auth_header("Bearer").is_err());
    }

    #[test]
    fn test_round_trip() {
        let svc = TokenService::new(test_config());
        let user = test_user(Role::User);

        let (token, claims) = svc.mint(&user, TokenClass::Access).unwrap();
        let decoded = svc.verify(&token, Role::User, TokenClass::Access).unwrap();

        assert_eq!(decoded.sub, user.id);
        assert_eq!(decoded.email, user.email);
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.exp, claims.iat + 3600);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let svc = TokenService::new(test_config());
        let user = test_user(Role::User);

        let (token, _) = svc.mint(&user, TokenClass::Access).unwrap();

        // Refresh key does not verify an access token
        assert!(svc.verify(&token, Role::User, TokenClass::Refresh).is_err());
        // Admin key does not verify a user token
        assert!(svc.verify(&token, Role::Admin, TokenClass::Access).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = test_config();
        config.access_ttl_secs = -10;
        let svc = TokenService::new(config);
        let user = test_user(Role::User);

        let (token, _) = svc.mint(&user, TokenClass::Access).unwrap();
        let err = svc
            .verify(&token, Role::User, TokenClass::Access)
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_jti_unique_per_token() {
        let svc = TokenService::new(test_config());
        let user = test_user(Role::User);

        let (_, a) = svc.mint(&user, TokenClass::Access).unwrap();
        let (_, b) = svc.mint(&user, TokenClass::Access).unwrap();

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_prefix_role_mismatch_rejected() {
        // Sign an admin-role claims set with the USER access key, then
        // present it under the Bearer prefix: the signature verifies but the
        // role claim disagrees with the prefix.
        let svc = TokenService::new(test_config());
        let mut claims = svc.issue(&test_user(Role::User), TokenClass::Access).unwrap();
        claims.role = Role::Admin;

        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(test_config().user_access_secret.as_bytes()),
        )
        .unwrap();

        let err = svc
            .verify_with_prefix(TokenPrefix::Bearer, &forged, TokenClass::Access)
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_confirm_link_round_trip() {
        let svc = TokenService::new(test_config());
        let token = svc.issue_confirm_link("a@example.com").unwrap();

        assert_eq!(svc.verify_confirm_link(&token).unwrap(), "a@example.com");
    }
}

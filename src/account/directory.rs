/// Persisted user records
///
/// Every user-table statement in the crate lives here; flows go through
/// these operations and never touch SQL. Runtime query building keeps the
/// crate compilable without a live DATABASE_URL.
use crate::{
    db::models::{Provider, Role, User},
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, password_hash, phone_enc, role, provider, confirmed, \
     otp_code, otp_expires_at, otp_attempts, otp_ban_expires_at, \
     login_attempts, login_ban_expires_at, reset_otp_hash, \
     deleted, deleted_by, version, profile_image_url, profile_image_id, created_at";

/// Fields needed to create an account
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub phone_enc: Option<String>,
    pub role: Role,
    pub provider: Provider,
    pub confirmed: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub profile_image_url: Option<String>,
    pub profile_image_id: Option<String>,
}

#[derive(Clone)]
pub struct AccountDirectory {
    db: SqlitePool,
}

impl AccountDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new account and return the stored record
    pub async fn create(&self, new: NewUser) -> ApiResult<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            phone_enc: new.phone_enc,
            role: new.role,
            provider: new.provider,
            confirmed: new.confirmed,
            otp_code: new.otp_code,
            otp_expires_at: new.otp_expires_at,
            otp_attempts: 0,
            otp_ban_expires_at: None,
            login_attempts: 0,
            login_ban_expires_at: None,
            reset_otp_hash: None,
            deleted: false,
            deleted_by: None,
            version: 0,
            profile_image_url: new.profile_image_url,
            profile_image_id: new.profile_image_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO user (id, email, name, password_hash, phone_enc, role, provider, \
             confirmed, otp_code, otp_expires_at, otp_attempts, otp_ban_expires_at, \
             login_attempts, login_ban_expires_at, reset_otp_hash, deleted, deleted_by, \
             version, profile_image_url, profile_image_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.phone_enc)
        .bind(user.role)
        .bind(user.provider)
        .bind(user.confirmed)
        .bind(&user.otp_code)
        .bind(user.otp_expires_at)
        .bind(user.otp_attempts)
        .bind(user.otp_ban_expires_at)
        .bind(user.login_attempts)
        .bind(user.login_ban_expires_at)
        .bind(&user.reset_otp_hash)
        .bind(user.deleted)
        .bind(&user.deleted_by)
        .bind(user.version)
        .bind(&user.profile_image_url)
        .bind(&user.profile_image_id)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(user)
    }

    /// Look up by id
    pub async fn find_by_id(&self, id: &str) -> ApiResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)
    }

    /// Look up by email, regardless of confirmation or freeze state
    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)
    }

    /// Look up an account still waiting on email confirmation
    pub async fn find_unconfirmed_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1 AND confirmed = FALSE");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)
    }

    /// Look up an account with a pending password reset
    pub async fn find_reset_pending(&self, email: &str) -> ApiResult<Option<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1 AND reset_otp_hash IS NOT NULL");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(ApiError::Database)
    }

    /// Application-level uniqueness check among non-deleted accounts
    pub async fn email_taken(&self, email: &str) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE email = ?1 AND deleted = FALSE")
                .bind(email)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

        Ok(count > 0)
    }

    /// Store a fresh confirmation OTP; the old one (if any) is replaced
    pub async fn set_otp(
        &self,
        id: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE user SET otp_code = ?1, otp_expires_at = ?2 WHERE id = ?3")
            .bind(code)
            .bind(expires_at)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Clear an expired code; code and expiry always move together
    pub async fn clear_otp(&self, id: &str) -> ApiResult<()> {
        sqlx::query("UPDATE user SET otp_code = NULL, otp_expires_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Persist a failed confirmation attempt and any resulting ban
    pub async fn record_otp_failure(
        &self,
        id: &str,
        attempts: i64,
        ban_expires_at: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE user SET otp_attempts = ?1, otp_ban_expires_at = ?2 WHERE id = ?3")
            .bind(attempts)
            .bind(ban_expires_at)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Mark the email confirmed and clear the whole OTP sub-state in one
    /// statement
    pub async fn confirm(&self, id: &str) -> ApiResult<()> {
        sqlx::query(
            "UPDATE user SET confirmed = TRUE, otp_code = NULL, otp_expires_at = NULL, \
             otp_attempts = 0, otp_ban_expires_at = NULL WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Persist a failed sign-in attempt and any resulting ban
    pub async fn record_login_failure(
        &self,
        id: &str,
        attempts: i64,
        ban_expires_at: Option<DateTime<Utc>>,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE user SET login_attempts = ?1, login_ban_expires_at = ?2 WHERE id = ?3")
            .bind(attempts)
            .bind(ban_expires_at)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Successful sign-in resets the throttle
    pub async fn reset_login_throttle(&self, id: &str) -> ApiResult<()> {
        sqlx::query("UPDATE user SET login_attempts = 0, login_ban_expires_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Store a new password hash
    pub async fn update_password(&self, id: &str, password_hash: &str) -> ApiResult<()> {
        sqlx::query("UPDATE user SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Stage a hashed reset OTP; its presence gates the reset path
    pub async fn set_reset_otp(&self, id: &str, otp_hash: &str) -> ApiResult<()> {
        sqlx::query("UPDATE user SET reset_otp_hash = ?1 WHERE id = ?2")
            .bind(otp_hash)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Complete a reset: new password in, staged OTP out, one statement
    pub async fn reset_password(&self, id: &str, password_hash: &str) -> ApiResult<()> {
        sqlx::query("UPDATE user SET password_hash = ?1, reset_otp_hash = NULL WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Soft-delete, guarded against double application. Returns false when
    /// the account was missing or already frozen.
    pub async fn freeze(&self, id: &str, frozen_by: &str) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE user SET deleted = TRUE, deleted_by = ?1, version = version + 1 \
             WHERE id = ?2 AND deleted = FALSE",
        )
        .bind(frozen_by)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Structural inverse of freeze, guarded on being currently frozen
    pub async fn unfreeze(&self, id: &str) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE user SET deleted = FALSE, deleted_by = NULL, version = version + 1 \
             WHERE id = ?1 AND deleted = TRUE",
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Update display name and/or encrypted phone
    pub async fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        phone_enc: Option<&str>,
    ) -> ApiResult<()> {
        if let Some(name) = name {
            sqlx::query("UPDATE user SET name = ?1 WHERE id = ?2")
                .bind(name)
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
        }

        if let Some(phone_enc) = phone_enc {
            sqlx::query("UPDATE user SET phone_enc = ?1 WHERE id = ?2")
                .bind(phone_enc)
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
        }

        Ok(())
    }

    /// Move the account to a new address: back to unconfirmed, fresh OTP
    pub async fn change_email(
        &self,
        id: &str,
        email: &str,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        sqlx::query(
            "UPDATE user SET email = ?1, confirmed = FALSE, otp_code = ?2, otp_expires_at = ?3, \
             otp_attempts = 0, otp_ban_expires_at = NULL WHERE id = ?4",
        )
        .bind(email)
        .bind(otp_code)
        .bind(otp_expires_at)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Replace the external profile-image handle
    pub async fn update_profile_image(
        &self,
        id: &str,
        url: &str,
        image_id: &str,
    ) -> ApiResult<()> {
        sqlx::query("UPDATE user SET profile_image_url = ?1, profile_image_id = ?2 WHERE id = ?3")
            .bind(url)
            .bind(image_id)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Sample".to_string(),
            password_hash: "$argon2id$fake".to_string(),
            phone_enc: None,
            role: Role::User,
            provider: Provider::Local,
            confirmed: false,
            otp_code: Some("123456".to_string()),
            otp_expires_at: Some(Utc::now() + chrono::Duration::minutes(5)),
            profile_image_url: Some("https://img.example/a.png".to_string()),
            profile_image_id: Some("img-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let created = dir.create(sample_user("a@example.com")).await.unwrap();

        let by_email = dir.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(!by_email.confirmed);
        assert_eq!(by_email.otp_code.as_deref(), Some("123456"));

        let by_id = dir.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_email_taken_ignores_frozen_accounts() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let user = dir.create(sample_user("a@example.com")).await.unwrap();

        assert!(dir.email_taken("a@example.com").await.unwrap());

        assert!(dir.freeze(&user.id, &user.id).await.unwrap());
        assert!(!dir.email_taken("a@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_confirm_clears_all_otp_state() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let user = dir.create(sample_user("a@example.com")).await.unwrap();

        dir.record_otp_failure(&user.id, 3, None).await.unwrap();
        dir.confirm(&user.id).await.unwrap();

        let user = dir.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(user.confirmed);
        assert!(user.otp_code.is_none());
        assert!(user.otp_expires_at.is_none());
        assert_eq!(user.otp_attempts, 0);
        assert!(user.otp_ban_expires_at.is_none());

        assert!(dir
            .find_unconfirmed_by_email("a@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_freeze_is_guarded_and_bumps_version() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let user = dir.create(sample_user("a@example.com")).await.unwrap();

        assert!(dir.freeze(&user.id, "admin-1").await.unwrap());
        // Second freeze matches no rows
        assert!(!dir.freeze(&user.id, "admin-1").await.unwrap());

        let frozen = dir.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(frozen.deleted);
        assert_eq!(frozen.deleted_by.as_deref(), Some("admin-1"));
        assert_eq!(frozen.version, 1);

        assert!(dir.unfreeze(&user.id).await.unwrap());
        assert!(!dir.unfreeze(&user.id).await.unwrap());

        let thawed = dir.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(!thawed.deleted);
        assert!(thawed.deleted_by.is_none());
        assert_eq!(thawed.version, 2);
    }

    #[tokio::test]
    async fn test_reset_password_unsets_staged_otp() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let user = dir.create(sample_user("a@example.com")).await.unwrap();

        dir.set_reset_otp(&user.id, "$argon2id$otp").await.unwrap();
        assert!(dir
            .find_reset_pending("a@example.com")
            .await
            .unwrap()
            .is_some());

        dir.reset_password(&user.id, "$argon2id$new").await.unwrap();
        assert!(dir
            .find_reset_pending("a@example.com")
            .await
            .unwrap()
            .is_none());

        let user = dir.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "$argon2id$new");
    }

    #[tokio::test]
    async fn test_change_email_reenters_unconfirmed_state() {
        let dir = AccountDirectory::new(crate::db::test_pool().await);
        let user = dir.create(sample_user("a@example.com")).await.unwrap();
        dir.confirm(&user.id).await.unwrap();

        let expires = Utc::now() + chrono::Duration::minutes(5);
        dir.change_email(&user.id, "b@example.com", "654321", expires)
            .await
            .unwrap();

        let user = dir.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.email, "b@example.com");
        assert!(!user.confirmed);
        assert_eq!(user.otp_code.as_deref(), Some("654321"));
    }
}

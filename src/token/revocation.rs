/// Revoked token store
///
/// Holds the jti of every token invalidated by logout or a password change,
/// together with the token's original expiry so the hourly sweep can drop
/// entries no verifier would accept anyway.
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct RevocationStore {
    db: SqlitePool,
}

impl RevocationStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record a revoked jti. Idempotent: revoking the same id twice is a
    /// no-op.
    pub async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO revoked_token (token_id, expires_at, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(())
    }

    /// Point lookup used on every authenticated request and on refresh
    pub async fn is_revoked(&self, token_id: &str) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM revoked_token WHERE token_id = ?1")
                .bind(token_id)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

        Ok(count > 0)
    }

    /// Delete every record whose original expiry has passed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_token WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_revoke_and_lookup() {
        let store = RevocationStore::new(crate::db::test_pool().await);
        let exp = Utc::now() + Duration::hours(1);

        assert!(!store.is_revoked("jti-1").await.unwrap());
        store.revoke("jti-1", exp).await.unwrap();
        assert!(store.is_revoked("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = RevocationStore::new(crate::db::test_pool().await);
        let exp = Utc::now() + Duration::hours(1);

        store.revoke("jti-1", exp).await.unwrap();
        store.revoke("jti-1", exp).await.unwrap();

        assert!(store.is_revoked("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = RevocationStore::new(crate::db::test_pool().await);
        let now = Utc::now();

        store.revoke("old", now - Duration::hours(2)).await.unwrap();
        store.revoke("fresh", now + Duration::hours(2)).await.unwrap();

        let removed = store.sweep_expired(now).await.unwrap();
        assert_eq!(removed, 1);

        // The swept id reverts to unrevoked; the live one stays
        assert!(!store.is_revoked("old").await.unwrap());
        assert!(store.is_revoked("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_on_empty_store() {
        let store = RevocationStore::new(crate::db::test_pool().await);
        assert_eq!(store.sweep_expired(Utc::now()).await.unwrap(), 0);
    }
}

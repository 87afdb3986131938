/// Background task implementations
use crate::{context::AppContext, error::ApiResult};
use chrono::Utc;

/// Delete revoked-token records whose original expiry has passed
pub async fn sweep_revoked_tokens(ctx: &AppContext) -> ApiResult<u64> {
    ctx.revocations.sweep_expired(Utc::now()).await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> ApiResult<()> {
    sqlx::query("SELECT 1")
        .fetch_one(&ctx.db)
        .await?;

    Ok(())
}

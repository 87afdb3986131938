/// murmur - anonymous messaging backend
///
/// Credential lifecycle core: sign-up with OTP email confirmation, throttled
/// sign-in, token issuance/refresh/revocation, and account freeze/unfreeze.

mod account;
mod api;
mod config;
mod context;
mod crypto;
mod db;
mod error;
mod guard;
mod identity;
mod jobs;
mod mailer;
mod rate_limit;
mod server;
mod token;

use config::ServerConfig;
use context::AppContext;
use error::ApiResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

/// Application context and dependency injection
use crate::{
    account::{AccountDirectory, AuthFlows},
    config::ServerConfig,
    crypto::{PasswordHasher, PhoneCipher},
    db,
    error::ApiResult,
    identity::GoogleVerifier,
    mailer::{EmailOutbox, Mailer},
    rate_limit::{RateLimitConfig, RateLimiter},
    token::{revocation::RevocationStore, TokenService},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub directory: AccountDirectory,
    pub tokens: TokenService,
    pub revocations: RevocationStore,
    pub flows: AuthFlows,
    pub mailer: Arc<Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize database
        let pool = db::create_pool(&config.storage.account_db, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let directory = AccountDirectory::new(pool.clone());
        let tokens = TokenService::new(config.auth.clone());
        let revocations = RevocationStore::new(pool.clone());

        let hasher = PasswordHasher::new(
            config.security.hash_memory_kib,
            config.security.hash_iterations,
        );
        let cipher = PhoneCipher::from_hex_key(&config.security.phone_key_hex)?;

        let mailer = Mailer::new(config.email.clone())?;
        let outbox = EmailOutbox::start(mailer.clone());

        let google = GoogleVerifier::new(config.google.client_id.clone())?;

        let flows = AuthFlows::new(
            directory.clone(),
            tokens.clone(),
            revocations.clone(),
            hasher,
            cipher,
            outbox,
            google,
            config.service.public_url.clone(),
        );

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            directory,
            tokens,
            revocations,
            flows,
            mailer: Arc::new(mailer),
            rate_limiter,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        self.config.service.public_url.clone()
    }
}

//! User Registry
//!
//! Registration records for user accounts:
//! - Field-keyed validation of candidate users, uniqueness checked against storage
//! - Argon2 password hashing and email confirmation / password recovery tokens
//! - In-memory and PostgreSQL storage

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::config::StorageBackend;
use crate::domain::{PasswordPolicy, UserRepository};
use crate::infrastructure::user::{
    Argon2Hasher, InMemoryUserRepository, LogMailer, PostgresUserRepository, SharedUserService,
    TokenGenerator, UserService, UserServiceSettings,
};

/// Create the user service with the default configuration
pub async fn create_user_service() -> anyhow::Result<SharedUserService> {
    create_user_service_with_config(&AppConfig::default()).await
}

/// Create the user service for the configured storage backend
pub async fn create_user_service_with_config(
    config: &AppConfig,
) -> anyhow::Result<SharedUserService> {
    let credentials = &config.credentials;

    let settings = UserServiceSettings {
        password_policy: PasswordPolicy {
            min_length: credentials.password_min_length,
            max_length: credentials.password_max_length,
        },
        confirm_within: credentials
            .confirm_within_hours
            .map(|hours| hours_setting("confirm_within_hours", hours))
            .transpose()?,
        reset_password_within: hours_setting(
            "reset_password_within_hours",
            credentials.reset_password_within_hours,
        )?,
    };

    let mut hasher = Argon2Hasher::with_params(
        credentials.argon2_memory_kib,
        credentials.argon2_iterations,
        credentials.argon2_parallelism,
    )?;
    if let Some(pepper) = &credentials.password_pepper {
        hasher = hasher.with_pepper(pepper.as_bytes());
    }

    if credentials.uses_development_secret() {
        warn!("Using the development token secret; set APP__CREDENTIALS__TOKEN_SECRET");
    }

    let repository = create_repository(config).await?;

    Ok(UserService::new(
        repository,
        Arc::new(hasher),
        Arc::new(LogMailer::new()),
        TokenGenerator::new(credentials.token_secret.as_bytes()),
    )
    .with_settings(settings))
}

/// Convert a configured hour count, rejecting negative and out-of-range values
fn hours_setting(name: &str, hours: i64) -> anyhow::Result<Duration> {
    if hours < 0 {
        anyhow::bail!("credentials.{} must not be negative, got {}", name, hours);
    }

    Duration::try_hours(hours)
        .ok_or_else(|| anyhow::anyhow!("credentials.{} is out of range: {}", name, hours))
}

async fn create_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn UserRepository>> {
    info!("Storage backend: {:?}", config.storage.backend);

    match config.storage.backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryUserRepository::new())),
        StorageBackend::Postgres => {
            let database_url = config.storage.resolve_database_url().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL is required for the postgres storage backend")
            })?;

            info!("Connecting to PostgreSQL...");
            let repository =
                PostgresUserRepository::connect(&database_url, config.storage.max_connections)
                    .await?;
            repository.ensure_schema().await?;
            info!("PostgreSQL connection established");

            Ok(Arc::new(repository))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserCandidate;

    #[tokio::test]
    async fn test_create_user_service_in_memory() {
        let mut config = AppConfig::default();
        config.credentials.argon2_memory_kib = 1024;
        config.credentials.argon2_iterations = 1;
        config.credentials.confirm_within_hours = Some(24);

        let service = create_user_service_with_config(&config).await.unwrap();

        assert_eq!(service.settings().confirm_within, Some(Duration::hours(24)));
        let errors = service
            .validate(
                &UserCandidate::new("A", "B", "test12", "test@test.com", "male"),
                None,
            )
            .await
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_hours_setting() {
        assert_eq!(hours_setting("x", 6).unwrap(), Duration::hours(6));
        assert!(hours_setting("x", 10_000_000_000).is_ok());
        assert!(hours_setting("x", -1).is_err());
        assert!(hours_setting("x", i64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_rejects_invalid_expiry_windows() {
        let mut config = AppConfig::default();
        config.credentials.confirm_within_hours = Some(i64::MAX);
        assert!(create_user_service_with_config(&config).await.is_err());

        let mut config = AppConfig::default();
        config.credentials.reset_password_within_hours = -6;
        assert!(create_user_service_with_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_argon2_params() {
        let mut config = AppConfig::default();
        config.credentials.argon2_memory_kib = 1;

        assert!(create_user_service_with_config(&config).await.is_err());
    }
}

//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CredentialsConfig, LogFormat, LoggingConfig, StorageBackend, StorageConfig,
    DEVELOPMENT_TOKEN_SECRET,
};

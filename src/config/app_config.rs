use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Falls back to the `DATABASE_URL` environment variable
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub password_min_length: usize,
    pub password_max_length: usize,
    /// Unset means confirmation tokens never expire
    pub confirm_within_hours: Option<i64>,
    pub reset_password_within_hours: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
    pub password_pepper: Option<String>,
    /// HMAC key for confirmation and reset token digests
    pub token_secret: String,
}

/// Token key used when none is configured; never fit for production
pub const DEVELOPMENT_TOKEN_SECRET: &str = "development-token-secret";

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: 5,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            password_min_length: 6,
            password_max_length: 128,
            confirm_within_hours: None,
            reset_password_within_hours: 6,
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
            argon2_parallelism: argon2::Params::DEFAULT_P_COST,
            password_pepper: None,
            token_secret: DEVELOPMENT_TOKEN_SECRET.to_string(),
        }
    }
}

impl StorageConfig {
    /// Configured database URL, else `DATABASE_URL`
    pub fn resolve_database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}

impl CredentialsConfig {
    pub fn uses_development_secret(&self) -> bool {
        self.token_secret == DEVELOPMENT_TOKEN_SECRET
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

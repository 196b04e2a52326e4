//! CLI module for the user registry
//!
//! Provides subcommands working against the configured storage backend:
//! - `validate`: report the field errors of a candidate user
//! - `register`: validate, persist and issue a confirmation token

pub mod register;
pub mod validate;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tracing::error;

use crate::config::{AppConfig, LoggingConfig};
use crate::domain::{DomainError, UserCandidate};
use crate::infrastructure::logging;

/// User Registry - validate and register user accounts
#[derive(Parser)]
#[command(name = "user-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the validation errors of a candidate user
    Validate(validate::ValidateArgs),

    /// Register a user; the password is read from stdin
    Register(register::RegisterArgs),
}

/// Exit status for a command that failed with `err`
///
/// Storage and internal failures get 2 and so do configuration errors. Every
/// other failure, such as a rejected candidate or bad credentials, gets 1.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<::config::ConfigError>().is_some() {
        return 2;
    }

    match err.downcast_ref::<DomainError>() {
        Some(domain) if domain.is_infrastructure() => 2,
        _ => 1,
    }
}

/// Load `.env` and the configuration, then install logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();
    init_from(AppConfig::load())
}

fn init_from(loaded: Result<AppConfig, ::config::ConfigError>) -> anyhow::Result<AppConfig> {
    match loaded {
        Ok(config) => {
            logging::init_logging(&config.logging);
            Ok(config)
        }
        Err(e) => {
            // Report through the default subscriber before giving up
            logging::init_logging(&LoggingConfig::default());
            error!(error = %e, "Invalid configuration");
            Err(e.into())
        }
    }
}

fn parse_candidate(json: &str) -> anyhow::Result<UserCandidate> {
    serde_json::from_str(json).context("candidate must be a JSON object")
}

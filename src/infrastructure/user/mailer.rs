//! Delivery of account emails

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::info;

#[cfg(test)]
use mockall::automock;

use crate::domain::user::User;
use crate::domain::DomainError;

/// Sends the emails of the confirmation and recovery flows
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Ask the user to verify ownership of their email address
    async fn send_confirmation_instructions(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), DomainError>;

    /// Send a link for choosing a new password
    async fn send_reset_password_instructions(
        &self,
        user: &User,
        token: &str,
    ) -> Result<(), DomainError>;
}

/// Mailer that only records deliveries in the log
///
/// Tokens are never logged; a deployment wires a real transport instead.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation_instructions(
        &self,
        user: &User,
        _token: &str,
    ) -> Result<(), DomainError> {
        info!(
            user_id = %user.id(),
            email = %user.email(),
            "Confirmation instructions issued"
        );
        Ok(())
    }

    async fn send_reset_password_instructions(
        &self,
        user: &User,
        _token: &str,
    ) -> Result<(), DomainError> {
        info!(
            user_id = %user.id(),
            email = %user.email(),
            "Reset password instructions issued"
        );
        Ok(())
    }
}

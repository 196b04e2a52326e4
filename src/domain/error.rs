use thiserror::Error;

use crate::domain::user::FieldErrors;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Validation failed: {errors}")]
    InvalidRecord { errors: FieldErrors },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_record(errors: FieldErrors) -> Self {
        Self::InvalidRecord { errors }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Field errors carried by a rejected record, if this is one
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::InvalidRecord { errors } => Some(errors),
            _ => None,
        }
    }

    /// Whether the error is caused by the infrastructure rather than the input
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Internal { .. })
    }
}

//! Domain layer - Core business logic and entities

pub mod error;
pub mod user;

pub use error::DomainError;
pub use user::{
    is_blank, normalize_email, validate, validate_password, validate_update, ExistingUsers,
    Field, FieldErrors, Gender, PasswordPolicy, UniqueField, UniquenessSnapshot, User,
    UserCandidate, UserId, UserProfile, UserRepository, Violation,
};

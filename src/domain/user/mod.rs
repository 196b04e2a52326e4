//! User domain
//!
//! This module provides the user entity, the candidate record submitted for
//! registration, the validation rule table and the repository trait.

mod candidate;
mod entity;
mod field_errors;
mod repository;
mod validation;

pub use candidate::{is_blank, normalize_email, UserCandidate};
pub use entity::{Confirmation, Gender, Recovery, UnknownGender, User, UserId, UserProfile};
pub use field_errors::{Field, FieldErrors, Violation};
pub use repository::UserRepository;
pub use validation::{
    validate, validate_password, validate_update, ExistingUsers, PasswordPolicy, UniqueField,
    UniquenessSnapshot, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, USERNAME_MAX_LENGTH,
    USERNAME_MIN_LENGTH,
};

#[cfg(test)]
pub use repository::mock::MockUserRepository;

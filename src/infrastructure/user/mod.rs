//! User infrastructure module
//!
//! Credential subsystem and storage for users: password hashing with Argon2,
//! account tokens, the mailer capability, in-memory and PostgreSQL
//! repositories, and the registration service tying them together.

mod mailer;
mod password;
mod postgres_repository;
mod repository;
mod service;
mod tokens;

pub use mailer::{LogMailer, Mailer};
pub use password::{Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::{
    Registration, RegistrationRequest, SharedUserService, UserService, UserServiceSettings,
};
pub use tokens::{GeneratedToken, TokenGenerator};

#[cfg(test)]
pub use mailer::MockMailer;

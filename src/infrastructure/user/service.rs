//! User service for registration, confirmation and authentication

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::user::{
    is_blank, normalize_email, validate, validate_password, validate_update, FieldErrors,
    PasswordPolicy, UniqueField, UniquenessSnapshot, User, UserCandidate, UserId, UserProfile,
    UserRepository,
};
use crate::domain::DomainError;

use super::mailer::Mailer;
use super::password::{Argon2Hasher, PasswordHasher};
use super::tokens::TokenGenerator;

/// Service wired against whichever storage backend is configured
pub type SharedUserService = UserService<dyn UserRepository, Argon2Hasher>;

/// Tunables of the credential flows
#[derive(Debug, Clone)]
pub struct UserServiceSettings {
    pub password_policy: PasswordPolicy,
    /// How long a confirmation token stays usable; `None` never expires
    pub confirm_within: Option<Duration>,
    pub reset_password_within: Duration,
}

impl Default for UserServiceSettings {
    fn default() -> Self {
        Self {
            password_policy: PasswordPolicy::default(),
            confirm_within: None,
            reset_password_within: Duration::hours(6),
        }
    }
}

/// Request for registering a new user
#[derive(Clone)]
pub struct RegistrationRequest {
    pub candidate: UserCandidate,
    pub password: String,
    pub password_confirmation: Option<String>,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("candidate", &self.candidate)
            .finish_non_exhaustive()
    }
}

/// A persisted registration and the confirmation token sent for it
#[derive(Clone)]
pub struct Registration {
    pub user: User,
    pub confirmation_token: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("user", &self.user)
            .field("confirmation_token", &"<redacted>")
            .finish()
    }
}

/// User service for registration and credential management
#[derive(Debug)]
pub struct UserService<R: UserRepository + ?Sized, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenGenerator,
    settings: UserServiceSettings,
}

impl<R: UserRepository + ?Sized, H: PasswordHasher> UserService<R, H> {
    /// Create a new user service with default settings
    pub fn new(
        repository: Arc<R>,
        hasher: Arc<H>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenGenerator,
    ) -> Self {
        Self {
            repository,
            hasher,
            mailer,
            tokens,
            settings: UserServiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: UserServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &UserServiceSettings {
        &self.settings
    }

    /// Validate a candidate against the stored users
    ///
    /// `exclude` names the user being edited, which never conflicts with
    /// itself. The email is normalized first. Storage failures are returned
    /// as errors rather than as a validation result.
    pub async fn validate(
        &self,
        candidate: &UserCandidate,
        exclude: Option<&UserId>,
    ) -> Result<FieldErrors, DomainError> {
        let candidate = candidate.clone().normalized();
        let snapshot = self.uniqueness(&candidate, exclude).await?;

        Ok(match exclude {
            Some(id) => validate_update(&candidate, &snapshot, id),
            None => validate(&candidate, &snapshot),
        })
    }

    async fn uniqueness(
        &self,
        candidate: &UserCandidate,
        exclude: Option<&UserId>,
    ) -> Result<UniquenessSnapshot, DomainError> {
        let mut snapshot = UniquenessSnapshot::new();

        for field in UniqueField::ALL {
            let value = field.candidate_value(candidate);
            if is_blank(value) {
                continue;
            }
            if self.repository.exists_with(field, value, exclude).await? {
                snapshot.mark_taken(field, value);
            }
        }

        Ok(snapshot)
    }

    /// Register a new, unconfirmed user and send confirmation instructions
    ///
    /// The user is persisted before the mail goes out. When the mailer fails
    /// the error is returned with the user already stored and the token lost;
    /// `resend_confirmation` issues a new one.
    pub async fn register(&self, request: RegistrationRequest) -> Result<Registration, DomainError> {
        let candidate = request.candidate.normalized();

        let mut errors = self.validate(&candidate, None).await?;
        errors.merge(validate_password(
            &request.password,
            request.password_confirmation.as_deref(),
            &self.settings.password_policy,
        ));

        if !errors.is_empty() {
            debug!(username = %candidate.username, errors = %errors, "Registration rejected");
            return Err(DomainError::invalid_record(errors));
        }

        let profile = UserProfile::try_from(&candidate)
            .map_err(|e| DomainError::internal(format!("Validated candidate rejected: {}", e)))?;
        let encrypted_password = self.hasher.hash(&request.password)?;

        let mut user = User::new(UserId::generate(), profile, encrypted_password);
        let token = self.tokens.generate();
        user.issue_confirmation(token.digest, Utc::now());

        let user = self.repository.create(user).await?;
        if let Err(e) = self
            .mailer
            .send_confirmation_instructions(&user, &token.raw)
            .await
        {
            warn!(
                user_id = %user.id(),
                error = %e,
                "User registered but confirmation instructions were not sent"
            );
            return Err(e);
        }

        info!(user_id = %user.id(), username = %user.username(), "User registered");

        Ok(Registration {
            user,
            confirmation_token: token.raw,
        })
    }

    /// Replace the profile attributes of an existing user
    pub async fn update_profile(
        &self,
        id: &UserId,
        candidate: UserCandidate,
    ) -> Result<User, DomainError> {
        let mut user = self.require(id).await?;
        let candidate = candidate.normalized();

        let errors = self.validate(&candidate, Some(id)).await?;
        if !errors.is_empty() {
            return Err(DomainError::invalid_record(errors));
        }

        let profile = UserProfile::try_from(&candidate)
            .map_err(|e| DomainError::internal(format!("Validated candidate rejected: {}", e)))?;
        user.apply_profile(profile);

        let user = self.repository.update(&user).await?;
        info!(user_id = %user.id(), "User profile updated");

        Ok(user)
    }

    /// Confirm the email address of the user holding `raw_token`
    pub async fn confirm(&self, raw_token: &str) -> Result<User, DomainError> {
        let digest = self.tokens.digest(raw_token);
        let mut user = self
            .repository
            .get_by_confirmation_digest(&digest)
            .await?
            .ok_or_else(|| DomainError::not_found("Confirmation token is invalid"))?;

        if user.is_confirmed() {
            return Err(DomainError::validation(
                "Email was already confirmed, please try signing in",
            ));
        }

        let now = Utc::now();
        if let Some(within) = self.settings.confirm_within {
            if user.confirmation_expired(within, now) {
                warn!(user_id = %user.id(), "Expired confirmation token used");
                return Err(DomainError::credential(format!(
                    "Email needs to be confirmed within {} hours, please request a new one",
                    within.num_hours()
                )));
            }
        }

        user.confirm(now);
        let user = self.repository.update(&user).await?;
        info!(user_id = %user.id(), "User confirmed");

        Ok(user)
    }

    /// Issue a fresh confirmation token for an unconfirmed user
    ///
    /// Returns the raw token that was mailed.
    pub async fn resend_confirmation(&self, email: &str) -> Result<String, DomainError> {
        let mut user = self.require_email(email).await?;

        if user.is_confirmed() {
            return Err(DomainError::validation(
                "Email was already confirmed, please try signing in",
            ));
        }

        let token = self.tokens.generate();
        user.issue_confirmation(token.digest, Utc::now());

        let user = self.repository.update(&user).await?;
        self.mailer
            .send_confirmation_instructions(&user, &token.raw)
            .await?;

        info!(user_id = %user.id(), "Confirmation instructions resent");
        Ok(token.raw)
    }

    /// Authenticate a user with email and password
    ///
    /// Unknown users and wrong passwords yield `Ok(None)`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let email = normalize_email(email);

        let mut user = match self.repository.get_by_email(&email).await? {
            Some(u) => u,
            None => {
                debug!(email = %email, "Authentication for unknown email");
                return Ok(None);
            }
        };

        if !self.hasher.verify(password, user.encrypted_password()) {
            warn!(user_id = %user.id(), "Rejected credentials");
            return Ok(None);
        }

        if !user.is_confirmed() {
            return Err(DomainError::credential(
                "You have to confirm your email address before continuing.",
            ));
        }

        if self.hasher.needs_rehash(user.encrypted_password()) {
            let encrypted_password = self.hasher.hash(password)?;
            user.set_encrypted_password(encrypted_password);
            user = self.repository.update(&user).await?;
            info!(user_id = %user.id(), "Password hash upgraded");
        }

        Ok(Some(user))
    }

    /// Issue a reset password token and mail it
    ///
    /// Returns the raw token that was mailed.
    pub async fn send_reset_password_instructions(
        &self,
        email: &str,
    ) -> Result<String, DomainError> {
        let mut user = self.require_email(email).await?;

        let token = self.tokens.generate();
        user.issue_reset_password(token.digest, Utc::now());

        let user = self.repository.update(&user).await?;
        self.mailer
            .send_reset_password_instructions(&user, &token.raw)
            .await?;

        info!(user_id = %user.id(), "Reset password instructions sent");
        Ok(token.raw)
    }

    /// Choose a new password with an emailed reset token
    ///
    /// Proves ownership of the email, so an unconfirmed user is confirmed too.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        password: &str,
        password_confirmation: Option<&str>,
    ) -> Result<User, DomainError> {
        let digest = self.tokens.digest(raw_token);
        let mut user = self
            .repository
            .get_by_reset_password_digest(&digest)
            .await?
            .ok_or_else(|| DomainError::credential("Reset password token is invalid"))?;

        let now = Utc::now();
        if user.reset_password_expired(self.settings.reset_password_within, now) {
            warn!(user_id = %user.id(), "Expired reset password token used");
            return Err(DomainError::credential(
                "Reset password token has expired, please request a new one",
            ));
        }

        let errors = validate_password(
            password,
            password_confirmation,
            &self.settings.password_policy,
        );
        if !errors.is_empty() {
            return Err(DomainError::invalid_record(errors));
        }

        user.set_encrypted_password(self.hasher.hash(password)?);
        user.clear_reset_password();
        if !user.is_confirmed() {
            user.confirm(now);
        }

        let user = self.repository.update(&user).await?;
        info!(user_id = %user.id(), "Password reset");

        Ok(user)
    }

    /// Get a user by ID
    pub async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        self.repository.get(id).await
    }

    /// Get a user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        self.repository.get_by_username(username).await
    }

    /// Get a user by email, compared after normalization
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.repository.get_by_email(&normalize_email(email)).await
    }

    /// List all users
    pub async fn list(&self) -> Result<Vec<User>, DomainError> {
        self.repository.list().await
    }

    /// Count users
    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }

    /// Delete a user
    pub async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!(user_id = %id, "User deleted");
        }
        Ok(deleted)
    }

    async fn require(&self, id: &UserId) -> Result<User, DomainError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
    }

    async fn require_email(&self, email: &str) -> Result<User, DomainError> {
        let email = normalize_email(email);
        self.repository
            .get_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Email '{}' not found", email)))
    }
}

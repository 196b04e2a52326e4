//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{User, UserId};
use super::validation::UniqueField;
use crate::domain::DomainError;

/// Repository trait for user storage
///
/// Implementations must also enforce uniqueness of `username` and `email` on
/// `create` and `update`, returning [`DomainError::Conflict`]; the validator's
/// lookup is not atomic with the write.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by their ID
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Get a user by their username (exact match)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError>;

    /// Get a user by their normalized email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Get the user holding an outstanding confirmation token
    async fn get_by_confirmation_digest(&self, digest: &str)
        -> Result<Option<User>, DomainError>;

    /// Get the user holding an outstanding reset password token
    async fn get_by_reset_password_digest(
        &self,
        digest: &str,
    ) -> Result<Option<User>, DomainError>;

    /// Whether a user other than `exclude` holds `value` for `field`
    async fn exists_with(
        &self,
        field: UniqueField,
        value: &str,
        exclude: Option<&UserId>,
    ) -> Result<bool, DomainError>;

    /// Create a new user
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Update an existing user
    async fn update(&self, user: &User) -> Result<User, DomainError>;

    /// Delete a user
    async fn delete(&self, id: &UserId) -> Result<bool, DomainError>;

    /// List all users, oldest first
    async fn list(&self) -> Result<Vec<User>, DomainError>;

    /// Count users
    async fn count(&self) -> Result<usize, DomainError>;

    /// Check if a user ID exists
    async fn exists(&self, id: &UserId) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Mock user repository for testing
    #[derive(Debug, Default)]
    pub struct MockUserRepository {
        users: Arc<RwLock<HashMap<UserId, User>>>,
        should_fail: Arc<RwLock<bool>>,
    }

    impl MockUserRepository {
        /// Create a new mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Set whether operations should fail
        pub async fn set_should_fail(&self, fail: bool) {
            *self.should_fail.write().await = fail;
        }

        async fn check_should_fail(&self) -> Result<(), DomainError> {
            if *self.should_fail.read().await {
                return Err(DomainError::storage("Mock repository configured to fail"));
            }
            Ok(())
        }

        async fn find(&self, matches: impl Fn(&User) -> bool) -> Result<Option<User>, DomainError> {
            self.check_should_fail().await?;
            let users = self.users.read().await;
            Ok(users.values().find(|&u| matches(u)).cloned())
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
            self.find(|u| u.id() == id).await
        }

        async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
            self.find(|u| u.username() == username).await
        }

        async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
            self.find(|u| u.email() == email).await
        }

        async fn get_by_confirmation_digest(
            &self,
            digest: &str,
        ) -> Result<Option<User>, DomainError> {
            self.find(|u| u.confirmation().token_digest.as_deref() == Some(digest))
                .await
        }

        async fn get_by_reset_password_digest(
            &self,
            digest: &str,
        ) -> Result<Option<User>, DomainError> {
            self.find(|u| u.recovery().token_digest.as_deref() == Some(digest))
                .await
        }

        async fn exists_with(
            &self,
            field: UniqueField,
            value: &str,
            exclude: Option<&UserId>,
        ) -> Result<bool, DomainError> {
            Ok(self
                .find(|u| Some(u.id()) != exclude && field.value_of(u) == value)
                .await?
                .is_some())
        }

        async fn create(&self, user: User) -> Result<User, DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;

            if users.contains_key(user.id()) {
                return Err(DomainError::conflict(format!(
                    "User with ID '{}' already exists",
                    user.id()
                )));
            }

            users.insert(*user.id(), user.clone());
            Ok(user)
        }

        async fn update(&self, user: &User) -> Result<User, DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;

            if !users.contains_key(user.id()) {
                return Err(DomainError::not_found(format!(
                    "User '{}' not found",
                    user.id()
                )));
            }

            users.insert(*user.id(), user.clone());
            Ok(user.clone())
        }

        async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;
            Ok(users.remove(id).is_some())
        }

        async fn list(&self) -> Result<Vec<User>, DomainError> {
            self.check_should_fail().await?;
            let users = self.users.read().await;
            Ok(users.values().cloned().collect())
        }

        async fn count(&self) -> Result<usize, DomainError> {
            self.check_should_fail().await?;
            Ok(self.users.read().await.len())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::user::{Gender, UserProfile};

        fn create_test_user(username: &str, email: &str) -> User {
            User::new(
                UserId::generate(),
                UserProfile {
                    first_name: "Test".to_string(),
                    last_name: "User".to_string(),
                    username: username.to_string(),
                    email: email.to_string(),
                    gender: Gender::Other,
                },
                "hashed_password",
            )
        }

        #[tokio::test]
        async fn test_create_and_get() {
            let repo = MockUserRepository::new();
            let user = create_test_user("testuser", "test@test.com");

            repo.create(user.clone()).await.unwrap();

            let retrieved = repo.get(user.id()).await.unwrap();
            assert_eq!(retrieved.unwrap().username(), "testuser");
            assert!(repo.exists(user.id()).await.unwrap());
        }

        #[tokio::test]
        async fn test_exists_with_excludes_self() {
            let repo = MockUserRepository::new();
            let user = create_test_user("testuser", "test@test.com");

            repo.create(user.clone()).await.unwrap();

            assert!(repo
                .exists_with(UniqueField::Username, "testuser", None)
                .await
                .unwrap());
            assert!(!repo
                .exists_with(UniqueField::Username, "testuser", Some(user.id()))
                .await
                .unwrap());
        }

        #[tokio::test]
        async fn test_should_fail() {
            let repo = MockUserRepository::new();
            repo.set_should_fail(true).await;

            let result = repo
                .exists_with(UniqueField::Email, "test@test.com", None)
                .await;
            assert!(matches!(result, Err(DomainError::Storage { .. })));
        }
    }
}

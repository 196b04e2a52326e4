//! In-memory user repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{UniqueField, User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// Index for username -> user ID lookup
    usernames: HashMap<String, UserId>,
    /// Index for email -> user ID lookup
    emails: HashMap<String, UserId>,
}

impl Tables {
    fn index(&self, field: UniqueField) -> &HashMap<String, UserId> {
        match field {
            UniqueField::Username => &self.usernames,
            UniqueField::Email => &self.emails,
        }
    }

    fn holder(&self, field: UniqueField, value: &str) -> Option<&UserId> {
        self.index(field).get(value)
    }

    fn lookup(&self, field: UniqueField, value: &str) -> Option<User> {
        self.holder(field, value)
            .and_then(|id| self.users.get(id))
            .cloned()
    }

    /// Reject a write that would give `user`'s unique values to a second user
    fn check_unique(&self, user: &User) -> Result<(), DomainError> {
        for field in UniqueField::ALL {
            let value = field.value_of(user);
            if self.holder(field, value).is_some_and(|id| id != user.id()) {
                return Err(DomainError::conflict(format!(
                    "{} '{}' already exists",
                    field.field().human_name(),
                    value
                )));
            }
        }
        Ok(())
    }

    fn insert(&mut self, user: User) {
        self.usernames.insert(user.username().to_string(), *user.id());
        self.emails.insert(user.email().to_string(), *user.id());
        self.users.insert(*user.id(), user);
    }

    fn remove(&mut self, id: &UserId) -> Option<User> {
        let user = self.users.remove(id)?;
        self.usernames.remove(user.username());
        self.emails.remove(user.email());
        Some(user)
    }
}

/// In-memory implementation of UserRepository
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository with initial users
    ///
    /// Users whose username or email collides with an earlier one are skipped.
    pub fn with_users(users: Vec<User>) -> Self {
        let mut tables = Tables::default();

        for user in users {
            if tables.check_unique(&user).is_ok() {
                tables.insert(user);
            }
        }

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    async fn find(&self, matches: impl Fn(&User) -> bool) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.values().find(|&u| matches(u)).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.lookup(UniqueField::Username, username))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.lookup(UniqueField::Email, email))
    }

    async fn get_by_confirmation_digest(
        &self,
        digest: &str,
    ) -> Result<Option<User>, DomainError> {
        Ok(self
            .find(|u| u.confirmation().token_digest.as_deref() == Some(digest))
            .await)
    }

    async fn get_by_reset_password_digest(
        &self,
        digest: &str,
    ) -> Result<Option<User>, DomainError> {
        Ok(self
            .find(|u| u.recovery().token_digest.as_deref() == Some(digest))
            .await)
    }

    async fn exists_with(
        &self,
        field: UniqueField,
        value: &str,
        exclude: Option<&UserId>,
    ) -> Result<bool, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .holder(field, value)
            .is_some_and(|id| Some(id) != exclude))
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        if tables.users.contains_key(user.id()) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                user.id()
            )));
        }

        tables.check_unique(&user)?;
        tables.insert(user.clone());

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(user.id()) {
            return Err(DomainError::not_found(format!(
                "User '{}' not found",
                user.id()
            )));
        }

        tables.check_unique(user)?;

        // Drop the old index entries in case username or email changed
        tables.remove(user.id());
        tables.insert(user.clone());

        Ok(user.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let tables = self.tables.read().await;

        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at());

        Ok(users)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.tables.read().await.users.len())
    }
}

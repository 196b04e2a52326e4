//! PostgreSQL user repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::{
    Confirmation, Gender, Recovery, UniqueField, User, UserId, UserProfile, UserRepository,
};
use crate::domain::DomainError;

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, username, email, gender, encrypted_password,
    confirmation_token_digest, confirmation_sent_at, confirmed_at,
    reset_password_token_digest, reset_password_sent_at,
    created_at, updated_at
"#;

/// PostgreSQL implementation of UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new repository with connection pooling
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures the users table and its unique indexes exist
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                first_name VARCHAR(255) NOT NULL,
                last_name VARCHAR(255) NOT NULL,
                username VARCHAR(255) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                gender VARCHAR(32) NOT NULL,
                encrypted_password TEXT NOT NULL,
                confirmation_token_digest VARCHAR(128) UNIQUE,
                confirmation_sent_at TIMESTAMPTZ,
                confirmed_at TIMESTAMPTZ,
                reset_password_token_digest VARCHAR(128) UNIQUE,
                reset_password_sent_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create users table: {}", e)))?;

        Ok(())
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, DomainError> {
        let query = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);

        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user by {}: {}", column, e)))?;

        row.as_ref().map(row_to_user).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("email", email).await
    }

    async fn get_by_confirmation_digest(
        &self,
        digest: &str,
    ) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("confirmation_token_digest", digest).await
    }

    async fn get_by_reset_password_digest(
        &self,
        digest: &str,
    ) -> Result<Option<User>, DomainError> {
        self.fetch_one_by("reset_password_token_digest", digest)
            .await
    }

    async fn exists_with(
        &self,
        field: UniqueField,
        value: &str,
        exclude: Option<&UserId>,
    ) -> Result<bool, DomainError> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {} = $1 AND ($2::uuid IS NULL OR id <> $2))",
            field.column()
        );

        sqlx::query_scalar::<_, bool>(&query)
            .bind(value)
            .bind(exclude.map(|id| *id.as_uuid()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check {}: {}", field.column(), e)))
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let confirmation = user.confirmation();
        let recovery = user.recovery();

        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, username, email, gender,
                               encrypted_password, confirmation_token_digest,
                               confirmation_sent_at, confirmed_at,
                               reset_password_token_digest, reset_password_sent_at,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.username())
        .bind(user.email())
        .bind(user.gender().as_str())
        .bind(user.encrypted_password())
        .bind(confirmation.token_digest.as_deref())
        .bind(confirmation.sent_at)
        .bind(confirmation.confirmed_at)
        .bind(recovery.token_digest.as_deref())
        .bind(recovery.sent_at)
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &user, "create"))?;

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let confirmation = user.confirmation();
        let recovery = user.recovery();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, username = $4, email = $5, gender = $6,
                encrypted_password = $7, confirmation_token_digest = $8,
                confirmation_sent_at = $9, confirmed_at = $10,
                reset_password_token_digest = $11, reset_password_sent_at = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.username())
        .bind(user.email())
        .bind(user.gender().as_str())
        .bind(user.encrypted_password())
        .bind(confirmation.token_digest.as_deref())
        .bind(confirmation.sent_at)
        .bind(confirmation.confirmed_at)
        .bind(recovery.token_digest.as_deref())
        .bind(recovery.sent_at)
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, user, "update"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "User '{}' not found",
                user.id()
            )));
        }

        Ok(user.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete user: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let query = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list users: {}", e)))?;

        rows.iter().map(row_to_user).collect()
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        Ok(count as usize)
    }
}

/// Map a failed INSERT/UPDATE, turning unique violations into conflicts
fn write_error(e: sqlx::Error, user: &User, action: &str) -> DomainError {
    let msg = e.to_string();

    if !(msg.contains("duplicate key") || msg.contains("unique constraint")) {
        return DomainError::storage(format!("Failed to {} user: {}", action, e));
    }

    match conflicting_field(&msg) {
        Some(field) => DomainError::conflict(format!(
            "{} '{}' already exists",
            field.field().human_name(),
            field.value_of(user)
        )),
        None => DomainError::conflict(format!("User with ID '{}' already exists", user.id())),
    }
}

/// Which unique attribute a violation message names, if any
fn conflicting_field(message: &str) -> Option<UniqueField> {
    UniqueField::ALL
        .into_iter()
        .find(|field| message.contains(&format!("users_{}_key", field.column())))
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let id: Uuid = row.get("id");
    let gender: String = row.get("gender");

    let gender: Gender = gender
        .parse()
        .map_err(|e| DomainError::storage(format!("Invalid gender in database: {}", e)))?;

    let profile = UserProfile {
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        username: row.get("username"),
        email: row.get("email"),
        gender,
    };

    let confirmation = Confirmation {
        token_digest: row.get("confirmation_token_digest"),
        sent_at: row.get::<Option<DateTime<Utc>>, _>("confirmation_sent_at"),
        confirmed_at: row.get::<Option<DateTime<Utc>>, _>("confirmed_at"),
    };

    let recovery = Recovery {
        token_digest: row.get("reset_password_token_digest"),
        sent_at: row.get::<Option<DateTime<Utc>>, _>("reset_password_sent_at"),
    };

    Ok(User::restore(
        UserId::from_uuid(id),
        profile,
        row.get("encrypted_password"),
        confirmation,
        recovery,
        row.get("created_at"),
        row.get("updated_at"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_field() {
        let msg = r#"error returned from database: duplicate key value violates unique constraint "users_username_key""#;
        assert_eq!(conflicting_field(msg), Some(UniqueField::Username));

        let msg = r#"duplicate key value violates unique constraint "users_email_key""#;
        assert_eq!(conflicting_field(msg), Some(UniqueField::Email));

        let msg = r#"duplicate key value violates unique constraint "users_pkey""#;
        assert_eq!(conflicting_field(msg), None);
    }

    #[test]
    fn test_user_columns_cover_schema() {
        for column in [
            "first_name",
            "encrypted_password",
            "confirmation_token_digest",
            "reset_password_sent_at",
            "updated_at",
        ] {
            assert!(USER_COLUMNS.contains(column));
        }
    }
}

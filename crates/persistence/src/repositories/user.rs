//! User repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for user accounts and their roles.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find an active user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, phone, display_name, password_hash, is_active, created_at, updated_at
            FROM users
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an active user by email address, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, phone, display_name, password_hash, is_active, created_at, updated_at
            FROM users
            WHERE LOWER(email) = LOWER($1) AND is_active = true
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create a user account. A duplicate email fails with a unique violation.
    pub async fn create_user(
        &self,
        email: &str,
        phone: Option<&str>,
        display_name: Option<&str>,
        password_hash: &str,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (email, phone, display_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, phone, display_name, password_hash, is_active, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(phone)
        .bind(display_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Check whether a user holds a role.
    pub async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("check_user_role");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = $1 AND role = $2)
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Grant a role. Granting a role the user already holds changes nothing.
    pub async fn grant_role(&self, user_id: Uuid, role: &str) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("grant_user_role");
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Note: UserRepository tests require database connection and are covered by integration tests
}

//! User repository for database operations

use common::error::DatabaseResult;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{UpdateUser, User};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, middle_name, \
                            is_active, deleted_at, created_at, updated_at";

/// Fields of a user row to insert; the password is already hashed
#[derive(Debug, Clone)]
pub struct UserRecord<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub middle_name: Option<&'a str>,
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the user and attach `default_role` (when that role exists) in one transaction.
    pub async fn create_with_default_role(
        &self,
        record: &UserRecord<'_>,
        default_role: &str,
    ) -> DatabaseResult<User> {
        info!("Creating new user: {}", record.email);

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, middle_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(record.email)
        .bind(record.password_hash)
        .bind(record.first_name)
        .bind(record.last_name)
        .bind(record.middle_name)
        .fetch_one(&mut *tx)
        .await?;

        let attached = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, id FROM roles WHERE name = $2
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(default_role)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if attached.rows_affected() == 0 {
            warn!(
                "Default role '{}' not found, user {} registered without roles",
                default_role, user.id
            );
        }

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Find a user by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Whether another user already uses this email
    pub async fn email_taken(&self, email: &str, except: Option<Uuid>) -> DatabaseResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// Partial profile update; `None` when the user does not exist
    pub async fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateUser,
    ) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                middle_name = COALESCE($5, middle_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(update.email.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.middle_name.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Deactivate and stamp `deleted_at`; false if already deleted or missing
    pub async fn soft_delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Page through active, non-deleted users ordered by email
    pub async fn list_active(&self, limit: i64, offset: i64) -> DatabaseResult<(Vec<User>, i64)> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE is_active AND deleted_at IS NULL
            ORDER BY email
            LIMIT $1 OFFSET $2
            "#,
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active AND deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((users, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::{DatabaseConfig, init_pool};
    use rbac::models::NewRole;
    use rbac::{PermissionEvaluator, PgRbacStore, RbacAdmin, Seed};
    use rbac::seed::DEFAULT_USER_ROLE;
    use std::sync::Arc;

    async fn connect() -> (PgPool, RbacAdmin, PermissionEvaluator) {
        let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
        let store = Arc::new(PgRbacStore::new(pool.clone()));
        let admin = RbacAdmin::new(store.clone());
        admin.seed(&Seed::default_blog()).await.unwrap();
        (pool, admin, PermissionEvaluator::new(store))
    }

    fn record<'a>(email: &'a str) -> UserRecord<'a> {
        UserRecord {
            email,
            password_hash: "$argon2id$not-a-real-hash",
            first_name: "Ivan",
            last_name: "Petrov",
            middle_name: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL) with schema.sql applied"]
    async fn test_registration_attaches_default_role() {
        let (pool, admin, evaluator) = connect().await;
        let repository = UserRepository::new(pool.clone());
        let email = format!("{}@example.com", Uuid::new_v4());

        let user = repository
            .create_with_default_role(&record(&email), DEFAULT_USER_ROLE)
            .await
            .unwrap();

        assert!(admin.user_has_role(user.id, DEFAULT_USER_ROLE).await.unwrap());
        assert!(evaluator.has_permission(&user, "blog.post.read").await);
        assert!(evaluator.has_permission(&user, "blog.post.list").await);
        assert!(!evaluator.has_permission(&user, "blog.post.create").await);

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL) with schema.sql applied"]
    async fn test_non_system_default_role_is_attached() {
        let (pool, admin, _) = connect().await;
        let repository = UserRepository::new(pool.clone());
        let role_name = format!("reader-{}", Uuid::new_v4());
        let role = admin.create_role(&NewRole::new(&role_name, "")).await.unwrap();
        let email = format!("{}@example.com", Uuid::new_v4());

        let user = repository
            .create_with_default_role(&record(&email), &role_name)
            .await
            .unwrap();
        assert!(admin.user_has_role(user.id, &role_name).await.unwrap());

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
        admin.delete_role(role.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL) with schema.sql applied"]
    async fn test_unknown_default_role_still_registers() {
        let (pool, admin, _) = connect().await;
        let repository = UserRepository::new(pool.clone());
        let email = format!("{}@example.com", Uuid::new_v4());

        let user = repository
            .create_with_default_role(&record(&email), "no-such-role")
            .await
            .unwrap();
        assert!(admin.user_roles(user.id).await.unwrap().is_empty());
        assert!(repository.find_by_email(&email).await.unwrap().is_some());

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .unwrap();
    }
}

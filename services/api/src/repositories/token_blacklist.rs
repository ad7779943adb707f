//! Storage for revoked tokens

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{BlacklistedToken, NewBlacklistedToken};

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Insert unless the jti is already present; either way return the stored row.
    async fn insert_if_absent(
        &self,
        entry: &NewBlacklistedToken,
    ) -> DatabaseResult<BlacklistedToken>;
    async fn find(&self, jti: Uuid) -> DatabaseResult<Option<BlacklistedToken>>;
    async fn contains(&self, jti: Uuid) -> DatabaseResult<bool>;
    /// Remove entries whose token expired before `now`; returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64>;
}

#[derive(Clone)]
pub struct PgBlacklistStore {
    pool: PgPool,
}

impl PgBlacklistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlacklistStore for PgBlacklistStore {
    async fn insert_if_absent(
        &self,
        entry: &NewBlacklistedToken,
    ) -> DatabaseResult<BlacklistedToken> {
        sqlx::query(
            r#"
            INSERT INTO token_blacklist (token_jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_jti) DO NOTHING
            "#,
        )
        .bind(entry.token_jti)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;

        let stored = sqlx::query_as::<_, BlacklistedToken>(
            r#"
            SELECT id, token_jti, user_id, expires_at, blacklisted_at
            FROM token_blacklist
            WHERE token_jti = $1
            "#,
        )
        .bind(entry.token_jti)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn find(&self, jti: Uuid) -> DatabaseResult<Option<BlacklistedToken>> {
        let entry = sqlx::query_as::<_, BlacklistedToken>(
            r#"
            SELECT id, token_jti, user_id, expires_at, blacklisted_at
            FROM token_blacklist
            WHERE token_jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn contains(&self, jti: Uuid) -> DatabaseResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE token_jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Process-local blacklist used by tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlacklistStore {
    entries: Arc<RwLock<HashMap<Uuid, BlacklistedToken>>>,
}

impl InMemoryBlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl BlacklistStore for InMemoryBlacklistStore {
    async fn insert_if_absent(
        &self,
        entry: &NewBlacklistedToken,
    ) -> DatabaseResult<BlacklistedToken> {
        let mut entries = self.entries.write().await;
        let stored = entries
            .entry(entry.token_jti)
            .or_insert_with(|| BlacklistedToken {
                id: Uuid::new_v4(),
                token_jti: entry.token_jti,
                user_id: entry.user_id,
                expires_at: entry.expires_at,
                blacklisted_at: Utc::now(),
            });
        Ok(stored.clone())
    }

    async fn find(&self, jti: Uuid) -> DatabaseResult<Option<BlacklistedToken>> {
        Ok(self.entries.read().await.get(&jti).cloned())
    }

    async fn contains(&self, jti: Uuid) -> DatabaseResult<bool> {
        Ok(self.entries.read().await.contains_key(&jti))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::database::{DatabaseConfig, init_pool};

    async fn pool_with_user() -> (PgPool, Uuid) {
        let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
        let user_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, 'x', 'Token', 'Owner')
            RETURNING id
            "#,
        )
        .bind(format!("{}@example.com", Uuid::new_v4()))
        .fetch_one(&pool)
        .await
        .unwrap();
        (pool, user_id)
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL) with schema.sql applied"]
    async fn test_same_jti_is_stored_once_and_pruned_after_expiry() {
        let (pool, user_id) = pool_with_user().await;
        let store = PgBlacklistStore::new(pool.clone());
        let now = Utc::now();

        let expired = NewBlacklistedToken {
            token_jti: Uuid::new_v4(),
            user_id,
            expires_at: now - Duration::seconds(10),
        };
        let live = NewBlacklistedToken {
            token_jti: Uuid::new_v4(),
            user_id,
            expires_at: now + Duration::hours(1),
        };

        let first = store.insert_if_absent(&expired).await.unwrap();
        let second = store.insert_if_absent(&expired).await.unwrap();
        assert_eq!(first.id, second.id);
        store.insert_if_absent(&live).await.unwrap();

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM token_blacklist WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rows, 2);

        assert!(store.delete_expired(Utc::now()).await.unwrap() >= 1);
        assert!(!store.contains(expired.token_jti).await.unwrap());
        assert!(store.contains(live.token_jti).await.unwrap());

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();
    }
}

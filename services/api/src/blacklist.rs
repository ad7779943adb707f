//! Token blacklist
//!
//! Revocation is keyed by the token's `jti`. A token that cannot be decoded
//! is never stored and never reported as blacklisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jwt::JwtService;
use crate::models::{BlacklistedToken, NewBlacklistedToken};
use crate::repositories::BlacklistStore;

#[derive(Clone)]
pub struct TokenBlacklist {
    store: Arc<dyn BlacklistStore>,
    jwt: JwtService,
}

impl TokenBlacklist {
    pub fn new(store: Arc<dyn BlacklistStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    /// Revoke `token`. `None` when it does not decode; the existing entry when
    /// it was already revoked.
    pub async fn add_token_to_blacklist(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> DatabaseResult<Option<BlacklistedToken>> {
        let claims = match self.jwt.validate_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Refusing to blacklist undecodable token: {}", e);
                return Ok(None);
            }
        };

        if let Some(existing) = self.store.find(claims.jti).await? {
            debug!("Token {} already blacklisted", claims.jti);
            return Ok(Some(existing));
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);
        let entry = self
            .store
            .insert_if_absent(&NewBlacklistedToken {
                token_jti: claims.jti,
                user_id,
                expires_at,
            })
            .await?;

        info!("Token {} blacklisted for user {}", entry.token_jti, user_id);
        Ok(Some(entry))
    }

    /// False for undecodable tokens.
    pub async fn is_token_blacklisted(&self, token: &str) -> DatabaseResult<bool> {
        match self.jwt.validate_token(token) {
            Ok(claims) => self.is_jti_blacklisted(claims.jti).await,
            Err(_) => Ok(false),
        }
    }

    pub async fn is_jti_blacklisted(&self, jti: Uuid) -> DatabaseResult<bool> {
        self.store.contains(jti).await
    }

    /// Drop entries whose tokens have expired anyway.
    pub async fn cleanup_expired(&self) -> DatabaseResult<u64> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        info!("Removed {} expired blacklist entries", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::test_service;
    use crate::repositories::InMemoryBlacklistStore;
    use chrono::Duration;

    fn blacklist() -> (TokenBlacklist, InMemoryBlacklistStore) {
        let store = InMemoryBlacklistStore::new();
        (
            TokenBlacklist::new(Arc::new(store.clone()), test_service()),
            store,
        )
    }

    #[tokio::test]
    async fn test_blacklisting_is_idempotent() {
        let (blacklist, store) = blacklist();
        let user_id = Uuid::new_v4();
        let token = test_service().generate_access_token(user_id).unwrap();

        let first = blacklist
            .add_token_to_blacklist(&token, user_id)
            .await
            .unwrap()
            .unwrap();
        let second = blacklist
            .add_token_to_blacklist(&token, user_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_reflects_blacklist() {
        let (blacklist, _) = blacklist();
        let jwt = test_service();
        let user_id = Uuid::new_v4();
        let revoked = jwt.generate_refresh_token(user_id).unwrap();
        let live = jwt.generate_refresh_token(user_id).unwrap();

        assert!(!blacklist.is_token_blacklisted(&revoked).await.unwrap());
        blacklist
            .add_token_to_blacklist(&revoked, user_id)
            .await
            .unwrap();

        assert!(blacklist.is_token_blacklisted(&revoked).await.unwrap());
        assert!(!blacklist.is_token_blacklisted(&live).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_is_neither_stored_nor_blacklisted() {
        let (blacklist, store) = blacklist();

        let stored = blacklist
            .add_token_to_blacklist("garbage", Uuid::new_v4())
            .await
            .unwrap();
        assert!(stored.is_none());
        assert_eq!(store.len().await, 0);
        assert!(!blacklist.is_token_blacklisted("garbage").await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_entries() {
        let (blacklist, store) = blacklist();
        let now = Utc::now();
        for (offset, user_id) in [(-10, Uuid::new_v4()), (3600, Uuid::new_v4())] {
            store
                .insert_if_absent(&NewBlacklistedToken {
                    token_jti: Uuid::new_v4(),
                    user_id,
                    expires_at: now + Duration::seconds(offset),
                })
                .await
                .unwrap();
        }

        assert_eq!(blacklist.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }
}

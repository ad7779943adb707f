//! Blacklisted token entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A revoked token, keyed by its `jti`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct BlacklistedToken {
    pub id: Uuid,
    pub token_jti: Uuid,
    pub user_id: Uuid,
    /// Original token expiry; the row can be pruned after this
    pub expires_at: DateTime<Utc>,
    pub blacklisted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlacklistedToken {
    pub token_jti: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

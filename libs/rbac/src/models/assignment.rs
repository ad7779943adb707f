//! Role-permission and user-role links

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Link between a role and a permission, with the permission's display fields
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RolePermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub permission_code: String,
    pub permission_name: String,
    pub created_at: DateTime<Utc>,
}

/// User role association
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub role_description: String,
    /// Admin who made the assignment; `None` for self-registration and seeding
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

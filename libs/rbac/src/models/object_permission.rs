//! Per-resource grant/deny overrides

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Explicit grant or deny of one permission on one resource for one user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserObjectPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission_id: Uuid,
    pub permission_code: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub is_granted: bool,
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}

/// Explicit grant or deny of one permission on one resource for every holder of a role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RoleObjectPermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub permission_code: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub is_granted: bool,
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
}

/// Payload for setting an override; an existing (subject, permission,
/// resource_type, resource_id) entry is overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPermissionGrant {
    pub permission_id: Uuid,
    pub resource_type: String,
    pub resource_id: Uuid,
    #[serde(default = "default_granted")]
    pub is_granted: bool,
    #[serde(skip)]
    pub granted_by: Option<Uuid>,
}

fn default_granted() -> bool {
    true
}

impl ObjectPermissionGrant {
    pub fn grant(permission_id: Uuid, resource_type: impl Into<String>, resource_id: Uuid) -> Self {
        Self {
            permission_id,
            resource_type: resource_type.into(),
            resource_id,
            is_granted: true,
            granted_by: None,
        }
    }

    pub fn deny(permission_id: Uuid, resource_type: impl Into<String>, resource_id: Uuid) -> Self {
        Self {
            is_granted: false,
            ..Self::grant(permission_id, resource_type, resource_id)
        }
    }

    pub fn by(mut self, granted_by: Uuid) -> Self {
        self.granted_by = Some(granted_by);
        self
    }
}

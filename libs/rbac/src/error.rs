//! Errors raised by RBAC management operations
//!
//! Evaluation never surfaces these; see [`crate::evaluator`].

use common::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RbacError {
    #[error("Role {0} not found")]
    RoleNotFound(Uuid),

    #[error("Permission {0} not found")]
    PermissionNotFound(Uuid),

    #[error("Role {role_id} does not hold permission {permission_id}")]
    RolePermissionNotFound { role_id: Uuid, permission_id: Uuid },

    #[error("Role {role_id} is not assigned to user {user_id}")]
    UserRoleNotFound { user_id: Uuid, role_id: Uuid },

    #[error("Object permission {0} not found")]
    ObjectPermissionNotFound(Uuid),

    #[error("System role '{0}' cannot be deleted")]
    SystemRole(String),

    #[error("A role named '{0}' already exists")]
    DuplicateRole(String),

    #[error("A permission with code '{0}' already exists")]
    DuplicatePermission(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl RbacError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RbacError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for RbacError {
    fn from(e: sqlx::Error) -> Self {
        RbacError::Database(DatabaseError::Query(e))
    }
}

pub type RbacResult<T> = Result<T, RbacError>;

//! RBAC models

pub mod assignment;
pub mod object_permission;
pub mod permission;
pub mod role;

// Re-export for convenience
pub use assignment::{RolePermission, UserRole};
pub use object_permission::{ObjectPermissionGrant, RoleObjectPermission, UserObjectPermission};
pub use permission::{
    NewPermission, Permission, PermissionAction, UpdatePermission, is_well_formed_code,
};
pub use role::{NewRole, Role, UpdateRole};

use uuid::Uuid;

/// Anything permissions can be evaluated for.
///
/// The API service implements this for its `User` model; the evaluator only
/// needs the identity and the account state.
pub trait Subject {
    fn subject_id(&self) -> Uuid;
    fn is_active(&self) -> bool;
    fn is_deleted(&self) -> bool;
}

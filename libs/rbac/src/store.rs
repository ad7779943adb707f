//! Storage seam for the RBAC tables
//!
//! Both backends share the same contract: unique pairs/tuples are enforced by
//! the store, `get_or_create`-style methods report whether a row was inserted,
//! and `apply_seed` is all-or-nothing.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RbacResult;
use crate::models::{
    NewPermission, NewRole, ObjectPermissionGrant, Permission, Role, RoleObjectPermission,
    RolePermission, UpdatePermission, UpdateRole, UserObjectPermission, UserRole,
};
use crate::seed::{Seed, SeedReport};

#[async_trait]
pub trait RbacStore: Send + Sync {
    // Roles
    async fn create_role(&self, new_role: &NewRole) -> RbacResult<Role>;
    async fn list_roles(&self) -> RbacResult<Vec<Role>>;
    async fn find_role(&self, id: Uuid) -> RbacResult<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> RbacResult<Option<Role>>;
    async fn update_role(&self, id: Uuid, update: &UpdateRole) -> RbacResult<Option<Role>>;
    /// Removes the role and, by cascade, its links and overrides.
    async fn delete_role(&self, id: Uuid) -> RbacResult<bool>;
    async fn count_role_permissions(&self, role_id: Uuid) -> RbacResult<i64>;

    // Permissions
    async fn create_permission(&self, new_permission: &NewPermission) -> RbacResult<Permission>;
    async fn list_permissions(&self) -> RbacResult<Vec<Permission>>;
    async fn find_permission(&self, id: Uuid) -> RbacResult<Option<Permission>>;
    async fn find_permission_by_code(&self, code: &str) -> RbacResult<Option<Permission>>;
    async fn update_permission(
        &self,
        id: Uuid,
        update: &UpdatePermission,
    ) -> RbacResult<Option<Permission>>;
    async fn delete_permission(&self, id: Uuid) -> RbacResult<bool>;
    /// True when a role link or an object override points at the permission.
    async fn permission_in_use(&self, id: Uuid) -> RbacResult<bool>;

    // Role -> permission links
    /// Get-or-create; the flag is `true` when the link was inserted.
    async fn add_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<(RolePermission, bool)>;
    async fn remove_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> RbacResult<bool>;
    async fn list_role_permissions(&self, role_id: Uuid) -> RbacResult<Vec<RolePermission>>;

    // User -> role links
    /// Get-or-create; `assigned_by` is only recorded on insert.
    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> RbacResult<(UserRole, bool)>;
    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> RbacResult<bool>;
    async fn list_user_roles(&self, user_id: Uuid) -> RbacResult<Vec<UserRole>>;
    async fn role_ids_for_user(&self, user_id: Uuid) -> RbacResult<Vec<Uuid>>;
    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> RbacResult<bool>;

    // Evaluation lookups
    async fn any_role_has_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
    ) -> RbacResult<bool>;
    async fn user_object_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>>;
    /// Combined override across `role_ids`; a deny on any role wins.
    async fn role_object_override(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>>;

    // Object-level overrides
    async fn set_user_object_permission(
        &self,
        user_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<UserObjectPermission>;
    async fn set_role_object_permission(
        &self,
        role_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<RoleObjectPermission>;
    async fn list_user_object_permissions(
        &self,
        user_id: Uuid,
    ) -> RbacResult<Vec<UserObjectPermission>>;
    async fn list_role_object_permissions(
        &self,
        role_id: Uuid,
    ) -> RbacResult<Vec<RoleObjectPermission>>;
    async fn delete_user_object_permission(&self, user_id: Uuid, id: Uuid) -> RbacResult<bool>;
    async fn delete_role_object_permission(&self, role_id: Uuid, id: Uuid) -> RbacResult<bool>;

    // Seeding
    async fn apply_seed(&self, seed: &Seed) -> RbacResult<SeedReport>;
}

//! Role, permission and assignment management
//!
//! Validation and existence checks live here so both storage backends stay
//! thin. Every mutation is logged at info level.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RbacError, RbacResult};
use crate::models::{
    NewPermission, NewRole, ObjectPermissionGrant, Permission, Role, RoleObjectPermission,
    RolePermission, UpdatePermission, UpdateRole, UserObjectPermission, UserRole,
    is_well_formed_code,
};
use crate::seed::{Seed, SeedReport};
use crate::store::RbacStore;

const MAX_NAME_LENGTH: usize = 100;

fn require_name(field: &'static str, value: &str) -> RbacResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RbacError::invalid(field, "must not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(RbacError::invalid(
            field,
            format!("must be at most {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// First identity field (code, resource type, action) the update would change.
fn identity_change(current: &Permission, update: &UpdatePermission) -> Option<&'static str> {
    if update.code.as_ref().is_some_and(|code| *code != current.code) {
        return Some("code");
    }
    if update
        .resource_type
        .as_ref()
        .is_some_and(|resource_type| *resource_type != current.resource_type)
    {
        return Some("resource_type");
    }
    if update.action.is_some_and(|action| action != current.action) {
        return Some("action");
    }
    None
}

fn require_code(code: &str) -> RbacResult<()> {
    if !is_well_formed_code(code) {
        return Err(RbacError::invalid(
            "code",
            format!("'{}' must be of the form resource.action", code),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct RbacAdmin {
    store: Arc<dyn RbacStore>,
}

impl RbacAdmin {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    // --- roles -----------------------------------------------------------

    pub async fn create_role(&self, new_role: &NewRole) -> RbacResult<Role> {
        require_name("name", &new_role.name)?;
        let role = self.store.create_role(new_role).await?;
        info!("Role created: {} ({})", role.name, role.id);
        Ok(role)
    }

    pub async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn get_role(&self, id: Uuid) -> RbacResult<Role> {
        self.store
            .find_role(id)
            .await?
            .ok_or(RbacError::RoleNotFound(id))
    }

    pub async fn role_permission_count(&self, id: Uuid) -> RbacResult<i64> {
        self.store.count_role_permissions(id).await
    }

    pub async fn update_role(&self, id: Uuid, update: &UpdateRole) -> RbacResult<Role> {
        if let Some(name) = &update.name {
            require_name("name", name)?;
        }
        let role = self
            .store
            .update_role(id, update)
            .await?
            .ok_or(RbacError::RoleNotFound(id))?;
        info!("Role updated: {} ({})", role.name, role.id);
        Ok(role)
    }

    /// System roles are never deleted.
    pub async fn delete_role(&self, id: Uuid) -> RbacResult<()> {
        let role = self.get_role(id).await?;
        if !role.can_be_deleted() {
            warn!("Refused to delete system role {}", role.name);
            return Err(RbacError::SystemRole(role.name));
        }

        if !self.store.delete_role(id).await? {
            return Err(RbacError::RoleNotFound(id));
        }
        info!("Role deleted: {} ({})", role.name, role.id);
        Ok(())
    }

    // --- permissions -----------------------------------------------------

    pub async fn create_permission(
        &self,
        new_permission: &NewPermission,
    ) -> RbacResult<Permission> {
        require_code(&new_permission.code)?;
        require_name("name", &new_permission.name)?;
        require_name("resource_type", &new_permission.resource_type)?;

        let permission = self.store.create_permission(new_permission).await?;
        info!("Permission created: {}", permission.code);
        Ok(permission)
    }

    pub async fn list_permissions(&self) -> RbacResult<Vec<Permission>> {
        self.store.list_permissions().await
    }

    pub async fn get_permission(&self, id: Uuid) -> RbacResult<Permission> {
        self.store
            .find_permission(id)
            .await?
            .ok_or(RbacError::PermissionNotFound(id))
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        update: &UpdatePermission,
    ) -> RbacResult<Permission> {
        if let Some(code) = &update.code {
            require_code(code)?;
        }
        if let Some(name) = &update.name {
            require_name("name", name)?;
        }
        if let Some(resource_type) = &update.resource_type {
            require_name("resource_type", resource_type)?;
        }

        let current = self.get_permission(id).await?;
        if let Some(field) = identity_change(&current, update) {
            if self.store.permission_in_use(id).await? {
                return Err(RbacError::invalid(
                    field,
                    format!(
                        "'{}' is referenced by existing grants; its {} cannot change",
                        current.code, field
                    ),
                ));
            }
        }

        let permission = self
            .store
            .update_permission(id, update)
            .await?
            .ok_or(RbacError::PermissionNotFound(id))?;
        info!("Permission updated: {}", permission.code);
        Ok(permission)
    }

    pub async fn delete_permission(&self, id: Uuid) -> RbacResult<()> {
        if !self.store.delete_permission(id).await? {
            return Err(RbacError::PermissionNotFound(id));
        }
        info!("Permission deleted: {}", id);
        Ok(())
    }

    // --- role -> permission ----------------------------------------------

    /// Returns the link and whether it was newly created.
    pub async fn grant_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<(RolePermission, bool)> {
        let role = self.get_role(role_id).await?;
        let permission = self.get_permission(permission_id).await?;

        let (link, created) = self
            .store
            .add_role_permission(role.id, permission.id)
            .await?;
        if created {
            info!("Granted {} to role {}", permission.code, role.name);
        }
        Ok((link, created))
    }

    pub async fn revoke_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<()> {
        if !self
            .store
            .remove_role_permission(role_id, permission_id)
            .await?
        {
            return Err(RbacError::RolePermissionNotFound {
                role_id,
                permission_id,
            });
        }
        info!("Revoked permission {} from role {}", permission_id, role_id);
        Ok(())
    }

    pub async fn role_permissions(&self, role_id: Uuid) -> RbacResult<Vec<RolePermission>> {
        self.get_role(role_id).await?;
        self.store.list_role_permissions(role_id).await
    }

    // --- user -> role ----------------------------------------------------

    /// Get-or-create; `assigned_by` is kept from the first assignment.
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> RbacResult<(UserRole, bool)> {
        let role = self.get_role(role_id).await?;
        let (link, created) = self.store.assign_role(user_id, role.id, assigned_by).await?;
        if created {
            info!("Role {} assigned to user {}", role.name, user_id);
        }
        Ok((link, created))
    }

    /// Same as [`Self::assign_role`] but resolving the role by name.
    pub async fn assign_role_by_name(
        &self,
        user_id: Uuid,
        role_name: &str,
        assigned_by: Option<Uuid>,
    ) -> RbacResult<Option<(UserRole, bool)>> {
        match self.store.find_role_by_name(role_name).await? {
            Some(role) => Ok(Some(self.assign_role(user_id, role.id, assigned_by).await?)),
            None => Ok(None),
        }
    }

    pub async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> RbacResult<()> {
        if !self.store.remove_role(user_id, role_id).await? {
            return Err(RbacError::UserRoleNotFound { user_id, role_id });
        }
        info!("Role {} removed from user {}", role_id, user_id);
        Ok(())
    }

    pub async fn user_roles(&self, user_id: Uuid) -> RbacResult<Vec<UserRole>> {
        self.store.list_user_roles(user_id).await
    }

    pub async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> RbacResult<bool> {
        self.store.user_has_role(user_id, role_name).await
    }

    // --- object overrides ------------------------------------------------

    fn check_grant(grant: &ObjectPermissionGrant) -> RbacResult<()> {
        require_name("resource_type", &grant.resource_type)
    }

    pub async fn set_user_object_permission(
        &self,
        user_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<UserObjectPermission> {
        Self::check_grant(grant)?;
        self.get_permission(grant.permission_id).await?;
        self.store.set_user_object_permission(user_id, grant).await
    }

    pub async fn user_object_permissions(
        &self,
        user_id: Uuid,
    ) -> RbacResult<Vec<UserObjectPermission>> {
        self.store.list_user_object_permissions(user_id).await
    }

    pub async fn delete_user_object_permission(&self, user_id: Uuid, id: Uuid) -> RbacResult<()> {
        if !self.store.delete_user_object_permission(user_id, id).await? {
            return Err(RbacError::ObjectPermissionNotFound(id));
        }
        info!("User object permission {} deleted for user {}", id, user_id);
        Ok(())
    }

    pub async fn set_role_object_permission(
        &self,
        role_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<RoleObjectPermission> {
        Self::check_grant(grant)?;
        self.get_role(role_id).await?;
        self.get_permission(grant.permission_id).await?;
        self.store.set_role_object_permission(role_id, grant).await
    }

    pub async fn role_object_permissions(
        &self,
        role_id: Uuid,
    ) -> RbacResult<Vec<RoleObjectPermission>> {
        self.get_role(role_id).await?;
        self.store.list_role_object_permissions(role_id).await
    }

    pub async fn delete_role_object_permission(&self, role_id: Uuid, id: Uuid) -> RbacResult<()> {
        if !self.store.delete_role_object_permission(role_id, id).await? {
            return Err(RbacError::ObjectPermissionNotFound(id));
        }
        info!("Role object permission {} deleted for role {}", id, role_id);
        Ok(())
    }

    // --- seeding ---------------------------------------------------------

    pub async fn seed(&self, seed: &Seed) -> RbacResult<SeedReport> {
        self.store.apply_seed(seed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRbacStore;
    use crate::models::PermissionAction;
    use crate::seed::{ADMIN_ROLE, DEFAULT_USER_ROLE};

    fn admin() -> RbacAdmin {
        RbacAdmin::new(Arc::new(InMemoryRbacStore::new()))
    }

    #[tokio::test]
    async fn test_system_roles_cannot_be_deleted() {
        let admin = admin();
        admin.seed(&Seed::default_blog()).await.unwrap();

        let roles = admin.list_roles().await.unwrap();
        let user_role = roles.iter().find(|r| r.name == DEFAULT_USER_ROLE).unwrap();
        let err = admin.delete_role(user_role.id).await.unwrap_err();
        assert!(matches!(err, RbacError::SystemRole(name) if name == DEFAULT_USER_ROLE));

        let custom = admin.create_role(&NewRole::new("editor", "")).await.unwrap();
        admin.delete_role(custom.id).await.unwrap();
        assert!(matches!(
            admin.get_role(custom.id).await,
            Err(RbacError::RoleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_roles_are_listed_by_name() {
        let admin = admin();
        admin.seed(&Seed::default_blog()).await.unwrap();
        let names: Vec<String> = admin
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec![ADMIN_ROLE, "moderator", DEFAULT_USER_ROLE]);
    }

    #[tokio::test]
    async fn test_permission_code_must_be_dotted() {
        let admin = admin();
        let mut payload =
            NewPermission::for_resource("report", PermissionAction::Read, "Read report");
        payload.code = "reportread".to_string();

        let err = admin.create_permission(&payload).await.unwrap_err();
        assert!(matches!(err, RbacError::Invalid { field: "code", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_permission_code_is_rejected() {
        let admin = admin();
        let payload = NewPermission::for_resource("report", PermissionAction::Read, "Read report");
        admin.create_permission(&payload).await.unwrap();
        assert!(matches!(
            admin.create_permission(&payload).await,
            Err(RbacError::DuplicatePermission(_))
        ));
    }

    #[tokio::test]
    async fn test_granted_permission_keeps_its_identity() {
        let admin = admin();
        let role = admin.create_role(&NewRole::new("editor", "")).await.unwrap();
        let permission = admin
            .create_permission(&NewPermission::for_resource(
                "report",
                PermissionAction::Read,
                "Read report",
            ))
            .await
            .unwrap();
        admin
            .grant_permission_to_role(role.id, permission.id)
            .await
            .unwrap();

        let retarget = UpdatePermission {
            code: Some("report.delete".to_string()),
            action: Some(PermissionAction::Delete),
            ..Default::default()
        };
        let err = admin
            .update_permission(permission.id, &retarget)
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Invalid { field: "code", .. }));
        assert_eq!(
            admin.get_permission(permission.id).await.unwrap().code,
            "report.read"
        );

        // display fields and no-op identity values stay editable
        let rename = UpdatePermission {
            code: Some("report.read".to_string()),
            name: Some("View report".to_string()),
            ..Default::default()
        };
        let updated = admin
            .update_permission(permission.id, &rename)
            .await
            .unwrap();
        assert_eq!(updated.name, "View report");

        // once unreferenced, the identity may change again
        admin
            .revoke_permission_from_role(role.id, permission.id)
            .await
            .unwrap();
        let updated = admin
            .update_permission(permission.id, &retarget)
            .await
            .unwrap();
        assert_eq!(updated.code, "report.delete");
        assert_eq!(updated.action, PermissionAction::Delete);
    }

    #[tokio::test]
    async fn test_overridden_permission_keeps_its_action() {
        let admin = admin();
        let permission = admin
            .create_permission(&NewPermission::for_resource(
                "report",
                PermissionAction::Read,
                "Read report",
            ))
            .await
            .unwrap();
        admin
            .set_user_object_permission(
                Uuid::new_v4(),
                &ObjectPermissionGrant::deny(permission.id, "report", Uuid::new_v4()),
            )
            .await
            .unwrap();

        let update = UpdatePermission {
            action: Some(PermissionAction::List),
            ..Default::default()
        };
        assert!(matches!(
            admin.update_permission(permission.id, &update).await,
            Err(RbacError::Invalid { field: "action", .. })
        ));
    }

    #[tokio::test]
    async fn test_assigning_twice_keeps_one_row_and_first_assigner() {
        let admin = admin();
        let role = admin.create_role(&NewRole::new("editor", "")).await.unwrap();
        let user_id = Uuid::new_v4();
        let first_admin = Uuid::new_v4();

        let (first, created) = admin
            .assign_role(user_id, role.id, Some(first_admin))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = admin
            .assign_role(user_id, role.id, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.assigned_by, Some(first_admin));
        assert_eq!(admin.user_roles(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_removing_missing_links_reports_not_found() {
        let admin = admin();
        let role = admin.create_role(&NewRole::new("editor", "")).await.unwrap();

        assert!(matches!(
            admin.remove_role(Uuid::new_v4(), role.id).await,
            Err(RbacError::UserRoleNotFound { .. })
        ));
        assert!(matches!(
            admin.revoke_permission_from_role(role.id, Uuid::new_v4()).await,
            Err(RbacError::RolePermissionNotFound { .. })
        ));
        assert!(matches!(
            admin.delete_user_object_permission(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(RbacError::ObjectPermissionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grant_requires_existing_role_and_permission() {
        let admin = admin();
        let role = admin.create_role(&NewRole::new("editor", "")).await.unwrap();
        assert!(matches!(
            admin.grant_permission_to_role(role.id, Uuid::new_v4()).await,
            Err(RbacError::PermissionNotFound(_))
        ));
        assert!(matches!(
            admin.assign_role(Uuid::new_v4(), Uuid::new_v4(), None).await,
            Err(RbacError::RoleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_role_checks_name_uniqueness() {
        let admin = admin();
        admin.create_role(&NewRole::new("editor", "")).await.unwrap();
        let other = admin.create_role(&NewRole::new("writer", "")).await.unwrap();

        let err = admin
            .update_role(
                other.id,
                &UpdateRole {
                    name: Some("editor".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::DuplicateRole(_)));

        let updated = admin
            .update_role(
                other.id,
                &UpdateRole {
                    name: None,
                    description: Some("Writes posts".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "writer");
        assert_eq!(updated.description, "Writes posts");
    }
}

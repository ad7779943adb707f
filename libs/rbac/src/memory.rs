//! In-memory [`RbacStore`] backend
//!
//! Mirrors the PostgreSQL constraints (unique names/codes/pairs, cascading
//! deletes) over plain vectors behind a single `RwLock`. Used by the test
//! suites and handy for local experiments without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RbacError, RbacResult};
use crate::models::{
    NewPermission, NewRole, ObjectPermissionGrant, Permission, Role, RoleObjectPermission,
    RolePermission, UpdatePermission, UpdateRole, UserObjectPermission, UserRole,
};
use crate::seed::{Seed, SeedReport};
use crate::store::RbacStore;

#[derive(Debug, Clone)]
struct RolePermissionRow {
    id: Uuid,
    role_id: Uuid,
    permission_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct UserRoleRow {
    id: Uuid,
    user_id: Uuid,
    role_id: Uuid,
    assigned_by: Option<Uuid>,
    assigned_at: DateTime<Utc>,
}

/// Shared shape of user-level and role-level override rows
#[derive(Debug, Clone)]
struct OverrideRow {
    id: Uuid,
    subject_id: Uuid,
    permission_id: Uuid,
    resource_type: String,
    resource_id: Uuid,
    is_granted: bool,
    granted_by: Option<Uuid>,
    granted_at: DateTime<Utc>,
}

impl OverrideRow {
    fn matches(&self, permission_id: Uuid, resource_type: &str, resource_id: Uuid) -> bool {
        self.permission_id == permission_id
            && self.resource_type == resource_type
            && self.resource_id == resource_id
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    role_permissions: Vec<RolePermissionRow>,
    user_roles: Vec<UserRoleRow>,
    user_overrides: Vec<OverrideRow>,
    role_overrides: Vec<OverrideRow>,
}

impl MemoryState {
    fn role(&self, id: Uuid) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    fn permission(&self, id: Uuid) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id)
    }

    fn permission_code(&self, id: Uuid) -> String {
        self.permission(id).map(|p| p.code.clone()).unwrap_or_default()
    }

    fn insert_role(&mut self, new_role: &NewRole) -> RbacResult<Role> {
        if self.roles.iter().any(|r| r.name == new_role.name) {
            return Err(RbacError::DuplicateRole(new_role.name.clone()));
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: new_role.name.clone(),
            description: new_role.description.clone(),
            is_system: new_role.is_system,
            created_at: now,
            updated_at: now,
        };
        self.roles.push(role.clone());
        Ok(role)
    }

    fn insert_permission(&mut self, new_permission: &NewPermission) -> RbacResult<Permission> {
        if self.permissions.iter().any(|p| p.code == new_permission.code) {
            return Err(RbacError::DuplicatePermission(new_permission.code.clone()));
        }
        let now = Utc::now();
        let permission = Permission {
            id: Uuid::new_v4(),
            code: new_permission.code.clone(),
            name: new_permission.name.clone(),
            description: new_permission.description.clone(),
            resource_type: new_permission.resource_type.clone(),
            action: new_permission.action,
            created_at: now,
            updated_at: now,
        };
        self.permissions.push(permission.clone());
        Ok(permission)
    }

    fn link_role_permission(
        &mut self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<(RolePermission, bool)> {
        if self.role(role_id).is_none() {
            return Err(RbacError::RoleNotFound(role_id));
        }
        if self.permission(permission_id).is_none() {
            return Err(RbacError::PermissionNotFound(permission_id));
        }

        if let Some(row) = self
            .role_permissions
            .iter()
            .find(|rp| rp.role_id == role_id && rp.permission_id == permission_id)
        {
            return Ok((self.role_permission_view(row), false));
        }

        let row = RolePermissionRow {
            id: Uuid::new_v4(),
            role_id,
            permission_id,
            created_at: Utc::now(),
        };
        let view = self.role_permission_view(&row);
        self.role_permissions.push(row);
        Ok((view, true))
    }

    fn role_permission_view(&self, row: &RolePermissionRow) -> RolePermission {
        let (code, name) = self
            .permission(row.permission_id)
            .map(|p| (p.code.clone(), p.name.clone()))
            .unwrap_or_default();
        RolePermission {
            id: row.id,
            role_id: row.role_id,
            permission_id: row.permission_id,
            permission_code: code,
            permission_name: name,
            created_at: row.created_at,
        }
    }

    fn user_role_view(&self, row: &UserRoleRow) -> UserRole {
        let (name, description) = self
            .role(row.role_id)
            .map(|r| (r.name.clone(), r.description.clone()))
            .unwrap_or_default();
        UserRole {
            id: row.id,
            user_id: row.user_id,
            role_id: row.role_id,
            role_name: name,
            role_description: description,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
        }
    }

    fn user_override_view(&self, row: &OverrideRow) -> UserObjectPermission {
        UserObjectPermission {
            id: row.id,
            user_id: row.subject_id,
            permission_id: row.permission_id,
            permission_code: self.permission_code(row.permission_id),
            resource_type: row.resource_type.clone(),
            resource_id: row.resource_id,
            is_granted: row.is_granted,
            granted_by: row.granted_by,
            granted_at: row.granted_at,
        }
    }

    fn role_override_view(&self, row: &OverrideRow) -> RoleObjectPermission {
        RoleObjectPermission {
            id: row.id,
            role_id: row.subject_id,
            permission_id: row.permission_id,
            permission_code: self.permission_code(row.permission_id),
            resource_type: row.resource_type.clone(),
            resource_id: row.resource_id,
            is_granted: row.is_granted,
            granted_by: row.granted_by,
            granted_at: row.granted_at,
        }
    }
}

/// Upsert keyed on (subject, permission, resource_type, resource_id).
fn upsert_override(
    rows: &mut Vec<OverrideRow>,
    subject_id: Uuid,
    grant: &ObjectPermissionGrant,
) -> OverrideRow {
    let now = Utc::now();
    if let Some(row) = rows.iter_mut().find(|r| {
        r.subject_id == subject_id
            && r.matches(grant.permission_id, &grant.resource_type, grant.resource_id)
    }) {
        row.is_granted = grant.is_granted;
        row.granted_by = grant.granted_by;
        row.granted_at = now;
        return row.clone();
    }

    let row = OverrideRow {
        id: Uuid::new_v4(),
        subject_id,
        permission_id: grant.permission_id,
        resource_type: grant.resource_type.clone(),
        resource_id: grant.resource_id,
        is_granted: grant.is_granted,
        granted_by: grant.granted_by,
        granted_at: now,
    };
    rows.push(row.clone());
    row
}

fn remove_where<T>(rows: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> bool {
    let before = rows.len();
    rows.retain(|r| !pred(r));
    rows.len() != before
}

/// Thread-safe in-memory RBAC store
#[derive(Debug, Clone, Default)]
pub struct InMemoryRbacStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn create_role(&self, new_role: &NewRole) -> RbacResult<Role> {
        self.state.write().await.insert_role(new_role)
    }

    async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        let mut roles = self.state.read().await.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, id: Uuid) -> RbacResult<Option<Role>> {
        Ok(self.state.read().await.role(id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> RbacResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn update_role(&self, id: Uuid, update: &UpdateRole) -> RbacResult<Option<Role>> {
        let mut state = self.state.write().await;
        if let Some(name) = &update.name {
            if state.roles.iter().any(|r| r.id != id && &r.name == name) {
                return Err(RbacError::DuplicateRole(name.clone()));
            }
        }

        let Some(role) = state.roles.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            role.name = name.clone();
        }
        if let Some(description) = &update.description {
            role.description = description.clone();
        }
        role.updated_at = Utc::now();
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        let removed = remove_where(&mut state.roles, |r| r.id == id);
        if removed {
            state.role_permissions.retain(|rp| rp.role_id != id);
            state.user_roles.retain(|ur| ur.role_id != id);
            state.role_overrides.retain(|o| o.subject_id != id);
        }
        Ok(removed)
    }

    async fn count_role_permissions(&self, role_id: Uuid) -> RbacResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .count() as i64)
    }

    async fn create_permission(&self, new_permission: &NewPermission) -> RbacResult<Permission> {
        self.state.write().await.insert_permission(new_permission)
    }

    async fn list_permissions(&self) -> RbacResult<Vec<Permission>> {
        let mut permissions = self.state.read().await.permissions.clone();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn find_permission(&self, id: Uuid) -> RbacResult<Option<Permission>> {
        Ok(self.state.read().await.permission(id).cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> RbacResult<Option<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions.iter().find(|p| p.code == code).cloned())
    }

    async fn update_permission(
        &self,
        id: Uuid,
        update: &UpdatePermission,
    ) -> RbacResult<Option<Permission>> {
        let mut state = self.state.write().await;
        if let Some(code) = &update.code {
            if state.permissions.iter().any(|p| p.id != id && &p.code == code) {
                return Err(RbacError::DuplicatePermission(code.clone()));
            }
        }

        let Some(permission) = state.permissions.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(code) = &update.code {
            permission.code = code.clone();
        }
        if let Some(name) = &update.name {
            permission.name = name.clone();
        }
        if let Some(description) = &update.description {
            permission.description = description.clone();
        }
        if let Some(resource_type) = &update.resource_type {
            permission.resource_type = resource_type.clone();
        }
        if let Some(action) = update.action {
            permission.action = action;
        }
        permission.updated_at = Utc::now();
        Ok(Some(permission.clone()))
    }

    async fn permission_in_use(&self, id: Uuid) -> RbacResult<bool> {
        let state = self.state.read().await;
        Ok(state.role_permissions.iter().any(|rp| rp.permission_id == id)
            || state.user_overrides.iter().any(|o| o.permission_id == id)
            || state.role_overrides.iter().any(|o| o.permission_id == id))
    }

    async fn delete_permission(&self, id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        let removed = remove_where(&mut state.permissions, |p| p.id == id);
        if removed {
            state.role_permissions.retain(|rp| rp.permission_id != id);
            state.user_overrides.retain(|o| o.permission_id != id);
            state.role_overrides.retain(|o| o.permission_id != id);
        }
        Ok(removed)
    }

    async fn add_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<(RolePermission, bool)> {
        self.state
            .write()
            .await
            .link_role_permission(role_id, permission_id)
    }

    async fn remove_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(remove_where(&mut state.role_permissions, |rp| {
            rp.role_id == role_id && rp.permission_id == permission_id
        }))
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> RbacResult<Vec<RolePermission>> {
        let state = self.state.read().await;
        let mut links: Vec<RolePermission> = state
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .map(|rp| state.role_permission_view(rp))
            .collect();
        links.sort_by(|a, b| a.permission_code.cmp(&b.permission_code));
        Ok(links)
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> RbacResult<(UserRole, bool)> {
        let mut state = self.state.write().await;
        if state.role(role_id).is_none() {
            return Err(RbacError::RoleNotFound(role_id));
        }

        if let Some(row) = state
            .user_roles
            .iter()
            .find(|ur| ur.user_id == user_id && ur.role_id == role_id)
        {
            return Ok((state.user_role_view(row), false));
        }

        let row = UserRoleRow {
            id: Uuid::new_v4(),
            user_id,
            role_id,
            assigned_by,
            assigned_at: Utc::now(),
        };
        let view = state.user_role_view(&row);
        state.user_roles.push(row);
        Ok((view, true))
    }

    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(remove_where(&mut state.user_roles, |ur| {
            ur.user_id == user_id && ur.role_id == role_id
        }))
    }

    async fn list_user_roles(&self, user_id: Uuid) -> RbacResult<Vec<UserRole>> {
        let state = self.state.read().await;
        let mut roles: Vec<UserRole> = state
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .map(|ur| state.user_role_view(ur))
            .collect();
        roles.sort_by(|a, b| a.role_name.cmp(&b.role_name));
        Ok(roles)
    }

    async fn role_ids_for_user(&self, user_id: Uuid) -> RbacResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .map(|ur| ur.role_id)
            .collect())
    }

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> RbacResult<bool> {
        let state = self.state.read().await;
        Ok(state.user_roles.iter().any(|ur| {
            ur.user_id == user_id && state.role(ur.role_id).is_some_and(|r| r.name == role_name)
        }))
    }

    async fn any_role_has_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
    ) -> RbacResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .any(|rp| rp.permission_id == permission_id && role_ids.contains(&rp.role_id)))
    }

    async fn user_object_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>> {
        let state = self.state.read().await;
        Ok(state
            .user_overrides
            .iter()
            .find(|o| {
                o.subject_id == user_id && o.matches(permission_id, resource_type, resource_id)
            })
            .map(|o| o.is_granted))
    }

    async fn role_object_override(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>> {
        let state = self.state.read().await;
        let decisions: Vec<bool> = state
            .role_overrides
            .iter()
            .filter(|o| {
                role_ids.contains(&o.subject_id)
                    && o.matches(permission_id, resource_type, resource_id)
            })
            .map(|o| o.is_granted)
            .collect();

        if decisions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(decisions.into_iter().all(|granted| granted)))
        }
    }

    async fn set_user_object_permission(
        &self,
        user_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<UserObjectPermission> {
        let mut state = self.state.write().await;
        if state.permission(grant.permission_id).is_none() {
            return Err(RbacError::PermissionNotFound(grant.permission_id));
        }
        let row = upsert_override(&mut state.user_overrides, user_id, grant);
        Ok(state.user_override_view(&row))
    }

    async fn set_role_object_permission(
        &self,
        role_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<RoleObjectPermission> {
        let mut state = self.state.write().await;
        if state.role(role_id).is_none() {
            return Err(RbacError::RoleNotFound(role_id));
        }
        if state.permission(grant.permission_id).is_none() {
            return Err(RbacError::PermissionNotFound(grant.permission_id));
        }
        let row = upsert_override(&mut state.role_overrides, role_id, grant);
        Ok(state.role_override_view(&row))
    }

    async fn list_user_object_permissions(
        &self,
        user_id: Uuid,
    ) -> RbacResult<Vec<UserObjectPermission>> {
        let state = self.state.read().await;
        Ok(state
            .user_overrides
            .iter()
            .filter(|o| o.subject_id == user_id)
            .map(|o| state.user_override_view(o))
            .collect())
    }

    async fn list_role_object_permissions(
        &self,
        role_id: Uuid,
    ) -> RbacResult<Vec<RoleObjectPermission>> {
        let state = self.state.read().await;
        Ok(state
            .role_overrides
            .iter()
            .filter(|o| o.subject_id == role_id)
            .map(|o| state.role_override_view(o))
            .collect())
    }

    async fn delete_user_object_permission(&self, user_id: Uuid, id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(remove_where(&mut state.user_overrides, |o| {
            o.id == id && o.subject_id == user_id
        }))
    }

    async fn delete_role_object_permission(&self, role_id: Uuid, id: Uuid) -> RbacResult<bool> {
        let mut state = self.state.write().await;
        Ok(remove_where(&mut state.role_overrides, |o| {
            o.id == id && o.subject_id == role_id
        }))
    }

    async fn apply_seed(&self, seed: &Seed) -> RbacResult<SeedReport> {
        seed.validate()?;

        // Work on a copy so a failure leaves the store untouched.
        let mut guard = self.state.write().await;
        let mut draft = MemoryState {
            roles: guard.roles.clone(),
            permissions: guard.permissions.clone(),
            role_permissions: guard.role_permissions.clone(),
            user_roles: guard.user_roles.clone(),
            user_overrides: guard.user_overrides.clone(),
            role_overrides: guard.role_overrides.clone(),
        };
        let mut report = SeedReport::default();

        for new_role in &seed.roles {
            if !draft.roles.iter().any(|r| r.name == new_role.name) {
                draft.insert_role(new_role)?;
                report.roles_created += 1;
            }
        }

        for new_permission in &seed.permissions {
            if !draft.permissions.iter().any(|p| p.code == new_permission.code) {
                draft.insert_permission(new_permission)?;
                report.permissions_created += 1;
            }
        }

        for (role_name, code) in &seed.grants {
            let role_id = draft
                .roles
                .iter()
                .find(|r| &r.name == role_name)
                .map(|r| r.id)
                .ok_or_else(|| {
                    RbacError::invalid("grants", format!("unknown role '{}'", role_name))
                })?;
            let permission_id = draft
                .permissions
                .iter()
                .find(|p| &p.code == code)
                .map(|p| p.id)
                .ok_or_else(|| {
                    RbacError::invalid("grants", format!("unknown permission '{}'", code))
                })?;

            let (_, created) = draft.link_role_permission(role_id, permission_id)?;
            if created {
                report.grants_created += 1;
            }
        }

        *guard = draft;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PermissionAction;

    async fn store_with_role_and_permission() -> (InMemoryRbacStore, Role, Permission) {
        let store = InMemoryRbacStore::new();
        let role = store
            .create_role(&NewRole::new("editor", "Edits things"))
            .await
            .unwrap();
        let permission = store
            .create_permission(&NewPermission::for_resource(
                "blog.post",
                PermissionAction::Update,
                "Update post",
            ))
            .await
            .unwrap();
        (store, role, permission)
    }

    #[tokio::test]
    async fn test_unique_role_names() {
        let store = InMemoryRbacStore::new();
        store.create_role(&NewRole::new("editor", "")).await.unwrap();
        let err = store.create_role(&NewRole::new("editor", "")).await.unwrap_err();
        assert!(matches!(err, RbacError::DuplicateRole(name) if name == "editor"));
    }

    #[tokio::test]
    async fn test_role_permission_link_is_idempotent() {
        let (store, role, permission) = store_with_role_and_permission().await;

        let (first, created) = store.add_role_permission(role.id, permission.id).await.unwrap();
        assert!(created);
        assert_eq!(first.permission_code, "blog.post.update");

        let (second, created) = store.add_role_permission(role.id, permission.id).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_role_permissions(role.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_role_cascades() {
        let (store, role, permission) = store_with_role_and_permission().await;
        let user_id = Uuid::new_v4();
        store.add_role_permission(role.id, permission.id).await.unwrap();
        store.assign_role(user_id, role.id, None).await.unwrap();
        store
            .set_role_object_permission(
                role.id,
                &ObjectPermissionGrant::grant(permission.id, "blog.post", Uuid::new_v4()),
            )
            .await
            .unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        assert!(store.role_ids_for_user(user_id).await.unwrap().is_empty());
        assert!(store.list_role_permissions(role.id).await.unwrap().is_empty());
        assert!(store.list_role_object_permissions(role.id).await.unwrap().is_empty());
        assert!(!store.delete_role(role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_override_upsert_keeps_single_row() {
        let (store, _, permission) = store_with_role_and_permission().await;
        let user_id = Uuid::new_v4();
        let resource_id = Uuid::new_v4();

        let granted = store
            .set_user_object_permission(
                user_id,
                &ObjectPermissionGrant::grant(permission.id, "blog.post", resource_id),
            )
            .await
            .unwrap();
        let denied = store
            .set_user_object_permission(
                user_id,
                &ObjectPermissionGrant::deny(permission.id, "blog.post", resource_id),
            )
            .await
            .unwrap();

        assert_eq!(granted.id, denied.id);
        assert!(!denied.is_granted);
        assert_eq!(store.list_user_object_permissions(user_id).await.unwrap().len(), 1);
        assert_eq!(
            store
                .user_object_override(user_id, permission.id, "blog.post", resource_id)
                .await
                .unwrap(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_role_override_deny_wins_across_roles() {
        let (store, role, permission) = store_with_role_and_permission().await;
        let other = store.create_role(&NewRole::new("reviewer", "")).await.unwrap();
        let resource_id = Uuid::new_v4();

        store
            .set_role_object_permission(
                role.id,
                &ObjectPermissionGrant::grant(permission.id, "blog.post", resource_id),
            )
            .await
            .unwrap();
        store
            .set_role_object_permission(
                other.id,
                &ObjectPermissionGrant::deny(permission.id, "blog.post", resource_id),
            )
            .await
            .unwrap();

        let only_grant = store
            .role_object_override(&[role.id], permission.id, "blog.post", resource_id)
            .await
            .unwrap();
        assert_eq!(only_grant, Some(true));

        let both = store
            .role_object_override(&[role.id, other.id], permission.id, "blog.post", resource_id)
            .await
            .unwrap();
        assert_eq!(both, Some(false));
    }

    #[tokio::test]
    async fn test_failed_seed_leaves_store_untouched() {
        let store = InMemoryRbacStore::new();
        let mut seed = Seed::default_blog();
        seed.grants.push(("nobody".to_string(), "blog.post.read".to_string()));

        assert!(store.apply_seed(&seed).await.is_err());
        assert!(store.list_roles().await.unwrap().is_empty());
        assert!(store.list_permissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let store = InMemoryRbacStore::new();
        let first = store.apply_seed(&Seed::default_blog()).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                roles_created: 3,
                permissions_created: 5,
                grants_created: 11
            }
        );

        let second = store.apply_seed(&Seed::default_blog()).await.unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(store.list_roles().await.unwrap().len(), 3);
    }
}

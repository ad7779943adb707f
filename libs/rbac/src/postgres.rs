//! PostgreSQL [`RbacStore`] backend
//!
//! Uniqueness lives in the schema (see `schema.sql`); get-or-create paths use
//! `ON CONFLICT` so concurrent callers never produce duplicate rows.

use async_trait::async_trait;
use common::error::is_unique_violation;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{RbacError, RbacResult};
use crate::models::{
    NewPermission, NewRole, ObjectPermissionGrant, Permission, Role, RoleObjectPermission,
    RolePermission, UpdatePermission, UpdateRole, UserObjectPermission, UserRole,
};
use crate::seed::{Seed, SeedReport};
use crate::store::RbacStore;

const ROLE_COLUMNS: &str = "id, name, description, is_system, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, code, name, description, resource_type, action, created_at, updated_at";

/// Map a unique violation to the given domain error, anything else to a database error.
fn on_unique(e: sqlx::Error, duplicate: impl FnOnce() -> RbacError) -> RbacError {
    if is_unique_violation(&e) {
        duplicate()
    } else {
        RbacError::from(e)
    }
}

/// RBAC tables backed by PostgreSQL
#[derive(Clone)]
pub struct PgRbacStore {
    pool: PgPool,
}

impl PgRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn role_permission_view(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<RolePermission> {
        let link = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.id, rp.role_id, rp.permission_id,
                   p.code AS permission_code, p.name AS permission_name, rp.created_at
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND rp.permission_id = $2
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }

    async fn user_role_view(&self, user_id: Uuid, role_id: Uuid) -> RbacResult<UserRole> {
        let link = sqlx::query_as::<_, UserRole>(
            r#"
            SELECT ur.id, ur.user_id, ur.role_id, r.name AS role_name,
                   r.description AS role_description, ur.assigned_by, ur.assigned_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1 AND ur.role_id = $2
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(link)
    }
}

#[async_trait]
impl RbacStore for PgRbacStore {
    async fn create_role(&self, new_role: &NewRole) -> RbacResult<Role> {
        info!("Creating role: {}", new_role.name);

        sqlx::query_as::<_, Role>(&format!(
            "INSERT INTO roles (name, description, is_system) VALUES ($1, $2, $3) RETURNING {}",
            ROLE_COLUMNS
        ))
        .bind(&new_role.name)
        .bind(&new_role.description)
        .bind(new_role.is_system)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_unique(e, || RbacError::DuplicateRole(new_role.name.clone())))
    }

    async fn list_roles(&self) -> RbacResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles ORDER BY name",
            ROLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn find_role(&self, id: Uuid) -> RbacResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE id = $1",
            ROLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> RbacResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE name = $1",
            ROLE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, update: &UpdateRole) -> RbacResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ROLE_COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, || {
                RbacError::DuplicateRole(update.name.clone().unwrap_or_default())
            })
        })
    }

    async fn delete_role(&self, id: Uuid) -> RbacResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_role_permissions(&self, role_id: Uuid) -> RbacResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
                .bind(role_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn create_permission(&self, new_permission: &NewPermission) -> RbacResult<Permission> {
        info!("Creating permission: {}", new_permission.code);

        sqlx::query_as::<_, Permission>(&format!(
            r#"
            INSERT INTO permissions (code, name, description, resource_type, action)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(&new_permission.code)
        .bind(&new_permission.name)
        .bind(&new_permission.description)
        .bind(&new_permission.resource_type)
        .bind(new_permission.action.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, || {
                RbacError::DuplicatePermission(new_permission.code.clone())
            })
        })
    }

    async fn list_permissions(&self) -> RbacResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions ORDER BY code",
            PERMISSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn find_permission(&self, id: Uuid) -> RbacResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE id = $1",
            PERMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn find_permission_by_code(&self, code: &str) -> RbacResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE code = $1",
            PERMISSION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: Uuid,
        update: &UpdatePermission,
    ) -> RbacResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>(&format!(
            r#"
            UPDATE permissions
            SET code = COALESCE($2, code),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                resource_type = COALESCE($5, resource_type),
                action = COALESCE($6, action),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(id)
        .bind(update.code.as_deref())
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.resource_type.as_deref())
        .bind(update.action.map(|a| a.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            on_unique(e, || {
                RbacError::DuplicatePermission(update.code.clone().unwrap_or_default())
            })
        })
    }

    async fn delete_permission(&self, id: Uuid) -> RbacResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn permission_in_use(&self, id: Uuid) -> RbacResult<bool> {
        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM role_permissions WHERE permission_id = $1)
                OR EXISTS (SELECT 1 FROM user_object_permissions WHERE permission_id = $1)
                OR EXISTS (SELECT 1 FROM role_object_permissions WHERE permission_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(in_use)
    }

    async fn add_role_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> RbacResult<(RolePermission, bool)> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;

        let link = self.role_permission_view(role_id, permission_id).await?;
        Ok((link, inserted.is_some()))
    }

    async fn remove_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> RbacResult<bool> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_role_permissions(&self, role_id: Uuid) -> RbacResult<Vec<RolePermission>> {
        let links = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.id, rp.role_id, rp.permission_id,
                   p.code AS permission_code, p.name AS permission_name, rp.created_at
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> RbacResult<(UserRole, bool)> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO user_roles (user_id, role_id, assigned_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, role_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(assigned_by)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            info!("Assigned role {} to user {}", role_id, user_id);
        }

        let link = self.user_role_view(user_id, role_id).await?;
        Ok((link, inserted.is_some()))
    }

    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> RbacResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_user_roles(&self, user_id: Uuid) -> RbacResult<Vec<UserRole>> {
        let roles = sqlx::query_as::<_, UserRole>(
            r#"
            SELECT ur.id, ur.user_id, ur.role_id, r.name AS role_name,
                   r.description AS role_description, ur.assigned_by, ur.assigned_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn role_ids_for_user(&self, user_id: Uuid) -> RbacResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar("SELECT role_id FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> RbacResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_roles ur
                JOIN roles r ON r.id = ur.role_id
                WHERE ur.user_id = $1 AND r.name = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(role_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn any_role_has_permission(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
    ) -> RbacResult<bool> {
        if role_ids.is_empty() {
            return Ok(false);
        }

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_permissions
                WHERE role_id = ANY($1) AND permission_id = $2
            )
            "#,
        )
        .bind(role_ids)
        .bind(permission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn user_object_override(
        &self,
        user_id: Uuid,
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>> {
        let granted: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT is_granted FROM user_object_permissions
            WHERE user_id = $1 AND permission_id = $2
              AND resource_type = $3 AND resource_id = $4
            "#,
        )
        .bind(user_id)
        .bind(permission_id)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(granted)
    }

    async fn role_object_override(
        &self,
        role_ids: &[Uuid],
        permission_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
    ) -> RbacResult<Option<bool>> {
        if role_ids.is_empty() {
            return Ok(None);
        }

        // bool_and is NULL over zero rows and false as soon as one role denies.
        let granted: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT bool_and(is_granted) FROM role_object_permissions
            WHERE role_id = ANY($1) AND permission_id = $2
              AND resource_type = $3 AND resource_id = $4
            "#,
        )
        .bind(role_ids)
        .bind(permission_id)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            "Role override for permission {} on {}:{} -> {:?}",
            permission_id, resource_type, resource_id, granted
        );
        Ok(granted)
    }

    async fn set_user_object_permission(
        &self,
        user_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<UserObjectPermission> {
        let entry = sqlx::query_as::<_, UserObjectPermission>(
            r#"
            WITH upserted AS (
                INSERT INTO user_object_permissions
                    (user_id, permission_id, resource_type, resource_id, is_granted, granted_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (user_id, permission_id, resource_type, resource_id)
                DO UPDATE SET is_granted = EXCLUDED.is_granted,
                              granted_by = EXCLUDED.granted_by,
                              granted_at = NOW()
                RETURNING *
            )
            SELECT u.id, u.user_id, u.permission_id, p.code AS permission_code,
                   u.resource_type, u.resource_id, u.is_granted, u.granted_by, u.granted_at
            FROM upserted u
            JOIN permissions p ON p.id = u.permission_id
            "#,
        )
        .bind(user_id)
        .bind(grant.permission_id)
        .bind(&grant.resource_type)
        .bind(grant.resource_id)
        .bind(grant.is_granted)
        .bind(grant.granted_by)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Set user object permission {} for user {} on {}:{} (granted: {})",
            entry.permission_code, user_id, entry.resource_type, entry.resource_id, entry.is_granted
        );
        Ok(entry)
    }

    async fn set_role_object_permission(
        &self,
        role_id: Uuid,
        grant: &ObjectPermissionGrant,
    ) -> RbacResult<RoleObjectPermission> {
        let entry = sqlx::query_as::<_, RoleObjectPermission>(
            r#"
            WITH upserted AS (
                INSERT INTO role_object_permissions
                    (role_id, permission_id, resource_type, resource_id, is_granted, granted_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (role_id, permission_id, resource_type, resource_id)
                DO UPDATE SET is_granted = EXCLUDED.is_granted,
                              granted_by = EXCLUDED.granted_by,
                              granted_at = NOW()
                RETURNING *
            )
            SELECT u.id, u.role_id, u.permission_id, p.code AS permission_code,
                   u.resource_type, u.resource_id, u.is_granted, u.granted_by, u.granted_at
            FROM upserted u
            JOIN permissions p ON p.id = u.permission_id
            "#,
        )
        .bind(role_id)
        .bind(grant.permission_id)
        .bind(&grant.resource_type)
        .bind(grant.resource_id)
        .bind(grant.is_granted)
        .bind(grant.granted_by)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Set role object permission {} for role {} on {}:{} (granted: {})",
            entry.permission_code, role_id, entry.resource_type, entry.resource_id, entry.is_granted
        );
        Ok(entry)
    }

    async fn list_user_object_permissions(
        &self,
        user_id: Uuid,
    ) -> RbacResult<Vec<UserObjectPermission>> {
        let entries = sqlx::query_as::<_, UserObjectPermission>(
            r#"
            SELECT u.id, u.user_id, u.permission_id, p.code AS permission_code,
                   u.resource_type, u.resource_id, u.is_granted, u.granted_by, u.granted_at
            FROM user_object_permissions u
            JOIN permissions p ON p.id = u.permission_id
            WHERE u.user_id = $1
            ORDER BY u.granted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn list_role_object_permissions(
        &self,
        role_id: Uuid,
    ) -> RbacResult<Vec<RoleObjectPermission>> {
        let entries = sqlx::query_as::<_, RoleObjectPermission>(
            r#"
            SELECT r.id, r.role_id, r.permission_id, p.code AS permission_code,
                   r.resource_type, r.resource_id, r.is_granted, r.granted_by, r.granted_at
            FROM role_object_permissions r
            JOIN permissions p ON p.id = r.permission_id
            WHERE r.role_id = $1
            ORDER BY r.granted_at DESC
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn delete_user_object_permission(&self, user_id: Uuid, id: Uuid) -> RbacResult<bool> {
        let result =
            sqlx::query("DELETE FROM user_object_permissions WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_role_object_permission(&self, role_id: Uuid, id: Uuid) -> RbacResult<bool> {
        let result =
            sqlx::query("DELETE FROM role_object_permissions WHERE id = $1 AND role_id = $2")
                .bind(id)
                .bind(role_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_seed(&self, seed: &Seed) -> RbacResult<SeedReport> {
        seed.validate()?;

        let mut report = SeedReport::default();
        let mut tx = self.pool.begin().await?;

        for role in &seed.roles {
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO roles (name, description, is_system)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.is_system)
            .fetch_optional(&mut *tx)
            .await?;
            if inserted.is_some() {
                report.roles_created += 1;
            }
        }

        for permission in &seed.permissions {
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO permissions (code, name, description, resource_type, action)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (code) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&permission.code)
            .bind(&permission.name)
            .bind(&permission.description)
            .bind(&permission.resource_type)
            .bind(permission.action.as_str())
            .fetch_optional(&mut *tx)
            .await?;
            if inserted.is_some() {
                report.permissions_created += 1;
            }
        }

        for (role_name, code) in &seed.grants {
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT r.id, p.id FROM roles r, permissions p
                WHERE r.name = $1 AND p.code = $2
                ON CONFLICT (role_id, permission_id) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(role_name)
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
            if inserted.is_some() {
                report.grants_created += 1;
            }
        }

        tx.commit().await?;

        info!(
            "Seed applied: {} roles, {} permissions, {} grants created",
            report.roles_created, report.permissions_created, report.grants_created
        );
        Ok(report)
    }
}

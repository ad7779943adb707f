//! Default roles and permissions
//!
//! A [`Seed`] is applied in one transaction by [`crate::RbacStore::apply_seed`]
//! with get-or-create semantics, so re-running it is harmless.

use serde::Serialize;

use crate::error::{RbacError, RbacResult};
use crate::models::{NewPermission, NewRole, PermissionAction, is_well_formed_code};

pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_USER_ROLE: &str = "user";
pub const MODERATOR_ROLE: &str = "moderator";

/// Resource type of blog posts
pub const BLOG_POST: &str = "blog.post";

/// Roles, permissions and role-permission links to ensure exist
#[derive(Debug, Clone, Default)]
pub struct Seed {
    pub roles: Vec<NewRole>,
    pub permissions: Vec<NewPermission>,
    /// (role name, permission code)
    pub grants: Vec<(String, String)>,
}

/// Number of rows actually inserted by a seed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub roles_created: usize,
    pub permissions_created: usize,
    pub grants_created: usize,
}

impl Seed {
    /// Roles `admin` and `user` (both system) plus `moderator`, with the
    /// `blog.post.*` permissions distributed between them.
    pub fn default_blog() -> Self {
        let roles = vec![
            NewRole::system(ADMIN_ROLE, "Administrator with full access"),
            NewRole::system(DEFAULT_USER_ROLE, "Regular user"),
            NewRole::new(MODERATOR_ROLE, "Moderator allowed to edit content"),
        ];

        let permissions = vec![
            NewPermission::for_resource(BLOG_POST, PermissionAction::Create, "Create post"),
            NewPermission::for_resource(BLOG_POST, PermissionAction::Read, "Read post"),
            NewPermission::for_resource(BLOG_POST, PermissionAction::Update, "Update post"),
            NewPermission::for_resource(BLOG_POST, PermissionAction::Delete, "Delete post"),
            NewPermission::for_resource(BLOG_POST, PermissionAction::List, "List posts"),
        ];

        let matrix: Vec<(&str, Vec<PermissionAction>)> = vec![
            (ADMIN_ROLE, PermissionAction::ALL.to_vec()),
            (
                DEFAULT_USER_ROLE,
                vec![PermissionAction::Read, PermissionAction::List],
            ),
            (
                MODERATOR_ROLE,
                vec![
                    PermissionAction::Read,
                    PermissionAction::List,
                    PermissionAction::Update,
                    PermissionAction::Delete,
                ],
            ),
        ];

        let grants = matrix
            .iter()
            .flat_map(|(role, actions)| {
                actions
                    .iter()
                    .map(move |action| (role.to_string(), format!("{}.{}", BLOG_POST, action)))
            })
            .collect();

        Self {
            roles,
            permissions,
            grants,
        }
    }

    /// Every grant must reference a role and a permission declared in this seed.
    pub fn validate(&self) -> RbacResult<()> {
        for permission in &self.permissions {
            if !is_well_formed_code(&permission.code) {
                return Err(RbacError::invalid(
                    "code",
                    format!("'{}' is not of the form resource.action", permission.code),
                ));
            }
        }

        for (role, code) in &self.grants {
            if !self.roles.iter().any(|r| &r.name == role) {
                return Err(RbacError::invalid(
                    "grants",
                    format!("role '{}' is not declared in the seed", role),
                ));
            }
            if !self.permissions.iter().any(|p| &p.code == code) {
                return Err(RbacError::invalid(
                    "grants",
                    format!("permission '{}' is not declared in the seed", code),
                ));
            }
        }

        Ok(())
    }
}

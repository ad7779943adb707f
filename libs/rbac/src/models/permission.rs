//! Permission model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Action a permission grants on its resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl PermissionAction {
    pub const ALL: [PermissionAction; 5] = [
        PermissionAction::Create,
        PermissionAction::Read,
        PermissionAction::Update,
        PermissionAction::Delete,
        PermissionAction::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::Create => "create",
            PermissionAction::Read => "read",
            PermissionAction::Update => "update",
            PermissionAction::Delete => "delete",
            PermissionAction::List => "list",
        }
    }

    /// Human readable label used by the admin listing
    pub fn label(&self) -> &'static str {
        match self {
            PermissionAction::Create => "Create",
            PermissionAction::Read => "Read",
            PermissionAction::Update => "Update",
            PermissionAction::Delete => "Delete",
            PermissionAction::List => "List",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown permission action '{0}', expected one of: create, read, update, delete, list")]
pub struct UnknownAction(pub String);

impl FromStr for PermissionAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

impl TryFrom<String> for PermissionAction {
    type Error = UnknownAction;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Permission entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Permission {
    pub id: Uuid,
    /// Globally unique dotted code, e.g. `blog.post.create`
    pub code: String,
    pub name: String,
    pub description: String,
    pub resource_type: String,
    #[sqlx(try_from = "String")]
    pub action: PermissionAction,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New permission creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPermission {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource_type: String,
    pub action: PermissionAction,
}

impl NewPermission {
    /// Build a permission whose code is `<resource_type>.<action>`.
    pub fn for_resource(
        resource_type: impl Into<String>,
        action: PermissionAction,
        name: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        Self {
            code: format!("{}.{}", resource_type, action),
            name: name.into(),
            description: String::new(),
            resource_type,
            action,
        }
    }
}

/// Permission update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub resource_type: Option<String>,
    pub action: Option<PermissionAction>,
}

/// A permission code must be `resource.action`: at least one dot, no empty segment.
pub fn is_well_formed_code(code: &str) -> bool {
    code.contains('.') && code.split('.').all(|segment| !segment.trim().is_empty())
}

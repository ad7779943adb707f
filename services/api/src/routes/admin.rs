//! RBAC administration endpoints
//!
//! Every route requires an authenticated caller holding the `admin` role.
//! Creating a link that already exists answers 200 with the existing row
//! instead of 201.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get},
};
use chrono::{DateTime, Utc};
use rbac::models::{
    NewPermission, NewRole, ObjectPermissionGrant, Permission, Role, RoleObjectPermission,
    RolePermission, UpdatePermission, UpdateRole, UserObjectPermission, UserRole,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, AppJson},
    middleware::{AuthUser, auth_middleware, require_admin},
    models::{Page, PageQuery, User},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: Role,
    pub permissions_count: i64,
    pub can_be_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    #[serde(flatten)]
    pub permission: Permission,
    pub action_display: &'static str,
}

impl From<Permission> for PermissionResponse {
    fn from(permission: Permission) -> Self {
        Self {
            action_display: permission.action.label(),
            permission,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Only name and description are accepted; system roles come from seeding
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionRequest {
    pub permission_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/roles/", get(list_roles).post(create_role))
        .route(
            "/admin/roles/:role_id/",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route(
            "/admin/permissions/",
            get(list_permissions).post(create_permission),
        )
        .route(
            "/admin/permissions/:permission_id/",
            get(get_permission)
                .patch(update_permission)
                .delete(delete_permission),
        )
        .route(
            "/admin/roles/:role_id/permissions/",
            get(list_role_permissions).post(grant_role_permission),
        )
        .route(
            "/admin/roles/:role_id/permissions/:permission_id/",
            delete(revoke_role_permission),
        )
        .route("/admin/users/", get(list_users))
        .route(
            "/admin/users/:user_id/roles/",
            get(list_user_roles).post(assign_user_role),
        )
        .route(
            "/admin/users/:user_id/roles/:role_id/",
            delete(remove_user_role),
        )
        .route(
            "/admin/users/:user_id/object-permissions/",
            get(list_user_object_permissions).post(set_user_object_permission),
        )
        .route(
            "/admin/users/:user_id/object-permissions/:grant_id/",
            delete(delete_user_object_permission),
        )
        .route(
            "/admin/roles/:role_id/object-permissions/",
            get(list_role_object_permissions).post(set_role_object_permission),
        )
        .route(
            "/admin/roles/:role_id/object-permissions/:grant_id/",
            delete(delete_role_object_permission),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn created_or_ok(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

async fn role_response(state: &AppState, role: Role) -> ApiResult<RoleResponse> {
    let permissions_count = state.rbac.role_permission_count(role.id).await?;
    Ok(RoleResponse {
        can_be_deleted: role.can_be_deleted(),
        permissions_count,
        role,
    })
}

/// Role assignments only target active, non-deleted accounts
async fn require_active_user(state: &AppState, user_id: Uuid) -> ApiResult<User> {
    state
        .user_repository
        .find_by_id(user_id)
        .await?
        .filter(User::can_authenticate)
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user_id)))
}

// --- roles ---------------------------------------------------------------

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state.rbac.list_roles().await?;
    let mut response = Vec::with_capacity(roles.len());
    for role in roles {
        response.push(role_response(&state, role).await?);
    }
    Ok(Json(response))
}

pub async fn create_role(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state
        .rbac
        .create_role(&NewRole::new(payload.name, payload.description))
        .await?;
    Ok((StatusCode::CREATED, Json(role_response(&state, role).await?)))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.rbac.get_role(role_id).await?;
    Ok(Json(role_response(&state, role).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    AppJson(update): AppJson<UpdateRole>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.rbac.update_role(role_id, &update).await?;
    Ok(Json(role_response(&state, role).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.rbac.delete_role(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- permissions ---------------------------------------------------------

pub async fn list_permissions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PermissionResponse>>> {
    let permissions = state.rbac.list_permissions().await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

pub async fn create_permission(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewPermission>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = state.rbac.create_permission(&payload).await?;
    Ok((StatusCode::CREATED, Json(permission.into())))
}

pub async fn get_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<Json<PermissionResponse>> {
    Ok(Json(state.rbac.get_permission(permission_id).await?.into()))
}

pub async fn update_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
    AppJson(update): AppJson<UpdatePermission>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = state.rbac.update_permission(permission_id, &update).await?;
    Ok(Json(permission.into()))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.rbac.delete_permission(permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- role -> permission --------------------------------------------------

pub async fn list_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RolePermission>>> {
    Ok(Json(state.rbac.role_permissions(role_id).await?))
}

pub async fn grant_role_permission(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    AppJson(payload): AppJson<AssignPermissionRequest>,
) -> ApiResult<(StatusCode, Json<RolePermission>)> {
    let (link, created) = state
        .rbac
        .grant_permission_to_role(role_id, payload.permission_id)
        .await?;
    Ok((created_or_ok(created), Json(link)))
}

pub async fn revoke_role_permission(
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .rbac
        .revoke_permission_from_role(role_id, permission_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- users ---------------------------------------------------------------

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<AdminUserResponse>>> {
    let (users, total) = state
        .user_repository
        .list_active(query.limit() as i64, query.offset())
        .await?;

    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let roles = state
            .rbac
            .user_roles(user.id)
            .await?
            .into_iter()
            .map(|link| link.role_name)
            .collect();
        items.push(AdminUserResponse {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            is_active: user.is_active,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        });
    }

    Ok(Json(Page {
        items,
        page: query.page(),
        limit: query.limit(),
        total,
    }))
}

pub async fn list_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserRole>>> {
    let user = require_active_user(&state, user_id).await?;
    Ok(Json(state.rbac.user_roles(user.id).await?))
}

pub async fn assign_user_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    AppJson(payload): AppJson<AssignRoleRequest>,
) -> ApiResult<(StatusCode, Json<UserRole>)> {
    let user = require_active_user(&state, user_id).await?;
    let (link, created) = state
        .rbac
        .assign_role(user.id, payload.role_id, Some(auth.id()))
        .await?;
    Ok((created_or_ok(created), Json(link)))
}

pub async fn remove_user_role(
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let user = require_active_user(&state, user_id).await?;
    state.rbac.get_role(role_id).await?;
    state.rbac.remove_role(user.id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- object overrides ----------------------------------------------------

pub async fn list_user_object_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UserObjectPermission>>> {
    let user = require_active_user(&state, user_id).await?;
    Ok(Json(state.rbac.user_object_permissions(user.id).await?))
}

pub async fn set_user_object_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
    AppJson(grant): AppJson<ObjectPermissionGrant>,
) -> ApiResult<Json<UserObjectPermission>> {
    let user = require_active_user(&state, user_id).await?;
    let stored = state
        .rbac
        .set_user_object_permission(user.id, &grant.by(auth.id()))
        .await?;
    Ok(Json(stored))
}

pub async fn delete_user_object_permission(
    State(state): State<AppState>,
    Path((user_id, grant_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .rbac
        .delete_user_object_permission(user_id, grant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_role_object_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoleObjectPermission>>> {
    Ok(Json(state.rbac.role_object_permissions(role_id).await?))
}

pub async fn set_role_object_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(role_id): Path<Uuid>,
    AppJson(grant): AppJson<ObjectPermissionGrant>,
) -> ApiResult<Json<RoleObjectPermission>> {
    let stored = state
        .rbac
        .set_role_object_permission(role_id, &grant.by(auth.id()))
        .await?;
    Ok(Json(stored))
}

pub async fn delete_role_object_permission(
    State(state): State<AppState>,
    Path((role_id, grant_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state
        .rbac
        .delete_role_object_permission(role_id, grant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{
        create_router,
        test_support::{send, test_state},
    };
    use rbac::Seed;
    use rbac::models::PermissionAction;
    use rbac::seed::ADMIN_ROLE;

    fn role_request(name: &str) -> AppJson<RoleRequest> {
        AppJson(RoleRequest {
            name: name.to_string(),
            description: String::new(),
        })
    }

    #[tokio::test]
    async fn test_admin_routes_require_authentication() {
        let (state, _) = test_state();
        let (status, _) =
            send(create_router(state), "GET", "/api/v1/admin/roles/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_crud_and_system_role_protection() {
        let (state, _) = test_state();
        state.rbac.seed(&Seed::default_blog()).await.unwrap();

        let (status, Json(editor)) = create_role(State(state.clone()), role_request("editor"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(editor.can_be_deleted);
        assert_eq!(editor.permissions_count, 0);

        let duplicate = create_role(State(state.clone()), role_request("editor")).await;
        assert_eq!(duplicate.unwrap_err().status(), StatusCode::CONFLICT);

        let Json(roles) = list_roles(State(state.clone())).await.unwrap();
        let admin = roles.iter().find(|r| r.role.name == ADMIN_ROLE).unwrap();
        assert_eq!(admin.permissions_count, 5);
        assert!(!admin.can_be_deleted);

        let rejected = delete_role(State(state.clone()), Path(admin.role.id)).await;
        assert_eq!(
            rejected.unwrap_err().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let deleted = delete_role(State(state.clone()), Path(editor.role.id))
            .await
            .unwrap();
        assert_eq!(deleted, StatusCode::NO_CONTENT);
        let missing = get_role(State(state), Path(editor.role.id)).await;
        assert_eq!(missing.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_granting_twice_answers_created_then_ok() {
        let (state, _) = test_state();
        let (_, Json(role)) = create_role(State(state.clone()), role_request("editor"))
            .await
            .unwrap();
        let (_, Json(permission)) = create_permission(
            State(state.clone()),
            AppJson(NewPermission::for_resource(
                "blog.comment",
                PermissionAction::Create,
                "Create comment",
            )),
        )
        .await
        .unwrap();
        assert_eq!(permission.action_display, PermissionAction::Create.label());

        let payload = || {
            AppJson(AssignPermissionRequest {
                permission_id: permission.permission.id,
            })
        };
        let (first, _) = grant_role_permission(State(state.clone()), Path(role.role.id), payload())
            .await
            .unwrap();
        let (second, _) = grant_role_permission(State(state.clone()), Path(role.role.id), payload())
            .await
            .unwrap();
        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::OK);

        let Json(links) = list_role_permissions(State(state.clone()), Path(role.role.id))
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].permission_code, "blog.comment.create");

        revoke_role_permission(
            State(state.clone()),
            Path((role.role.id, permission.permission.id)),
        )
        .await
        .unwrap();
        let again = revoke_role_permission(
            State(state),
            Path((role.role.id, permission.permission.id)),
        )
        .await;
        assert_eq!(again.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_granted_permission_code_cannot_be_retargeted() {
        let (state, _) = test_state();
        state.rbac.seed(&Seed::default_blog()).await.unwrap();
        let read = state
            .rbac
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.code == "blog.post.read")
            .unwrap();

        let result = update_permission(
            State(state.clone()),
            Path(read.id),
            AppJson(UpdatePermission {
                code: Some("blog.post.delete_all".to_string()),
                ..Default::default()
            }),
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let Json(unchanged) = get_permission(State(state), Path(read.id)).await.unwrap();
        assert_eq!(unchanged.permission.code, "blog.post.read");
    }

    #[tokio::test]
    async fn test_role_object_override_is_stamped_with_granting_admin() {
        let (state, _) = test_state();
        state.rbac.seed(&Seed::default_blog()).await.unwrap();
        let permission = state
            .rbac
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.code == "blog.post.update")
            .unwrap();
        let role = state
            .rbac
            .list_roles()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == rbac::seed::MODERATOR_ROLE)
            .unwrap();

        let admin = crate::models::user::tests::sample_user();
        let auth = AuthUser {
            token_jti: Uuid::new_v4(),
            token: String::new(),
            user: admin.clone(),
        };
        let post_id = Uuid::new_v4();

        let Json(stored) = set_role_object_permission(
            State(state.clone()),
            Extension(auth),
            Path(role.id),
            AppJson(ObjectPermissionGrant::deny(
                permission.id,
                rbac::seed::BLOG_POST,
                post_id,
            )),
        )
        .await
        .unwrap();
        assert!(!stored.is_granted);
        assert_eq!(stored.granted_by, Some(admin.id));

        let Json(listed) = list_role_object_permissions(State(state.clone()), Path(role.id))
            .await
            .unwrap();
        assert_eq!(listed, vec![stored.clone()]);

        delete_role_object_permission(State(state.clone()), Path((role.id, stored.id)))
            .await
            .unwrap();
        let Json(listed) = list_role_object_permissions(State(state), Path(role.id))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}

//! Blog posts
//!
//! Access to a single post is decided per object: an explicit override for
//! the caller (or one of their roles) wins, then authorship, then the
//! role-based `blog.post.*` permission.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use rbac::{PermissionEvaluator, models::PermissionAction, seed::BLOG_POST};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, AppJson},
    middleware::{AuthUser, optional_auth},
    models::{NewPost, PageQuery, Post, PostListResponse, UpdatePost, User},
    state::AppState,
    validation::{FieldErrors, validate_title},
};

/// Actions reported by the per-post permissions endpoint
const OBJECT_ACTIONS: [PermissionAction; 3] = [
    PermissionAction::Read,
    PermissionAction::Update,
    PermissionAction::Delete,
];

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/blog/posts/", get(list_posts).post(create_post))
        .route("/blog/posts/mine/", get(my_posts))
        .route(
            "/blog/posts/:id/",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route("/blog/posts/:id/publish/", post(publish_post))
        .route("/blog/posts/:id/unpublish/", post(unpublish_post))
        .route("/blog/posts/:id/permissions/", get(post_permissions))
        .route_layer(middleware::from_fn_with_state(state, optional_auth))
}

fn permission_code(action: PermissionAction) -> String {
    format!("{}.{}", BLOG_POST, action)
}

/// Object-level decision for `user` performing `action` on `post`
pub(crate) async fn can_access_post(
    evaluator: &PermissionEvaluator,
    user: &User,
    post: &Post,
    action: PermissionAction,
) -> bool {
    if !user.can_authenticate() {
        return false;
    }

    let code = permission_code(action);

    if let Some(decision) = evaluator
        .check_object_permission(user, &code, BLOG_POST, post.id)
        .await
    {
        debug!("Override on post {} for {}: {}", post.id, code, decision);
        return decision;
    }

    if post.author_id == user.id {
        return true;
    }

    evaluator.has_permission(user, &code).await
}

fn post_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Post {} not found", id))
}

async fn find_post(state: &AppState, id: Uuid) -> ApiResult<Post> {
    state
        .post_repository
        .find(id)
        .await?
        .ok_or_else(|| post_not_found(id))
}

/// 204 when the row went away, 404 when it was already gone
fn deleted_status(deleted: bool, id: Uuid) -> ApiResult<StatusCode> {
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(post_not_found(id))
    }
}

/// Load a post the caller is allowed to act on; 403 otherwise
async fn authorize(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    action: PermissionAction,
) -> ApiResult<Post> {
    let post = find_post(state, id).await?;
    if !can_access_post(&state.evaluator, &auth.user, &post, action).await {
        return Err(ApiError::permission_denied(format!(
            "You are not allowed to {} this post",
            action
        )));
    }
    Ok(post)
}

fn validate_new_post(post: &NewPost) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    errors.check("title", validate_title(&post.title));
    errors.finish()
}

fn validate_update(update: &UpdatePost) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(title) = &update.title {
        errors.check("title", validate_title(title));
    }
    errors.finish()
}

/// Published posts, newest first
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let (items, total) = state
        .post_repository
        .list_published(query.limit() as i64, query.offset())
        .await?;

    Ok(Json(PostListResponse {
        items,
        page: query.page(),
        limit: query.limit(),
        total,
    }))
}

/// The caller's own posts, drafts included
pub async fn my_posts(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.post_repository.list_by_author(auth.id()).await?))
}

/// Drafts are reported as missing to anyone not allowed to read them
pub async fn get_post(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    let post = find_post(&state, id).await?;
    if post.is_published {
        return Ok(Json(post));
    }

    let visible = match &auth {
        Some(auth) => {
            can_access_post(&state.evaluator, &auth.user, &post, PermissionAction::Read).await
        }
        None => false,
    };
    if !visible {
        return Err(post_not_found(id));
    }
    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<NewPost>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let code = permission_code(PermissionAction::Create);
    if !state.evaluator.has_permission(&auth.user, &code).await {
        return Err(ApiError::permission_denied("You are not allowed to create posts"));
    }
    validate_new_post(&payload)?;

    let post = state.post_repository.create(auth.id(), &payload).await?;
    info!("Post {} created by {}", post.id, auth.id());
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(update): AppJson<UpdatePost>,
) -> ApiResult<Json<Post>> {
    authorize(&state, &auth, id, PermissionAction::Update).await?;
    validate_update(&update)?;

    let post = state
        .post_repository
        .update(id, &update)
        .await?
        .ok_or_else(|| post_not_found(id))?;
    info!("Post {} updated by {}", post.id, auth.id());
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(&state, &auth, id, PermissionAction::Delete).await?;
    let status = deleted_status(state.post_repository.delete(id).await?, id)?;
    info!("Post {} deleted by {}", id, auth.id());
    Ok(status)
}

async fn set_published(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    published: bool,
) -> ApiResult<Json<Post>> {
    authorize(state, auth, id, PermissionAction::Update).await?;
    let post = state
        .post_repository
        .set_published(id, published)
        .await?
        .ok_or_else(|| post_not_found(id))?;
    info!(
        "Post {} {} by {}",
        id,
        if published { "published" } else { "unpublished" },
        auth.id()
    );
    Ok(Json(post))
}

pub async fn publish_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    set_published(&state, &auth, id, true).await
}

pub async fn unpublish_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    set_published(&state, &auth, id, false).await
}

/// `{code: bool}` for read, update and delete on this post
pub async fn post_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HashMap<String, bool>>> {
    let post = find_post(&state, id).await?;
    Ok(Json(
        object_permissions(&state.evaluator, &auth.user, &post).await,
    ))
}

async fn object_permissions(
    evaluator: &PermissionEvaluator,
    user: &User,
    post: &Post,
) -> HashMap<String, bool> {
    let mut result = HashMap::with_capacity(OBJECT_ACTIONS.len());
    for action in OBJECT_ACTIONS {
        let allowed = can_access_post(evaluator, user, post, action).await;
        result.insert(permission_code(action), allowed);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::sample_user;
    use crate::routes::{
        create_router,
        test_support::{send, test_state},
    };
    use chrono::Utc;
    use rbac::models::ObjectPermissionGrant;
    use rbac::seed::{DEFAULT_USER_ROLE, MODERATOR_ROLE};
    use rbac::{RbacAdmin, Seed};

    fn post_by(author_id: Uuid) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::new_v4(),
            author_id,
            title: "Hello".to_string(),
            content: "First post".to_string(),
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_delete_of_vanished_post_is_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(deleted_status(true, id).unwrap(), StatusCode::NO_CONTENT);
        let err = deleted_status(false, id).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    async fn seeded() -> (RbacAdmin, PermissionEvaluator) {
        let (state, _) = test_state();
        state.rbac.seed(&Seed::default_blog()).await.unwrap();
        (state.rbac, state.evaluator)
    }

    async fn permission_id(admin: &RbacAdmin, code: &str) -> Uuid {
        admin
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.code == code)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_author_may_edit_without_role_permission() {
        let (admin, evaluator) = seeded().await;
        let author = sample_user();
        admin
            .assign_role_by_name(author.id, DEFAULT_USER_ROLE, None)
            .await
            .unwrap();
        let post = post_by(author.id);

        let stranger = sample_user();
        admin
            .assign_role_by_name(stranger.id, DEFAULT_USER_ROLE, None)
            .await
            .unwrap();

        assert!(can_access_post(&evaluator, &author, &post, PermissionAction::Update).await);
        assert!(!can_access_post(&evaluator, &stranger, &post, PermissionAction::Update).await);
        assert!(can_access_post(&evaluator, &stranger, &post, PermissionAction::Read).await);
    }

    #[tokio::test]
    async fn test_moderator_role_grants_update_on_any_post() {
        let (admin, evaluator) = seeded().await;
        let moderator = sample_user();
        admin
            .assign_role_by_name(moderator.id, MODERATOR_ROLE, None)
            .await
            .unwrap();
        let post = post_by(Uuid::new_v4());

        let result = object_permissions(&evaluator, &moderator, &post).await;
        assert_eq!(result.len(), 3);
        assert!(result["blog.post.read"]);
        assert!(result["blog.post.update"]);
        assert!(result["blog.post.delete"]);
    }

    #[tokio::test]
    async fn test_user_deny_override_beats_authorship() {
        let (admin, evaluator) = seeded().await;
        let author = sample_user();
        let post = post_by(author.id);
        let delete = permission_id(&admin, "blog.post.delete").await;

        admin
            .set_user_object_permission(
                author.id,
                &ObjectPermissionGrant::deny(delete, BLOG_POST, post.id),
            )
            .await
            .unwrap();

        assert!(!can_access_post(&evaluator, &author, &post, PermissionAction::Delete).await);
        assert!(can_access_post(&evaluator, &author, &post, PermissionAction::Update).await);
        // only this post is affected
        let other = post_by(author.id);
        assert!(can_access_post(&evaluator, &author, &other, PermissionAction::Delete).await);
    }

    #[tokio::test]
    async fn test_deactivated_author_is_denied() {
        let (_, evaluator) = seeded().await;
        let mut author = sample_user();
        let post = post_by(author.id);
        author.is_active = false;

        assert!(!can_access_post(&evaluator, &author, &post, PermissionAction::Read).await);
    }

    #[tokio::test]
    async fn test_write_routes_require_authentication() {
        let (state, _) = test_state();
        let app = create_router(state);
        let id = Uuid::new_v4();

        let (status, _) = send(
            app.clone(),
            "POST",
            "/api/v1/blog/posts/",
            None,
            Some(r#"{"title": "t", "content": "c"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            app.clone(),
            "DELETE",
            &format!("/api/v1/blog/posts/{}/", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app, "GET", "/api/v1/blog/posts/mine/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_title_validation() {
        let blank = NewPost {
            title: "  ".to_string(),
            content: String::new(),
            is_published: false,
        };
        assert!(validate_new_post(&blank).is_err());
        assert!(validate_update(&UpdatePost::default()).is_ok());
    }
}

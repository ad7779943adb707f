//! Batch permission check for the current user

use std::collections::HashMap;

use axum::{Extension, Json, Router, extract::State, middleware, routing::post};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult, AppJson, codes},
    middleware::{AuthUser, auth_middleware},
    state::AppState,
};

const MAX_ACTION_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
pub struct PermissionCheckRequest {
    #[serde(default)]
    pub actions: Vec<String>,
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/permissions/check/", post(check_permissions))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn validate_actions(actions: &[String]) -> ApiResult<()> {
    if actions.is_empty() {
        return Err(ApiError::field(
            "actions",
            codes::REQUIRED,
            "Actions list cannot be empty",
        ));
    }

    for action in actions {
        if action.chars().count() > MAX_ACTION_LENGTH {
            return Err(ApiError::field(
                "actions",
                codes::MAX_LENGTH,
                format!("Action must be at most {} characters long", MAX_ACTION_LENGTH),
            ));
        }
        if !action.contains('.') {
            return Err(ApiError::field(
                "actions",
                codes::INVALID,
                format!(
                    "Invalid action format: '{}'. Expected format: 'module.action'",
                    action
                ),
            ));
        }
    }
    Ok(())
}

/// `{"actions": [codes]}` in, `{code: bool}` out
pub async fn check_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(payload): AppJson<PermissionCheckRequest>,
) -> ApiResult<Json<HashMap<String, bool>>> {
    validate_actions(&payload.actions)?;
    let result = state
        .evaluator
        .check_permissions(&auth.user, payload.actions.as_slice())
        .await;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::sample_user;
    use crate::routes::test_support::test_state;
    use rbac::Seed;
    use rbac::seed::DEFAULT_USER_ROLE;

    #[test]
    fn test_actions_must_be_dotted_and_non_empty() {
        assert!(validate_actions(&[]).is_err());
        assert!(validate_actions(&["blog".to_string()]).is_err());
        assert!(validate_actions(&["x.".to_string() + &"y".repeat(200)]).is_err());
        assert!(validate_actions(&["blog.post.read".to_string()]).is_ok());
    }

    #[tokio::test]
    async fn test_result_has_exactly_the_requested_codes() {
        let (state, _) = test_state();
        state.rbac.seed(&Seed::default_blog()).await.unwrap();
        let user = sample_user();
        state
            .rbac
            .assign_role_by_name(user.id, DEFAULT_USER_ROLE, None)
            .await
            .unwrap();

        let actions = vec![
            "blog.post.create".to_string(),
            "blog.post.read".to_string(),
            "unknown.thing".to_string(),
        ];
        let result = state.evaluator.check_permissions(&user, actions.as_slice()).await;

        assert_eq!(result.len(), 3);
        assert_eq!(result["blog.post.create"], false);
        assert_eq!(result["blog.post.read"], true);
        assert_eq!(result["unknown.thing"], false);
    }
}

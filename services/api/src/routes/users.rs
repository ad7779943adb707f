//! Profile of the authenticated user

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::get,
};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult, AppJson, codes},
    middleware::{AuthUser, auth_middleware},
    models::{UpdateUser, UserResponse},
    routes::auth::normalize_email,
    state::AppState,
    validation::{FieldErrors, validate_email, validate_name, validate_optional_name},
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/users/me/",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn validate_update(update: &UpdateUser) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(email) = &update.email {
        errors.check("email", validate_email(email));
    }
    if let Some(first_name) = &update.first_name {
        errors.check("first_name", validate_name("First name", first_name));
    }
    if let Some(last_name) = &update.last_name {
        errors.check("last_name", validate_name("Last name", last_name));
    }
    if let Some(middle_name) = &update.middle_name {
        errors.check("middle_name", validate_optional_name("Middle name", middle_name));
    }
    errors.finish()
}

pub async fn get_profile(Extension(auth): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse::from(&auth.user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(mut update): AppJson<UpdateUser>,
) -> ApiResult<Json<UserResponse>> {
    validate_update(&update)?;

    if let Some(email) = update.email.take() {
        let email = normalize_email(&email);
        if state
            .user_repository
            .email_taken(&email, Some(auth.id()))
            .await?
        {
            return Err(ApiError::business_field(
                "email",
                codes::EMAIL_EXISTS,
                "A user with this email already exists",
            ));
        }
        update.email = Some(email);
    }

    let user = state
        .user_repository
        .update_profile(auth.id(), &update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", auth.id())))?;

    info!("User {} updated their profile", user.id);
    Ok(Json(UserResponse::from(&user)))
}

/// Soft delete: the account is deactivated and every token stops working
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    if !state.user_repository.soft_delete(auth.id()).await? {
        return Err(ApiError::business(
            codes::ALREADY_DELETED,
            "Account is already deleted",
        ));
    }

    state
        .blacklist
        .add_token_to_blacklist(&auth.token, auth.id())
        .await?;

    info!("User {} deleted their account", auth.id());
    Ok(StatusCode::NO_CONTENT)
}

//! Registration, login, token refresh and logout

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult, AppJson, codes},
    jwt::{TokenPair, TokenType},
    middleware::{AuthUser, auth_middleware},
    models::{NewUser, User, UserResponse},
    password::{hash_password, verify_password},
    repositories::user::UserRecord,
    state::AppState,
    validation::{
        FieldErrors, validate_email, validate_name, validate_optional_name, validate_password,
    },
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Body of a successful register or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/logout/", post(logout))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .route("/auth/refresh/", post(refresh_token))
        .merge(protected)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(payload: &NewUser) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    errors
        .check("email", validate_email(&payload.email))
        .check("password", validate_password(&payload.password))
        .check("first_name", validate_name("First name", &payload.first_name))
        .check("last_name", validate_name("Last name", &payload.last_name));
    if let Some(middle_name) = &payload.middle_name {
        errors.check("middle_name", validate_optional_name("Middle name", middle_name));
    }
    if payload.password_confirm.is_empty() {
        errors.push(
            "password_confirm",
            codes::REQUIRED,
            "Password confirmation is required",
        );
    } else if payload.password != payload.password_confirm {
        errors.push(
            "password_confirm",
            codes::PASSWORD_MISMATCH,
            "Passwords do not match",
        );
    }
    errors.finish()
}

fn email_exists() -> ApiError {
    ApiError::business_field(
        "email",
        codes::EMAIL_EXISTS,
        "A user with this email already exists",
    )
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    state
        .jwt_service
        .generate_token_pair(user.id)
        .map_err(ApiError::internal)
}

/// Register a new account; the configured default role is attached when it exists
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewUser>,
) -> ApiResult<impl IntoResponse> {
    validate_registration(&payload)?;

    let email = normalize_email(&payload.email);
    if state.user_repository.email_taken(&email, None).await? {
        return Err(email_exists());
    }

    let password = payload.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let record = UserRecord {
        email: &email,
        password_hash: &password_hash,
        first_name: payload.first_name.trim(),
        last_name: payload.last_name.trim(),
        middle_name: payload
            .middle_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty()),
    };

    let user = match state
        .user_repository
        .create_with_default_role(&record, &state.config.default_role)
        .await
    {
        Ok(user) => user,
        // lost a race with a concurrent registration
        Err(e) if e.is_unique_violation() => return Err(email_exists()),
        Err(e) => return Err(e.into()),
    };

    let tokens = issue_tokens(&state, &user)?;
    info!("User {} registered", user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            tokens,
        }),
    ))
}

/// Exchange credentials for a token pair
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let mut errors = FieldErrors::new();
    if payload.email.trim().is_empty() {
        errors.push("email", codes::REQUIRED, "Email is required");
    }
    if payload.password.is_empty() {
        errors.push("password", codes::REQUIRED, "Password is required");
    }
    errors.finish()?;

    let email = normalize_email(&payload.email);
    if state.rate_limiter.is_locked(&email).await {
        warn!("Login for {} rejected while locked", email);
        return Err(ApiError::Throttled(format!(
            "Too many failed login attempts, try again in {} seconds",
            state.rate_limiter.config().ban_duration_seconds
        )));
    }

    let user = state.user_repository.find_by_email(&email).await?;
    let verified = match &user {
        Some(user) => {
            let hash = user.password_hash.clone();
            let password = payload.password.clone();
            tokio::task::spawn_blocking(move || verify_password(&hash, &password))
                .await
                .map_err(ApiError::internal)?
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            state.rate_limiter.record_failure(&email).await;
            info!("Failed login for {}", email);
            return Err(ApiError::business(
                codes::INVALID_CREDENTIALS,
                "Invalid email or password",
            ));
        }
    };

    if !user.can_authenticate() {
        let reason = if user.is_deleted() { "deleted" } else { "deactivated" };
        return Err(ApiError::business(
            codes::ACCOUNT_INACTIVE,
            format!("Account {}", reason),
        ));
    }

    state.rate_limiter.reset(&email).await;
    let tokens = issue_tokens(&state, &user)?;
    info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        tokens,
    }))
}

/// Issue a new access token from a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.refresh_token.trim().is_empty() {
        return Err(ApiError::field(
            "refresh_token",
            codes::REQUIRED,
            "Refresh token is required",
        ));
    }

    let claims = state
        .jwt_service
        .validate_token_of_type(&payload.refresh_token, TokenType::Refresh)
        .map_err(|_| ApiError::business(codes::INVALID_REFRESH_TOKEN, "Invalid refresh token"))?;

    if state
        .blacklist
        .is_token_blacklisted(&payload.refresh_token)
        .await?
    {
        return Err(ApiError::business(
            codes::TOKEN_BLACKLISTED,
            "Refresh token has been revoked",
        ));
    }

    state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .filter(User::can_authenticate)
        .ok_or_else(|| {
            ApiError::business(codes::USER_NOT_FOUND, "User not found or inactive")
        })?;

    let access_token = state
        .jwt_service
        .generate_access_token(claims.sub)
        .map_err(ApiError::internal)?;

    Ok(Json(json!({ "access_token": access_token })))
}

/// Revoke the presented access token and the given refresh token
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(payload): AppJson<LogoutRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.refresh_token.trim().is_empty() {
        return Err(ApiError::field(
            "refresh_token",
            codes::REQUIRED,
            "Refresh token is required",
        ));
    }

    let access = state
        .blacklist
        .add_token_to_blacklist(&auth.token, auth.id())
        .await?;
    let refresh = state
        .blacklist
        .add_token_to_blacklist(&payload.refresh_token, auth.id())
        .await?;

    if access.is_none() && refresh.is_none() {
        return Err(ApiError::business(
            codes::LOGOUT_FAILED,
            "Could not revoke the supplied tokens",
        ));
    }

    info!("User {} logged out", auth.id());
    Ok(Json(json!({ "message": "Successfully logged out" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{
        create_router,
        test_support::{send, test_state},
    };

    fn registration(password_confirm: &str) -> NewUser {
        NewUser {
            email: "ivan@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            password_confirm: password_confirm.to_string(),
            first_name: "Ivan".to_string(),
            last_name: "Petrov".to_string(),
            middle_name: None,
        }
    }

    fn attrs(err: ApiError) -> Vec<(String, String)> {
        match err {
            ApiError::Validation(details) => details
                .into_iter()
                .map(|d| (d.attr.unwrap_or_default(), d.code))
                .collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_password_mismatch_is_reported_on_confirmation() {
        let err = validate_registration(&registration("different")).unwrap_err();
        assert_eq!(
            attrs(err),
            vec![(
                "password_confirm".to_string(),
                codes::PASSWORD_MISMATCH.to_string()
            )]
        );
        assert!(validate_registration(&registration("Str0ng!pass")).is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(normalize_email("  Ivan@Example.COM "), "ivan@example.com");
    }

    #[tokio::test]
    async fn test_register_reports_every_invalid_field() {
        let (state, _) = test_state();
        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/register/",
            None,
            Some(r#"{"email": "nope", "password": "short", "password_confirm": "short"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let attrs: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["attr"].as_str())
            .collect();
        assert_eq!(attrs, vec!["email", "password", "first_name", "last_name"]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_validation_error() {
        let (state, _) = test_state();
        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/login/",
            None,
            Some("{not json"),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["code"], "invalid");
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_tokens() {
        let (state, _) = test_state();
        let access = state
            .jwt_service
            .generate_access_token(uuid::Uuid::new_v4())
            .unwrap();
        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/refresh/",
            None,
            Some(&json!({ "refresh_token": access }).to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["code"], codes::INVALID_REFRESH_TOKEN);
    }

    #[tokio::test]
    async fn test_refresh_rejects_blacklisted_token() {
        let (state, _) = test_state();
        let user_id = uuid::Uuid::new_v4();
        let refresh = state.jwt_service.generate_refresh_token(user_id).unwrap();
        state
            .blacklist
            .add_token_to_blacklist(&refresh, user_id)
            .await
            .unwrap();

        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/refresh/",
            None,
            Some(&json!({ "refresh_token": refresh }).to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["code"], codes::TOKEN_BLACKLISTED);
    }

    #[tokio::test]
    async fn test_logout_requires_authentication() {
        let (state, _) = test_state();
        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/logout/",
            None,
            Some(r#"{"refresh_token": "x"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"][0]["code"], codes::NOT_AUTHENTICATED);
    }

    #[tokio::test]
    async fn test_login_is_throttled_once_locked() {
        let (state, _) = test_state();
        for _ in 0..state.rate_limiter.config().max_attempts {
            state.rate_limiter.record_failure("ivan@example.com").await;
        }

        let (status, body) = send(
            create_router(state),
            "POST",
            "/api/v1/auth/login/",
            None,
            Some(r#"{"email": "Ivan@example.com", "password": "whatever1"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["errors"][0]["code"], codes::LIMIT_EXCEEDED);
    }
}

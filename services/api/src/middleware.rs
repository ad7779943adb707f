//! Request middleware: bearer authentication, admin gate and request logging

use std::time::Instant;

use axum::{
    Extension, async_trait,
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::logging::{is_ignored_path, scrub_headers, scrub_json};
use rbac::seed::ADMIN_ROLE;
use tracing::{Level, debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    jwt::TokenType,
    models::User,
    state::AppState,
};

/// Bodies larger than this are not buffered for debug logging
const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Raw access token, needed to revoke it on logout
    pub token: String,
    pub token_jti: Uuid,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Reads the caller attached by [`auth_middleware`] or [`optional_auth`];
/// 401 when there is none.
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Resolve a bearer token to an active user.
async fn authenticate(state: &AppState, token: &str) -> ApiResult<AuthUser> {
    let claims = state
        .jwt_service
        .validate_token_of_type(token, TokenType::Access)
        .map_err(|e| {
            debug!("Rejected access token: {}", e);
            ApiError::unauthorized()
        })?;

    if state.blacklist.is_jti_blacklisted(claims.jti).await? {
        warn!("Blacklisted token {} presented by {}", claims.jti, claims.sub);
        return Err(ApiError::unauthorized());
    }

    let user = state
        .user_repository
        .find_by_id(claims.sub)
        .await?
        .filter(User::can_authenticate)
        .ok_or_else(ApiError::unauthorized)?;

    Ok(AuthUser {
        user,
        token: token.to_string(),
        token_jti: claims.jti,
    })
}

/// Require a valid, non-revoked access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(ApiError::unauthorized)?;
    let auth = authenticate(&state, bearer.token()).await?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Attach the caller when a valid token is present; anonymous otherwise
pub async fn optional_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        match authenticate(&state, bearer.token()).await {
            Ok(auth) => {
                req.extensions_mut().insert(auth);
            }
            Err(e) => debug!("Ignoring invalid credentials on public route: {}", e),
        }
    }
    next.run(req).await
}

/// Must run after [`auth_middleware`]
pub async fn require_admin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.rbac.user_has_role(auth.id(), ADMIN_ROLE).await? {
        warn!("User {} denied access to {}", auth.id(), req.uri().path());
        return Err(ApiError::admin_required());
    }
    Ok(next.run(req).await)
}

/// Log method, path, status and latency; bodies and headers at debug level, scrubbed
pub async fn request_logging(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_ignored_path(&path) {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let started = Instant::now();

    let req = if tracing::enabled!(Level::DEBUG) {
        log_request_details(req).await
    } else {
        req
    };

    let response = next.run(req).await;
    let elapsed = started.elapsed();

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "request completed"
    );

    response
}

async fn log_request_details(req: Request) -> Request {
    let headers = scrub_headers(
        req.headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
    );
    debug!(?headers, "request headers");

    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let small_enough = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= MAX_LOGGED_BODY);
    if !is_json || !small_enough {
        return req;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Request body not logged: {}", e);
            return Request::from_parts(parts, Body::empty());
        }
    };

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        debug!(body = %scrub_json(&value), "request body");
    }

    Request::from_parts(parts, Body::from(bytes))
}

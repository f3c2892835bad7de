use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::Claims;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::account_service::{AuthResponse, LoginRequest, ProfileWithRoles, RegisterRequest};

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /auth/register - create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let response = state.accounts().register(req).await?;
    Ok(ApiResponse::created(response))
}

/// POST /auth/login - exchange username (or email) and password for a bearer token
pub async fn login(State(state): State<AppState>, JsonBody(req): JsonBody<LoginRequest>) -> ApiResult<AuthResponse> {
    Ok(ApiResponse::success(state.accounts().login(req).await?))
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<ProfileWithRoles> {
    Ok(ApiResponse::success(state.accounts().profile_with_roles(user.user_id).await?))
}

/// GET /auth/verify - the middleware already validated the token; echo its claims
pub async fn verify(Extension(claims): Extension<Claims>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "valid": true, "claims": claims })))
}

/// POST /auth/forgot-password - same answer whether or not the address is known
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Value> {
    state.accounts().forgot_password(&req.email).await?;
    Ok(ApiResponse::accepted(json!({
        "message": "If the address is registered, password reset instructions will be sent"
    })))
}

//! Account and token endpoints.

use axum::extract::State;

use stockroom_core::Role;

use crate::error::Result;
use crate::extract::ApiJson;
use crate::response::ApiResponse;
use crate::services::auth::{
    AuthService, LoginRequest, RefreshRequest, RegisterRequest, TokenPair, UserResponse,
};
use crate::state::AppState;

fn service(state: &AppState) -> AuthService<'_> {
    AuthService::new(state.pool(), state.tokens(), state.hasher())
}

/// POST /api/auth/register
///
/// Self-registration always creates a `user` account; admins are created
/// with `stockroom user create`.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<UserResponse>> {
    let user = service(&state).register(&request, Role::User).await?;
    Ok(ApiResponse::created(
        "Registration successful",
        UserResponse::from(&user),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<TokenPair>> {
    let tokens = service(&state).login(&request).await?;
    Ok(ApiResponse::ok("Login successful", tokens))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<ApiResponse<TokenPair>> {
    let tokens = service(&state).refresh(&request).await?;
    Ok(ApiResponse::ok("Token refreshed", tokens))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<ApiResponse<()>> {
    service(&state).logout(&request).await?;
    Ok(ApiResponse::message("Logged out"))
}

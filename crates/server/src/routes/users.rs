//! Current-user endpoint.

use axum::extract::State;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::response::ApiResponse;
use crate::services::auth::{AuthService, UserResponse};
use crate::state::AppState;

/// GET /api/users/me
pub async fn me(
    RequireAuth(current): RequireAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<UserResponse>> {
    let user = AuthService::new(state.pool(), state.tokens(), state.hasher())
        .me(current.id)
        .await?;
    Ok(ApiResponse::ok("User retrieved", UserResponse::from(&user)))
}

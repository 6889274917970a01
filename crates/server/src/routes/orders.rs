//! Order endpoints. Every route requires an authenticated user.

use axum::extract::State;

use stockroom_core::OrderId;
use stockroom_core::orders::OrderRequest;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::response::ApiResponse;
use crate::services::orders::{OrderResponse, OrderService, PlacedOrder};
use crate::state::AppState;

/// POST /api/orders
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OrderRequest>,
) -> Result<ApiResponse<PlacedOrder>> {
    let placed = OrderService::new(state.pool())
        .place(&request, user.id)
        .await?;
    Ok(ApiResponse::created("Order placed", placed))
}

/// GET /api/orders
pub async fn list_mine(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<OrderResponse>>> {
    let orders = OrderService::new(state.pool()).list_mine(user.id).await?;
    Ok(ApiResponse::ok("Orders retrieved", orders))
}

/// GET /api/orders/{id}
pub async fn get(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<OrderResponse>> {
    let order = OrderService::new(state.pool())
        .get(id, user.caller())
        .await?;
    Ok(ApiResponse::ok("Order retrieved", order))
}

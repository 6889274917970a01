//! Bundle endpoints. Reads are public; writes require an admin.

use axum::extract::State;

use stockroom_core::BundleId;
use stockroom_core::bundles::{BundleRequest, BundleSummary};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAdmin;
use crate::response::ApiResponse;
use crate::services::bundles::{BundleService, CreatedBundle};
use crate::state::AppState;

/// GET /api/bundles
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<BundleSummary>>> {
    let bundles = BundleService::new(state.pool()).list().await?;
    Ok(ApiResponse::ok("Bundles retrieved", bundles))
}

/// GET /api/bundles/{id}
pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BundleId>,
) -> Result<ApiResponse<BundleSummary>> {
    let bundle = BundleService::new(state.pool()).get(id).await?;
    Ok(ApiResponse::ok("Bundle retrieved", bundle))
}

/// POST /api/bundles
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<BundleRequest>,
) -> Result<ApiResponse<CreatedBundle>> {
    let created = BundleService::new(state.pool())
        .create(&request, admin.id)
        .await?;
    Ok(ApiResponse::created("Bundle created", created))
}

/// PUT /api/bundles/{id}
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BundleId>,
    ApiJson(request): ApiJson<BundleRequest>,
) -> Result<ApiResponse<BundleSummary>> {
    let bundle = BundleService::new(state.pool())
        .update(id, &request, admin.id)
        .await?;
    Ok(ApiResponse::ok("Bundle updated", bundle))
}

/// DELETE /api/bundles/{id}
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BundleId>,
) -> Result<ApiResponse<BundleSummary>> {
    let bundle = BundleService::new(state.pool()).delete(id, admin.id).await?;
    Ok(ApiResponse::ok("Bundle deleted", bundle))
}

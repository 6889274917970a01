//! Product endpoints. Reads are public; writes require an admin.

use axum::extract::State;
use serde::Deserialize;

use stockroom_core::ProductId;
use stockroom_core::catalog::ProductInput;

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAdmin;
use crate::response::ApiResponse;
use crate::services::products::{CreatedProduct, ProductResponse, ProductService};
use crate::state::AppState;

/// Update body: the product fields plus an optional id that must match the route.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(flatten)]
    pub product: ProductInput,
}

/// GET /api/products
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<ProductResponse>>> {
    let products = ProductService::new(state.pool()).list().await?;
    Ok(ApiResponse::ok("Products retrieved", products))
}

/// GET /api/products/{id}
pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<ProductResponse>> {
    let product = ProductService::new(state.pool()).get(id).await?;
    Ok(ApiResponse::ok("Product retrieved", product))
}

/// POST /api/products
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<ApiResponse<CreatedProduct>> {
    let created = ProductService::new(state.pool())
        .create(&input, admin.id)
        .await?;
    Ok(ApiResponse::created("Product created", created))
}

/// PUT /api/products/{id}
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<ApiResponse<ProductResponse>> {
    if request.id.is_some_and(|body_id| body_id != id) {
        return Err(AppError::BadRequest(
            "Product id in the path does not match the body".to_owned(),
        ));
    }
    let product = ProductService::new(state.pool())
        .update(id, &request.product, admin.id)
        .await?;
    Ok(ApiResponse::ok("Product updated", product))
}

/// DELETE /api/products/{id}
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<ProductResponse>> {
    let product = ProductService::new(state.pool()).delete(id, admin.id).await?;
    Ok(ApiResponse::ok("Product deleted", product))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_flattens_product_fields() {
        let id = ProductId::generate();
        let body = format!(
            r#"{{"id":"{id}","name":"Tee","basePrice":"12.50","options":[],"variants":[]}}"#
        );
        let request: UpdateProductRequest = serde_json::from_str(&body).unwrap();

        assert_eq!(request.id, Some(id));
        assert_eq!(request.product.name, "Tee");
    }
}

//! Product catalogue service: create, update, read, and delete products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use stockroom_core::catalog::product::normalize_sku;
use stockroom_core::catalog::{Product, ProductInput, apply_product_update, build_product};
use stockroom_core::{
    OptionValueId, ProductId, UserId, ValidationErrors, VariantId, VariantOptionId,
};

use crate::db::{ProductRepository, RepositoryError, UnitOfWork};
use crate::error::{AppError, Result};

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OptionValueResponse {
    pub id: OptionValueId,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionResponse {
    pub id: VariantOptionId,
    pub name: String,
    pub values: Vec<OptionValueResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResponse {
    pub option: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantResponse {
    pub id: VariantId,
    pub sku: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub selections: Vec<SelectionResponse>,
}

/// A product with its active options and variants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub sku: Option<String>,
    pub base_stock: Option<i32>,
    pub options: Vec<OptionResponse>,
    pub variants: Vec<VariantResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        let options = product
            .active_options()
            .map(|option| OptionResponse {
                id: option.id,
                name: option.name.clone(),
                values: option
                    .active_values()
                    .map(|value| OptionValueResponse {
                        id: value.id,
                        value: value.value.clone(),
                    })
                    .collect(),
            })
            .collect();

        let variants = product
            .active_variants()
            .map(|variant| VariantResponse {
                id: variant.id,
                sku: variant.sku.clone(),
                price: variant.price,
                stock: variant.stock,
                selections: product
                    .selections_of(variant)
                    .into_iter()
                    .map(|(option, value)| SelectionResponse { option, value })
                    .collect(),
            })
            .collect();

        Self {
            id: product.id(),
            name: product.name().to_owned(),
            description: product.description().map(str::to_owned),
            base_price: product.base_price(),
            sku: product.sku().map(str::to_owned),
            base_stock: product.base_stock(),
            options,
            variants,
            created_at: product.audit().created_at,
            updated_at: product.audit().updated_at,
        }
    }
}

/// Returned by product creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProduct {
    pub id: ProductId,
    pub base_price: Decimal,
}

// =============================================================================
// Service
// =============================================================================

pub struct ProductService<'a> {
    pool: &'a PgPool,
    products: ProductRepository<'a>,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            products: ProductRepository::new(pool),
        }
    }

    /// Every active product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn list(&self) -> Result<Vec<ProductResponse>> {
        let products = self.products.list_active().await?;
        Ok(products.iter().map(ProductResponse::from).collect())
    }

    /// One active product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is missing or inactive.
    pub async fn get(&self, id: ProductId) -> Result<ProductResponse> {
        let product = self.load_active(id).await?;
        Ok(ProductResponse::from(&product))
    }

    /// Create a product with its options and variants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` listing every input problem, including
    /// a name or sku already used by another active product.
    pub async fn create(&self, input: &ProductInput, actor: UserId) -> Result<CreatedProduct> {
        self.validate(input, None).await?;
        let product = build_product(input, Some(actor))?;

        let mut uow = UnitOfWork::begin(self.pool).await?;
        self.products
            .save(&mut uow, &product)
            .await
            .map_err(sku_conflict)?;
        uow.commit().await?;

        info!(
            product_id = %product.id(),
            variants = product.variants().len(),
            "Product created"
        );
        Ok(CreatedProduct {
            id: product.id(),
            base_price: product.base_price(),
        })
    }

    /// Diff `input` into the stored product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is missing or inactive,
    /// `AppError::Validation` for bad input, and `AppError::Internal` if a
    /// variant selection cannot be resolved after the option pass.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        actor: UserId,
    ) -> Result<ProductResponse> {
        self.validate(input, Some(id)).await?;

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut product = self
            .products
            .get_for_update(&mut uow, id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

        apply_product_update(&mut product, input, Some(actor)).inspect_err(|e| {
            if e.is_fatal() {
                warn!(product_id = %id, error = %e, "Product update aborted");
            }
        })?;

        self.products
            .save(&mut uow, &product)
            .await
            .map_err(sku_conflict)?;
        uow.commit().await?;

        info!(product_id = %id, "Product updated");
        Ok(ProductResponse::from(&product))
    }

    /// Soft-delete a product and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is missing or inactive and
    /// `AppError::BadRequest` while an active bundle still contains it.
    pub async fn delete(&self, id: ProductId, actor: UserId) -> Result<ProductResponse> {
        self.load_active(id).await?;
        if self.products.is_in_active_bundle(id).await? {
            warn!(product_id = %id, "Refused to delete product used by a bundle");
            return Err(AppError::BadRequest(
                "Product is part of an active bundle".to_owned(),
            ));
        }

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut product = self
            .products
            .get_for_update(&mut uow, id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

        product.deactivate(Some(actor));
        self.products.save(&mut uow, &product).await?;
        uow.commit().await?;

        info!(product_id = %id, "Product deleted");
        Ok(ProductResponse::from(&product))
    }

    async fn load_active(&self, id: ProductId) -> Result<Product> {
        self.products
            .get_detailed(id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
    }

    /// Input validation plus the name and sku uniqueness checks, as one batch.
    async fn validate(&self, input: &ProductInput, exclude: Option<ProductId>) -> Result<()> {
        let mut errors = input.validate().err().unwrap_or_default();

        let sku = normalize_sku(input.sku.as_deref());
        let duplicates = self
            .products
            .find_duplicates(&input.name, sku.as_deref(), exclude)
            .await?;
        if duplicates.name_taken {
            errors.push("request.name", "a product with this name already exists");
        }
        if duplicates.sku_taken {
            errors.push("request.sku", "a product with this sku already exists");
        }

        let variant_skus: Vec<Option<String>> = input
            .variants
            .iter()
            .map(|v| normalize_sku(v.sku.as_deref()))
            .collect();
        let requested: Vec<String> = variant_skus.iter().flatten().cloned().collect();
        let taken = self.products.variant_skus_taken(&requested, exclude).await?;
        for (i, sku) in variant_skus.iter().enumerate() {
            if sku.as_ref().is_some_and(|sku| taken.contains(&sku.to_lowercase())) {
                errors.push(
                    format!("variants[{i}].sku"),
                    "a variant with this sku already exists",
                );
            }
        }

        if !errors.is_empty() {
            warn!(errors = errors.len(), "Product request rejected");
        }
        errors.into_result().map_err(AppError::from)
    }
}

/// A sku unique index that fires at save time means another request took the
/// sku after validation ran. Report it like the pre-check would.
fn sku_conflict(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(message) => {
            warn!(error = %message, "Product save lost a sku race");
            ValidationErrors::single("request.sku", message).into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_sku_conflict_is_a_field_error() {
        let err = sku_conflict(RepositoryError::Conflict(
            "variant sku already exists".to_owned(),
        ));

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let AppError::Validation(errors) = err else {
            panic!("expected a validation error, got {err:?}");
        };
        assert_eq!(errors.errors()[0].field, "request.sku");
        assert_eq!(errors.errors()[0].error, "variant sku already exists");
    }

    #[test]
    fn test_other_save_errors_pass_through() {
        let err = sku_conflict(RepositoryError::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}

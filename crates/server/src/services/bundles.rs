//! Bundle service.
//!
//! Request validation (structure, then two batched catalogue lookups) runs
//! before any transaction is opened. Reads compute availability and savings
//! from live component stock.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use stockroom_core::bundles::{Bundle, BundleRequest, BundleSummary, CatalogSnapshot};
use stockroom_core::{BundleId, ProductId, UserId, VariantId};

use crate::db::{BundleRepository, ProductRepository, UnitOfWork};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBundleItem {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

/// Returned by bundle creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBundle {
    pub id: BundleId,
    pub name: String,
    pub price: Decimal,
    pub product_count: usize,
    pub items: Vec<CreatedBundleItem>,
}

impl From<&Bundle> for CreatedBundle {
    fn from(bundle: &Bundle) -> Self {
        let items: Vec<CreatedBundleItem> = bundle
            .active_items()
            .map(|item| CreatedBundleItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect();
        let product_count = items
            .iter()
            .map(|item| item.product_id)
            .collect::<HashSet<_>>()
            .len();

        Self {
            id: bundle.id(),
            name: bundle.name().to_owned(),
            price: bundle.price(),
            product_count,
            items,
        }
    }
}

pub struct BundleService<'a> {
    pool: &'a PgPool,
    bundles: BundleRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> BundleService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            bundles: BundleRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// Every active bundle with live availability.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn list(&self) -> Result<Vec<BundleSummary>> {
        let bundles = self.bundles.list_active().await?;

        let mut ids: Vec<ProductId> = bundles
            .iter()
            .flat_map(|b| b.active_items().map(|item| item.product_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.products.get_many_detailed(&ids).await?;

        Ok(bundles.iter().map(|b| b.summarize(&products)).collect())
    }

    /// One active bundle with live availability.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the bundle is missing or inactive.
    pub async fn get(&self, id: BundleId) -> Result<BundleSummary> {
        let bundle = self
            .bundles
            .get_detailed(id)
            .await?
            .filter(Bundle::is_active)
            .ok_or_else(|| not_found(id))?;
        self.summarize(&bundle).await
    }

    /// Validate and persist a new bundle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` (field `request.products` for list
    /// problems) if the request is rejected.
    pub async fn create(&self, request: &BundleRequest, actor: UserId) -> Result<CreatedBundle> {
        self.validate(request).await?;

        let bundle = Bundle::compose(request.header(), &request.item_specs(), Some(actor))?;

        let mut uow = UnitOfWork::begin(self.pool).await?;
        self.bundles.save(&mut uow, &bundle).await?;
        uow.commit().await?;

        info!(
            bundle_id = %bundle.id(),
            items = bundle.items().len(),
            "Bundle created"
        );
        Ok(CreatedBundle::from(&bundle))
    }

    /// Replace a bundle's header and reconcile its items against the request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the request is rejected and
    /// `AppError::NotFound` if the bundle is missing or inactive.
    pub async fn update(
        &self,
        id: BundleId,
        request: &BundleRequest,
        actor: UserId,
    ) -> Result<BundleSummary> {
        self.validate(request).await?;

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut bundle = self
            .bundles
            .get_for_update(&mut uow, id)
            .await?
            .filter(Bundle::is_active)
            .ok_or_else(|| not_found(id))?;

        bundle.update_details(request.header(), Some(actor))?;
        let summary = bundle.reconcile_items(&request.item_specs(), Some(actor));
        self.bundles.save(&mut uow, &bundle).await?;
        uow.commit().await?;

        info!(
            bundle_id = %id,
            created = summary.created,
            reactivated = summary.reactivated,
            requantified = summary.requantified,
            deactivated = summary.deactivated,
            "Bundle updated"
        );

        let bundle = self
            .bundles
            .get_detailed(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        self.summarize(&bundle).await
    }

    /// Soft-delete a bundle and its items.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the bundle does not exist and
    /// `AppError::BadRequest` if it was already deleted.
    pub async fn delete(&self, id: BundleId, actor: UserId) -> Result<BundleSummary> {
        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut bundle = self
            .bundles
            .get_for_update(&mut uow, id)
            .await?
            .ok_or_else(|| not_found(id))?;

        if !bundle.deactivate(Some(actor)) {
            return Err(AppError::BadRequest("Bundle already deleted".to_owned()));
        }
        self.bundles.save(&mut uow, &bundle).await?;
        uow.commit().await?;

        info!(bundle_id = %id, "Bundle deleted");
        self.summarize(&bundle).await
    }

    async fn summarize(&self, bundle: &Bundle) -> Result<BundleSummary> {
        let mut ids: Vec<ProductId> = bundle.items().iter().map(|item| item.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.products.get_many_detailed(&ids).await?;
        Ok(bundle.summarize(&products))
    }

    async fn validate(&self, request: &BundleRequest) -> Result<()> {
        let result = self.check_request(request).await;
        if let Err(AppError::Validation(errors)) = &result {
            warn!(errors = errors.len(), "Bundle request rejected");
        }
        result
    }

    /// Structure first, then one query for active products and one for
    /// active variants.
    async fn check_request(&self, request: &BundleRequest) -> Result<()> {
        request.check_structure()?;

        let ids = request.product_ids();
        let snapshot = CatalogSnapshot {
            active_products: self.products.active_ids(&ids).await?,
            active_variants: self.products.active_variants_by_product(&ids).await?,
        };
        request.check_catalog(&snapshot)?;
        Ok(())
    }
}

fn not_found(id: BundleId) -> AppError {
    AppError::NotFound(format!("Bundle {id} not found"))
}

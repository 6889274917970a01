//! In-memory stock state for one order.
//!
//! The caller loads each product or variant row once (locked for update)
//! and hands it to the ledger; every later line touching the same row sees
//! the already-deducted value. Nothing here does I/O, so the rules can be
//! exercised without a database.

use std::collections::{BTreeMap, BTreeSet};

use crate::bundles::Bundle;
use crate::types::{BundleId, ProductId, VariantId};

/// Stock-bearing fields of a product row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductStock {
    pub id: ProductId,
    pub is_active: bool,
    pub base_stock: Option<i32>,
}

/// Stock-bearing fields of a variant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantStock {
    pub id: VariantId,
    pub product_id: ProductId,
    pub is_active: bool,
    pub stock: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderLineError {
    #[error("item {index}: quantity must be greater than zero (got {quantity})")]
    InvalidQuantity { index: usize, quantity: i32 },
    #[error("item {index}: unknown item type '{kind}'")]
    UnknownType { index: usize, kind: String },
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),
    #[error("Variant {0} not found")]
    VariantNotFound(VariantId),
    #[error("Bundle {0} not found")]
    BundleNotFound(BundleId),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientProductStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientVariantStock {
        variant_id: VariantId,
        requested: i32,
        available: i32,
    },
    #[error("Bundle {bundle_id} contains an unavailable component: {component}")]
    BundleComponentUnavailable { bundle_id: BundleId, component: String },
    #[error("Insufficient stock for bundle {bundle_id}: component {component} needs {required}, available {available}")]
    BundleComponentShort {
        bundle_id: BundleId,
        component: String,
        required: i32,
        available: i32,
    },
}

impl OrderLineError {
    /// Whether the referenced entity itself is missing (404) rather than the
    /// request being unsatisfiable (400).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_) | Self::VariantNotFound(_) | Self::BundleNotFound(_)
        )
    }
}

/// A bundle component resolved to the row that holds its stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StockRow {
    Product(ProductId),
    Variant(VariantId),
}

#[derive(Debug, Default)]
pub struct StockLedger {
    products: BTreeMap<ProductId, Option<ProductStock>>,
    variants: BTreeMap<VariantId, Option<VariantStock>>,
    dirty_products: BTreeSet<ProductId>,
    dirty_variants: BTreeSet<VariantId>,
}

impl StockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the product row still has to be loaded.
    #[must_use]
    pub fn needs_product(&self, id: ProductId) -> bool {
        !self.products.contains_key(&id)
    }

    #[must_use]
    pub fn needs_variant(&self, id: VariantId) -> bool {
        !self.variants.contains_key(&id)
    }

    /// Record a loaded product row (`None` when no row exists). A row that is
    /// already cached is kept, so in-progress deductions are never lost.
    pub fn cache_product(&mut self, id: ProductId, row: Option<ProductStock>) {
        self.products.entry(id).or_insert(row);
    }

    pub fn cache_variant(&mut self, id: VariantId, row: Option<VariantStock>) {
        self.variants.entry(id).or_insert(row);
    }

    /// Rows a bundle still needs loaded, split into product and variant ids.
    /// Ids come back sorted so rows are always locked in the same order.
    #[must_use]
    pub fn missing_for_bundle(&self, bundle: &Bundle) -> (Vec<ProductId>, Vec<VariantId>) {
        let mut products = BTreeSet::new();
        let mut variants = BTreeSet::new();
        for item in bundle.active_items() {
            match item.variant_id {
                Some(id) if self.needs_variant(id) => {
                    variants.insert(id);
                }
                Some(_) => {}
                None if self.needs_product(item.product_id) => {
                    products.insert(item.product_id);
                }
                None => {}
            }
        }
        (products.into_iter().collect(), variants.into_iter().collect())
    }

    fn product_available(&self, id: ProductId) -> Option<Option<i32>> {
        match self.products.get(&id) {
            Some(Some(row)) if row.is_active => Some(row.base_stock),
            _ => None,
        }
    }

    fn variant_available(&self, id: VariantId) -> Option<i32> {
        match self.variants.get(&id) {
            Some(Some(row)) if row.is_active => Some(row.stock),
            _ => None,
        }
    }

    fn deduct(&mut self, row: StockRow, quantity: i32) {
        match row {
            StockRow::Product(id) => {
                if let Some(Some(stock)) = self.products.get_mut(&id)
                    && let Some(base) = stock.base_stock.as_mut()
                {
                    *base -= quantity;
                    self.dirty_products.insert(id);
                }
            }
            StockRow::Variant(id) => {
                if let Some(Some(stock)) = self.variants.get_mut(&id) {
                    stock.stock -= quantity;
                    self.dirty_variants.insert(id);
                }
            }
        }
    }

    /// Deduct `quantity` units of a product without variants.
    ///
    /// # Errors
    ///
    /// [`OrderLineError::ProductNotFound`] when the row is missing or
    /// inactive; [`OrderLineError::InsufficientProductStock`] when it has no
    /// stock value or too little.
    pub fn apply_product(&mut self, id: ProductId, quantity: i32) -> Result<(), OrderLineError> {
        let stock = self
            .product_available(id)
            .ok_or(OrderLineError::ProductNotFound(id))?;
        match stock {
            Some(available) if available >= quantity => {
                self.deduct(StockRow::Product(id), quantity);
                Ok(())
            }
            other => Err(OrderLineError::InsufficientProductStock {
                product_id: id,
                requested: quantity,
                available: other.unwrap_or(0),
            }),
        }
    }

    /// # Errors
    ///
    /// [`OrderLineError::VariantNotFound`] when missing or inactive;
    /// [`OrderLineError::InsufficientVariantStock`] when short.
    pub fn apply_variant(&mut self, id: VariantId, quantity: i32) -> Result<(), OrderLineError> {
        let available = self
            .variant_available(id)
            .ok_or(OrderLineError::VariantNotFound(id))?;
        if available < quantity {
            return Err(OrderLineError::InsufficientVariantStock {
                variant_id: id,
                requested: quantity,
                available,
            });
        }
        self.deduct(StockRow::Variant(id), quantity);
        Ok(())
    }

    /// Deduct every component of `ordered` bundle instances.
    ///
    /// All components are checked before anything is deducted, so a
    /// failure leaves the ledger as it was. Components that appear in
    /// several items are summed before checking.
    ///
    /// # Errors
    ///
    /// [`OrderLineError::BundleNotFound`] for an inactive bundle,
    /// [`OrderLineError::BundleComponentUnavailable`] for a missing or
    /// inactive component, [`OrderLineError::BundleComponentShort`] when a
    /// component lacks stock.
    pub fn apply_bundle(&mut self, bundle: &Bundle, ordered: i32) -> Result<(), OrderLineError> {
        if !bundle.is_active() {
            return Err(OrderLineError::BundleNotFound(bundle.id()));
        }

        let mut required: Vec<(StockRow, i32)> = Vec::new();
        for item in bundle.active_items() {
            let row = item
                .variant_id
                .map_or(StockRow::Product(item.product_id), StockRow::Variant);
            let units = item.quantity.checked_mul(ordered).unwrap_or(i32::MAX);
            match required.iter_mut().find(|(r, _)| *r == row) {
                Some((_, total)) => *total = total.saturating_add(units),
                None => required.push((row, units)),
            }
        }

        for &(row, units) in &required {
            let (component, available) = match row {
                StockRow::Product(id) => (
                    format!("product {id}"),
                    self.product_available(id).map(|s| s.unwrap_or(0)),
                ),
                StockRow::Variant(id) => (format!("variant {id}"), self.variant_available(id)),
            };
            let Some(available) = available else {
                return Err(OrderLineError::BundleComponentUnavailable {
                    bundle_id: bundle.id(),
                    component,
                });
            };
            if available < units {
                return Err(OrderLineError::BundleComponentShort {
                    bundle_id: bundle.id(),
                    component,
                    required: units,
                    available,
                });
            }
        }

        for (row, units) in required {
            self.deduct(row, units);
        }
        Ok(())
    }

    /// Product rows whose stock changed, with their new values.
    pub fn changed_products(&self) -> impl Iterator<Item = ProductStock> + '_ {
        self.dirty_products
            .iter()
            .filter_map(|id| self.products.get(id).copied().flatten())
    }

    pub fn changed_variants(&self) -> impl Iterator<Item = VariantStock> + '_ {
        self.dirty_variants
            .iter()
            .filter_map(|id| self.variants.get(id).copied().flatten())
    }
}

//! The bundle aggregate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{BundleId, BundleItemId, ProductId, UserId, VariantId};
use crate::validation::ValidationErrors;

/// One component of a bundle: a product, or one variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleItem {
    pub id: BundleItemId,
    pub bundle_id: BundleId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub audit: Audit,
}

impl BundleItem {
    #[must_use]
    pub fn new(bundle_id: BundleId, spec: ItemSpec, actor: Option<UserId>) -> Self {
        Self {
            id: BundleItemId::generate(),
            bundle_id,
            product_id: spec.product_id,
            variant_id: spec.variant_id,
            quantity: spec.quantity,
            audit: Audit::new(actor),
        }
    }

    /// The `(product, variant)` pair identifying this item within a bundle.
    #[must_use]
    pub const fn key(&self) -> (ProductId, Option<VariantId>) {
        (self.product_id, self.variant_id)
    }
}

/// A validated request for one bundle item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSpec {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

impl ItemSpec {
    #[must_use]
    pub const fn key(&self) -> (ProductId, Option<VariantId>) {
        (self.product_id, self.variant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

impl BundleHeader {
    pub fn validate(&self, errors: &mut ValidationErrors) {
        if self.name.trim().is_empty() {
            errors.push("request.name", "name is required");
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            errors.push("request.price", "price cannot be negative");
        }
    }
}

#[derive(Debug, Clone)]
pub struct BundleParts {
    pub id: BundleId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub audit: Audit,
    pub items: Vec<BundleItem>,
}

/// A fixed-price set of products and variants sold together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    id: BundleId,
    name: String,
    description: Option<String>,
    price: Decimal,
    audit: Audit,
    items: Vec<BundleItem>,
}

impl Bundle {
    /// Create a bundle with one item per spec.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a blank name or negative price.
    pub fn compose(
        header: BundleHeader,
        specs: &[ItemSpec],
        actor: Option<UserId>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        header.validate(&mut errors);
        errors.into_result()?;

        let id = BundleId::generate();
        Ok(Self {
            id,
            name: header.name.trim().to_owned(),
            description: header.description,
            price: header.price,
            audit: Audit::new(actor),
            items: specs.iter().map(|s| BundleItem::new(id, *s, actor)).collect(),
        })
    }

    #[must_use]
    pub fn restore(parts: BundleParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            description: parts.description,
            price: parts.price,
            audit: parts.audit,
            items: parts.items,
        }
    }

    #[must_use]
    pub const fn id(&self) -> BundleId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub const fn audit(&self) -> &Audit {
        &self.audit
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.audit.is_active
    }

    /// All items, including deactivated ones.
    #[must_use]
    pub fn items(&self) -> &[BundleItem] {
        &self.items
    }

    pub fn active_items(&self) -> impl Iterator<Item = &BundleItem> {
        self.items.iter().filter(|i| i.audit.is_active)
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<BundleItem> {
        &mut self.items
    }

    /// Replace name, description, and price. Always bumps the audit stamp.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a blank name or negative price.
    pub fn update_details(
        &mut self,
        header: BundleHeader,
        actor: Option<UserId>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        header.validate(&mut errors);
        errors.into_result()?;

        self.name = header.name.trim().to_owned();
        self.description = header.description;
        self.price = header.price;
        self.audit.touch(actor);
        Ok(())
    }

    /// Soft-delete the bundle and its items. Returns `false` if it was
    /// already inactive.
    pub fn deactivate(&mut self, actor: Option<UserId>) -> bool {
        if !self.audit.is_active {
            return false;
        }
        for item in &mut self.items {
            item.audit.deactivate(actor);
        }
        self.audit.deactivate(actor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header() -> BundleHeader {
        BundleHeader {
            name: " Starter Kit ".to_owned(),
            description: None,
            price: Decimal::new(45, 0),
        }
    }

    #[test]
    fn test_compose_links_items() {
        let spec = ItemSpec {
            product_id: ProductId::generate(),
            variant_id: None,
            quantity: 2,
        };
        let bundle = Bundle::compose(header(), &[spec], None).unwrap();
        assert_eq!(bundle.name(), "Starter Kit");
        assert_eq!(bundle.items().len(), 1);
        assert_eq!(bundle.items()[0].bundle_id, bundle.id());
        assert_eq!(bundle.items()[0].key(), spec.key());
    }

    #[test]
    fn test_deactivate_cascades_once() {
        let spec = ItemSpec {
            product_id: ProductId::generate(),
            variant_id: Some(VariantId::generate()),
            quantity: 1,
        };
        let mut bundle = Bundle::compose(header(), &[spec], None).unwrap();
        assert!(bundle.deactivate(None));
        assert!(bundle.items().iter().all(|i| !i.audit.is_active));
        assert!(!bundle.deactivate(None));
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut bad = header();
        bad.price = Decimal::new(-5, 0);
        let errors = Bundle::compose(bad, &[], None).unwrap_err();
        assert_eq!(errors.errors()[0].field, "request.price");
    }
}

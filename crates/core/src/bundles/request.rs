//! Bundle create/update requests and their validation.
//!
//! Checks run in stages so the cheap ones fail before any catalogue lookup:
//! [`BundleRequest::check_structure`] needs nothing, then
//! [`BundleRequest::check_catalog`] runs against the active product and
//! variant sets the caller fetched in two batched queries.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bundle::{BundleHeader, ItemSpec};
use crate::types::{ProductId, VariantId};
use crate::validation::ValidationErrors;

/// Field every product-list error is reported under.
pub const PRODUCTS_FIELD: &str = "request.products";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleVariantInput {
    pub variant_id: VariantId,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleProductInput {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub variants: Vec<BundleVariantInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub products: Vec<BundleProductInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleRequestError {
    #[error("at least one product is required")]
    NoProducts,
    #[error("product {0} is listed more than once")]
    DuplicateProduct(ProductId),
    #[error("products not found or inactive: {}", join_ids(.0))]
    InactiveProducts(Vec<ProductId>),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl BundleRequestError {
    /// Flatten into field errors for the response body.
    #[must_use]
    pub fn into_validation(self) -> ValidationErrors {
        match self {
            Self::Validation(errors) => errors,
            other => ValidationErrors::single(PRODUCTS_FIELD, other.to_string()),
        }
    }
}

/// Active ids fetched for a request's products.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub active_products: HashSet<ProductId>,
    pub active_variants: HashMap<ProductId, HashSet<VariantId>>,
}

impl BundleRequest {
    #[must_use]
    pub fn header(&self) -> BundleHeader {
        BundleHeader {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }

    /// Distinct product ids in request order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut seen = HashSet::new();
        self.products
            .iter()
            .map(|p| p.product_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Checks that need no catalogue data: header fields, a non-empty
    /// product list without duplicates.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn check_structure(&self) -> Result<(), BundleRequestError> {
        let mut errors = ValidationErrors::new();
        self.header().validate(&mut errors);
        errors.into_result()?;

        if self.products.is_empty() {
            return Err(BundleRequestError::NoProducts);
        }
        let mut seen = HashSet::new();
        for entry in &self.products {
            if !seen.insert(entry.product_id) {
                return Err(BundleRequestError::DuplicateProduct(entry.product_id));
            }
        }
        Ok(())
    }

    /// Checks against the live catalogue, then the quantity rules.
    ///
    /// Unknown variants and bad quantities are each collected in full
    /// before failing.
    ///
    /// # Errors
    ///
    /// Returns [`BundleRequestError::InactiveProducts`] or a batched
    /// [`BundleRequestError::Validation`].
    pub fn check_catalog(&self, catalog: &CatalogSnapshot) -> Result<(), BundleRequestError> {
        let inactive: Vec<ProductId> = self
            .products
            .iter()
            .map(|p| p.product_id)
            .filter(|id| !catalog.active_products.contains(id))
            .collect();
        if !inactive.is_empty() {
            return Err(BundleRequestError::InactiveProducts(inactive));
        }

        let empty = HashSet::new();
        let mut errors = ValidationErrors::new();
        for entry in &self.products {
            let active = catalog
                .active_variants
                .get(&entry.product_id)
                .unwrap_or(&empty);
            for variant in &entry.variants {
                if !active.contains(&variant.variant_id) {
                    errors.push(
                        PRODUCTS_FIELD,
                        format!(
                            "variant {} is not an active variant of product {}",
                            variant.variant_id, entry.product_id
                        ),
                    );
                }
            }
        }
        errors.into_result()?;

        let mut errors = ValidationErrors::new();
        for entry in &self.products {
            if entry.variants.is_empty() {
                if !entry.quantity.is_some_and(|q| q > 0) {
                    errors.push(
                        PRODUCTS_FIELD,
                        format!("product {} needs a quantity greater than zero", entry.product_id),
                    );
                }
            } else {
                for variant in entry.variants.iter().filter(|v| v.quantity <= 0) {
                    errors.push(
                        PRODUCTS_FIELD,
                        format!(
                            "variant {} needs a quantity greater than zero",
                            variant.variant_id
                        ),
                    );
                }
            }
        }
        errors.into_result()?;
        Ok(())
    }

    /// One item per `(product, variant?)` pair. Repeated variants within an
    /// entry are merged by summing quantities.
    #[must_use]
    pub fn item_specs(&self) -> Vec<ItemSpec> {
        let mut specs: Vec<ItemSpec> = Vec::new();
        for entry in &self.products {
            if entry.variants.is_empty() {
                specs.push(ItemSpec {
                    product_id: entry.product_id,
                    variant_id: None,
                    quantity: entry.quantity.unwrap_or_default(),
                });
                continue;
            }
            for variant in &entry.variants {
                let key = (entry.product_id, Some(variant.variant_id));
                if let Some(existing) = specs.iter_mut().find(|s| s.key() == key) {
                    existing.quantity = existing.quantity.saturating_add(variant.quantity);
                } else {
                    specs.push(ItemSpec {
                        product_id: entry.product_id,
                        variant_id: Some(variant.variant_id),
                        quantity: variant.quantity,
                    });
                }
            }
        }
        specs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(products: Vec<BundleProductInput>) -> BundleRequest {
        BundleRequest {
            name: "Kit".to_owned(),
            description: None,
            price: Decimal::new(30, 0),
            products,
        }
    }

    fn plain(product_id: ProductId, quantity: Option<i32>) -> BundleProductInput {
        BundleProductInput {
            product_id,
            quantity,
            variants: Vec::new(),
        }
    }

    #[test]
    fn test_empty_products_rejected() {
        let err = request(Vec::new()).check_structure().unwrap_err();
        assert_eq!(err, BundleRequestError::NoProducts);
        let errors = err.into_validation();
        assert_eq!(errors.errors()[0].field, PRODUCTS_FIELD);
    }

    #[test]
    fn test_duplicate_products_rejected() {
        let id = ProductId::generate();
        let err = request(vec![plain(id, Some(1)), plain(id, Some(2))])
            .check_structure()
            .unwrap_err();
        assert_eq!(err, BundleRequestError::DuplicateProduct(id));
    }

    #[test]
    fn test_inactive_products_rejected_before_variants() {
        let id = ProductId::generate();
        let err = request(vec![plain(id, Some(1))])
            .check_catalog(&CatalogSnapshot::default())
            .unwrap_err();
        assert_eq!(err, BundleRequestError::InactiveProducts(vec![id]));
    }

    #[test]
    fn test_unknown_variants_reported_together() {
        let product = ProductId::generate();
        let good = VariantId::generate();
        let bad_a = VariantId::generate();
        let bad_b = VariantId::generate();
        let entry = BundleProductInput {
            product_id: product,
            quantity: None,
            variants: [good, bad_a, bad_b]
                .into_iter()
                .map(|variant_id| BundleVariantInput {
                    variant_id,
                    quantity: 1,
                })
                .collect(),
        };
        let catalog = CatalogSnapshot {
            active_products: HashSet::from([product]),
            active_variants: HashMap::from([(product, HashSet::from([good]))]),
        };

        let errors = request(vec![entry])
            .check_catalog(&catalog)
            .unwrap_err()
            .into_validation();
        assert_eq!(errors.len(), 2);
        assert!(errors.errors()[0].error.contains(&bad_a.to_string()));
        assert!(errors.errors()[0].error.contains(&product.to_string()));
    }

    #[test]
    fn test_quantity_rules() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let variant = VariantId::generate();
        let entries = vec![
            plain(a, None),
            BundleProductInput {
                product_id: b,
                quantity: Some(5),
                variants: vec![BundleVariantInput {
                    variant_id: variant,
                    quantity: 0,
                }],
            },
        ];
        let catalog = CatalogSnapshot {
            active_products: HashSet::from([a, b]),
            active_variants: HashMap::from([(b, HashSet::from([variant]))]),
        };
        let errors = request(entries)
            .check_catalog(&catalog)
            .unwrap_err()
            .into_validation();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_item_specs_one_per_pair() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let v1 = VariantId::generate();
        let v2 = VariantId::generate();
        let req = request(vec![
            plain(a, Some(2)),
            BundleProductInput {
                product_id: b,
                quantity: None,
                variants: vec![
                    BundleVariantInput {
                        variant_id: v1,
                        quantity: 1,
                    },
                    BundleVariantInput {
                        variant_id: v2,
                        quantity: 3,
                    },
                ],
            },
        ]);
        let specs = req.item_specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].key(), (a, None));
        assert_eq!(specs[2].key(), (b, Some(v2)));
        assert_eq!(specs[2].quantity, 3);
    }

    #[test]
    fn test_deserializes_request_body() {
        let json = format!(
            r#"{{"name":"Kit","price":"19.99","products":[{{"productId":"{}","quantity":2}}]}}"#,
            ProductId::generate()
        );
        let req: BundleRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.products[0].quantity, Some(2));
        assert!(req.products[0].variants.is_empty());
    }
}

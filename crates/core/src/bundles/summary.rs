//! Read-side view of a bundle: availability, savings, and grouped items.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::bundle::Bundle;
use crate::catalog::Product;
use crate::types::{BundleId, ProductId, VariantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleVariantLine {
    pub variant_id: VariantId,
    pub sku: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleProductLine {
    pub product_id: ProductId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<BundleVariantLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub id: BundleId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_bundles: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<Decimal>,
    pub products: Vec<BundleProductLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price and stock of one bundle component as currently stored.
struct Component<'a> {
    product_name: &'a str,
    sku: Option<&'a str>,
    price: Decimal,
    stock: Option<i32>,
}

fn component<'a>(
    products: &'a HashMap<ProductId, Product>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
) -> Option<Component<'a>> {
    let product = products.get(&product_id)?;
    match variant_id {
        None => Some(Component {
            product_name: product.name(),
            sku: None,
            price: product.base_price(),
            stock: if product.is_active() { product.base_stock() } else { Some(0) },
        }),
        Some(id) => {
            let variant = product.variant(id)?;
            let live = product.is_active() && variant.audit.is_active;
            Some(Component {
                product_name: product.name(),
                sku: variant.sku.as_deref(),
                price: variant.price,
                stock: Some(if live { variant.stock } else { 0 }),
            })
        }
    }
}

impl Bundle {
    /// Summarize the bundle against the current state of its components.
    ///
    /// `products` should hold every product referenced by an active item.
    /// Components that are missing or deactivated count as out of stock.
    #[must_use]
    pub fn summarize(&self, products: &HashMap<ProductId, Product>) -> BundleSummary {
        let mut available: Option<i32> = None;
        let mut list_price = Decimal::ZERO;
        let mut lines: Vec<BundleProductLine> = Vec::new();

        for item in self.active_items() {
            let found = component(products, item.product_id, item.variant_id);
            let stock = found.as_ref().map_or(Some(0), |c| c.stock);

            if let Some(stock) = stock
                && item.quantity > 0
            {
                let sets = stock.max(0) / item.quantity;
                available = Some(available.map_or(sets, |a| a.min(sets)));
            }
            if let Some(c) = &found {
                list_price += c.price * Decimal::from(item.quantity);
            }

            let position = lines
                .iter()
                .position(|l| l.product_id == item.product_id)
                .unwrap_or_else(|| {
                    lines.push(BundleProductLine {
                        product_id: item.product_id,
                        name: found
                            .as_ref()
                            .map(|c| c.product_name.to_owned())
                            .unwrap_or_default(),
                        quantity: None,
                        variants: Vec::new(),
                    });
                    lines.len() - 1
                });
            let Some(line) = lines.get_mut(position) else {
                continue;
            };

            match item.variant_id {
                None => {
                    line.quantity = Some(line.quantity.unwrap_or(0) + item.quantity);
                }
                Some(variant_id) => {
                    if let Some(v) = line.variants.iter_mut().find(|v| v.variant_id == variant_id) {
                        v.quantity += item.quantity;
                    } else {
                        line.variants.push(BundleVariantLine {
                            variant_id,
                            sku: found.as_ref().and_then(|c| c.sku.map(str::to_owned)),
                            quantity: item.quantity,
                        });
                    }
                }
            }
        }

        lines.sort_by(|a, b| a.name.cmp(&b.name));
        for line in &mut lines {
            line.variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        }

        let savings = list_price - self.price();
        BundleSummary {
            id: self.id(),
            name: self.name().to_owned(),
            description: self.description().map(str::to_owned),
            price: self.price(),
            available_bundles: available,
            savings: (savings > Decimal::ZERO).then_some(savings),
            products: lines,
            created_at: self.audit().created_at,
            updated_at: self.audit().updated_at,
        }
    }
}

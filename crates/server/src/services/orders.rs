//! Order placement and order reads.
//!
//! Placement runs in one transaction. Every product and variant row is
//! locked with `SELECT ... FOR UPDATE` the first time the order touches it
//! and cached in a [`StockLedger`], so later lines (and bundle components)
//! see the in-progress stock. The first failing line aborts the order and
//! rolls the transaction back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use stockroom_core::orders::{Order, OrderLineError, OrderRequest, OrderTarget, StockLedger};
use stockroom_core::{OrderId, OrderItemId, OrderItemKind, UserId, ValidationErrors};

use crate::db::{BundleRepository, OrderRepository, ProductRepository, UnitOfWork};
use crate::error::{AppError, Result};

/// Returned by order placement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderItemId,
    #[serde(rename = "type")]
    pub kind: OrderItemKind,
    pub reference_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub items: Vec<OrderItemResponse>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            user_id: order.user_id(),
            created_at: order.audit().created_at,
            item_count: order.item_count(),
            items: order
                .items()
                .iter()
                .filter(|item| item.audit.is_active)
                .map(|item| OrderItemResponse {
                    id: item.id,
                    kind: item.target.kind(),
                    reference_id: item.target.reference(),
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

/// Who is asking, for ownership checks on reads.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    products: ProductRepository<'a>,
    bundles: BundleRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            products: ProductRepository::new(pool),
            bundles: BundleRepository::new(pool),
        }
    }

    /// Place an order, deducting stock for every line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an empty item list,
    /// `AppError::NotFound` for a missing or inactive product, variant, or
    /// bundle, and `AppError::BadRequest` for a bad line or short stock.
    pub async fn place(&self, request: &OrderRequest, user_id: UserId) -> Result<PlacedOrder> {
        if request.items.is_empty() {
            return Err(ValidationErrors::single(
                "request.items",
                "at least one item is required",
            )
            .into());
        }

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut order = Order::open(user_id);
        self.orders.create(&mut uow, &order).await?;

        let mut ledger = StockLedger::new();
        if let Err(err) = self.fill(&mut uow, &mut order, &mut ledger, request).await {
            if let AppError::NotFound(_) | AppError::BadRequest(_) = err {
                warn!(user_id = %user_id, error = %err, "Order rejected");
            }
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Order rollback failed");
            }
            return Err(err);
        }

        let products: Vec<_> = ledger.changed_products().collect();
        for stock in &products {
            self.products
                .save_product_stock(&mut uow, stock, user_id)
                .await?;
        }
        let variants: Vec<_> = ledger.changed_variants().collect();
        for stock in &variants {
            self.products
                .save_variant_stock(&mut uow, stock, user_id)
                .await?;
        }

        self.orders.add_items(&mut uow, &order).await?;
        uow.commit().await?;

        info!(
            order_id = %order.id(),
            user_id = %user_id,
            lines = order.items().len(),
            products_touched = products.len(),
            variants_touched = variants.len(),
            "Order placed"
        );
        Ok(PlacedOrder {
            order_id: order.id(),
            item_count: order.item_count(),
        })
    }

    /// Process each line in request order, stopping at the first failure.
    async fn fill(
        &self,
        uow: &mut UnitOfWork,
        order: &mut Order,
        ledger: &mut StockLedger,
        request: &OrderRequest,
    ) -> Result<()> {
        for (index, input) in request.items.iter().enumerate() {
            let line = input.parse(index)?;

            match line.target {
                OrderTarget::Product(id) => {
                    if ledger.needs_product(id) {
                        let row = self.products.product_stock_for_update(uow, id).await?;
                        ledger.cache_product(id, row);
                    }
                    ledger.apply_product(id, line.quantity)?;
                }
                OrderTarget::Variant(id) => {
                    if ledger.needs_variant(id) {
                        let row = self.products.variant_stock_for_update(uow, id).await?;
                        ledger.cache_variant(id, row);
                    }
                    ledger.apply_variant(id, line.quantity)?;
                }
                OrderTarget::Bundle(id) => {
                    let bundle = self
                        .bundles
                        .get_detailed_in(uow, id)
                        .await?
                        .ok_or(OrderLineError::BundleNotFound(id))?;

                    let (product_ids, variant_ids) = ledger.missing_for_bundle(&bundle);
                    for product_id in product_ids {
                        let row = self
                            .products
                            .product_stock_for_update(uow, product_id)
                            .await?;
                        ledger.cache_product(product_id, row);
                    }
                    for variant_id in variant_ids {
                        let row = self
                            .products
                            .variant_stock_for_update(uow, variant_id)
                            .await?;
                        ledger.cache_variant(variant_id, row);
                    }
                    ledger.apply_bundle(&bundle, line.quantity)?;
                }
            }

            order.add_item(line.target, line.quantity);
        }
        Ok(())
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if loading fails.
    pub async fn list_mine(&self, user_id: UserId) -> Result<Vec<OrderResponse>> {
        let orders = self.orders.list_for_user(user_id).await?;
        Ok(orders.iter().map(OrderResponse::from).collect())
    }

    /// One order. Other users' orders read as missing unless the caller is
    /// an admin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order is missing, inactive, or
    /// not visible to the caller.
    pub async fn get(&self, id: OrderId, caller: Caller) -> Result<OrderResponse> {
        let order = self
            .orders
            .get_detailed(id)
            .await?
            .filter(|order| order.audit().is_active)
            .filter(|order| caller.is_admin || order.user_id() == caller.user_id)
            .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;

        Ok(OrderResponse::from(&order))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockroom_core::{BundleId, ProductId};

    use super::*;

    #[test]
    fn test_order_response_shape() {
        let mut order = Order::open(UserId::generate());
        let bundle = BundleId::generate();
        order.add_item(OrderTarget::Product(ProductId::generate()), 2);
        order.add_item(OrderTarget::Bundle(bundle), 3);

        let json = serde_json::to_value(OrderResponse::from(&order)).unwrap();

        assert_eq!(json["itemCount"], 5);
        assert_eq!(json["items"][1]["type"], "bundle");
        assert_eq!(json["items"][1]["referenceId"], bundle.to_string());
        assert_eq!(json["items"][1]["quantity"], 3);
    }

    #[test]
    fn test_placed_order_shape() {
        let placed = PlacedOrder {
            order_id: OrderId::generate(),
            item_count: 4,
        };
        let json = serde_json::to_value(&placed).unwrap();
        assert_eq!(json["itemCount"], 4);
        assert!(json.get("orderId").is_some());
    }
}

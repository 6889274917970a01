//! The order aggregate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::Audit;
use crate::types::{BundleId, OrderId, OrderItemId, OrderItemKind, ProductId, UserId, VariantId};

/// What an order line points at. Exactly one reference per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "referenceId", rename_all = "snake_case")]
pub enum OrderTarget {
    Product(ProductId),
    Variant(VariantId),
    Bundle(BundleId),
}

impl OrderTarget {
    #[must_use]
    pub const fn kind(self) -> OrderItemKind {
        match self {
            Self::Product(_) => OrderItemKind::Product,
            Self::Variant(_) => OrderItemKind::Variant,
            Self::Bundle(_) => OrderItemKind::Bundle,
        }
    }

    #[must_use]
    pub const fn reference(self) -> Uuid {
        match self {
            Self::Product(id) => id.as_uuid(),
            Self::Variant(id) => id.as_uuid(),
            Self::Bundle(id) => id.as_uuid(),
        }
    }

    /// Rebuild from the three nullable reference columns. `None` unless
    /// exactly one is set.
    #[must_use]
    pub const fn from_columns(
        product: Option<ProductId>,
        variant: Option<VariantId>,
        bundle: Option<BundleId>,
    ) -> Option<Self> {
        match (product, variant, bundle) {
            (Some(id), None, None) => Some(Self::Product(id)),
            (None, Some(id), None) => Some(Self::Variant(id)),
            (None, None, Some(id)) => Some(Self::Bundle(id)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn product_id(self) -> Option<ProductId> {
        if let Self::Product(id) = self { Some(id) } else { None }
    }

    #[must_use]
    pub const fn variant_id(self) -> Option<VariantId> {
        if let Self::Variant(id) = self { Some(id) } else { None }
    }

    #[must_use]
    pub const fn bundle_id(self) -> Option<BundleId> {
        if let Self::Bundle(id) = self { Some(id) } else { None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub target: OrderTarget,
    /// Units ordered; for bundles, the number of bundle instances.
    pub quantity: i32,
    pub audit: Audit,
}

#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub user_id: UserId,
    pub audit: Audit,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    audit: Audit,
    items: Vec<OrderItem>,
}

impl Order {
    /// Open an empty order for `user_id`.
    #[must_use]
    pub fn open(user_id: UserId) -> Self {
        Self {
            id: OrderId::generate(),
            user_id,
            audit: Audit::new(Some(user_id)),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn restore(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            user_id: parts.user_id,
            audit: parts.audit,
            items: parts.items,
        }
    }

    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.id
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub const fn audit(&self) -> &Audit {
        &self.audit
    }

    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Append a line. Quantity must already be validated as positive.
    pub fn add_item(&mut self, target: OrderTarget, quantity: i32) -> OrderItemId {
        let id = OrderItemId::generate();
        let item = OrderItem {
            id,
            order_id: self.id,
            target,
            quantity,
            audit: Audit::new(Some(self.user_id)),
        };
        self.audit.touch(Some(self.user_id));
        self.items.push(item);
        id
    }

    /// Sum of line quantities; bundle lines count their instances.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items
            .iter()
            .filter(|i| i.audit.is_active)
            .map(|i| i64::from(i.quantity))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_count_sums_quantities() {
        let mut order = Order::open(UserId::generate());
        order.add_item(OrderTarget::Product(ProductId::generate()), 2);
        order.add_item(OrderTarget::Bundle(BundleId::generate()), 3);
        assert_eq!(order.item_count(), 5);
        assert!(order.items().iter().all(|i| i.order_id == order.id()));
    }

    #[test]
    fn test_from_columns_requires_exactly_one() {
        let p = ProductId::generate();
        let v = VariantId::generate();
        assert_eq!(
            OrderTarget::from_columns(Some(p), None, None),
            Some(OrderTarget::Product(p))
        );
        assert_eq!(OrderTarget::from_columns(Some(p), Some(v), None), None);
        assert_eq!(OrderTarget::from_columns(None, None, None), None);
    }

    #[test]
    fn test_target_serializes_with_type_tag() {
        let id = VariantId::generate();
        let json = serde_json::to_value(OrderTarget::Variant(id)).unwrap();
        assert_eq!(json["type"], "variant");
        assert_eq!(json["referenceId"], id.to_string());
    }
}

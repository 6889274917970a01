//! Order request lines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::OrderLineError;
use super::order::OrderTarget;
use crate::types::{BundleId, OrderItemKind, ProductId, VariantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLineInput>,
}

/// A line whose type and quantity have been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub target: OrderTarget,
    pub quantity: i32,
}

impl OrderLineInput {
    /// # Errors
    ///
    /// Returns [`OrderLineError::InvalidQuantity`] for a quantity of zero or
    /// less and [`OrderLineError::UnknownType`] for an unrecognized type.
    pub fn parse(&self, index: usize) -> Result<OrderLine, OrderLineError> {
        if self.quantity <= 0 {
            return Err(OrderLineError::InvalidQuantity {
                index,
                quantity: self.quantity,
            });
        }
        let kind: OrderItemKind = self
            .kind
            .parse()
            .map_err(|_| OrderLineError::UnknownType {
                index,
                kind: self.kind.clone(),
            })?;
        let target = match kind {
            OrderItemKind::Product => OrderTarget::Product(ProductId::from_uuid(self.id)),
            OrderItemKind::Variant => OrderTarget::Variant(VariantId::from_uuid(self.id)),
            OrderItemKind::Bundle => OrderTarget::Bundle(BundleId::from_uuid(self.id)),
        };
        Ok(OrderLine {
            target,
            quantity: self.quantity,
        })
    }
}

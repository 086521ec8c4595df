use serde::{Deserialize, Serialize};

use stockalloc_core::{DomainError, DomainResult, OrderId, Sku, ValueObject};

/// A request for `quantity` units of one SKU, belonging to one customer order.
///
/// Immutable once built; two lines are equal iff all three fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OrderLineRecord")]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    quantity: u32,
}

impl OrderLine {
    pub fn new(order_id: OrderId, sku: Sku, quantity: u32) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("order line quantity must be positive"));
        }
        Ok(Self {
            order_id,
            sku,
            quantity,
        })
    }

    /// Build a line from raw strings, validating every field.
    pub fn parse(order_id: &str, sku: &str, quantity: u32) -> DomainResult<Self> {
        Self::new(OrderId::new(order_id)?, Sku::new(sku)?, quantity)
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

impl ValueObject for OrderLine {}

/// Unvalidated wire shape; deserialization goes through `OrderLine::new`.
#[derive(Deserialize)]
struct OrderLineRecord {
    order_id: OrderId,
    sku: Sku,
    quantity: u32,
}

impl TryFrom<OrderLineRecord> for OrderLine {
    type Error = DomainError;

    fn try_from(record: OrderLineRecord) -> Result<Self, Self::Error> {
        OrderLine::new(record.order_id, record.sku, record.quantity)
    }
}

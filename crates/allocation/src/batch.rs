use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use stockalloc_core::{BatchRef, DomainError, DomainResult, Entity, Sku};

use crate::order_line::OrderLine;

/// Entity: a lot of stock for one SKU, either on the shelf (`eta == None`) or
/// in transit and expected on `eta`.
///
/// Identity is the batch reference; `PartialEq` and `Hash` ignore every other
/// field so a batch held in memory compares equal to the same batch freshly
/// loaded from storage.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    eta: Option<NaiveDate>,
    purchased_quantity: u32,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    pub fn new(reference: BatchRef, sku: Sku, purchased_quantity: u32, eta: Option<NaiveDate>) -> Self {
        Self {
            reference,
            sku,
            eta,
            purchased_quantity,
            allocations: HashSet::new(),
        }
    }

    /// Build a batch from raw strings, validating the identifiers.
    pub fn parse(
        reference: &str,
        sku: &str,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        Ok(Self::new(
            BatchRef::new(reference)?,
            Sku::new(sku)?,
            purchased_quantity,
            eta,
        ))
    }

    /// Rehydrate a batch together with its persisted allocations.
    ///
    /// Storage is not trusted: every line must match the batch SKU and the
    /// lines together must fit in `purchased_quantity`.
    pub fn restore(
        reference: BatchRef,
        sku: Sku,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
        lines: impl IntoIterator<Item = OrderLine>,
    ) -> DomainResult<Self> {
        let mut batch = Self::new(reference, sku, purchased_quantity, eta);
        let mut allocated: u64 = 0;

        for line in lines {
            if line.sku() != &batch.sku {
                return Err(DomainError::invariant(format!(
                    "batch {} holds a line for sku {} (expected {})",
                    batch.reference,
                    line.sku(),
                    batch.sku
                )));
            }
            if batch.allocations.insert(line.clone()) {
                allocated += u64::from(line.quantity());
            }
        }

        if allocated > u64::from(purchased_quantity) {
            return Err(DomainError::invariant(format!(
                "batch {} is over-allocated ({allocated} of {purchased_quantity})",
                batch.reference
            )));
        }

        Ok(batch)
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// On the shelf now rather than in transit.
    pub fn is_in_stock(&self) -> bool {
        self.eta.is_none()
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(OrderLine::quantity).sum()
    }

    pub fn available_quantity(&self) -> u32 {
        // Cannot underflow: allocate() and restore() both refuse to exceed
        // purchased_quantity.
        self.purchased_quantity - self.allocated_quantity()
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == *line.sku() && self.available_quantity() >= line.quantity()
    }

    /// Commit `line` against this batch.
    ///
    /// A line that fails `can_allocate` is ignored without error, and a line
    /// already held is not counted twice. Callers that need to know whether the
    /// line landed must check `can_allocate` first.
    pub fn allocate(&mut self, line: &OrderLine) {
        if self.can_allocate(line) {
            self.allocations.insert(line.clone());
        }
    }

    /// Release `line`; no-op if it was never allocated here.
    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }
}

impl Entity for Batch {
    type Id = BatchRef;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

/// Allocation preference between two batches: `Less` means `a` is preferred.
///
/// In-stock batches come before any batch in transit; batches in transit are
/// ordered by arrival date. Batches with the same `eta` (or both without one)
/// compare `Equal`, leaving the tie to the caller's input order.
pub fn priority(a: &Batch, b: &Batch) -> Ordering {
    match (a.eta, b.eta) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

use thiserror::Error;

use stockalloc_core::BatchRef;

use crate::batch::{priority, Batch};
use crate::order_line::OrderLine;

/// Allocation outcome errors.
///
/// Not fatal: callers are expected to report these per order line and carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// No candidate batch can hold the order line.
    #[error("out of stock: {0}")]
    OutOfStock(String),
}

/// Allocate `line` to the most preferred batch that can hold it and return
/// that batch's reference.
///
/// Preference follows [`priority`]: in-stock batches first, then batches in
/// transit by earliest `eta`. Equally preferred batches are taken in slice
/// order. Batches of other SKUs are skipped. Exactly one batch is mutated on
/// success; none on failure.
pub fn allocate(line: &OrderLine, batches: &mut [Batch]) -> Result<BatchRef, AllocationError> {
    let index = allocate_index(line, batches)?;
    Ok(batches[index].reference().clone())
}

/// Same as [`allocate`], but returns the position of the chosen batch in
/// `batches` so callers can persist it without searching again.
pub fn allocate_index(line: &OrderLine, batches: &mut [Batch]) -> Result<usize, AllocationError> {
    // `min_by` keeps the first of several equal minima, which is the same
    // choice a stable sort followed by a linear scan would make.
    let index = batches
        .iter()
        .enumerate()
        .filter(|(_, batch)| batch.can_allocate(line))
        .min_by(|(_, a), (_, b)| priority(a, b))
        .map(|(index, _)| index)
        .ok_or_else(|| {
            AllocationError::OutOfStock(format!(
                "not enough stock of {} to allocate {} unit(s) for order {}",
                line.sku(),
                line.quantity(),
                line.order_id()
            ))
        })?;

    batches[index].allocate(line);
    Ok(index)
}

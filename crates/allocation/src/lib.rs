//! Stock allocation domain module.
//!
//! Order lines are allocated against stock batches, preferring stock on the
//! shelf over shipments and earlier shipments over later ones. Pure,
//! deterministic domain logic (no IO, no logging, no storage).

pub mod allocator;
pub mod batch;
pub mod order_line;

pub use allocator::{allocate, allocate_index, AllocationError};
pub use batch::{priority, Batch};
pub use order_line::OrderLine;

//! Batch storage boundary.
//!
//! Defines the repository abstraction the allocation layer loads and saves
//! batches through, plus the in-memory and Postgres implementations.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryBatchRepository;
pub use postgres::PostgresBatchRepository;
pub use r#trait::{BatchRepository, RepositoryError};

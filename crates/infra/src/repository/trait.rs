use std::sync::Arc;

use thiserror::Error;

use stockalloc_allocation::Batch;
use stockalloc_core::BatchRef;

/// Storage operation error.
///
/// These are **infrastructure errors**. The allocation domain never produces or
/// inspects them; they travel unchanged to whoever called the repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("batch not found: {0}")]
    NotFound(BatchRef),

    #[error("batch reference already exists: {0}")]
    DuplicateRef(BatchRef),

    /// Stored data could not be turned back into a valid batch.
    #[error("corrupt batch data: {0}")]
    Corrupt(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Batch storage boundary.
///
/// The allocation core only needs to load and save batches by reference; the
/// storage technology behind this trait is interchangeable (in-memory for
/// tests/dev, Postgres for production).
///
/// ## Semantics
///
/// - `add` stores a new batch, allocations included, and rejects a reference
///   that already exists.
/// - `get` returns an owned copy; mutations to it are not visible to storage
///   until passed to `update`.
/// - `update` replaces the allocations of an existing batch. Reference, SKU,
///   purchased quantity and eta are fixed at creation and are not rewritten.
/// - `list` returns every batch ordered by reference.
pub trait BatchRepository: Send + Sync {
    fn add(&self, batch: Batch) -> Result<(), RepositoryError>;

    fn get(&self, reference: &BatchRef) -> Result<Batch, RepositoryError>;

    fn list(&self) -> Result<Vec<Batch>, RepositoryError>;

    fn update(&self, batch: &Batch) -> Result<(), RepositoryError>;
}

impl<R> BatchRepository for Arc<R>
where
    R: BatchRepository + ?Sized,
{
    fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        (**self).add(batch)
    }

    fn get(&self, reference: &BatchRef) -> Result<Batch, RepositoryError> {
        (**self).get(reference)
    }

    fn list(&self) -> Result<Vec<Batch>, RepositoryError> {
        (**self).list()
    }

    fn update(&self, batch: &Batch) -> Result<(), RepositoryError> {
        (**self).update(batch)
    }
}

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::RwLock;

use stockalloc_allocation::Batch;
use stockalloc_core::BatchRef;

use super::r#trait::{BatchRepository, RepositoryError};

/// In-memory batch repository.
///
/// Intended for tests/dev. Each call takes the lock once; there is no
/// transaction spanning a `get` and a later `update`.
#[derive(Debug, Default)]
pub struct InMemoryBatchRepository {
    batches: RwLock<BTreeMap<BatchRef, Batch>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a repository with existing batches, rejecting duplicate references.
    pub fn with_batches(batches: impl IntoIterator<Item = Batch>) -> Result<Self, RepositoryError> {
        let repo = Self::new();
        for batch in batches {
            repo.add(batch)?;
        }
        Ok(repo)
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Storage("lock poisoned".to_string())
    }
}

impl BatchRepository for InMemoryBatchRepository {
    fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        let mut batches = self.batches.write().map_err(|_| Self::poisoned())?;
        match batches.entry(batch.reference().clone()) {
            Entry::Occupied(existing) => Err(RepositoryError::DuplicateRef(existing.key().clone())),
            Entry::Vacant(slot) => {
                tracing::debug!(batch_ref = %batch.reference(), sku = %batch.sku(), "batch added");
                slot.insert(batch);
                Ok(())
            }
        }
    }

    fn get(&self, reference: &BatchRef) -> Result<Batch, RepositoryError> {
        let batches = self.batches.read().map_err(|_| Self::poisoned())?;
        batches
            .get(reference)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(reference.clone()))
    }

    fn list(&self) -> Result<Vec<Batch>, RepositoryError> {
        let batches = self.batches.read().map_err(|_| Self::poisoned())?;
        Ok(batches.values().cloned().collect())
    }

    fn update(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut batches = self.batches.write().map_err(|_| Self::poisoned())?;
        let stored = batches
            .get_mut(batch.reference())
            .ok_or_else(|| RepositoryError::NotFound(batch.reference().clone()))?;

        // Only the allocations are mutable; rebuild from the stored attributes
        // so a caller cannot rewrite sku/quantity/eta through update().
        let restored = Batch::restore(
            stored.reference().clone(),
            stored.sku().clone(),
            stored.purchased_quantity(),
            stored.eta(),
            batch.allocations().cloned(),
        )
        .map_err(|e| RepositoryError::Corrupt(e.to_string()))?;

        *stored = restored;
        tracing::debug!(batch_ref = %batch.reference(), "batch allocations updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockalloc_allocation::OrderLine;

    fn batch(reference: &str, sku: &str, qty: u32, eta: Option<NaiveDate>) -> Batch {
        Batch::parse(reference, sku, qty, eta).unwrap()
    }

    fn line(order_id: &str, sku: &str, qty: u32) -> OrderLine {
        OrderLine::parse(order_id, sku, qty).unwrap()
    }

    fn reference(s: &str) -> BatchRef {
        BatchRef::new(s).unwrap()
    }

    #[test]
    fn add_then_get_returns_the_same_batch() {
        let repo = InMemoryBatchRepository::new();
        let mut b = batch("batch-001", "RUSTY-SOAPDISH", 100, None);
        b.allocate(&line("order-1", "RUSTY-SOAPDISH", 10));
        repo.add(b.clone()).unwrap();

        let loaded = repo.get(&reference("batch-001")).unwrap();
        assert_eq!(loaded, b);
        assert_eq!(loaded.sku().as_str(), "RUSTY-SOAPDISH");
        assert_eq!(loaded.available_quantity(), 90);
    }

    #[test]
    fn duplicate_reference_is_rejected() {
        let repo = InMemoryBatchRepository::new();
        repo.add(batch("batch-001", "LAMP", 1, None)).unwrap();

        let err = repo.add(batch("batch-001", "SOFA", 5, None)).unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateRef(r) if r.as_str() == "batch-001"));
        assert_eq!(repo.get(&reference("batch-001")).unwrap().sku().as_str(), "LAMP");
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let repo = InMemoryBatchRepository::new();
        let err = repo.get(&reference("missing")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn update_persists_allocations_but_not_attributes() {
        let repo = InMemoryBatchRepository::new();
        repo.add(batch("batch-001", "LAMP", 10, None)).unwrap();

        let mut loaded = repo.get(&reference("batch-001")).unwrap();
        loaded.allocate(&line("order-1", "LAMP", 4));
        repo.update(&loaded).unwrap();

        let reloaded = repo.get(&reference("batch-001")).unwrap();
        assert_eq!(reloaded.available_quantity(), 6);
        assert_eq!(reloaded.purchased_quantity(), 10);
    }

    #[test]
    fn update_of_unknown_batch_is_not_found() {
        let repo = InMemoryBatchRepository::new();
        let err = repo.update(&batch("ghost", "LAMP", 1, None)).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn list_is_ordered_by_reference() {
        let repo = InMemoryBatchRepository::with_batches([
            batch("b-3", "LAMP", 1, None),
            batch("b-1", "LAMP", 1, None),
            batch("b-2", "SOFA", 1, None),
        ])
        .unwrap();

        let refs: Vec<String> = repo
            .list()
            .unwrap()
            .iter()
            .map(|b| b.reference().to_string())
            .collect();
        assert_eq!(refs, vec!["b-1", "b-2", "b-3"]);
    }
}

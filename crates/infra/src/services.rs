//! Application service: drives allocation against a batch repository.
//!
//! Flow for one order line: load candidates → pure `allocate` → persist the
//! one batch that changed. Serialising concurrent calls for the same SKU is
//! the caller's job (a transaction or lock around the service call).

use chrono::NaiveDate;
use thiserror::Error;
use tracing::instrument;

use stockalloc_allocation::{AllocationError, Batch, OrderLine};
use stockalloc_core::{BatchRef, DomainError, Sku};

use crate::repository::{BatchRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub fn is_out_of_stock(&self) -> bool {
        matches!(self, ServiceError::Allocation(AllocationError::OutOfStock(_)))
    }
}

#[derive(Debug, Clone)]
pub struct AllocationService<R> {
    repository: R,
}

impl<R> AllocationService<R>
where
    R: BatchRepository,
{
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Register a newly purchased batch.
    #[instrument(skip(self), err)]
    pub fn add_batch(
        &self,
        reference: &str,
        sku: &str,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Result<BatchRef, ServiceError> {
        let batch = Batch::parse(reference, sku, purchased_quantity, eta)?;
        let reference = batch.reference().clone();
        self.repository.add(batch)?;
        tracing::info!(batch_ref = %reference, "batch registered");
        Ok(reference)
    }

    /// Allocate one order line and persist the chosen batch.
    ///
    /// `OutOfStock` is reported as `ServiceError::Allocation`, logged once at
    /// WARN, and leaves storage untouched.
    #[instrument(
        skip(self, line),
        fields(order_id = %line.order_id(), sku = %line.sku(), quantity = line.quantity())
    )]
    pub fn allocate(&self, line: &OrderLine) -> Result<BatchRef, ServiceError> {
        let result = self.allocate_and_persist(line);
        match &result {
            Ok(reference) => tracing::info!(batch_ref = %reference, "order line allocated"),
            Err(err) if err.is_out_of_stock() => tracing::warn!("{err}"),
            Err(err) => tracing::error!("allocation failed: {err}"),
        }
        result
    }

    fn allocate_and_persist(&self, line: &OrderLine) -> Result<BatchRef, ServiceError> {
        let mut candidates: Vec<Batch> = self
            .repository
            .list()?
            .into_iter()
            .filter(|batch| batch.sku() == line.sku())
            .collect();

        let index = stockalloc_allocation::allocate_index(line, &mut candidates)?;
        let chosen = &candidates[index];
        self.repository.update(chosen)?;
        Ok(chosen.reference().clone())
    }

    /// Release an order line from a batch and persist the change.
    #[instrument(skip(self, line), fields(order_id = %line.order_id()), err)]
    pub fn deallocate(&self, reference: &BatchRef, line: &OrderLine) -> Result<(), ServiceError> {
        let mut batch = self.repository.get(reference)?;
        batch.deallocate(line);
        self.repository.update(&batch)?;
        tracing::info!(batch_ref = %reference, "order line deallocated");
        Ok(())
    }

    pub fn available_quantity(&self, reference: &BatchRef) -> Result<u32, ServiceError> {
        Ok(self.repository.get(reference)?.available_quantity())
    }

    /// Total free units of `sku` across every stored batch.
    pub fn available_for_sku(&self, sku: &Sku) -> Result<u64, ServiceError> {
        Ok(self
            .repository
            .list()?
            .iter()
            .filter(|batch| batch.sku() == sku)
            .map(|batch| u64::from(batch.available_quantity()))
            .sum())
    }
}

//! Postgres-backed batch repository.
//!
//! ## Schema
//!
//! - `batches(reference PK, sku, purchased_quantity, eta NULL)`
//! - `allocations(batch_reference FK, order_id, sku, quantity)`, unique over
//!   all four columns so an order line is held at most once per batch.
//!
//! Quantities are stored as `BIGINT` so every `u32` fits.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) on `batches` insert | `23505` | `DuplicateRef` |
//! | No row for the reference | N/A | `NotFound` |
//! | Decoded row fails batch invariants | N/A | `Corrupt` |
//! | Anything else | Any | `Storage` |

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tokio::runtime::RuntimeFlavor;
use tracing::instrument;

use stockalloc_allocation::{Batch, OrderLine};
use stockalloc_core::{BatchRef, Sku};

use super::r#trait::{BatchRepository, RepositoryError};

const CREATE_BATCHES: &str = r#"
    CREATE TABLE IF NOT EXISTS batches (
        reference TEXT PRIMARY KEY,
        sku TEXT NOT NULL,
        purchased_quantity BIGINT NOT NULL CHECK (purchased_quantity >= 0),
        eta DATE NULL
    )
"#;

const CREATE_ALLOCATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS allocations (
        batch_reference TEXT NOT NULL REFERENCES batches (reference) ON DELETE CASCADE,
        order_id TEXT NOT NULL,
        sku TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        UNIQUE (batch_reference, order_id, sku, quantity)
    )
"#;

/// Postgres-backed batch repository.
///
/// The async inherent methods are the primary API. The synchronous
/// [`BatchRepository`] impl drives them on the current tokio runtime and
/// therefore must be called from inside a multi-threaded runtime.
#[derive(Debug, Clone)]
pub struct PostgresBatchRepository {
    pool: Arc<PgPool>,
}

impl PostgresBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet. Safe to call repeatedly.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_BATCHES)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        sqlx::query(CREATE_ALLOCATIONS)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self, batch), fields(batch_ref = %batch.reference()), err)]
    pub async fn insert(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert", e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO batches (reference, sku, purchased_quantity, eta)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(batch.reference().as_str())
        .bind(batch.sku().as_str())
        .bind(i64::from(batch.purchased_quantity()))
        .bind(batch.eta())
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            return Err(if is_unique_violation(&err) {
                RepositoryError::DuplicateRef(batch.reference().clone())
            } else {
                map_sqlx_error("insert", err)
            });
        }

        insert_allocations(&mut tx, batch.reference(), batch.allocations()).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("insert", e))?;
        Ok(())
    }

    #[instrument(skip(self, reference), fields(batch_ref = %reference), err)]
    pub async fn fetch(&self, reference: &BatchRef) -> Result<Batch, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta
            FROM batches
            WHERE reference = $1
            "#,
        )
        .bind(reference.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch", e))?
        .ok_or_else(|| RepositoryError::NotFound(reference.clone()))?;

        let header = BatchRow::from_row(&row)?;

        let lines = sqlx::query(
            r#"
            SELECT order_id, sku, quantity
            FROM allocations
            WHERE batch_reference = $1
            "#,
        )
        .bind(reference.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch", e))?
        .iter()
        .map(decode_line)
        .collect::<Result<Vec<_>, _>>()?;

        header.into_batch(lines)
    }

    #[instrument(skip(self), fields(batch_count = tracing::field::Empty), err)]
    pub async fn fetch_all(&self) -> Result<Vec<Batch>, RepositoryError> {
        let headers = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta
            FROM batches
            ORDER BY reference ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_all", e))?;

        let allocation_rows = sqlx::query(
            r#"
            SELECT batch_reference, order_id, sku, quantity
            FROM allocations
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_all", e))?;

        let mut lines_by_batch: HashMap<String, Vec<OrderLine>> = HashMap::new();
        for row in &allocation_rows {
            let batch_reference: String = row
                .try_get("batch_reference")
                .map_err(|e| map_sqlx_error("fetch_all", e))?;
            lines_by_batch
                .entry(batch_reference)
                .or_default()
                .push(decode_line(row)?);
        }

        let mut batches = Vec::with_capacity(headers.len());
        for row in &headers {
            let header = BatchRow::from_row(row)?;
            let lines = lines_by_batch.remove(&header.reference).unwrap_or_default();
            batches.push(header.into_batch(lines)?);
        }

        tracing::Span::current().record("batch_count", batches.len());
        Ok(batches)
    }

    /// Replace the stored allocations of an existing batch.
    ///
    /// The batch row is locked for the duration of the transaction and the new
    /// allocation set is validated against the *stored* attributes.
    #[instrument(skip(self, batch), fields(batch_ref = %batch.reference()), err)]
    pub async fn save_allocations(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("save_allocations", e))?;

        let row = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta
            FROM batches
            WHERE reference = $1
            FOR UPDATE
            "#,
        )
        .bind(batch.reference().as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_allocations", e))?
        .ok_or_else(|| RepositoryError::NotFound(batch.reference().clone()))?;

        let checked = BatchRow::from_row(&row)?.into_batch(batch.allocations().cloned())?;

        sqlx::query("DELETE FROM allocations WHERE batch_reference = $1")
            .bind(checked.reference().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_allocations", e))?;

        insert_allocations(&mut tx, checked.reference(), checked.allocations()).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("save_allocations", e))?;
        Ok(())
    }

    fn run<F, T>(&self, fut: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            RepositoryError::Storage(
                "PostgresBatchRepository requires a tokio runtime; call it from within one".to_string(),
            )
        })?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(RepositoryError::Storage(
                "PostgresBatchRepository cannot block on a current-thread runtime; use the async methods or a multi-thread runtime"
                    .to_string(),
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(fut))
    }
}

impl BatchRepository for PostgresBatchRepository {
    fn add(&self, batch: Batch) -> Result<(), RepositoryError> {
        self.run(self.insert(&batch))
    }

    fn get(&self, reference: &BatchRef) -> Result<Batch, RepositoryError> {
        self.run(self.fetch(reference))
    }

    fn list(&self) -> Result<Vec<Batch>, RepositoryError> {
        self.run(self.fetch_all())
    }

    fn update(&self, batch: &Batch) -> Result<(), RepositoryError> {
        self.run(self.save_allocations(batch))
    }
}

/// Decoded `batches` row, before its allocations are attached.
struct BatchRow {
    reference: String,
    sku: String,
    purchased_quantity: i64,
    eta: Option<NaiveDate>,
}

impl BatchRow {
    fn from_row(row: &PgRow) -> Result<Self, RepositoryError> {
        let get = |e| map_sqlx_error("decode batch", e);
        Ok(Self {
            reference: row.try_get("reference").map_err(get)?,
            sku: row.try_get("sku").map_err(get)?,
            purchased_quantity: row.try_get("purchased_quantity").map_err(get)?,
            eta: row.try_get("eta").map_err(get)?,
        })
    }

    fn into_batch(self, lines: impl IntoIterator<Item = OrderLine>) -> Result<Batch, RepositoryError> {
        let corrupt = |e: stockalloc_core::DomainError| RepositoryError::Corrupt(e.to_string());
        let purchased = u32::try_from(self.purchased_quantity).map_err(|_| {
            RepositoryError::Corrupt(format!(
                "batch {} has out-of-range purchased_quantity {}",
                self.reference, self.purchased_quantity
            ))
        })?;

        Batch::restore(
            BatchRef::new(self.reference).map_err(corrupt)?,
            Sku::new(self.sku).map_err(corrupt)?,
            purchased,
            self.eta,
            lines,
        )
        .map_err(corrupt)
    }
}

fn decode_line(row: &PgRow) -> Result<OrderLine, RepositoryError> {
    let get = |e| map_sqlx_error("decode allocation", e);
    let order_id: String = row.try_get("order_id").map_err(get)?;
    let sku: String = row.try_get("sku").map_err(get)?;
    let quantity: i64 = row.try_get("quantity").map_err(get)?;

    let quantity = u32::try_from(quantity)
        .map_err(|_| RepositoryError::Corrupt(format!("allocation quantity {quantity} out of range")))?;
    OrderLine::parse(&order_id, &sku, quantity).map_err(|e| RepositoryError::Corrupt(e.to_string()))
}

async fn insert_allocations<'a>(
    tx: &mut Transaction<'_, Postgres>,
    reference: &BatchRef,
    lines: impl Iterator<Item = &'a OrderLine>,
) -> Result<(), RepositoryError> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO allocations (batch_reference, order_id, sku, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reference.as_str())
        .bind(line.order_id().as_str())
        .bind(line.sku().as_str())
        .bind(i64::from(line.quantity()))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_allocations", e))?;
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            RepositoryError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed during {operation}"))
        }
        other => RepositoryError::Storage(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    // Requires a scratch database: DATABASE_URL=postgres://... cargo test -- --ignored
    async fn repository() -> PostgresBatchRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        let repo = PostgresBatchRepository::new(pool);
        repo.ensure_schema().await.unwrap();
        repo
    }

    fn unique_ref(prefix: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("{prefix}-{nanos}")
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore]
    async fn insert_fetch_and_save_allocations_round_trip() {
        let repo = repository().await;
        let reference = unique_ref("pg-batch");
        let mut batch = Batch::parse(&reference, "PG-LAMP", 10, NaiveDate::from_ymd_opt(2030, 1, 1)).unwrap();
        batch.allocate(&OrderLine::parse("order-1", "PG-LAMP", 3).unwrap());

        repo.insert(&batch).await.unwrap();
        let loaded = repo.fetch(batch.reference()).await.unwrap();
        assert_eq!(loaded, batch);
        assert_eq!(loaded.available_quantity(), 7);
        assert_eq!(loaded.eta(), batch.eta());

        let mut changed = loaded.clone();
        changed.allocate(&OrderLine::parse("order-2", "PG-LAMP", 5).unwrap());
        repo.save_allocations(&changed).await.unwrap();
        assert_eq!(repo.fetch(batch.reference()).await.unwrap().available_quantity(), 2);

        let err = repo.insert(&batch).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateRef(_)));
    }

    fn lazy_repository() -> PostgresBatchRepository {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://stockalloc@localhost/unused")
            .unwrap();
        PostgresBatchRepository::new(pool)
    }

    #[tokio::test]
    async fn sync_trait_refuses_current_thread_runtime() {
        let repo = lazy_repository();
        let missing = BatchRef::new("batch-001").unwrap();

        let err = BatchRepository::get(&repo, &missing).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(msg) if msg.contains("current-thread")));
    }

    #[test]
    fn sync_trait_outside_a_runtime_is_a_storage_error() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let repo = runtime.block_on(async { lazy_repository() });

        let err = BatchRepository::list(&repo).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(msg) if msg.contains("requires a tokio runtime")));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore]
    async fn sync_trait_bridges_to_the_runtime() {
        let repo = repository().await;
        let missing = BatchRef::new(unique_ref("pg-missing")).unwrap();
        let err = BatchRepository::get(&repo, &missing).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}

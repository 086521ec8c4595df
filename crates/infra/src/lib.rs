//! Infrastructure layer: batch storage adapters, configuration, and the
//! application service that wires allocation to storage.

pub mod config;
pub mod repository;
pub mod services;


pub use config::{ConfigError, PostgresConfig, StoreConfig};
pub use repository::{BatchRepository, InMemoryBatchRepository, PostgresBatchRepository, RepositoryError};
pub use services::{AllocationService, ServiceError};

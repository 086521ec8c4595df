//! Configuration loading and representation.
//!
//! Read from the process environment:
//!
//! - `STOCKALLOC_STORE`: `memory` (default) or `postgres`
//! - `DATABASE_URL`: required when the store is `postgres`
//! - `STOCKALLOC_DB_MAX_CONNECTIONS`: pool size (default 5)

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::repository::{
    BatchRepository, InMemoryBatchRepository, PostgresBatchRepository, RepositoryError,
};

pub const STORE_VAR: &str = "STOCKALLOC_STORE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "STOCKALLOC_DB_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Which batch store backs the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Postgres(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = lookup(STORE_VAR).unwrap_or_else(|| "memory".to_string());

        match store.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(Self::Memory),
            "postgres" => {
                let database_url = lookup(DATABASE_URL_VAR)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;

                let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
                    None => DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => raw
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ConfigError::Invalid {
                            key: MAX_CONNECTIONS_VAR,
                            value: raw,
                        })?,
                };

                Ok(Self::Postgres(PostgresConfig {
                    database_url,
                    max_connections,
                }))
            }
            _ => Err(ConfigError::Invalid {
                key: STORE_VAR,
                value: store,
            }),
        }
    }
}

pub async fn connect_postgres(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
}

/// Open the configured batch store. Postgres stores get their schema created
/// on first use.
pub async fn open_repository(
    config: &StoreConfig,
) -> Result<Arc<dyn BatchRepository>, RepositoryError> {
    match config {
        StoreConfig::Memory => {
            tracing::info!("using in-memory batch store");
            Ok(Arc::new(InMemoryBatchRepository::new()))
        }
        StoreConfig::Postgres(pg) => {
            let pool = connect_postgres(pg)
                .await
                .map_err(|e| RepositoryError::Storage(format!("connect failed: {e}")))?;
            let repo = PostgresBatchRepository::new(pool);
            repo.ensure_schema().await?;
            tracing::info!(max_connections = pg.max_connections, "using postgres batch store");
            Ok(Arc::new(repo))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_memory_store() {
        assert_eq!(StoreConfig::from_lookup(lookup(&[])).unwrap(), StoreConfig::Memory);
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = StoreConfig::from_lookup(lookup(&[(STORE_VAR, "postgres")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(DATABASE_URL_VAR));
    }

    #[test]
    fn postgres_reads_url_and_pool_size() {
        let config = StoreConfig::from_lookup(lookup(&[
            (STORE_VAR, "Postgres"),
            (DATABASE_URL_VAR, "postgres://localhost/stock"),
            (MAX_CONNECTIONS_VAR, "12"),
        ]))
        .unwrap();

        assert_eq!(
            config,
            StoreConfig::Postgres(PostgresConfig {
                database_url: "postgres://localhost/stock".to_string(),
                max_connections: 12,
            })
        );
    }

    #[test]
    fn rejects_zero_pool_size_and_unknown_store() {
        let err = StoreConfig::from_lookup(lookup(&[
            (STORE_VAR, "postgres"),
            (DATABASE_URL_VAR, "postgres://localhost/stock"),
            (MAX_CONNECTIONS_VAR, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == MAX_CONNECTIONS_VAR));

        let err = StoreConfig::from_lookup(lookup(&[(STORE_VAR, "redis")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == STORE_VAR));
    }

    #[tokio::test]
    async fn memory_config_opens_an_empty_store() {
        let repo = open_repository(&StoreConfig::Memory).await.unwrap();
        assert!(repo.list().unwrap().is_empty());
    }
}

//! # Database Module (Geo-Store)
//!
//! Owns the PostgreSQL connection pool used by the provisioner and the
//! ingestion handler. The pool is constructed once at process start and
//! passed down explicitly; no module-level connection state exists.

use deadpool_postgres::{Config, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::error::{GeoError, GeoResult};

// Fixed connection parameters. The deployment target is a single local
// PostGIS instance; only the HTTP port is externally configurable.
const PG_HOST: &str = "localhost";
const PG_PORT: u16 = 5432;
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "123456789";
const PG_DBNAME: &str = "geo_db";

/// The Geo-Store: manages the database pool and provides query utilities
pub struct GeoStore {
    pool: Pool,
}

impl GeoStore {
    /// Builds the connection pool against the fixed database parameters.
    ///
    /// Pool construction is lazy; the first checkout performs the actual
    /// connection, so a failure here only indicates a bad configuration.
    pub fn connect() -> GeoResult<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(PG_HOST.to_string());
        cfg.port = Some(PG_PORT);
        cfg.user = Some(PG_USER.to_string());
        cfg.password = Some(PG_PASSWORD.to_string());
        cfg.dbname = Some(PG_DBNAME.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| GeoError::Database(format!("Failed to create pool: {}", e)))?;

        info!("Database pool configured for {}@{}:{}/{}", PG_USER, PG_HOST, PG_PORT, PG_DBNAME);
        Ok(Self { pool })
    }

    /// Checks out a pooled client. Needed directly by callers that open
    /// their own transaction.
    pub async fn client(&self) -> GeoResult<Object> {
        Ok(self.pool.get().await?)
    }

    /// Execute a write statement (INSERT, DDL) and return affected rows
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> GeoResult<u64> {
        debug!("Executing: {}", sql);
        let client = self.client().await?;
        Ok(client.execute(sql, params).await?)
    }

    /// Execute multiple statements in one batch (DDL setup)
    pub async fn batch_execute(&self, sql: &str) -> GeoResult<()> {
        debug!("Executing batch: {}", sql);
        let client = self.client().await?;
        Ok(client.batch_execute(sql).await?)
    }

    /// Run a query and return the raw rows
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> GeoResult<Vec<Row>> {
        let client = self.client().await?;
        Ok(client.query(sql, params).await?)
    }

    /// Run a query expected to return exactly one row
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> GeoResult<Row> {
        let client = self.client().await?;
        Ok(client.query_one(sql, params).await?)
    }

    /// Connectivity probe used by the health endpoint
    pub async fn ping(&self) -> GeoResult<()> {
        self.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_configuration_is_valid() {
        // Pool creation does not connect; it must succeed against the
        // fixed parameters without a running server.
        assert!(GeoStore::connect().is_ok());
    }
}

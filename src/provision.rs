//! # Schema Provisioner
//!
//! Ensures the `departamentos` table exists with the exact expected column
//! set and types before the server accepts any upload.
//!
//! ## Execution Loop
//! 1. **Existence check**: query `information_schema.tables`
//! 2. **Create**: if absent, issue the fixed CREATE TABLE and stop
//! 3. **Catalog fetch**: read observed `(column_name, udt_name)` pairs
//! 4. **Diffing**: every expected column must be present with a matching udt
//! 5. **Recreate**: on any mismatch, drop the table and recreate it
//!
//! Provisioning runs to completion before the listener binds; a failure
//! here is a fatal startup error, never a silently degraded process.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::GeoStore;
use crate::error::GeoResult;

/// The single table this service provisions and loads
pub const TABLE_NAME: &str = "departamentos";

/// Expected columns as `(name, udt_name)` pairs, matching what
/// `information_schema.columns` reports for the fixed schema. PostGIS
/// geometry shows up with `data_type = 'USER-DEFINED'`, so the udt name
/// is the reliable field to compare.
pub const EXPECTED_COLUMNS: [(&str, &str); 6] = [
    ("objectid", "int4"),
    ("coddep", "varchar"),
    ("departamen", "varchar"),
    ("capital", "varchar"),
    ("fuente", "varchar"),
    ("geometry", "geometry"),
];

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE departamentos (
        objectid   SERIAL PRIMARY KEY,
        coddep     VARCHAR(10),
        departamen VARCHAR(50),
        capital    VARCHAR(100),
        fuente     VARCHAR(50),
        geometry   GEOMETRY(MultiPolygon, 4326)
    )";

/// An observed column from the database catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedColumn {
    pub name: String,
    pub udt: String,
}

/// Provisions the target table against an owned store handle
pub struct Provisioner {
    store: Arc<GeoStore>,
}

impl Provisioner {
    pub fn new(store: Arc<GeoStore>) -> Self {
        Self { store }
    }

    /// Ensures the target table exists with the correct shape.
    ///
    /// Idempotent: a second run against an already-correct table issues
    /// no DDL. A structurally drifted table is dropped and recreated,
    /// losing its contents.
    pub async fn ensure_table(&self) -> GeoResult<()> {
        if !self.table_exists().await? {
            self.create_table().await?;
            info!("Created table '{}'", TABLE_NAME);
            return Ok(());
        }

        let observed = self.fetch_columns().await?;
        if structure_matches(&observed) {
            debug!("Table '{}' already has the expected structure", TABLE_NAME);
            return Ok(());
        }

        warn!(
            "Table '{}' structure does not match the expected schema; dropping and recreating",
            TABLE_NAME
        );
        self.store
            .execute(&format!("DROP TABLE {}", TABLE_NAME), &[])
            .await?;
        self.create_table().await?;
        info!("Recreated table '{}'", TABLE_NAME);

        Ok(())
    }

    async fn table_exists(&self) -> GeoResult<bool> {
        let row = self
            .store
            .query_one(
                "SELECT EXISTS (
                     SELECT FROM information_schema.tables
                     WHERE table_schema = 'public' AND table_name = $1
                 )",
                &[&TABLE_NAME],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn create_table(&self) -> GeoResult<()> {
        self.store.batch_execute(CREATE_TABLE_SQL).await
    }

    /// Fetches the observed column names and udt names from the catalog
    async fn fetch_columns(&self) -> GeoResult<Vec<ObservedColumn>> {
        let rows = self
            .store
            .query(
                "SELECT column_name, udt_name
                 FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1",
                &[&TABLE_NAME],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| ObservedColumn {
                name: row.get(0),
                udt: row.get(1),
            })
            .collect())
    }
}

/// Compares observed columns against the fixed expected list by name.
///
/// Every expected column must be present with a matching udt name; extra
/// columns do not invalidate the table.
pub fn structure_matches(observed: &[ObservedColumn]) -> bool {
    EXPECTED_COLUMNS.iter().all(|(name, udt)| {
        observed
            .iter()
            .any(|col| col.name == *name && col.udt == *udt)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_as_observed() -> Vec<ObservedColumn> {
        EXPECTED_COLUMNS
            .iter()
            .map(|(name, udt)| ObservedColumn {
                name: name.to_string(),
                udt: udt.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_exact_schema_matches() {
        assert!(structure_matches(&expected_as_observed()));
    }

    #[test]
    fn test_column_order_is_irrelevant() {
        let mut observed = expected_as_observed();
        observed.reverse();
        assert!(structure_matches(&observed));
    }

    #[test]
    fn test_missing_column_invalidates() {
        let mut observed = expected_as_observed();
        observed.retain(|col| col.name != "capital");
        assert!(!structure_matches(&observed));
    }

    #[test]
    fn test_type_mismatch_invalidates() {
        let mut observed = expected_as_observed();
        for col in &mut observed {
            if col.name == "objectid" {
                col.udt = "text".to_string();
            }
        }
        assert!(!structure_matches(&observed));
    }

    #[test]
    fn test_extra_column_is_tolerated() {
        let mut observed = expected_as_observed();
        observed.push(ObservedColumn {
            name: "notes".to_string(),
            udt: "text".to_string(),
        });
        assert!(structure_matches(&observed));
    }

    #[test]
    fn test_empty_catalog_invalidates() {
        assert!(!structure_matches(&[]));
    }
}

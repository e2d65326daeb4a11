//! # geoingest
//!
//! A single-purpose ingestion service for geographic department datasets.
//! Accepts one uploaded file per request, validates its shape against a
//! fixed tabular schema, and loads its rows into a PostGIS table.
//!
//! ## Core Components
//!
//! - **Schema Provisioner**: ensures the target table exists with the
//!   exact expected columns at startup, recreating it on drift
//! - **Ingestion Pipeline**: Axum upload handler with filename and
//!   row-shape validation gates and transactional per-row inserts
//! - **Geo-Store**: owned PostgreSQL connection pool passed explicitly
//!   into the provisioner and the request handlers

pub mod db;
pub mod error;
pub mod ingest;
pub mod provision;

pub use error::{GeoError, GeoResult};

//! # geoingest
//!
//! Ingestion service for the department dataset: upload
//! `DEPARTAMENTOS.geojson` via `POST /upload` and its rows land in the
//! PostGIS `departamentos` table.
//!
//! ```bash
//! # Run on the default port
//! geoingest
//!
//! # Custom port
//! PORT=8080 geoingest
//! ```

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoingest::db::GeoStore;
use geoingest::ingest::{create_router, AppState};
use geoingest::provision::Provisioner;

const DEFAULT_PORT: u16 = 3000;
const HOST: &str = "0.0.0.0";
const UPLOAD_DIR: &str = "./uploads";

/// Runtime options
struct Args {
    /// HTTP listen port
    port: u16,
}

impl Args {
    fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self { port }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let args = Args::from_env();

    // Initialize the database pool
    let store = Arc::new(GeoStore::connect()?);

    // Provision the target table before accepting any request. A failure
    // here aborts startup instead of leaving a degraded process running.
    let provisioner = Provisioner::new(Arc::clone(&store));
    provisioner.ensure_table().await?;
    info!("Schema provisioning complete");

    // Build the router
    let state = AppState::new(Arc::clone(&store), UPLOAD_DIR);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", HOST, args.port).parse()?;
    info!("geoingest listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C signal handler");
        })
        .await?;

    Ok(())
}

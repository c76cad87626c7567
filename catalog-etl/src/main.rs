//! Catalog ETL Main Entry Point
//!
//! Replicates film, genre and person changes from PostgreSQL into the search
//! index, forever.

use catalog_etl::{CatalogEtlError, Dependencies, Settings};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), CatalogEtlError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_etl=info,catalog_etl_repository=info"));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| CatalogEtlError::config(e.to_string()))?;

        info!(
            service_name = "catalog-etl",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| CatalogEtlError::config(e.to_string()))?;

        info!(
            service_name = "catalog-etl",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CatalogEtlError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting catalog ETL");

    let settings = Settings::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    let deps = match Dependencies::new(&settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    match deps.orchestrator.run().await {
        Ok(()) => {
            info!("Catalog ETL stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Catalog ETL failed");
            Err(e.into())
        }
    }
}

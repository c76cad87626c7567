//! Dependency initialization and wiring for the catalog ETL.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use catalog_etl_repository::{
    CatalogSource, CheckpointError, CheckpointStore, OpenSearchProvider, PostgresCatalogSource,
    RedisCheckpointStore, SearchIndexError, SearchIndexProvider,
};

use crate::config::{ConnectionMode, Settings};
use crate::detector::ChangeDetector;
use crate::extractor::AggregateExtractor;
use crate::loader::{IndexLoader, LoaderConfig};
use crate::orchestrator::{Orchestrator, Pipeline, PipelineConfig};
use crate::CatalogEtlError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Connect to PostgreSQL, Redis and OpenSearch and build one pipeline per
    /// configured entity class.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(CatalogEtlError)` - If a dependency cannot be reached (only in fail-fast mode)
    pub async fn new(settings: &Settings) -> Result<Self, CatalogEtlError> {
        info!(
            pipelines = ?settings.pipelines,
            connection_mode = ?settings.connection_mode,
            check_interval_secs = settings.check_interval.as_secs(),
            chunk_size = settings.chunk_size,
            "Initializing dependencies"
        );

        let source: Arc<dyn CatalogSource> = Arc::new(
            connect_with_mode("PostgreSQL", settings, move || {
                PostgresCatalogSource::connect(
                    &settings.database_url,
                    settings.postgres_max_connections,
                    settings.connect_timeout,
                )
            })
            .await?,
        );

        let store: Arc<dyn CheckpointStore> = Arc::new(
            connect_with_mode("Redis", settings, move || async move {
                tokio::time::timeout(
                    settings.connect_timeout,
                    RedisCheckpointStore::connect(&settings.redis_url),
                )
                .await
                .map_err(|_| {
                    CheckpointError::connection(format!(
                        "no answer within {:?}",
                        settings.connect_timeout
                    ))
                })?
            })
            .await?,
        );

        let provider: Arc<dyn SearchIndexProvider> = Arc::new(
            connect_with_mode("OpenSearch", settings, move || async move {
                let provider = OpenSearchProvider::new(
                    &settings.elastic_url,
                    settings.elastic_credentials.clone(),
                    settings.retry.call_timeout,
                )?;
                provider.ping().await?;
                Ok::<_, SearchIndexError>(provider)
            })
            .await?,
        );

        info!("All connections established");

        let pipelines = settings
            .pipelines
            .iter()
            .map(|&class| {
                Pipeline::new(
                    PipelineConfig {
                        class,
                        check_interval: settings.check_interval,
                    },
                    ChangeDetector::new(source.clone(), store.clone(), settings.retry.clone()),
                    AggregateExtractor::new(
                        source.clone(),
                        settings.retry.clone(),
                        settings.extract_concurrency,
                    ),
                    IndexLoader::with_config(
                        provider.clone(),
                        LoaderConfig {
                            chunk_size: settings.chunk_size,
                        },
                        settings.retry.clone(),
                    ),
                    store.clone(),
                    settings.retry.clone(),
                )
            })
            .collect();

        Ok(Self {
            orchestrator: Orchestrator::new(pipelines),
        })
    }
}

/// Run `connect` once, or until it succeeds in retry mode.
async fn connect_with_mode<T, E, F, Fut>(
    name: &str,
    settings: &Settings,
    mut connect: F,
) -> Result<T, CatalogEtlError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match connect().await {
            Ok(connected) => {
                info!(dependency = name, "Connection established");
                return Ok(connected);
            }
            Err(e) => match settings.connection_mode {
                ConnectionMode::FailFast => {
                    return Err(CatalogEtlError::connection(format!(
                        "Failed to connect to {}: {}",
                        name, e
                    )));
                }
                ConnectionMode::Retry => {
                    warn!(
                        dependency = name,
                        error = %e,
                        retry_interval_secs = settings.connect_retry_interval.as_secs(),
                        "Failed to connect, retrying..."
                    );
                    sleep(settings.connect_retry_interval).await;
                }
            },
        }
    }
}

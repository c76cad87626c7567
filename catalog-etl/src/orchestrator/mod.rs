//! Orchestrator module for the catalog ETL.
//!
//! Runs one [`Pipeline`] per entity class as an independent task and handles
//! shutdown.

mod pipeline;

pub use pipeline::{CycleReport, Pipeline, PipelineConfig, PipelineState, PipelineStats};

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use crate::errors::PipelineError;

/// Orchestrator that owns the per-class pipelines.
///
/// Pipelines share nothing in process; they only meet in the checkpoint
/// store, where every key is partitioned by entity class.
pub struct Orchestrator {
    pipelines: Vec<Pipeline>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator for the given pipelines.
    pub fn new(pipelines: Vec<Pipeline>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            pipelines,
            shutdown_tx,
        }
    }

    /// Handle that stops every pipeline after its current cycle.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until Ctrl-C or until every pipeline has stopped.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<(), PipelineError> {
        let shutdown_tx = self.shutdown_tx.clone();
        let pipelines = self.run_pipelines();
        tokio::pin!(pipelines);

        tokio::select! {
            stats = &mut pipelines => {
                info!(pipelines = stats.len(), "All pipelines stopped");
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
            }
        }

        let stats = pipelines.await;
        info!(pipelines = stats.len(), "Orchestrator shutdown complete");
        Ok(())
    }

    /// Spawn every pipeline and wait for all of them to stop.
    ///
    /// Returns the final statistics of each pipeline that stopped cleanly.
    pub async fn run_pipelines(self) -> Vec<PipelineStats> {
        info!(pipelines = self.pipelines.len(), "Starting catalog ETL orchestrator");

        let mut tasks = JoinSet::new();
        for pipeline in self.pipelines {
            let shutdown_rx = self.shutdown_tx.subscribe();
            tasks.spawn(pipeline.run(shutdown_rx));
        }

        let mut stats = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pipeline_stats) => stats.push(pipeline_stats),
                Err(e) => error!(error = %e, "Pipeline task panicked"),
            }
        }
        stats
    }
}

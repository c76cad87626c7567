//! Per-class pipeline driver.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use catalog_etl_repository::{CheckpointStore, IndexConfig};
use catalog_etl_shared::EntityClass;
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::detector::ChangeDetector;
use crate::errors::PipelineError;
use crate::extractor::{AggregateExtractor, ExtractOutcome};
use crate::loader::IndexLoader;
use crate::processor::DocumentTransformer;
use crate::retry::{with_retry, RetryPolicy};

/// Step a pipeline is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Detecting,
    Extracting,
    Transforming,
    Loading,
    ClearingPending,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Detecting => "detecting",
            Self::Extracting => "extracting",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::ClearingPending => "clearing_pending",
        };
        f.write_str(name)
    }
}

/// Counters for a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// IDs found changed by this cycle's detection pass.
    pub detected: usize,
    /// Size of the pending set the cycle worked on.
    pub pending: usize,
    /// Documents confirmed written.
    pub indexed: usize,
    /// Pending IDs whose root row no longer exists.
    pub vanished: usize,
    /// Pending IDs skipped because of a data error.
    pub skipped: usize,
    /// Documents the index did not accept.
    pub failed: usize,
    /// IDs removed from the pending set.
    pub cleared: usize,
}

/// Running totals since the pipeline started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub indexed: u64,
    pub vanished: u64,
    pub skipped: u64,
}

/// Settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub class: EntityClass,
    /// Sleep between the end of one cycle and the start of the next.
    pub check_interval: Duration,
}

/// Detect, extract, transform and load loop for one entity class.
///
/// The pending set in the checkpoint store is the only state carried from one
/// cycle to the next: an ID leaves it only once its document is written or
/// its row is gone.
pub struct Pipeline {
    config: PipelineConfig,
    detector: ChangeDetector,
    extractor: AggregateExtractor,
    transformer: DocumentTransformer,
    loader: IndexLoader,
    store: Arc<dyn CheckpointStore>,
    policy: RetryPolicy,
    index: IndexConfig,
    index_ready: bool,
    state: PipelineState,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        detector: ChangeDetector,
        extractor: AggregateExtractor,
        loader: IndexLoader,
        store: Arc<dyn CheckpointStore>,
        policy: RetryPolicy,
    ) -> Self {
        let index = IndexConfig::for_class(config.class);
        Self {
            config,
            detector,
            extractor,
            transformer: DocumentTransformer::new(),
            loader,
            store,
            policy,
            index,
            index_ready: false,
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
        }
    }

    pub fn class(&self) -> EntityClass {
        self.config.class
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(class = %self.config.class, from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    /// Run one full cycle.
    ///
    /// On error the pipeline is back in [`PipelineState::Idle`]; IDs that were
    /// not delivered stay pending.
    #[instrument(skip(self), fields(class = %self.config.class))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        self.stats.cycles += 1;
        let result = self.cycle().await;
        if result.is_err() {
            self.stats.failed_cycles += 1;
        }
        self.transition(PipelineState::Idle);
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let class = self.config.class;
        let mut report = CycleReport::default();

        self.transition(PipelineState::Detecting);
        let detection = self.detector.detect(class).await?;
        report.detected = detection.changed.len();

        let pending = with_retry(&self.policy, "list_pending", || {
            self.store.list_pending(class)
        })
        .await?;
        report.pending = pending.len();
        if pending.is_empty() {
            debug!("Nothing pending");
            return Ok(report);
        }

        // Sorted so that batches are reproducible across cycles.
        let mut ids: Vec<String> = pending.into_iter().collect();
        ids.sort();

        self.transition(PipelineState::Extracting);
        let mut documents = Vec::with_capacity(ids.len());
        let mut vanished = HashSet::new();
        {
            let mut extracted = self.extractor.extract(class, ids);
            while let Some(item) = extracted.next().await {
                let transient = item.outcome.is_transient_failure();
                match item.outcome {
                    ExtractOutcome::Found(aggregate) => {
                        documents.push((item.id, self.transformer.transform(&aggregate)));
                    }
                    ExtractOutcome::Vanished => {
                        debug!(id = %item.id, "Aggregate no longer exists");
                        vanished.insert(item.id);
                    }
                    ExtractOutcome::InvalidId(reason) => {
                        error!(id = %item.id, reason = %reason, "Skipping malformed pending ID");
                        report.skipped += 1;
                    }
                    ExtractOutcome::Failed(err) if transient => {
                        return Err(err.into());
                    }
                    ExtractOutcome::Failed(err) => {
                        error!(id = %item.id, error = %err, "Skipping aggregate");
                        report.skipped += 1;
                    }
                }
            }
        }
        report.vanished = vanished.len();

        self.transition(PipelineState::Transforming);
        // Pending members are cleared by the exact string they were stored
        // under, which may differ from the document `_id` in case or form.
        let mut pending_by_key: HashMap<String, Vec<String>> = HashMap::new();
        let mut bodies = Vec::with_capacity(documents.len());
        for (id, document) in documents {
            match serde_json::to_value(&document) {
                Ok(body) => {
                    pending_by_key
                        .entry(document.document_id())
                        .or_default()
                        .push(id);
                    bodies.push(body);
                }
                Err(err) => {
                    let err = PipelineError::from(err);
                    error!(id = %id, error = %err, "Skipping unserializable document");
                    report.skipped += 1;
                }
            }
        }

        let mut cleared = vanished;
        if !bodies.is_empty() {
            self.transition(PipelineState::Loading);
            if !self.index_ready {
                self.loader.ensure_index(&self.index).await?;
                self.index_ready = true;
            }
            let load = self
                .loader
                .bulk_upsert(&self.index.name, bodies, class.id_field())
                .await;
            report.indexed = load.delivered.len();
            report.failed = load.failed.len();
            if load.batch_failed {
                warn!(failed = load.failed.len(), "Some batches were not written");
            }
            cleared.extend(
                load.delivered
                    .iter()
                    .filter_map(|key| pending_by_key.remove(key))
                    .flatten(),
            );
        }

        self.transition(PipelineState::ClearingPending);
        with_retry(&self.policy, "remove_pending", || {
            self.store.remove_pending(class, &cleared)
        })
        .await?;
        report.cleared = cleared.len();

        self.stats.indexed += report.indexed as u64;
        self.stats.vanished += report.vanished as u64;
        self.stats.skipped += report.skipped as u64;
        Ok(report)
    }

    /// Run cycles every check interval until `shutdown` fires.
    ///
    /// A failed cycle is logged and retried on the next tick; it never ends
    /// the loop. Shutdown also interrupts a cycle that is still waiting on an
    /// unreachable dependency.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> PipelineStats {
        let class = self.config.class;
        info!(
            class = %class,
            interval_secs = self.config.check_interval.as_secs(),
            "Pipeline started"
        );

        loop {
            // Dropping a cycle mid-flight is safe: IDs only leave the pending
            // set in its last step.
            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = shutdown.recv() => {
                    info!(class = %class, "Received shutdown signal, abandoning cycle");
                    break;
                }
            };

            match outcome {
                Ok(report) if report.pending > 0 => {
                    info!(
                        class = %class,
                        detected = report.detected,
                        pending = report.pending,
                        indexed = report.indexed,
                        vanished = report.vanished,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Cycle complete"
                    );
                }
                Ok(_) => debug!(class = %class, "Cycle complete, nothing to do"),
                Err(e) => {
                    error!(
                        class = %class,
                        error = %e,
                        transient = e.is_transient(),
                        "Cycle failed"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {}
                _ = shutdown.recv() => {
                    info!(class = %class, "Received shutdown signal");
                    break;
                }
            }
        }

        self.transition(PipelineState::Idle);
        info!(
            class = %class,
            cycles = self.stats.cycles,
            failed_cycles = self.stats.failed_cycles,
            indexed = self.stats.indexed,
            "Pipeline stopped"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::ClearingPending.to_string(), "clearing_pending");
        assert_eq!(PipelineState::Idle.to_string(), "idle");
    }
}

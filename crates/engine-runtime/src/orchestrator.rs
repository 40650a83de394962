use crate::{error::PipelineError, settings::PipelineSettings};
use chrono::{DateTime, Utc};
use connectors::{sink::SinkWriter, source::SourceConnector};
use engine_core::state::{ReconciliationLog, StateStore, models::AuditEntry};
use engine_core::lease::LeaseRegistry;
use engine_processing::{
    error::TransformError,
    ingest::{BatchIngestor, IngestSummary, batch_id_for},
    reconcile::ReconciliationEngine,
    transform::Transformer,
};
use model::{
    batch::{BatchOutcome, BatchStatus},
    key::TableKey,
    reconciliation::ReconStatus,
};
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Drives one batch through INIT → EXTRACT → TRANSFORM → RECONCILE →
/// {COMMIT | QUARANTINE} → DONE, holding the per-pair lease for the whole
/// run. Unrecoverable extract/transform errors surface as `PipelineError`
/// (the FAILED state); the watermark is only ever touched by COMMIT.
pub struct PipelineOrchestrator {
    state: Arc<dyn StateStore>,
    leases: Arc<LeaseRegistry>,
    ingestor: BatchIngestor,
    transformer: Transformer,
    reconciler: ReconciliationEngine,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new<S>(
        connector: Arc<dyn SourceConnector>,
        sink: Arc<dyn SinkWriter>,
        state: Arc<S>,
        settings: PipelineSettings,
    ) -> Self
    where
        S: StateStore + 'static,
    {
        let ingestor = BatchIngestor::new(connector, sink.clone(), settings.max_batch_size);
        let transformer = Transformer::standard(sink);
        let reconciler = ReconciliationEngine::new(
            state.clone() as Arc<dyn ReconciliationLog>,
            settings.warn_threshold,
        );

        PipelineOrchestrator {
            state: state as Arc<dyn StateStore>,
            leases: LeaseRegistry::new(),
            ingestor,
            transformer,
            reconciler,
            settings,
        }
    }

    /// Registry backing the per-pair leases; shared with any other
    /// orchestrator that must serialize on the same pairs.
    pub fn leases(&self) -> &Arc<LeaseRegistry> {
        &self.leases
    }

    /// Single entry point per pipeline run, invoked by the scheduler/CLI.
    pub async fn run_batch(
        &self,
        key: &TableKey,
        cancel: CancellationToken,
    ) -> Result<BatchOutcome, PipelineError> {
        // INIT: one active batch per pair, watermark read once.
        let _lease = self.leases.try_acquire(key)?;
        let watermark = self.state.get(key).await?;
        let since = watermark.last_processed_timestamp;
        let batch_id = self.fresh_batch_id(key, since).await?;

        info!(key = %key, batch_id = %batch_id, since = %since, "pipeline run started");
        self.state
            .append(&AuditEntry::RunStart {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: batch_id.clone(),
                watermark: since,
                at: Utc::now(),
            })
            .await?;

        // EXTRACT: transient connector errors retry with backoff, everything
        // else fails the run.
        self.bail_if_cancelled(key, &batch_id, "extract", &cancel)
            .await?;
        let extract = timeout(
            self.settings.stage_timeout,
            self.settings.retry.run("extract", || {
                self.ingestor
                    .ingest(key, &watermark.watermark_column, since, &batch_id)
            }),
        )
        .await;

        let ingest = match extract {
            Err(_) => {
                return self
                    .fail(
                        key,
                        &batch_id,
                        "extract",
                        "stage timeout",
                        PipelineError::StageTimeout {
                            stage: "extract",
                            timeout: self.settings.stage_timeout,
                        },
                    )
                    .await;
            }
            Ok(Err(failure)) => {
                let source = failure.into_inner();
                let reason = source.to_string();
                return self
                    .fail(
                        key,
                        &batch_id,
                        "extract",
                        &reason,
                        PipelineError::Extract {
                            batch_id: batch_id.clone(),
                            source,
                        },
                    )
                    .await;
            }
            Ok(Ok(summary)) => summary,
        };

        self.state
            .append(&AuditEntry::BatchIngested {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                record_count: ingest.record_count,
                window_end: ingest.window.until,
                at: Utc::now(),
            })
            .await?;

        // TRANSFORM: a reject-batch quality rule quarantines, it does not
        // fail the process.
        self.bail_if_cancelled(key, &batch_id, "transform", &cancel)
            .await?;
        let transformed = match timeout(
            self.settings.stage_timeout,
            self.transformer.transform(&ingest.batch_id),
        )
        .await
        {
            Err(_) => {
                return self
                    .fail(
                        key,
                        &batch_id,
                        "transform",
                        "stage timeout",
                        PipelineError::StageTimeout {
                            stage: "transform",
                            timeout: self.settings.stage_timeout,
                        },
                    )
                    .await;
            }
            Ok(Err(err @ TransformError::QualityRule { .. })) => {
                let reason = err.to_string();
                return self.quarantine(key, &ingest, 0, &reason).await;
            }
            Ok(Err(err)) => {
                let reason = err.to_string();
                return self
                    .fail(
                        key,
                        &batch_id,
                        "transform",
                        &reason,
                        PipelineError::Transform {
                            batch_id: batch_id.clone(),
                            source: err,
                        },
                    )
                    .await;
            }
            Ok(Ok(summary)) => summary,
        };

        self.state
            .append(&AuditEntry::BatchTransformed {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                accepted: transformed.accepted,
                quarantined: transformed.quarantined,
                at: Utc::now(),
            })
            .await?;

        // RECONCILE: the count comparison gates the commit.
        self.bail_if_cancelled(key, &batch_id, "reconcile", &cancel)
            .await?;
        let recon = match self
            .reconciler
            .reconcile(&ingest.batch_id, key, ingest.record_count, transformed.accepted)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                let reason = err.to_string();
                return self
                    .fail(
                        key,
                        &batch_id,
                        "reconcile",
                        &reason,
                        PipelineError::Reconcile(err),
                    )
                    .await;
            }
        };
        self.state
            .append(&AuditEntry::Reconciled {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                status: recon.status,
                variance: recon.variance,
                at: Utc::now(),
            })
            .await?;

        let commit = match recon.status {
            ReconStatus::Pass => true,
            ReconStatus::Warn => {
                warn!(
                    key = %key,
                    batch_id = %ingest.batch_id,
                    variance = recon.variance,
                    advance = self.settings.advance_on_warn,
                    "reconciliation warning"
                );
                self.settings.advance_on_warn
            }
            ReconStatus::Fail => false,
        };

        if !commit {
            let reason = format!("reconciliation {}: {}", recon.status, recon.remarks);
            return self
                .quarantine(key, &ingest, transformed.accepted, &reason)
                .await;
        }

        // COMMIT: conditional advance against the timestamp read at INIT.
        self.bail_if_cancelled(key, &batch_id, "commit", &cancel)
            .await?;
        if let Err(err) = self
            .state
            .advance(key, since, ingest.window.until, &ingest.batch_id)
            .await
        {
            let reason = err.to_string();
            return self
                .fail(key, &batch_id, "commit", &reason, PipelineError::State(err))
                .await;
        }
        self.state
            .append(&AuditEntry::RunDone {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                outcome: "committed".to_string(),
                at: Utc::now(),
            })
            .await?;

        info!(
            key = %key,
            batch_id = %ingest.batch_id,
            to = %ingest.window.until,
            records = transformed.accepted,
            "batch committed"
        );

        Ok(BatchOutcome {
            batch_id: ingest.batch_id.clone(),
            status: BatchStatus::Committed,
            source_count: ingest.record_count,
            target_count: transformed.accepted,
        })
    }

    /// Batch id for the window starting at `since`. The deterministic base
    /// id is reused while the window has no reconciliation verdict, so a
    /// retry after a failed run converges on the same pre-stage rows. Once a
    /// verdict exists (an idle pair re-committing its empty window, or a
    /// quarantined batch being rerun) a run suffix keeps the id clear of the
    /// write-once reconciliation log.
    async fn fresh_batch_id(
        &self,
        key: &TableKey,
        since: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        let base = batch_id_for(key, since);
        if self.state.load(&base).await?.is_none() {
            return Ok(base);
        }

        let mut run = 2u32;
        loop {
            let candidate = format!("{base}.{run}");
            if self.state.load(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            run += 1;
        }
    }

    async fn quarantine(
        &self,
        key: &TableKey,
        ingest: &IngestSummary,
        target_count: u64,
        reason: &str,
    ) -> Result<BatchOutcome, PipelineError> {
        warn!(key = %key, batch_id = %ingest.batch_id, reason, "batch quarantined");
        self.state
            .append(&AuditEntry::BatchQuarantined {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                reason: reason.to_string(),
                at: Utc::now(),
            })
            .await?;
        self.state
            .append(&AuditEntry::RunDone {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: ingest.batch_id.clone(),
                outcome: "quarantined".to_string(),
                at: Utc::now(),
            })
            .await?;

        Ok(BatchOutcome {
            batch_id: ingest.batch_id.clone(),
            status: BatchStatus::Quarantined,
            source_count: ingest.record_count,
            target_count,
        })
    }

    async fn fail(
        &self,
        key: &TableKey,
        batch_id: &str,
        stage: &'static str,
        reason: &str,
        err: PipelineError,
    ) -> Result<BatchOutcome, PipelineError> {
        error!(key = %key, batch_id, stage, reason, "pipeline run failed");
        self.state
            .append(&AuditEntry::BatchFailed {
                source_system: key.source_system.clone(),
                table_name: key.table_name.clone(),
                batch_id: batch_id.to_string(),
                stage: stage.to_string(),
                reason: reason.to_string(),
                at: Utc::now(),
            })
            .await?;
        Err(err)
    }

    async fn bail_if_cancelled(
        &self,
        key: &TableKey,
        batch_id: &str,
        stage: &'static str,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            self.state
                .append(&AuditEntry::BatchFailed {
                    source_system: key.source_system.clone(),
                    table_name: key.table_name.clone(),
                    batch_id: batch_id.to_string(),
                    stage: stage.to_string(),
                    reason: "shutdown requested".to_string(),
                    at: Utc::now(),
                })
                .await?;
            return Err(PipelineError::ShutdownRequested);
        }
        Ok(())
    }
}

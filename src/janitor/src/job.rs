//! Cleanup orchestrator.
//!
//! A run walks the stages in [`CleanupStage`] order. The fest branch and the
//! standalone-event branch are independent: a failed lookup abandons only its
//! own branch. Storage failures are recorded per bucket and never stop the
//! run. A failed row delete aborts the remaining stages.

use std::any::Any;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::config::{CleanupConfig, MatchMode};
use common::model::{ExpiredEvent, ExpiredFest};
use common::storage::{FileStore, PublicUrlBase, StoredFile};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::error::CleanupError;
use crate::files::{FileDeletionReport, delete_files, event_files, fest_files, planned_deletions};
use crate::metrics::CleanupMetrics;
use crate::report::{CascadeSummary, CleanupReport, CleanupStage};
use crate::resolver::{
    ExpiredFestSet, event_ids, resolve_expired_fests, resolve_expired_standalone_events,
};
use crate::store::CleanupStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    pub match_mode: MatchMode,
    /// Resolve and log, delete nothing
    pub dry_run: bool,
}

impl From<&CleanupConfig> for CleanupOptions {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            match_mode: config.match_mode,
            dry_run: config.dry_run,
        }
    }
}

/// The nightly cleanup job.
///
/// Holds the database and storage handles created at boot; the scheduler,
/// the admin endpoints and the delete routes all share one instance.
pub struct CleanupJob {
    store: Arc<dyn CleanupStore>,
    files: Arc<dyn FileStore>,
    /// Root that persisted file URLs must sit under to be deleted
    public_base: PublicUrlBase,
    options: CleanupOptions,
    metrics: CleanupMetrics,
    /// Serializes runs and purges within this process
    running: Mutex<()>,
    last_report: RwLock<Option<CleanupReport>>,
}

impl CleanupJob {
    pub fn new(
        store: Arc<dyn CleanupStore>,
        files: Arc<dyn FileStore>,
        public_base: PublicUrlBase,
        options: CleanupOptions,
    ) -> Self {
        Self {
            store,
            files,
            public_base,
            options,
            metrics: CleanupMetrics::new(),
            running: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn options(&self) -> CleanupOptions {
        self.options
    }

    pub fn metrics(&self) -> &CleanupMetrics {
        &self.metrics
    }

    /// Report of the most recent completed run
    pub async fn last_report(&self) -> Option<CleanupReport> {
        self.last_report.read().await.clone()
    }

    /// Run every stage for `reference_date`.
    pub async fn run(&self, reference_date: NaiveDate) -> Result<CleanupReport, CleanupError> {
        let _running = self.running.lock().await;

        let mut report = CleanupReport::new(
            reference_date,
            self.options.match_mode,
            self.options.dry_run,
        );
        self.metrics.record_run_start();

        info!(
            run_id = %report.run_id,
            reference_date = %reference_date,
            match_mode = %self.options.match_mode,
            dry_run = self.options.dry_run,
            "Starting cleanup run"
        );

        if let Err(e) = self.execute(&mut report).await {
            self.metrics.record_run_failure();
            error!(
                run_id = %report.run_id,
                reference_date = %reference_date,
                stages = ?report.stages,
                error = %e,
                "Cleanup run aborted"
            );
            return Err(e);
        }

        report.stages.push(CleanupStage::Done);
        let completed_at = Utc::now();
        report.completed_at = Some(completed_at);

        info!(
            run_id = %report.run_id,
            reference_date = %reference_date,
            fests = report.fests_deleted(),
            events = report.events_deleted(),
            registrations = report.registrations_deleted(),
            files_removed = report.files_removed(),
            storage_failures = report.storage_failures(),
            errors = report.errors.len(),
            dry_run = report.dry_run,
            duration_ms = (completed_at - report.started_at).num_milliseconds(),
            "Cleanup run completed"
        );

        self.metrics.record_run_completed(&report);
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    async fn execute(&self, report: &mut CleanupReport) -> Result<(), CleanupError> {
        let reference_date = report.reference_date;
        let mode = report.match_mode;
        let dry_run = report.dry_run;

        report.stages.push(CleanupStage::ResolveFests);
        match resolve_expired_fests(self.store.as_ref(), reference_date, mode).await {
            Ok(set) if set.is_empty() => {}
            Ok(set) => {
                self.cascade_fests(&set, dry_run, &mut report.fests, &mut report.stages)
                    .await?;
            }
            Err(e) => {
                warn!(
                    reference_date = %reference_date,
                    error = %e,
                    "Failed to resolve expired fests, skipping fest cleanup"
                );
                report
                    .errors
                    .push(format!("Failed to resolve expired fests: {e}"));
            }
        }

        report.stages.push(CleanupStage::ResolveStandaloneEvents);
        match resolve_expired_standalone_events(self.store.as_ref(), reference_date, mode).await {
            Ok(events) if events.is_empty() => {}
            Ok(events) => {
                self.cascade_events(&events, dry_run, &mut report.standalone, &mut report.stages)
                    .await?;
            }
            Err(e) => {
                warn!(
                    reference_date = %reference_date,
                    error = %e,
                    "Failed to resolve expired standalone events, skipping them"
                );
                report
                    .errors
                    .push(format!("Failed to resolve expired standalone events: {e}"));
            }
        }

        Ok(())
    }

    /// Event files, registrations, event rows, fest images, fest rows.
    async fn cascade_fests(
        &self,
        set: &ExpiredFestSet,
        dry_run: bool,
        summary: &mut CascadeSummary,
        stages: &mut Vec<CleanupStage>,
    ) -> Result<(), CleanupError> {
        summary.fests_found += set.fests.len();
        summary.events_found += set.events.len();

        stages.push(CleanupStage::DeleteFestEventFiles);
        let files = event_files(&self.public_base, &set.events);
        let removed = self.remove_files(&files, dry_run).await;
        summary.files.merge(removed);

        if !set.events.is_empty() {
            stages.push(CleanupStage::DeleteFestEventRows);
            self.delete_event_rows(
                &set.event_ids(),
                dry_run,
                summary,
                CleanupStage::DeleteFestEventRows,
            )
            .await?;
        }

        stages.push(CleanupStage::DeleteFestFiles);
        let files = fest_files(&self.public_base, &set.fests);
        let removed = self.remove_files(&files, dry_run).await;
        summary.files.merge(removed);

        stages.push(CleanupStage::DeleteFestRows);
        let fest_ids = set.fest_ids();
        if dry_run {
            for fest_id in &fest_ids {
                info!(fest_id = %fest_id, "[DRY-RUN] Would delete fest");
            }
        } else {
            summary.fests_deleted += self.store.delete_fests(&fest_ids).await.map_err(|source| {
                CleanupError::RowDeletion {
                    stage: CleanupStage::DeleteFestRows,
                    source,
                }
            })?;
        }

        Ok(())
    }

    /// Files, registrations, then event rows of events without a fest.
    async fn cascade_events(
        &self,
        events: &[ExpiredEvent],
        dry_run: bool,
        summary: &mut CascadeSummary,
        stages: &mut Vec<CleanupStage>,
    ) -> Result<(), CleanupError> {
        summary.events_found += events.len();

        stages.push(CleanupStage::DeleteStandaloneFiles);
        let files = event_files(&self.public_base, events);
        let removed = self.remove_files(&files, dry_run).await;
        summary.files.merge(removed);

        stages.push(CleanupStage::DeleteStandaloneRows);
        self.delete_event_rows(
            &event_ids(events),
            dry_run,
            summary,
            CleanupStage::DeleteStandaloneRows,
        )
        .await
    }

    async fn remove_files(&self, entries: &[StoredFile], dry_run: bool) -> FileDeletionReport {
        if dry_run {
            planned_deletions(entries)
        } else {
            delete_files(self.files.as_ref(), entries).await
        }
    }

    async fn delete_event_rows(
        &self,
        ids: &[String],
        dry_run: bool,
        summary: &mut CascadeSummary,
        stage: CleanupStage,
    ) -> Result<(), CleanupError> {
        if dry_run {
            for event_id in ids {
                info!(event_id = %event_id, "[DRY-RUN] Would delete event and its registrations");
            }
            return Ok(());
        }

        summary.registrations_deleted += self
            .store
            .delete_registrations(ids)
            .await
            .map_err(|source| CleanupError::RowDeletion { stage, source })?;
        summary.events_deleted += self
            .store
            .delete_events(ids)
            .await
            .map_err(|source| CleanupError::RowDeletion { stage, source })?;
        Ok(())
    }

    /// Remove one fest right away with the same cascade the nightly run uses.
    pub async fn purge_fest(&self, fest: ExpiredFest) -> Result<CascadeSummary, CleanupError> {
        let _running = self.running.lock().await;

        let events = self
            .store
            .find_fest_events(std::slice::from_ref(&fest.fest_id))
            .await
            .map_err(CleanupError::Lookup)?;
        let set = ExpiredFestSet {
            fests: vec![fest],
            events,
        };

        let mut summary = CascadeSummary::default();
        let mut stages = Vec::new();
        self.cascade_fests(&set, false, &mut summary, &mut stages)
            .await?;
        info!(
            fest_id = %set.fests[0].fest_id,
            events = summary.events_deleted,
            registrations = summary.registrations_deleted,
            files_removed = summary.files.removed(),
            "Purged fest"
        );
        Ok(summary)
    }

    /// Remove one event with its files and registrations.
    pub async fn purge_event(&self, event: ExpiredEvent) -> Result<CascadeSummary, CleanupError> {
        let _running = self.running.lock().await;

        let mut summary = CascadeSummary::default();
        let mut stages = Vec::new();
        let events = [event];
        self.cascade_events(&events, false, &mut summary, &mut stages)
            .await?;
        info!(
            event_id = %events[0].event_id,
            registrations = summary.registrations_deleted,
            files_removed = summary.files.removed(),
            "Purged event"
        );
        Ok(summary)
    }
}

/// Run the job on its own task so a panic is returned as an error.
pub async fn run_supervised(
    job: Arc<CleanupJob>,
    reference_date: NaiveDate,
) -> Result<CleanupReport, CleanupError> {
    let metrics = job.metrics().clone();
    match tokio::spawn(async move { job.run(reference_date).await }).await {
        Ok(result) => result,
        Err(e) => {
            metrics.record_run_failure();
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            Err(CleanupError::Panicked(message))
        }
    }
}

/// Top-level guard: failures are logged, never propagated.
pub async fn run_guarded(job: Arc<CleanupJob>, reference_date: NaiveDate) -> Option<CleanupReport> {
    match run_supervised(job, reference_date).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(reference_date = %reference_date, error = %e, "Cleanup run failed");
            None
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

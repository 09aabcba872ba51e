//! Cleanup metrics
//!
//! Process-wide counters shared by the scheduler and the admin endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::report::CleanupReport;

/// Thread-safe metrics for tracking cleanup runs
#[derive(Debug, Clone)]
pub struct CleanupMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    runs_started: AtomicUsize,
    runs_completed: AtomicUsize,
    runs_failed: AtomicUsize,
    branch_errors: AtomicUsize,
    fests_deleted: AtomicU64,
    events_deleted: AtomicU64,
    registrations_deleted: AtomicU64,
    files_removed: AtomicUsize,
    storage_failures: AtomicUsize,
    /// Unix millis of the last completed run, 0 when none
    last_completed_ms: AtomicI64,
}

impl Default for CleanupMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                runs_started: AtomicUsize::new(0),
                runs_completed: AtomicUsize::new(0),
                runs_failed: AtomicUsize::new(0),
                branch_errors: AtomicUsize::new(0),
                fests_deleted: AtomicU64::new(0),
                events_deleted: AtomicU64::new(0),
                registrations_deleted: AtomicU64::new(0),
                files_removed: AtomicUsize::new(0),
                storage_failures: AtomicUsize::new(0),
                last_completed_ms: AtomicI64::new(0),
            }),
        }
    }

    pub fn record_run_start(&self) {
        self.inner.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that reached `Done`
    pub fn record_run_completed(&self, report: &CleanupReport) {
        self.inner.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .branch_errors
            .fetch_add(report.errors.len(), Ordering::Relaxed);
        self.inner
            .fests_deleted
            .fetch_add(report.fests_deleted(), Ordering::Relaxed);
        self.inner
            .events_deleted
            .fetch_add(report.events_deleted(), Ordering::Relaxed);
        self.inner
            .registrations_deleted
            .fetch_add(report.registrations_deleted(), Ordering::Relaxed);
        self.inner
            .files_removed
            .fetch_add(report.files_removed(), Ordering::Relaxed);
        self.inner
            .storage_failures
            .fetch_add(report.storage_failures(), Ordering::Relaxed);

        let completed_at = report.completed_at.unwrap_or_else(Utc::now);
        self.inner
            .last_completed_ms
            .store(completed_at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_run_failure(&self) {
        self.inner.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn runs_started(&self) -> usize {
        self.inner.runs_started.load(Ordering::Relaxed)
    }

    pub fn runs_completed(&self) -> usize {
        self.inner.runs_completed.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> usize {
        self.inner.runs_failed.load(Ordering::Relaxed)
    }

    pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        match self.inner.last_completed_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            runs_started: self.runs_started(),
            runs_completed: self.runs_completed(),
            runs_failed: self.runs_failed(),
            branch_errors: self.inner.branch_errors.load(Ordering::Relaxed),
            fests_deleted: self.inner.fests_deleted.load(Ordering::Relaxed),
            events_deleted: self.inner.events_deleted.load(Ordering::Relaxed),
            registrations_deleted: self.inner.registrations_deleted.load(Ordering::Relaxed),
            files_removed: self.inner.files_removed.load(Ordering::Relaxed),
            storage_failures: self.inner.storage_failures.load(Ordering::Relaxed),
            last_completed_at: self.last_completed_at(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub runs_started: usize,
    pub runs_completed: usize,
    pub runs_failed: usize,
    pub branch_errors: usize,
    pub fests_deleted: u64,
    pub events_deleted: u64,
    pub registrations_deleted: u64,
    pub files_removed: usize,
    pub storage_failures: usize,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl MetricsSummary {
    pub fn log(&self) {
        log::info!("=== Cleanup Metrics Summary ===");
        log::info!(
            "Runs: {} started, {} completed, {} failed",
            self.runs_started,
            self.runs_completed,
            self.runs_failed
        );
        log::info!(
            "Deleted: {} fests, {} events, {} registrations, {} files",
            self.fests_deleted,
            self.events_deleted,
            self.registrations_deleted,
            self.files_removed
        );
        if self.storage_failures > 0 || self.branch_errors > 0 {
            log::warn!(
                "Problems: {} storage failures, {} abandoned branches",
                self.storage_failures,
                self.branch_errors
            );
        }
    }
}

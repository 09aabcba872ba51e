use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use common::config::MatchMode;
use serde::Serialize;

use crate::files::FileDeletionReport;

/// States of a cleanup run, in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStage {
    ResolveFests,
    DeleteFestEventFiles,
    DeleteFestEventRows,
    DeleteFestFiles,
    DeleteFestRows,
    ResolveStandaloneEvents,
    DeleteStandaloneFiles,
    DeleteStandaloneRows,
    Done,
}

impl fmt::Display for CleanupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupStage::ResolveFests => "resolve_fests",
            CleanupStage::DeleteFestEventFiles => "delete_fest_event_files",
            CleanupStage::DeleteFestEventRows => "delete_fest_event_rows",
            CleanupStage::DeleteFestFiles => "delete_fest_files",
            CleanupStage::DeleteFestRows => "delete_fest_rows",
            CleanupStage::ResolveStandaloneEvents => "resolve_standalone_events",
            CleanupStage::DeleteStandaloneFiles => "delete_standalone_files",
            CleanupStage::DeleteStandaloneRows => "delete_standalone_rows",
            CleanupStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What one branch (fest cascade or standalone events) found and removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub fests_found: usize,
    pub events_found: usize,
    pub registrations_deleted: u64,
    pub events_deleted: u64,
    pub fests_deleted: u64,
    pub files: FileDeletionReport,
}

/// Result of a complete cleanup run
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub run_id: String,
    pub reference_date: NaiveDate,
    pub match_mode: MatchMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<CleanupStage>,
    pub fests: CascadeSummary,
    pub standalone: CascadeSummary,
    /// Branches abandoned because a lookup failed
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn new(reference_date: NaiveDate, match_mode: MatchMode, dry_run: bool) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: format!("cleanup_{}", started_at.timestamp_millis()),
            reference_date,
            match_mode,
            dry_run,
            started_at,
            completed_at: None,
            stages: Vec::new(),
            fests: CascadeSummary::default(),
            standalone: CascadeSummary::default(),
            errors: Vec::new(),
        }
    }

    pub fn fests_deleted(&self) -> u64 {
        self.fests.fests_deleted
    }

    /// Fest children plus standalone events
    pub fn events_deleted(&self) -> u64 {
        self.fests.events_deleted + self.standalone.events_deleted
    }

    pub fn registrations_deleted(&self) -> u64 {
        self.fests.registrations_deleted + self.standalone.registrations_deleted
    }

    pub fn files_removed(&self) -> usize {
        self.fests.files.removed() + self.standalone.files.removed()
    }

    pub fn storage_failures(&self) -> usize {
        self.fests.files.failures().count() + self.standalone.files.failures().count()
    }

    /// `true` when nothing matched the reference date.
    pub fn is_noop(&self) -> bool {
        self.fests.fests_found == 0
            && self.fests.events_found == 0
            && self.standalone.events_found == 0
    }

    pub fn visited(&self, stage: CleanupStage) -> bool {
        self.stages.contains(&stage)
    }
}

//! SOCIO Janitor Library
//!
//! The nightly cleanup job: fests and events are removed the day after they
//! end, together with their uploaded files and registrations.
//!
//! Deletion always runs bottom-up: files, then registrations, then events,
//! then fests.

pub mod error;
pub mod files;
pub mod job;
pub mod metrics;
pub mod report;
pub mod resolver;
pub mod schedule;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{CleanupError, StoreError};
pub use files::{BucketOutcome, FileDeletionReport, delete_files, event_files, fest_files};
pub use job::{CleanupJob, CleanupOptions, run_guarded, run_supervised};
pub use metrics::{CleanupMetrics, MetricsSummary};
pub use report::{CascadeSummary, CleanupReport, CleanupStage};
pub use resolver::{ExpiredFestSet, resolve_expired_fests, resolve_expired_standalone_events};
pub use schedule::{DailySchedule, spawn_scheduler};
pub use store::CleanupStore;

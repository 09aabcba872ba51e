//! Batch file deletion.
//!
//! Deletion targets are grouped by bucket and each bucket gets exactly one
//! bulk-remove call. Buckets are independent: a failing bucket is recorded
//! and the remaining buckets are still processed.

use std::collections::BTreeMap;

use common::model::{ExpiredEvent, ExpiredFest};
use common::storage::{Bucket, FileStore, PublicUrlBase, StoredFile};
use serde::Serialize;
use tracing::{error, info};

/// Outcome of the remove call for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketOutcome {
    pub bucket: String,
    /// Paths sent in the remove call
    pub requested: usize,
    /// Objects the backend reported as removed
    pub removed: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDeletionReport {
    pub buckets: Vec<BucketOutcome>,
}

impl FileDeletionReport {
    pub fn requested(&self) -> usize {
        self.buckets.iter().map(|b| b.requested).sum()
    }

    pub fn removed(&self) -> usize {
        self.buckets.iter().map(|b| b.removed).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BucketOutcome> {
        self.buckets.iter().filter(|b| b.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn merge(&mut self, other: FileDeletionReport) {
        self.buckets.extend(other.buckets);
    }
}

/// Group deletion targets by bucket, dropping empty paths and duplicates.
pub fn group_by_bucket(entries: &[StoredFile]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in entries {
        if entry.path.is_empty() || entry.bucket.is_empty() {
            continue;
        }
        let paths = groups.entry(entry.bucket.clone()).or_default();
        if !paths.contains(&entry.path) {
            paths.push(entry.path.clone());
        }
    }
    groups
}

/// Issue one remove call per bucket and report every bucket's outcome.
pub async fn delete_files(store: &dyn FileStore, entries: &[StoredFile]) -> FileDeletionReport {
    let mut report = FileDeletionReport::default();

    for (bucket, paths) in group_by_bucket(entries) {
        let requested = paths.len();
        match store.remove(&bucket, &paths).await {
            Ok(removed) => {
                info!(bucket = %bucket, requested, removed, "Removed files");
                report.buckets.push(BucketOutcome {
                    bucket,
                    requested,
                    removed,
                    error: None,
                });
            }
            Err(e) => {
                error!(bucket = %bucket, requested, error = %e, "Failed to remove files");
                report.buckets.push(BucketOutcome {
                    bucket,
                    requested,
                    removed: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    report
}

/// What [`delete_files`] would send, without calling the store.
pub fn planned_deletions(entries: &[StoredFile]) -> FileDeletionReport {
    let buckets = group_by_bucket(entries)
        .into_iter()
        .map(|(bucket, paths)| {
            for path in &paths {
                info!(bucket = %bucket, path = %path, "[DRY-RUN] Would delete file");
            }
            BucketOutcome {
                bucket,
                requested: paths.len(),
                removed: 0,
                error: None,
            }
        })
        .collect();
    FileDeletionReport { buckets }
}

/// Image, banner and PDF of each event; URLs that don't resolve are skipped.
pub fn event_files(base: &PublicUrlBase, events: &[ExpiredEvent]) -> Vec<StoredFile> {
    events
        .iter()
        .flat_map(|event| {
            [
                StoredFile::resolve(base, Bucket::EventImages, event.event_image_url.as_deref()),
                StoredFile::resolve(base, Bucket::EventBanners, event.banner_url.as_deref()),
                StoredFile::resolve(base, Bucket::EventPdfs, event.pdf_url.as_deref()),
            ]
        })
        .flatten()
        .collect()
}

pub fn fest_files(base: &PublicUrlBase, fests: &[ExpiredFest]) -> Vec<StoredFile> {
    fests
        .iter()
        .filter_map(|fest| {
            StoredFile::resolve(base, Bucket::FestImages, fest.fest_image_url.as_deref())
        })
        .collect()
}

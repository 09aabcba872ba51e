use thiserror::Error;

use crate::report::CleanupStage;

/// Failure of a single data-access call made by the cleanup job.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum CleanupError {
    /// A row delete failed; the rest of the run was skipped
    #[error("Cleanup aborted at {stage}: {source}")]
    RowDeletion {
        stage: CleanupStage,
        #[source]
        source: StoreError,
    },

    #[error("Lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Cleanup run panicked: {0}")]
    Panicked(String),
}

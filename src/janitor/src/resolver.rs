use chrono::NaiveDate;
use common::config::MatchMode;
use common::model::{ExpiredEvent, ExpiredFest};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::CleanupStore;

/// Expired fests together with every event that belongs to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiredFestSet {
    pub fests: Vec<ExpiredFest>,
    pub events: Vec<ExpiredEvent>,
}

impl ExpiredFestSet {
    pub fn is_empty(&self) -> bool {
        self.fests.is_empty()
    }

    pub fn fest_ids(&self) -> Vec<String> {
        self.fests.iter().map(|f| f.fest_id.clone()).collect()
    }

    pub fn event_ids(&self) -> Vec<String> {
        event_ids(&self.events)
    }
}

pub fn event_ids(events: &[ExpiredEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_id.clone()).collect()
}

/// Fests closing on `reference_date` plus all of their events.
///
/// Child events are resolved by parent reference alone; their own end date
/// does not matter.
pub async fn resolve_expired_fests(
    store: &dyn CleanupStore,
    reference_date: NaiveDate,
    mode: MatchMode,
) -> Result<ExpiredFestSet, StoreError> {
    let fests = store.find_expired_fests(reference_date, mode).await?;
    if fests.is_empty() {
        debug!(reference_date = %reference_date, "No expired fests");
        return Ok(ExpiredFestSet::default());
    }

    let fest_ids: Vec<String> = fests.iter().map(|f| f.fest_id.clone()).collect();
    let events = store.find_fest_events(&fest_ids).await?;

    info!(
        reference_date = %reference_date,
        fests = fests.len(),
        events = events.len(),
        "Resolved expired fests"
    );

    Ok(ExpiredFestSet { fests, events })
}

/// Events without a parent fest ending on `reference_date`.
pub async fn resolve_expired_standalone_events(
    store: &dyn CleanupStore,
    reference_date: NaiveDate,
    mode: MatchMode,
) -> Result<Vec<ExpiredEvent>, StoreError> {
    let events = store
        .find_expired_standalone_events(reference_date, mode)
        .await?;
    info!(
        reference_date = %reference_date,
        events = events.len(),
        "Resolved expired standalone events"
    );
    Ok(events)
}

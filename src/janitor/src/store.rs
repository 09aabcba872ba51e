use async_trait::async_trait;
use chrono::NaiveDate;
use common::Database;
use common::config::MatchMode;
use common::model::{ExpiredEvent, ExpiredFest};

use crate::error::StoreError;

/// The queries and row deletes the cleanup job needs.
#[async_trait]
pub trait CleanupStore: Send + Sync {
    async fn find_expired_fests(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredFest>, StoreError>;

    /// Events of the given fests, whatever their own end date.
    async fn find_fest_events(&self, fest_ids: &[String]) -> Result<Vec<ExpiredEvent>, StoreError>;

    async fn find_expired_standalone_events(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredEvent>, StoreError>;

    async fn delete_registrations(&self, event_ids: &[String]) -> Result<u64, StoreError>;

    async fn delete_events(&self, event_ids: &[String]) -> Result<u64, StoreError>;

    async fn delete_fests(&self, fest_ids: &[String]) -> Result<u64, StoreError>;
}

#[async_trait]
impl CleanupStore for Database {
    async fn find_expired_fests(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredFest>, StoreError> {
        Ok(Database::find_expired_fests(self, reference_date, mode).await?)
    }

    async fn find_fest_events(&self, fest_ids: &[String]) -> Result<Vec<ExpiredEvent>, StoreError> {
        Ok(Database::find_fest_events(self, fest_ids).await?)
    }

    async fn find_expired_standalone_events(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredEvent>, StoreError> {
        Ok(Database::find_expired_standalone_events(self, reference_date, mode).await?)
    }

    async fn delete_registrations(&self, event_ids: &[String]) -> Result<u64, StoreError> {
        Ok(Database::delete_registrations(self, event_ids).await?)
    }

    async fn delete_events(&self, event_ids: &[String]) -> Result<u64, StoreError> {
        Ok(Database::delete_events(self, event_ids).await?)
    }

    async fn delete_fests(&self, fest_ids: &[String]) -> Result<u64, StoreError> {
        Ok(Database::delete_fests(self, fest_ids).await?)
    }
}

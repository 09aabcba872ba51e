//! In-memory fakes that record every call in one shared log, so tests can
//! assert on the order of file and row deletions.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::config::MatchMode;
use common::model::{ExpiredEvent, ExpiredFest};
use common::storage::{FileStore, PublicUrlBase, StorageError};

use crate::error::StoreError;
use crate::store::CleanupStore;

const PROJECT: &str = "https://demo.supabase.co";
const BASE: &str = "https://demo.supabase.co/storage/v1/object/public";

/// A day in March 2025
pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

pub fn public_base() -> PublicUrlBase {
    PublicUrlBase::parse(PROJECT).unwrap()
}

pub fn public_url(bucket: &str, path: &str) -> String {
    format!("{BASE}/{bucket}/{path}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    FindExpiredFests,
    FindFestEvents(Vec<String>),
    FindStandaloneEvents,
    Remove { bucket: String, paths: Vec<String> },
    DeleteRegistrations(Vec<String>),
    DeleteEvents(Vec<String>),
    DeleteFests(Vec<String>),
}

impl Op {
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Op::FindExpiredFests | Op::FindFestEvents(_) | Op::FindStandaloneEvents
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpLog(Arc<Mutex<Vec<Op>>>);

impl OpLog {
    fn push(&self, op: Op) {
        self.0.lock().unwrap().push(op);
    }

    pub fn all(&self) -> Vec<Op> {
        self.0.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Op> {
        self.all().into_iter().filter(|op| !op.is_lookup()).collect()
    }
}

struct EventRow {
    event: ExpiredEvent,
    end_date: NaiveDate,
    fest: Option<String>,
}

/// Rows of the three tables, with the foreign keys enforced on delete.
#[derive(Default)]
pub struct FakeStore {
    log: OpLog,
    fests: Mutex<Vec<(ExpiredFest, NaiveDate)>>,
    events: Mutex<Vec<EventRow>>,
    registrations: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    panicking: Mutex<HashSet<&'static str>>,
}

impl FakeStore {
    pub fn with_log(log: OpLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn add_fest(&self, id: &str, closing_date: NaiveDate) {
        let fest = ExpiredFest {
            fest_id: id.to_string(),
            fest_image_url: Some(public_url("fest-images", &format!("{id}.png"))),
        };
        self.fests.lock().unwrap().push((fest, closing_date));
    }

    pub fn add_event(&self, id: &str, end_date: NaiveDate, fest: Option<&str>) {
        let event = ExpiredEvent {
            event_id: id.to_string(),
            event_image_url: Some(public_url("event-images", &format!("{id}.png"))),
            banner_url: Some(public_url("event-banners", &format!("{id}.jpg"))),
            pdf_url: Some(public_url("event-pdfs", &format!("{id}.pdf"))),
        };
        self.events.lock().unwrap().push(EventRow {
            event,
            end_date,
            fest: fest.map(str::to_string),
        });
    }

    pub fn set_fest_image(&self, id: &str, url: &str) {
        for (fest, _) in self.fests.lock().unwrap().iter_mut() {
            if fest.fest_id == id {
                fest.fest_image_url = Some(url.to_string());
            }
        }
    }

    pub fn add_registration(&self, event_id: &str) {
        self.registrations
            .lock()
            .unwrap()
            .push(event_id.to_string());
    }

    /// Make the named call return an error
    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().insert(call);
    }

    /// Make the named call panic
    pub fn panic_on(&self, call: &'static str) {
        self.panicking.lock().unwrap().insert(call);
    }

    pub fn operations(&self) -> Vec<Op> {
        self.log.all()
    }

    pub fn fest_count(&self) -> usize {
        self.fests.lock().unwrap().len()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    fn check(&self, call: &'static str) -> Result<(), StoreError> {
        if self.panicking.lock().unwrap().contains(call) {
            panic!("{call} panicked");
        }
        if self.failing.lock().unwrap().contains(call) {
            return Err(StoreError::Other(format!("{call} failed")));
        }
        Ok(())
    }
}

fn matches(mode: MatchMode, value: NaiveDate, reference_date: NaiveDate) -> bool {
    match mode {
        MatchMode::Exact => value == reference_date,
        MatchMode::Backlog => value <= reference_date,
    }
}

#[async_trait]
impl CleanupStore for FakeStore {
    async fn find_expired_fests(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredFest>, StoreError> {
        self.log.push(Op::FindExpiredFests);
        self.check("find_expired_fests")?;
        Ok(self
            .fests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, closing)| matches(mode, *closing, reference_date))
            .map(|(fest, _)| fest.clone())
            .collect())
    }

    async fn find_fest_events(&self, fest_ids: &[String]) -> Result<Vec<ExpiredEvent>, StoreError> {
        self.log.push(Op::FindFestEvents(fest_ids.to_vec()));
        self.check("find_fest_events")?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.fest.as_ref().is_some_and(|f| fest_ids.contains(f)))
            .map(|row| row.event.clone())
            .collect())
    }

    async fn find_expired_standalone_events(
        &self,
        reference_date: NaiveDate,
        mode: MatchMode,
    ) -> Result<Vec<ExpiredEvent>, StoreError> {
        self.log.push(Op::FindStandaloneEvents);
        self.check("find_expired_standalone_events")?;
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.fest.is_none() && matches(mode, row.end_date, reference_date))
            .map(|row| row.event.clone())
            .collect())
    }

    async fn delete_registrations(&self, event_ids: &[String]) -> Result<u64, StoreError> {
        self.log.push(Op::DeleteRegistrations(event_ids.to_vec()));
        self.check("delete_registrations")?;
        let mut registrations = self.registrations.lock().unwrap();
        let before = registrations.len();
        registrations.retain(|event_id| !event_ids.contains(event_id));
        Ok((before - registrations.len()) as u64)
    }

    async fn delete_events(&self, event_ids: &[String]) -> Result<u64, StoreError> {
        self.log.push(Op::DeleteEvents(event_ids.to_vec()));
        self.check("delete_events")?;
        if self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .any(|event_id| event_ids.contains(event_id))
        {
            return Err(StoreError::Other(
                "event_registrations still reference events".to_string(),
            ));
        }
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|row| !event_ids.contains(&row.event.event_id));
        Ok((before - events.len()) as u64)
    }

    async fn delete_fests(&self, fest_ids: &[String]) -> Result<u64, StoreError> {
        self.log.push(Op::DeleteFests(fest_ids.to_vec()));
        self.check("delete_fests")?;
        if self
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|row| row.fest.as_ref().is_some_and(|f| fest_ids.contains(f)))
        {
            return Err(StoreError::Other("events still reference fests".to_string()));
        }
        let mut fests = self.fests.lock().unwrap();
        let before = fests.len();
        fests.retain(|(fest, _)| !fest_ids.contains(&fest.fest_id));
        Ok((before - fests.len()) as u64)
    }
}

/// File store that logs each remove call; listed buckets fail.
#[derive(Default)]
pub struct RecordingFiles {
    log: OpLog,
    failing: Mutex<HashSet<String>>,
}

impl RecordingFiles {
    pub fn with_log(log: OpLog) -> Self {
        Self {
            log,
            failing: Mutex::default(),
        }
    }

    pub fn fail_bucket(&self, bucket: &str) {
        self.failing.lock().unwrap().insert(bucket.to_string());
    }
}

#[async_trait]
impl FileStore for RecordingFiles {
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<usize, StorageError> {
        self.log.push(Op::Remove {
            bucket: bucket.to_string(),
            paths: paths.to_vec(),
        });
        if self.failing.lock().unwrap().contains(bucket) {
            return Err(StorageError::Api {
                bucket: bucket.to_string(),
                status: 503,
                message: "storage unavailable".to_string(),
            });
        }
        Ok(paths.len())
    }
}

/// Shorthand for a remove call in expected operation lists
pub fn remove(bucket: &str, paths: &[&str]) -> Op {
    Op::Remove {
        bucket: bucket.to_string(),
        paths: paths.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

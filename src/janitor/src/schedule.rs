//! Daily trigger for the cleanup job.
//!
//! The schedule is a wall-clock time in a fixed UTC offset (`00:01` at
//! `+05:30` by default). Each firing cleans up the previous local day.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use common::config::{CleanupConfig, ConfigError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::job::{CleanupJob, run_guarded};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, offset: FixedOffset) -> Result<Self, ConfigError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            ConfigError::Invalid(format!("{hour:02}:{minute:02} is not a valid time of day"))
        })?;
        Ok(Self { time, offset })
    }

    pub fn from_config(config: &CleanupConfig) -> Result<Self, ConfigError> {
        Self::new(config.hour, config.minute, config.offset()?)
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// First firing strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset).naive_local();
        let today = local.date().and_time(self.time);
        let next = if today > local {
            today
        } else {
            (local.date() + Days::new(1)).and_time(self.time)
        };
        (next - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// The day a firing at `now` cleans up: yesterday in the schedule's offset.
    pub fn reference_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive() - Days::new(1)
    }
}

/// Run `job` every day at the scheduled time until `shutdown` flips to `true`.
pub fn spawn_scheduler(
    job: Arc<CleanupJob>,
    schedule: DailySchedule,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            log::info!(
                "Next cleanup run at {} ({} local)",
                next.to_rfc3339(),
                next.with_timezone(&schedule.offset).format("%Y-%m-%d %H:%M")
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("Cleanup scheduler stopping");
                        return;
                    }
                    continue;
                }
            }

            let reference_date = schedule.reference_date(Utc::now());
            log::info!("Scheduled cleanup firing for {reference_date}");
            if run_guarded(job.clone(), reference_date).await.is_some() {
                job.metrics().summary().log();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::CleanupOptions;
    use crate::testing::{FakeStore, RecordingFiles, public_base};
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_after_crosses_utc_day() {
        let schedule = DailySchedule::new(0, 1, ist()).unwrap();

        // 23:30 IST on the 9th
        let next = schedule.next_after(utc(2025, 3, 9, 18, 0));
        assert_eq!(next, utc(2025, 3, 9, 18, 31));

        // exactly at the firing time: the next one is a day later
        let next = schedule.next_after(utc(2025, 3, 9, 18, 31));
        assert_eq!(next, utc(2025, 3, 10, 18, 31));

        // 00:30 IST on the 10th
        let next = schedule.next_after(utc(2025, 3, 9, 19, 0));
        assert_eq!(next, utc(2025, 3, 10, 18, 31));
    }

    #[test]
    fn test_reference_date_is_previous_local_day() {
        let schedule = DailySchedule::new(0, 1, ist()).unwrap();

        // 00:01 IST on the 10th is still the 9th in UTC
        let fired = utc(2025, 3, 9, 18, 31);
        assert_eq!(
            schedule.reference_date(fired),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );

        let utc_schedule = DailySchedule::new(0, 1, FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(
            utc_schedule.reference_date(fired),
            NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()
        );
    }

    #[test]
    fn test_from_config() {
        let schedule = DailySchedule::from_config(&CleanupConfig::default()).unwrap();
        assert_eq!(schedule.time(), NaiveTime::from_hms_opt(0, 1, 0).unwrap());
        assert_eq!(schedule.offset(), ist());

        assert!(DailySchedule::new(24, 0, ist()).is_err());

        let config = CleanupConfig {
            utc_offset: "IST".to_string(),
            ..CleanupConfig::default()
        };
        assert!(DailySchedule::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let job = Arc::new(CleanupJob::new(
            Arc::new(FakeStore::default()),
            Arc::new(RecordingFiles::default()),
            public_base(),
            CleanupOptions::default(),
        ));
        let schedule = DailySchedule::new(0, 1, ist()).unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(job.clone(), schedule, rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert_eq!(job.metrics().runs_started(), 0);
    }
}

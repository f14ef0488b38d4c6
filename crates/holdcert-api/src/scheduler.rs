//! # Daily Monitor Schedule
//!
//! Fires the expiry monitor once per UTC day at a fixed time of day. A date
//! that has already fired never fires again, and a process started after the
//! day's run time waits for the next day.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::task::JoinHandle;

use holdcert_core::ValidationError;

use crate::monitor::{ExpiryMonitor, MonitorTrigger};

/// A once-a-day schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailySchedule {
    /// Fire every day at `at` (UTC).
    pub fn new(at: NaiveTime) -> Self {
        Self {
            at,
            last_fired: None,
        }
    }

    /// Parse an `HH:MM` run time.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(Self::new)
            .map_err(|e| ValidationError::InvalidField {
                field: "run_at",
                reason: format!("expected HH:MM, got {value:?}: {e}"),
            })
    }

    /// Time of day the schedule fires.
    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// Whether a run is due at `now`: the run time has passed today and
    /// today has not fired yet.
    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        now.time() >= self.at && self.last_fired != Some(now.date_naive())
    }

    /// Record that the run for `date` happened.
    pub fn mark_fired(&mut self, date: NaiveDate) {
        self.last_fired = Some(date);
    }

    /// The next instant strictly after `now` at which the schedule fires.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let candidate = today.and_time(self.at).and_utc();
        if candidate <= now || self.last_fired == Some(today) {
            candidate + chrono::Duration::days(1)
        } else {
            candidate
        }
    }
}

/// Run the monitor daily on the blocking pool until the runtime shuts down.
pub fn spawn_daily_monitor(monitor: Arc<ExpiryMonitor>, mut schedule: DailySchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = schedule.next_run_after(now);
            tracing::info!(next_run = %next.to_rfc3339(), "expiry monitor scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let now = Utc::now();
            if !schedule.should_fire(now) {
                continue;
            }
            let today = now.date_naive();
            schedule.mark_fired(today);

            let monitor = Arc::clone(&monitor);
            match tokio::task::spawn_blocking(move || monitor.run(today, MonitorTrigger::Scheduled))
                .await
            {
                Ok(summary) => tracing::info!(
                    %today,
                    expired = summary.expired.len(),
                    admin_report_sent = summary.admin_report_sent,
                    "scheduled expiry run complete"
                ),
                Err(e) => tracing::error!(%today, error = %e, "scheduled expiry run panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn parses_hh_mm() {
        assert_eq!(
            DailySchedule::parse("08:30").unwrap().at(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert!(DailySchedule::parse("8.30").is_err());
        assert!(DailySchedule::parse("25:00").is_err());
    }

    #[test]
    fn next_run_is_today_before_run_time_and_tomorrow_after() {
        let s = DailySchedule::parse("08:00").unwrap();
        assert_eq!(
            s.next_run_after(at("2026-05-01T07:59:00Z")),
            at("2026-05-01T08:00:00Z")
        );
        assert_eq!(
            s.next_run_after(at("2026-05-01T08:00:00Z")),
            at("2026-05-02T08:00:00Z")
        );
        assert_eq!(
            s.next_run_after(at("2026-05-01T23:00:00Z")),
            at("2026-05-02T08:00:00Z")
        );
    }

    #[test]
    fn fires_once_per_day() {
        let mut s = DailySchedule::parse("08:00").unwrap();
        assert!(!s.should_fire(at("2026-05-01T07:00:00Z")));
        assert!(s.should_fire(at("2026-05-01T08:00:05Z")));
        s.mark_fired(at("2026-05-01T08:00:05Z").date_naive());
        assert!(!s.should_fire(at("2026-05-01T12:00:00Z")));
        assert!(s.should_fire(at("2026-05-02T08:00:00Z")));
    }

    #[test]
    fn fired_day_is_skipped_when_planning() {
        let mut s = DailySchedule::parse("08:00").unwrap();
        s.mark_fired(at("2026-05-01T00:00:00Z").date_naive());
        assert_eq!(
            s.next_run_after(at("2026-05-01T06:00:00Z")),
            at("2026-05-02T08:00:00Z")
        );
    }
}

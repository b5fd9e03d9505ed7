//! Dose notification scheduling
//!
//! A dose is taken first at `time_of_day` and then every `frequency_hours`
//! until the calendar day ends. Each day from `start_date` through the window
//! end (the end date, or 30 days after the start) repeats that pattern. Only
//! instants strictly after `now` are materialized.

use std::num::NonZeroU32;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Transaction};

use crate::error::{ScheduleError, StoreError};

/// Window length when a dose has no end date
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
/// Storage format of `notifications.scheduled_time`
pub const SCHEDULED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A recurring dose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseSpec {
    pub time_of_day: NaiveTime,
    pub frequency_hours: NonZeroU32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl DoseSpec {
    pub fn new(
        time_of_day: NaiveTime,
        frequency_hours: u32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, ScheduleError> {
        let frequency_hours = NonZeroU32::new(frequency_hours).ok_or(ScheduleError::ZeroFrequency)?;
        Ok(Self {
            time_of_day,
            frequency_hours,
            start_date,
            end_date,
        })
    }

    /// Build from the textual forms used in storage and on the command line
    pub fn parse(
        time_of_day: &str,
        frequency_hours: u32,
        start_date: &str,
        end_date: Option<&str>,
    ) -> Result<Self, ScheduleError> {
        let end_date = end_date
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_date)
            .transpose()?;
        Self::new(
            parse_time_of_day(time_of_day)?,
            frequency_hours,
            parse_date(start_date)?,
            end_date,
        )
    }

    /// Last calendar day that receives doses
    pub fn window_end(&self) -> NaiveDate {
        self.end_date
            .unwrap_or_else(|| self.start_date + Duration::days(DEFAULT_WINDOW_DAYS))
    }
}

/// `HH:MM`, seconds ignored if present
pub fn parse_time_of_day(text: &str) -> Result<NaiveTime, ScheduleError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(text.to_string()))
}

pub fn parse_date(text: &str) -> Result<NaiveDate, ScheduleError> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| ScheduleError::InvalidDate(text.to_string()))
}

/// Every future dose instant of `spec`, ascending
pub fn expand(spec: &DoseSpec, now: NaiveDateTime) -> Vec<NaiveDateTime> {
    let step = Duration::hours(i64::from(spec.frequency_hours.get()));
    let window_end = spec.window_end();
    let mut instants = Vec::new();

    for day in spec.start_date.iter_days().take_while(|d| *d <= window_end) {
        let mut t = day.and_time(spec.time_of_day);
        while t.date() == day {
            if t > now {
                instants.push(t);
            }
            match t.checked_add_signed(step) {
                Some(next) => t = next,
                None => break,
            }
        }
    }
    instants
}

/// Insert a pending notification for every instant of `spec`, returning how
/// many were written. Runs inside the caller's transaction.
pub fn schedule_notifications(
    tx: &Transaction<'_>,
    user_id: i64,
    routine_id: i64,
    dose_id: i64,
    spec: &DoseSpec,
    now: NaiveDateTime,
) -> Result<usize, StoreError> {
    let instants = expand(spec, now);
    let mut stmt = tx.prepare_cached(
        "INSERT INTO notifications (user_id, routine_id, dose_id, scheduled_time, status)
         VALUES (?1, ?2, ?3, ?4, 'pending')",
    )?;
    for t in &instants {
        stmt.execute(params![
            user_id,
            routine_id,
            dose_id,
            t.format(SCHEDULED_FORMAT).to_string()
        ])?;
    }
    tracing::debug!(routine_id, dose_id, count = instants.len(), "notifications scheduled");
    Ok(instants.len())
}

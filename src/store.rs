//! SQLite persistence for users, search history, medicine routines and their
//! notifications.
//!
//! Every operation that writes more than one row runs in a single
//! transaction; a failure anywhere rolls the whole operation back.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::scheduler::{
    parse_time_of_day, schedule_notifications, DoseSpec, DATE_FORMAT, SCHEDULED_FORMAT, TIME_FORMAT,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    age INTEGER NOT NULL CHECK (age BETWEEN 1 AND 120),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    query TEXT NOT NULL,
    search_date TEXT NOT NULL,
    results_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS medicine_routines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    medicine_name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    priority INTEGER NOT NULL DEFAULT 0,
    start_date TEXT NOT NULL,
    end_date TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS medicine_doses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    routine_id INTEGER NOT NULL REFERENCES medicine_routines(id) ON DELETE CASCADE,
    time_of_day TEXT NOT NULL,
    frequency_hours INTEGER NOT NULL CHECK (frequency_hours > 0),
    dosage TEXT NOT NULL,
    instructions TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    routine_id INTEGER NOT NULL REFERENCES medicine_routines(id) ON DELETE CASCADE,
    dose_id INTEGER NOT NULL REFERENCES medicine_doses(id) ON DELETE CASCADE,
    scheduled_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'sent', 'taken', 'skipped')),
    sent_at TEXT,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_search_history_user ON search_history(user_id, search_date);
CREATE INDEX IF NOT EXISTS idx_notifications_user_time ON notifications(user_id, scheduled_time);
CREATE INDEX IF NOT EXISTS idx_notifications_routine ON notifications(routine_id);
"#;

/// Format of audit columns (`created_at`, `sent_at`, ...)
const AUDIT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NOTIFICATION_COLUMNS: &str = "n.id, n.scheduled_time, n.status, r.medicine_name, r.priority, d.dosage, d.instructions
     FROM notifications n
     JOIN medicine_routines r ON n.routine_id = r.id
     JOIN medicine_doses d ON n.dose_id = d.id";

/// Where searches are logged. The aggregator only needs these two writes.
pub trait SearchHistory: Send + Sync {
    fn record_search(&self, user_id: i64, query: &str) -> Result<i64, StoreError>;
    fn update_result_count(&self, search_id: i64, count: usize) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Taken,
    Skipped,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Taken => "taken",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "taken" => Ok(Self::Taken),
            "skipped" => Ok(Self::Skipped),
            other => Err(StoreError::Invalid(format!("unknown notification status {other:?}"))),
        }
    }
}

/// A dose as submitted by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDose {
    /// `HH:MM`
    pub time_of_day: String,
    pub frequency_hours: u32,
    pub dosage: String,
    #[serde(default)]
    pub instructions: String,
}

/// A routine with its doses, as submitted for create or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoutine {
    pub medicine_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub doses: Vec<NewDose>,
}

impl NewRoutine {
    /// Validate every dose before anything is written
    fn dose_specs(&self) -> Result<Vec<DoseSpec>, StoreError> {
        if self.medicine_name.trim().is_empty() {
            return Err(StoreError::Invalid("medicine name is required".into()));
        }
        self.doses
            .iter()
            .map(|dose| -> Result<DoseSpec, StoreError> {
                let time = parse_time_of_day(&dose.time_of_day)?;
                Ok(DoseSpec::new(time, dose.frequency_hours, self.start_date, self.end_date)?)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub id: i64,
    pub query: String,
    pub searched_at: String,
    pub results_count: i64,
}

/// An active routine with its dose and due-notification counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineSummary {
    pub id: i64,
    pub medicine_name: String,
    pub description: String,
    pub priority: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub dose_count: i64,
    /// Pending notifications already due
    pub pending_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dose {
    pub id: i64,
    pub routine_id: i64,
    #[serde(serialize_with = "serialize_time")]
    pub time_of_day: NaiveTime,
    pub frequency_hours: u32,
    pub dosage: String,
    pub instructions: String,
}

/// A notification as shown to the polling consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationView {
    pub id: i64,
    /// `YYYY-MM-DD HH:MM`
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NotificationStatus>,
    pub medicine: String,
    pub dosage: String,
    pub instructions: String,
    pub priority: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub taken: i64,
    pub remaining: i64,
    pub skipped: i64,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn create_user(&self, username: &str, name: &str, age: u32) -> Result<i64, StoreError> {
        if username.trim().is_empty() || name.trim().is_empty() {
            return Err(StoreError::Invalid("username and name are required".into()));
        }
        if !(1..=120).contains(&age) {
            return Err(StoreError::Invalid(format!("age {age} outside 1..=120")));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, name, age, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username.trim(), name.trim(), age, audit_now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_user(&self, username: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn()?;
        let id = conn
            .query_row("SELECT id FROM users WHERE username = ?1", [username.trim()], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Most recent searches first
    pub fn recent_searches(&self, user_id: i64, limit: usize) -> Result<Vec<SearchEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, query, search_date, results_count FROM search_history
             WHERE user_id = ?1
             ORDER BY search_date DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(SearchEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                searched_at: row.get(2)?,
                results_count: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn clear_search_history(&self, user_id: i64) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM search_history WHERE user_id = ?1", [user_id])?)
    }

    /// Insert a routine with its doses and schedule their notifications
    pub fn create_routine(
        &self,
        user_id: i64,
        routine: &NewRoutine,
        now: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        let specs = routine.dose_specs()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO medicine_routines
                (user_id, medicine_name, description, priority, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                routine.medicine_name.trim(),
                routine.description,
                routine.priority,
                format_date(routine.start_date),
                routine.end_date.map(format_date),
                now.format(AUDIT_FORMAT).to_string()
            ],
        )?;
        let routine_id = tx.last_insert_rowid();
        let scheduled = insert_doses(&tx, user_id, routine_id, routine, &specs, now)?;
        tx.commit()?;

        tracing::info!(user_id, routine_id, scheduled, "routine created");
        Ok(routine_id)
    }

    /// Replace a routine's fields and doses. All existing notifications of
    /// the routine are discarded and regenerated from the new doses.
    pub fn update_routine(
        &self,
        user_id: i64,
        routine_id: i64,
        routine: &NewRoutine,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let specs = routine.dose_specs()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_routine_owner(&tx, user_id, routine_id)?;

        tx.execute(
            "UPDATE medicine_routines
             SET medicine_name = ?1, description = ?2, priority = ?3, start_date = ?4, end_date = ?5
             WHERE id = ?6",
            params![
                routine.medicine_name.trim(),
                routine.description,
                routine.priority,
                format_date(routine.start_date),
                routine.end_date.map(format_date),
                routine_id
            ],
        )?;
        tx.execute("DELETE FROM notifications WHERE routine_id = ?1", [routine_id])?;
        tx.execute("DELETE FROM medicine_doses WHERE routine_id = ?1", [routine_id])?;
        let scheduled = insert_doses(&tx, user_id, routine_id, routine, &specs, now)?;
        tx.commit()?;

        tracing::info!(user_id, routine_id, scheduled, "routine updated");
        Ok(())
    }

    pub fn delete_routine(&self, user_id: i64, routine_id: i64) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_routine_owner(&tx, user_id, routine_id)?;

        tx.execute("DELETE FROM notifications WHERE routine_id = ?1", [routine_id])?;
        tx.execute("DELETE FROM medicine_doses WHERE routine_id = ?1", [routine_id])?;
        tx.execute("DELETE FROM medicine_routines WHERE id = ?1", [routine_id])?;
        tx.commit()?;

        tracing::info!(user_id, routine_id, "routine deleted");
        Ok(())
    }

    /// Active routines, highest priority first, then by name
    pub fn list_routines(&self, user_id: i64, now: NaiveDateTime) -> Result<Vec<RoutineSummary>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, r.medicine_name, r.description, r.priority, r.start_date, r.end_date,
                    (SELECT COUNT(*) FROM medicine_doses WHERE routine_id = r.id),
                    (SELECT COUNT(*) FROM notifications
                     WHERE routine_id = r.id AND status = 'pending' AND scheduled_time <= ?2)
             FROM medicine_routines r
             WHERE r.user_id = ?1 AND r.active = 1
             ORDER BY r.priority DESC, r.medicine_name ASC",
        )?;
        let rows = stmt.query_map(params![user_id, format_scheduled(now)], |row| {
            Ok(RoutineSummary {
                id: row.get(0)?,
                medicine_name: row.get(1)?,
                description: row.get(2)?,
                priority: row.get(3)?,
                start_date: date_column(row, 4)?,
                end_date: row
                    .get::<_, Option<String>>(5)?
                    .map(|text| parse_column(5, &text, |s| NaiveDate::parse_from_str(s, DATE_FORMAT)))
                    .transpose()?,
                dose_count: row.get(6)?,
                pending_count: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn routine_doses(&self, routine_id: i64) -> Result<Vec<Dose>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, routine_id, time_of_day, frequency_hours, dosage, instructions
             FROM medicine_doses WHERE routine_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([routine_id], |row| {
            let time: String = row.get(2)?;
            Ok(Dose {
                id: row.get(0)?,
                routine_id: row.get(1)?,
                time_of_day: parse_column(2, &time, |s| NaiveTime::parse_from_str(s, TIME_FORMAT))?,
                frequency_hours: row.get(3)?,
                dosage: row.get(4)?,
                instructions: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Due notifications still pending. Each returned row is marked `sent`
    /// in the same transaction, so a second poll does not see it again.
    pub fn pending_notifications(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<NotificationView>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let due = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS}
                 WHERE n.user_id = ?1 AND n.status = 'pending' AND n.scheduled_time <= ?2
                 ORDER BY n.scheduled_time ASC, n.id ASC"
            ))?;
            let rows = stmt.query_map(params![user_id, format_scheduled(now)], notification_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let sent_at = now.format(AUDIT_FORMAT).to_string();
        {
            let mut mark = tx.prepare(
                "UPDATE notifications SET status = 'sent', sent_at = ?1
                 WHERE id = ?2 AND status = 'pending'",
            )?;
            for view in &due {
                mark.execute(params![sent_at, view.id])?;
            }
        }
        tx.commit()?;

        if !due.is_empty() {
            tracing::debug!(user_id, count = due.len(), "notifications marked sent");
        }
        Ok(due
            .into_iter()
            .map(|view| NotificationView { status: None, ..view })
            .collect())
    }

    /// Every notification scheduled on `today`, any status
    pub fn today_notifications(&self, user_id: i64, today: NaiveDate) -> Result<Vec<NotificationView>, StoreError> {
        self.notifications_on(user_id, today, None, None, None)
    }

    /// Pending notifications later on the day of `now` (strictly after it),
    /// soonest first
    pub fn upcoming_notifications(
        &self,
        user_id: i64,
        now: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<NotificationView>, StoreError> {
        self.notifications_on(
            user_id,
            now.date(),
            Some(now),
            Some(NotificationStatus::Pending),
            Some(limit),
        )
    }

    fn notifications_on(
        &self,
        user_id: i64,
        day: NaiveDate,
        after: Option<NaiveDateTime>,
        status: Option<NotificationStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<NotificationView>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS}
             WHERE n.user_id = ?1 AND date(n.scheduled_time) = ?2
               AND (?3 IS NULL OR n.status = ?3)
               AND (?5 IS NULL OR n.scheduled_time > ?5)
             ORDER BY n.scheduled_time ASC, n.id ASC
             LIMIT ?4"
        ))?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(
            params![
                user_id,
                format_date(day),
                status.map(|s| s.as_str()),
                limit,
                after.map(format_scheduled)
            ],
            notification_row,
        )?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Taken, remaining (pending) and skipped counts for one day
    pub fn day_summary(&self, user_id: i64, day: NaiveDate) -> Result<DaySummary, StoreError> {
        let conn = self.conn()?;
        let summary = conn.query_row(
            "SELECT COALESCE(SUM(status = 'taken'), 0),
                    COALESCE(SUM(status = 'pending'), 0),
                    COALESCE(SUM(status = 'skipped'), 0)
             FROM notifications
             WHERE user_id = ?1 AND date(scheduled_time) = ?2",
            params![user_id, format_date(day)],
            |row| {
                Ok(DaySummary {
                    taken: row.get(0)?,
                    remaining: row.get(1)?,
                    skipped: row.get(2)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Record the user's response to a notification. Only `taken` and
    /// `skipped` can be set this way.
    pub fn update_notification_status(
        &self,
        user_id: i64,
        notification_id: i64,
        status: NotificationStatus,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        if !matches!(status, NotificationStatus::Taken | NotificationStatus::Skipped) {
            return Err(StoreError::Invalid(format!(
                "status {} cannot be set by the user",
                status.as_str()
            )));
        }
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![status.as_str(), now.format(AUDIT_FORMAT).to_string(), notification_id, user_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("notification {notification_id}")));
        }
        Ok(())
    }
}

impl SearchHistory for Store {
    fn record_search(&self, user_id: i64, query: &str) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO search_history (user_id, query, search_date) VALUES (?1, ?2, ?3)",
            params![user_id, query, audit_now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_result_count(&self, search_id: i64, count: usize) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE search_history SET results_count = ?1 WHERE id = ?2",
            params![count as i64, search_id],
        )?;
        Ok(())
    }
}

fn insert_doses(
    tx: &Transaction<'_>,
    user_id: i64,
    routine_id: i64,
    routine: &NewRoutine,
    specs: &[DoseSpec],
    now: NaiveDateTime,
) -> Result<usize, StoreError> {
    let mut scheduled = 0;
    for (dose, spec) in routine.doses.iter().zip(specs) {
        tx.execute(
            "INSERT INTO medicine_doses (routine_id, time_of_day, frequency_hours, dosage, instructions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                routine_id,
                spec.time_of_day.format(TIME_FORMAT).to_string(),
                spec.frequency_hours.get(),
                dose.dosage,
                dose.instructions
            ],
        )?;
        let dose_id = tx.last_insert_rowid();
        scheduled += schedule_notifications(tx, user_id, routine_id, dose_id, spec, now)?;
    }
    Ok(scheduled)
}

fn ensure_routine_owner(conn: &Connection, user_id: i64, routine_id: i64) -> Result<(), StoreError> {
    conn.query_row(
        "SELECT 1 FROM medicine_routines WHERE id = ?1 AND user_id = ?2",
        params![routine_id, user_id],
        |_| Ok(()),
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("routine {routine_id}")))
}

fn notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationView> {
    let status: String = row.get(2)?;
    Ok(NotificationView {
        id: row.get(0)?,
        time: row.get(1)?,
        status: Some(parse_column(2, &status, NotificationStatus::from_str)?),
        medicine: row.get(3)?,
        priority: row.get(4)?,
        dosage: row.get(5)?,
        instructions: row.get(6)?,
    })
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    parse_column(idx, &text, |s| NaiveDate::parse_from_str(s, DATE_FORMAT))
}

/// Parse a text column, reporting failures as a column conversion error
fn parse_column<T, E>(idx: usize, text: &str, parse: impl FnOnce(&str) -> Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parse(text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_scheduled(t: NaiveDateTime) -> String {
    t.format(SCHEDULED_FORMAT).to_string()
}

fn audit_now() -> String {
    Local::now().naive_local().format(AUDIT_FORMAT).to_string()
}

fn serialize_time<S: serde::Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
}

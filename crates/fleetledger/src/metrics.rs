//! Dashboard metrics, recomputed from domain state on every call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{AircraftStatus, MetricsSnapshot, MissionStatus, UtilizationRow};
use crate::storage::{encode_time, Storage};

/// Rows in the utilization ranking.
pub const UTILIZATION_ROWS: usize = 5;

/// Computes [`MetricsSnapshot`]s.
#[derive(Debug, Clone)]
pub struct Aggregator {
    storage: Arc<Storage>,
}

impl Aggregator {
    /// Create an aggregator over the shared storage.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Snapshot for the server's current local day.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn snapshot(&self) -> Result<MetricsSnapshot> {
        self.snapshot_at(&Local::now())
    }

    /// Snapshot with "today" taken as the calendar day of `now` in its own
    /// time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the day has no
    /// representable midnight in that zone.
    pub fn snapshot_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<MetricsSnapshot> {
        let (start, end) = day_window(now)?;
        let (start, end) = (encode_time(&start), encode_time(&end));

        self.storage.with_conn(|conn| {
            let count = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> Result<i64> {
                Ok(conn.query_row(sql, params, |row| row.get(0))?)
            };

            Ok(MetricsSnapshot {
                aircraft_available: count(
                    "SELECT COUNT(*) FROM aircraft WHERE status = ?1",
                    params![AircraftStatus::Available],
                )?,
                flights_today: count(
                    "SELECT COUNT(*) FROM flight_logs WHERE flight_datetime BETWEEN ?1 AND ?2",
                    params![start, end],
                )?,
                active_missions: count(
                    "SELECT COUNT(*) FROM flight_logs
                     WHERE mission_status = ?1 AND flight_datetime BETWEEN ?2 AND ?3",
                    params![MissionStatus::Active, start, end],
                )?,
                maintenance_alerts: count("SELECT COUNT(*) FROM alerts WHERE is_resolved = 0", &[])?,
                crew_available: count("SELECT COUNT(*) FROM crew WHERE is_available = 1", &[])?,
                aircraft_utilization: utilization(conn)?,
                updated_at: now.with_timezone(&Utc),
            })
        })
    }
}

/// First and last millisecond of `now`'s local calendar day, in UTC.
///
/// # Errors
///
/// Returns an error if the zone has no valid start for the day.
pub fn day_window<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let zone = now.timezone();
    let today = now.date_naive();
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| Error::internal(format!("no day follows {today}")))?;

    let start = local_midnight(&zone, today)?;
    let end = local_midnight(&zone, tomorrow)? - Duration::milliseconds(1);
    Ok((start, end))
}

/// Start of `date` in `zone`. Zones that skip midnight start the day at the
/// first local hour that exists.
fn local_midnight<Tz: TimeZone>(zone: &Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    (0..3)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| zone.from_local_datetime(&date.and_time(time)).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::internal(format!("no local day start on {date}")))
}

fn utilization(conn: &Connection) -> Result<Vec<UtilizationRow>> {
    let mut stmt = conn.prepare(
        r"
        SELECT f.aircraft_id, a.tail_number, SUM(f.flight_hours) AS hours
        FROM flight_logs f LEFT JOIN aircraft a ON a.id = f.aircraft_id
        GROUP BY f.aircraft_id
        ORDER BY hours DESC, f.aircraft_id ASC
        LIMIT ?1
        ",
    )?;
    let rows = stmt
        .query_map([crate::storage::sql_limit(UTILIZATION_ROWS)], |row| {
            let id: i64 = row.get(0)?;
            let tail: Option<String> = row.get(1)?;
            Ok(UtilizationRow {
                aircraft: tail.unwrap_or_else(|| format!("Aircraft-{id}")),
                hours: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

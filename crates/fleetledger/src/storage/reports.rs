//! Report queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{date_column, encode_time, time_column, Storage};
use crate::error::Result;
use crate::models::{FlightReportRow, MaintenanceReportRow, UsageReportRow};

impl Storage {
    /// Flights departing within `[start, end]`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flight_report(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<FlightReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT f.id, a.tail_number, f.pilot_name, f.mission_type, f.mission_status,
                       f.flight_datetime, f.flight_hours, f.fuel_used, d.name, r.name, u.username
                FROM flight_logs f
                JOIN aircraft a ON a.id = f.aircraft_id
                JOIN bases d ON d.id = f.departure_base_id
                JOIN bases r ON r.id = f.arrival_base_id
                LEFT JOIN actors u ON u.id = f.logged_by_id
                WHERE f.flight_datetime BETWEEN ?1 AND ?2
                ORDER BY f.flight_datetime DESC, f.id DESC
                ",
            )?;
            let rows = stmt
                .query_map(params![encode_time(start), encode_time(end)], row_to_flight_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Maintenance logs recorded within `[since, until]`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn maintenance_report(
        &self,
        since: &DateTime<Utc>,
        until: &DateTime<Utc>,
    ) -> Result<Vec<MaintenanceReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT m.id, a.tail_number, m.total_flight_hours, m.last_maintenance_date,
                       m.component_status, m.maintenance_notes, u.username, m.created_at
                FROM maintenance_logs m
                JOIN aircraft a ON a.id = m.aircraft_id
                LEFT JOIN actors u ON u.id = m.logged_by_id
                WHERE m.created_at BETWEEN ?1 AND ?2
                ORDER BY m.created_at DESC, m.id DESC
                ",
            )?;
            let rows = stmt
                .query_map(params![encode_time(since), encode_time(until)], |row| {
                    Ok(MaintenanceReportRow {
                        maintenance_log_id: row.get(0)?,
                        aircraft: row.get(1)?,
                        total_flight_hours: row.get(2)?,
                        last_maintenance_date: date_column(row, 3)?,
                        component_status: row.get(4)?,
                        maintenance_notes: row.get(5)?,
                        logged_by: row.get(6)?,
                        created_at: time_column(row, 7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Summed hours and fuel per aircraft that has flown, most hours first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn usage_report(&self) -> Result<Vec<UsageReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT f.aircraft_id, a.tail_number,
                       SUM(f.flight_hours) AS hours, SUM(f.fuel_used)
                FROM flight_logs f
                LEFT JOIN aircraft a ON a.id = f.aircraft_id
                GROUP BY f.aircraft_id
                ORDER BY hours DESC, f.aircraft_id
                ",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let tail: Option<String> = row.get(1)?;
                    Ok(UsageReportRow {
                        aircraft: tail.unwrap_or_else(|| format!("Aircraft-{id}")),
                        total_flight_hours: row.get(2)?,
                        total_fuel_used: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn row_to_flight_row(row: &Row<'_>) -> rusqlite::Result<FlightReportRow> {
    Ok(FlightReportRow {
        flight_log_id: row.get(0)?,
        aircraft: row.get(1)?,
        pilot_name: row.get(2)?,
        mission_type: row.get(3)?,
        mission_status: row.get(4)?,
        flight_datetime: time_column(row, 5)?,
        flight_hours: row.get(6)?,
        fuel_used: row.get(7)?,
        departure_base: row.get(8)?,
        arrival_base: row.get(9)?,
        logged_by: row.get(10)?,
    })
}

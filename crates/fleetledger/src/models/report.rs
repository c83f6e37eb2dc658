//! Read-only report rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::MissionStatus;

/// One flight in the daily flight report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightReportRow {
    /// Flight log id.
    pub flight_log_id: i64,
    /// Tail number of the aircraft flown.
    pub aircraft: String,
    /// Pilot in command.
    pub pilot_name: String,
    /// Mission category.
    pub mission_type: String,
    /// Mission progress.
    pub mission_status: MissionStatus,
    /// Departure time.
    pub flight_datetime: DateTime<Utc>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    pub fuel_used: f64,
    /// Departure base name.
    pub departure_base: String,
    /// Arrival base name.
    pub arrival_base: String,
    /// Username of the recorder, if the account still exists.
    pub logged_by: Option<String>,
}

/// One maintenance log in the weekly maintenance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReportRow {
    /// Maintenance log id.
    pub maintenance_log_id: i64,
    /// Tail number of the aircraft inspected.
    pub aircraft: String,
    /// Cumulative hours at inspection.
    pub total_flight_hours: f64,
    /// Date of the last maintenance.
    pub last_maintenance_date: NaiveDate,
    /// Component condition summary.
    pub component_status: String,
    /// Free-form notes.
    pub maintenance_notes: Option<String>,
    /// Username of the recorder, if the account still exists.
    pub logged_by: Option<String>,
    /// When the log was recorded.
    pub created_at: DateTime<Utc>,
}

/// Cumulative usage of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReportRow {
    /// Tail number, or `Aircraft-<id>` if the aircraft no longer exists.
    pub aircraft: String,
    /// Summed flight hours.
    pub total_flight_hours: f64,
    /// Summed fuel.
    pub total_fuel_used: f64,
}

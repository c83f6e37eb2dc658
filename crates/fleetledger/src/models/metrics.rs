//! The derived dashboard snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hours flown by one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationRow {
    /// Tail number, or `Aircraft-<id>` if the aircraft no longer exists.
    pub aircraft: String,
    /// Summed flight hours across all flight logs.
    pub hours: f64,
}

/// Operational counts recomputed from domain state. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Aircraft with status `available`.
    pub aircraft_available: i64,
    /// Flights departing within the current local day.
    pub flights_today: i64,
    /// Of those, flights still active.
    pub active_missions: i64,
    /// Unresolved alerts.
    pub maintenance_alerts: i64,
    /// Crew marked available.
    pub crew_available: i64,
    /// Top aircraft by cumulative flight hours, at most five.
    pub aircraft_utilization: Vec<UtilizationRow>,
    /// When the snapshot was computed.
    pub updated_at: DateTime<Utc>,
}

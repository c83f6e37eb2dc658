//! Maintenance logs and the alerts derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::fleet::non_blank;
use super::Role;
use crate::error::{Error, Result};

/// A maintenance inspection record. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceLog {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Inspected aircraft.
    pub aircraft_id: i64,
    /// Cumulative airframe hours at inspection time.
    pub total_flight_hours: f64,
    /// Date of the last completed maintenance.
    pub last_maintenance_date: NaiveDate,
    /// Summary of component condition.
    pub component_status: String,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_notes: Option<String>,
    /// Actor who recorded the inspection.
    pub logged_by_id: Option<i64>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Input for recording an inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMaintenanceLog {
    /// Inspected aircraft.
    pub aircraft_id: i64,
    /// Cumulative airframe hours, non-negative.
    pub total_flight_hours: f64,
    /// Date of the last completed maintenance.
    pub last_maintenance_date: NaiveDate,
    /// Summary of component condition.
    pub component_status: String,
    /// Free-form notes.
    #[serde(default)]
    pub maintenance_notes: Option<String>,
}

impl CreateMaintenanceLog {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative hours or a blank status.
    pub fn validate(&self) -> Result<()> {
        if !self.total_flight_hours.is_finite() || self.total_flight_hours < 0.0 {
            return Err(Error::validation("total_flight_hours must not be negative"));
        }
        non_blank("component_status", &self.component_status)
    }
}

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Action required.
    High,
    /// Attention advised.
    Medium,
    /// Informational.
    Low,
}

labelled_enum!(Severity, "severity", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// A maintenance alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Aircraft the alert concerns.
    pub aircraft_id: i64,
    /// Inspection that raised the alert.
    pub maintenance_log_id: i64,
    /// Short heading.
    pub title: String,
    /// Full text.
    pub message: String,
    /// Urgency.
    pub severity: Severity,
    /// Role expected to act on the alert.
    pub target_role: Role,
    /// Whether the alert has been closed.
    pub is_resolved: bool,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
}

/// An alert about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    /// Aircraft the alert concerns.
    pub aircraft_id: i64,
    /// Inspection that raised the alert.
    pub maintenance_log_id: i64,
    /// Short heading.
    pub title: String,
    /// Full text.
    pub message: String,
    /// Urgency.
    pub severity: Severity,
    /// Role expected to act on the alert.
    pub target_role: Role,
}

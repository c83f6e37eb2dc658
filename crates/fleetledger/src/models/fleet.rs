//! Fleet reference data and flight records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Threshold applied when an aircraft is created without one.
pub const DEFAULT_THRESHOLD_HOURS: f64 = 100.0;

/// Operating base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Unique base name.
    pub name: String,
    /// Where the base is.
    pub location: String,
}

/// Input for creating a base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBase {
    /// Unique base name.
    pub name: String,
    /// Where the base is.
    pub location: String,
}

impl CreateBase {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is blank.
    pub fn validate(&self) -> Result<()> {
        non_blank("name", &self.name)?;
        non_blank("location", &self.location)
    }
}

/// Crew member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crew {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Full name.
    pub full_name: String,
    /// Rank.
    pub rank: String,
    /// Crew position.
    pub role: String,
    /// Whether the member can be assigned.
    pub is_available: bool,
}

/// Input for creating a crew member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCrew {
    /// Full name.
    pub full_name: String,
    /// Rank.
    pub rank: String,
    /// Crew position.
    pub role: String,
    /// Defaults to available.
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl CreateCrew {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is blank.
    pub fn validate(&self) -> Result<()> {
        non_blank("full_name", &self.full_name)?;
        non_blank("rank", &self.rank)?;
        non_blank("role", &self.role)
    }
}

/// Operational status of an aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatus {
    /// Ready for tasking.
    #[default]
    Available,
    /// Currently flying.
    InFlight,
    /// In the hangar.
    UnderMaintenance,
    /// Not airworthy.
    Grounded,
}

labelled_enum!(AircraftStatus, "aircraft status", {
    Available => "available",
    InFlight => "in_flight",
    UnderMaintenance => "under_maintenance",
    Grounded => "grounded",
});

/// An airframe in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Unique registration.
    pub tail_number: String,
    /// Type designation.
    pub model: String,
    /// Cumulative hours at which maintenance is due.
    pub maintenance_threshold_hours: f64,
    /// Current status.
    pub status: AircraftStatus,
    /// Base the aircraft is assigned to.
    pub home_base_id: i64,
}

/// Input for creating an aircraft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAircraft {
    /// Unique registration.
    pub tail_number: String,
    /// Type designation.
    pub model: String,
    /// Defaults to [`DEFAULT_THRESHOLD_HOURS`].
    #[serde(default)]
    pub maintenance_threshold_hours: Option<f64>,
    /// Defaults to available.
    #[serde(default)]
    pub status: Option<AircraftStatus>,
    /// Base the aircraft is assigned to.
    pub home_base_id: i64,
}

impl CreateAircraft {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank names or a threshold below one hour.
    pub fn validate(&self) -> Result<()> {
        non_blank("tail_number", &self.tail_number)?;
        non_blank("model", &self.model)?;
        if let Some(threshold) = self.maintenance_threshold_hours {
            if !threshold.is_finite() || threshold < 1.0 {
                return Err(Error::validation(
                    "maintenance_threshold_hours must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

/// Partial update of an aircraft. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateAircraft {
    /// New operational status.
    pub status: Option<AircraftStatus>,
    /// New type designation.
    pub model: Option<String>,
    /// New maintenance threshold.
    pub maintenance_threshold_hours: Option<f64>,
    /// New home base.
    pub home_base_id: Option<i64>,
}

impl UpdateAircraft {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty patch, a blank model or a
    /// threshold below one hour.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("update names no fields"));
        }
        if let Some(model) = &self.model {
            non_blank("model", model)?;
        }
        if let Some(threshold) = self.maintenance_threshold_hours {
            if !threshold.is_finite() || threshold < 1.0 {
                return Err(Error::validation(
                    "maintenance_threshold_hours must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// Whether the patch touches no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.model.is_none()
            && self.maintenance_threshold_hours.is_none()
            && self.home_base_id.is_none()
    }

    /// Apply the patch to `aircraft`.
    pub fn apply(self, aircraft: &mut Aircraft) {
        if let Some(status) = self.status {
            aircraft.status = status;
        }
        if let Some(model) = self.model {
            aircraft.model = model;
        }
        if let Some(threshold) = self.maintenance_threshold_hours {
            aircraft.maintenance_threshold_hours = threshold;
        }
        if let Some(home_base_id) = self.home_base_id {
            aircraft.home_base_id = home_base_id;
        }
    }
}

/// Progress of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Airborne or under way.
    Active,
    /// Landed and closed.
    #[default]
    Completed,
}

labelled_enum!(MissionStatus, "mission status", {
    Active => "active",
    Completed => "completed",
});

/// A recorded flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightLog {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Pilot in command.
    pub pilot_name: String,
    /// Crew members on board.
    pub crew_member_ids: Vec<i64>,
    /// Kind of mission.
    pub mission_type: String,
    /// Mission progress.
    pub mission_status: MissionStatus,
    /// Departure time.
    pub flight_datetime: DateTime<Utc>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    pub fuel_used: f64,
    /// Where the flight departed.
    pub departure_base_id: i64,
    /// Where the flight arrived.
    pub arrival_base_id: i64,
    /// Free-form remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Actor who recorded the flight.
    pub logged_by_id: Option<i64>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Input for recording a flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFlightLog {
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Pilot in command.
    pub pilot_name: String,
    /// Crew members on board.
    #[serde(default)]
    pub crew_member_ids: Vec<i64>,
    /// Kind of mission.
    pub mission_type: String,
    /// Defaults to completed.
    #[serde(default)]
    pub mission_status: Option<MissionStatus>,
    /// Departure time.
    pub flight_datetime: DateTime<Utc>,
    /// Hours flown, at least 0.1.
    pub flight_hours: f64,
    /// Fuel consumed, non-negative.
    pub fuel_used: f64,
    /// Where the flight departed.
    pub departure_base_id: i64,
    /// Where the flight arrived.
    pub arrival_base_id: i64,
    /// Free-form remarks.
    #[serde(default)]
    pub remarks: Option<String>,
}

impl CreateFlightLog {
    /// Check the declared input shape.
    ///
    /// Cross-field rules (distinct bases) are enforced by the operations
    /// service, not here.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        non_blank("pilot_name", &self.pilot_name)?;
        non_blank("mission_type", &self.mission_type)?;
        if !self.flight_hours.is_finite() || self.flight_hours < 0.1 {
            return Err(Error::validation("flight_hours must be at least 0.1"));
        }
        if !self.fuel_used.is_finite() || self.fuel_used < 0.0 {
            return Err(Error::validation("fuel_used must not be negative"));
        }
        Ok(())
    }
}

pub(super) fn non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::validation(format!("{field} must not be blank")))
    } else {
        Ok(())
    }
}

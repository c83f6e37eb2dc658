//! Read-only operational reports.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::error::Result;
use crate::guard::{self, EVERY_ROLE, FLIGHT_REPORT_READERS, MAINTENANCE_REPORT_READERS};
use crate::metrics::day_window;
use crate::models::{FlightReportRow, MaintenanceReportRow, Principal, UsageReportRow};
use crate::storage::Storage;

/// Look-back of the maintenance report.
pub const MAINTENANCE_REPORT_DAYS: i64 = 7;

/// Daily flight, weekly maintenance and utilization reports.
#[derive(Debug, Clone)]
pub struct ReportService {
    storage: Arc<Storage>,
}

impl ReportService {
    /// Create the service.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Flights of the server's current local day, newest first.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for maintenance, or an error if the
    /// database operation fails.
    pub fn daily_flights(&self, principal: &Principal) -> Result<Vec<FlightReportRow>> {
        self.daily_flights_at(principal, &Local::now())
    }

    /// Flights of `now`'s calendar day in its own time zone.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for maintenance, or an error if the
    /// database operation fails.
    pub fn daily_flights_at<Tz: TimeZone>(
        &self,
        principal: &Principal,
        now: &DateTime<Tz>,
    ) -> Result<Vec<FlightReportRow>> {
        guard::require(principal, FLIGHT_REPORT_READERS, "read the daily flight report")?;
        let (start, end) = day_window(now)?;
        self.storage.flight_report(&start, &end)
    }

    /// Maintenance logs recorded in the last seven days, newest first.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for flight operations, or an error if
    /// the database operation fails.
    pub fn weekly_maintenance(&self, principal: &Principal) -> Result<Vec<MaintenanceReportRow>> {
        self.weekly_maintenance_at(principal, Utc::now())
    }

    /// Maintenance logs recorded within `[now - 7 days, now]`.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for flight operations, or an error if
    /// the database operation fails.
    pub fn weekly_maintenance_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceReportRow>> {
        guard::require(
            principal,
            MAINTENANCE_REPORT_READERS,
            "read the weekly maintenance report",
        )?;
        let (since, until) = week_window(now);
        self.storage.maintenance_report(&since, &until)
    }

    /// Cumulative hours and fuel per aircraft, most hours first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn utilization(&self, principal: &Principal) -> Result<Vec<UsageReportRow>> {
        guard::require(principal, EVERY_ROLE, "read the utilization report")?;
        self.storage.usage_report()
    }
}

/// The maintenance report window ending at `now`.
#[must_use]
pub fn week_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(MAINTENANCE_REPORT_DAYS), now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{CreateFlightLog, MissionStatus, Role};
    use crate::services::testing::Fixture;
    use chrono::{FixedOffset, SubsecRound};

    fn flight(f: &Fixture, aircraft_id: i64, from: i64, to: i64, at: DateTime<Utc>, hours: f64) {
        f.services
            .storage
            .insert_flight_log(
                &CreateFlightLog {
                    aircraft_id,
                    pilot_name: "Capt. Owusu".to_string(),
                    crew_member_ids: Vec::new(),
                    mission_type: "Patrol".to_string(),
                    mission_status: Some(MissionStatus::Completed),
                    flight_datetime: at,
                    flight_hours: hours,
                    fuel_used: hours * 100.0,
                    departure_base_id: from,
                    arrival_base_id: to,
                    remarks: None,
                },
                f.admin.actor_id,
            )
            .unwrap();
    }

    fn maintenance_at(f: &Fixture, aircraft_id: i64, created_at: DateTime<Utc>, status: &str) {
        f.services
            .storage
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO maintenance_logs (aircraft_id, total_flight_hours,
                         last_maintenance_date, component_status, logged_by_id, created_at)
                     VALUES (?1, 40.0, '2026-03-01', ?2, ?3, ?4)",
                    rusqlite::params![
                        aircraft_id,
                        status,
                        f.admin.actor_id,
                        crate::storage::encode_time(&created_at)
                    ],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_daily_flights_cover_local_day_newest_first() {
        let f = Fixture::new();
        let (north, south) = (f.base("North"), f.base("South"));
        let aircraft = f.aircraft("GAF-101", 100.0, north);
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = zone.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let (start, end) = day_window(&now).unwrap();

        flight(&f, aircraft, north, south, start - Duration::milliseconds(1), 1.0);
        flight(&f, aircraft, north, south, start, 2.0);
        flight(&f, aircraft, south, north, end, 3.0);
        flight(&f, aircraft, north, south, end + Duration::milliseconds(1), 4.0);

        let ops = f.principal("ops", Role::FlightOperations);
        let rows = f.services.reports.daily_flights_at(&ops, &now).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].flight_datetime, end);
        assert_eq!(rows[0].departure_base, "South");
        assert_eq!(rows[0].arrival_base, "North");
        assert_eq!(rows[1].flight_datetime, start);
        assert_eq!(rows[1].aircraft, "GAF-101");
        assert_eq!(rows[1].logged_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_weekly_maintenance_boundary() {
        let f = Fixture::new();
        let base = f.base("North");
        let aircraft = f.aircraft("GAF-101", 100.0, base);
        let now = Utc::now().trunc_subsecs(3);
        let (since, _) = week_window(now);

        maintenance_at(&f, aircraft, since - Duration::milliseconds(1), "too old");
        maintenance_at(&f, aircraft, since, "oldest kept");
        maintenance_at(&f, aircraft, now, "latest");
        maintenance_at(&f, aircraft, now + Duration::milliseconds(1), "future");

        let eng = f.principal("eng", Role::Maintenance);
        let rows = f.services.reports.weekly_maintenance_at(&eng, now).unwrap();
        let statuses: Vec<_> = rows.iter().map(|r| r.component_status.as_str()).collect();
        assert_eq!(statuses, vec!["latest", "oldest kept"]);
        assert_eq!(rows[0].logged_by.as_deref(), Some("admin"));
        assert_eq!(rows[0].aircraft, "GAF-101");
    }

    #[test]
    fn test_utilization_sums_hours_and_fuel() {
        let f = Fixture::new();
        let (north, south) = (f.base("North"), f.base("South"));
        let light = f.aircraft("GAF-101", 100.0, north);
        let heavy = f.aircraft("GAF-102", 100.0, north);
        f.aircraft("GAF-103", 100.0, north);
        let now = Utc::now();
        flight(&f, light, north, south, now, 1.5);
        flight(&f, heavy, north, south, now, 2.0);
        flight(&f, heavy, south, north, now, 3.0);

        let commander = f.principal("cdr", Role::Commander);
        let rows = f.services.reports.utilization(&commander).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].aircraft, "GAF-102");
        assert!((rows[0].total_flight_hours - 5.0).abs() < f64::EPSILON);
        assert!((rows[0].total_fuel_used - 500.0).abs() < f64::EPSILON);
        assert_eq!(rows[1].aircraft, "GAF-101");
    }

    #[test]
    fn test_report_roles() {
        let f = Fixture::new();
        let reports = &f.services.reports;
        let eng = f.principal("eng", Role::Maintenance);
        let ops = f.principal("ops", Role::FlightOperations);
        let auditor = f.principal("aud", Role::Auditor);

        assert!(matches!(
            reports.daily_flights(&eng).unwrap_err(),
            Error::Authorization { .. }
        ));
        assert!(matches!(
            reports.weekly_maintenance(&ops).unwrap_err(),
            Error::Authorization { .. }
        ));
        assert!(reports.daily_flights(&auditor).unwrap().is_empty());
        assert!(reports.weekly_maintenance(&auditor).unwrap().is_empty());
        assert!(reports.utilization(&eng).unwrap().is_empty());
        assert!(reports.utilization(&ops).unwrap().is_empty());
    }
}

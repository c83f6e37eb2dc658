//! Maintenance log and alert queries.

use rusqlite::{params, OptionalExtension, Row};

use super::{
    constraint_error, date_column, encode_date, encode_time, now, sql_limit, time_column, Storage,
};
use crate::error::Result;
use crate::models::{Alert, CreateMaintenanceLog, MaintenanceLog, NewAlert};

const MAINTENANCE_COLUMNS: &str = r"
    id, aircraft_id, total_flight_hours, last_maintenance_date, component_status,
    maintenance_notes, logged_by_id, created_at
";

const ALERT_COLUMNS: &str = r"
    id, aircraft_id, maintenance_log_id, title, message, severity, target_role,
    is_resolved, created_at
";

impl Storage {
    /// Insert a maintenance log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_maintenance_log(
        &self,
        dto: &CreateMaintenanceLog,
        logged_by_id: i64,
    ) -> Result<MaintenanceLog> {
        let created_at = now();
        let id = self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO maintenance_logs
                    (aircraft_id, total_flight_hours, last_maintenance_date, component_status,
                     maintenance_notes, logged_by_id, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    dto.aircraft_id,
                    dto.total_flight_hours,
                    encode_date(&dto.last_maintenance_date),
                    dto.component_status,
                    dto.maintenance_notes,
                    logged_by_id,
                    encode_time(&created_at),
                ],
            )
            .map_err(|e| constraint_error(e, "maintenance log"))?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(MaintenanceLog {
            id,
            aircraft_id: dto.aircraft_id,
            total_flight_hours: dto.total_flight_hours,
            last_maintenance_date: dto.last_maintenance_date,
            component_status: dto.component_status.clone(),
            maintenance_notes: dto.maintenance_notes.clone(),
            logged_by_id: Some(logged_by_id),
            created_at,
        })
    }

    /// List maintenance logs, newest first, optionally for one aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_maintenance_logs(
        &self,
        aircraft_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<MaintenanceLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_logs
                 WHERE ?1 IS NULL OR aircraft_id = ?1
                 ORDER BY id DESC LIMIT ?2"
            ))?;
            let logs = stmt
                .query_map(params![aircraft_id, sql_limit(limit)], row_to_maintenance_log)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }

    /// Insert an alert in the unresolved state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_alert(&self, alert: &NewAlert) -> Result<Alert> {
        let created_at = now();
        let id = self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO alerts
                    (aircraft_id, maintenance_log_id, title, message, severity, target_role,
                     is_resolved, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
                ",
                params![
                    alert.aircraft_id,
                    alert.maintenance_log_id,
                    alert.title,
                    alert.message,
                    alert.severity,
                    alert.target_role,
                    encode_time(&created_at),
                ],
            )
            .map_err(|e| constraint_error(e, "alert"))?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Alert {
            id,
            aircraft_id: alert.aircraft_id,
            maintenance_log_id: alert.maintenance_log_id,
            title: alert.title.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            target_role: alert.target_role,
            is_resolved: false,
            created_at,
        })
    }

    /// Get an alert by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_alert(&self, id: i64) -> Result<Option<Alert>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
                    [id],
                    row_to_alert,
                )
                .optional()?)
        })
    }

    /// Flip an alert to resolved.
    ///
    /// Returns `false` if the alert was already resolved (or does not
    /// exist), in which case nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn mark_alert_resolved(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE alerts SET is_resolved = 1 WHERE id = ?1 AND is_resolved = 0",
                [id],
            )?;
            Ok(affected == 1)
        })
    }

    /// List alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_alerts(&self, unresolved_only: bool) -> Result<Vec<Alert>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE ?1 = 0 OR is_resolved = 0
                 ORDER BY id DESC"
            ))?;
            let alerts = stmt
                .query_map([unresolved_only], row_to_alert)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
    }
}

fn row_to_maintenance_log(row: &Row<'_>) -> rusqlite::Result<MaintenanceLog> {
    Ok(MaintenanceLog {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        total_flight_hours: row.get(2)?,
        last_maintenance_date: date_column(row, 3)?,
        component_status: row.get(4)?,
        maintenance_notes: row.get(5)?,
        logged_by_id: row.get(6)?,
        created_at: time_column(row, 7)?,
    })
}

fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        maintenance_log_id: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        severity: row.get(5)?,
        target_role: row.get(6)?,
        is_resolved: row.get(7)?,
        created_at: time_column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateActor, CreateAircraft, CreateBase, Role, Severity};
    use chrono::NaiveDate;

    fn seeded() -> (Storage, i64, i64) {
        let storage = Storage::open_in_memory().unwrap();
        let actor = storage
            .insert_actor(
                &CreateActor {
                    username: "eng".to_string(),
                    password: String::new(),
                    first_name: None,
                    last_name: None,
                    email: None,
                    role: Role::Maintenance,
                },
                "h",
            )
            .unwrap();
        let base = storage
            .insert_base(&CreateBase {
                name: "Main".to_string(),
                location: "Accra".to_string(),
            })
            .unwrap();
        let aircraft = storage
            .insert_aircraft(&CreateAircraft {
                tail_number: "GAF-201".to_string(),
                model: "Mi-17".to_string(),
                maintenance_threshold_hours: Some(50.0),
                status: None,
                home_base_id: base.id,
            })
            .unwrap();
        (storage, actor.id, aircraft.id)
    }

    fn log(aircraft_id: i64) -> CreateMaintenanceLog {
        CreateMaintenanceLog {
            aircraft_id,
            total_flight_hours: 12.5,
            last_maintenance_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            component_status: "Rotor blades nominal".to_string(),
            maintenance_notes: Some("Next check in 30h".to_string()),
        }
    }

    fn alert_for(log: &MaintenanceLog) -> NewAlert {
        NewAlert {
            aircraft_id: log.aircraft_id,
            maintenance_log_id: log.id,
            title: "Maintenance Threshold Reached".to_string(),
            message: "over".to_string(),
            severity: Severity::High,
            target_role: Role::Maintenance,
        }
    }

    #[test]
    fn test_insert_and_list_logs() {
        let (storage, actor_id, aircraft_id) = seeded();
        let created = storage.insert_maintenance_log(&log(aircraft_id), actor_id).unwrap();

        let all = storage.list_maintenance_logs(None, 10).unwrap();
        assert_eq!(all, vec![created]);
        assert!(storage.list_maintenance_logs(Some(999), 10).unwrap().is_empty());
    }

    #[test]
    fn test_logs_are_append_only() {
        let (storage, actor_id, aircraft_id) = seeded();
        let created = storage.insert_maintenance_log(&log(aircraft_id), actor_id).unwrap();
        let result = storage.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE maintenance_logs SET total_flight_hours = 0 WHERE id = ?1",
                [created.id],
            )?)
        });
        assert!(result.is_err());

        let result = storage.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM maintenance_logs WHERE id = ?1", [created.id])?)
        });
        assert!(result.is_err());
        assert_eq!(storage.list_maintenance_logs(None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_flips_once() {
        let (storage, actor_id, aircraft_id) = seeded();
        let created = storage.insert_maintenance_log(&log(aircraft_id), actor_id).unwrap();
        let alert = storage.insert_alert(&alert_for(&created)).unwrap();
        assert!(!alert.is_resolved);
        assert_eq!(storage.list_alerts(true).unwrap().len(), 1);

        assert!(storage.mark_alert_resolved(alert.id).unwrap());
        assert!(!storage.mark_alert_resolved(alert.id).unwrap());
        assert!(storage.get_alert(alert.id).unwrap().unwrap().is_resolved);
        assert!(storage.list_alerts(true).unwrap().is_empty());
        assert_eq!(storage.list_alerts(false).unwrap().len(), 1);
    }

    #[test]
    fn test_alert_round_trip() {
        let (storage, actor_id, aircraft_id) = seeded();
        let created = storage.insert_maintenance_log(&log(aircraft_id), actor_id).unwrap();
        let alert = storage.insert_alert(&alert_for(&created)).unwrap();
        assert_eq!(storage.get_alert(alert.id).unwrap().unwrap(), alert);
        assert!(storage.get_alert(alert.id + 1).unwrap().is_none());
    }
}

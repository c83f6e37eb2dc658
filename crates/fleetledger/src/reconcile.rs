//! Cross-check domain tables against the ledger.
//!
//! A mutation whose ledger append failed leaves a record with no matching
//! entry. [`scan`] finds them. Updates are matched by count: each mutable
//! table carries a revision counter bumped on every write, and the ledger
//! must hold at least that many `UPDATE` entries for the row.

use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::models::{entity, AuditAction};
use crate::storage::Storage;

/// A record the ledger does not account for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    /// Ledger entity label of the record.
    pub entity: &'static str,
    /// Record id.
    pub entity_id: i64,
    /// The entry that should exist but doesn't.
    pub missing: AuditAction,
}

/// Tables whose every row must have a `CREATE` entry.
const AUDITED_TABLES: &[(&str, &str)] = &[
    (entity::USER, "actors"),
    (entity::BASE, "bases"),
    (entity::CREW, "crew"),
    (entity::AIRCRAFT, "aircraft"),
    (entity::FLIGHT_LOG, "flight_logs"),
    (entity::MAINTENANCE_LOG, "maintenance_logs"),
    (entity::ALERT, "alerts"),
];

/// Revision counters and the ledger entries each one stands for.
const REVISION_COUNTERS: &[(&str, &str, &str, AuditAction)] = &[
    (entity::USER, "actors", "revision", AuditAction::Update),
    (entity::USER, "actors", "role_revision", AuditAction::RoleChange),
    (entity::AIRCRAFT, "aircraft", "revision", AuditAction::Update),
];

/// List every record lacking its ledger entry.
///
/// Every row needs a `CREATE` entry; resolved alerts also need an `UPDATE`.
/// Accounts and aircraft need one `UPDATE` per revision, and accounts one
/// `ROLE_CHANGE` per role revision.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn scan(storage: &Storage) -> Result<Vec<Discrepancy>> {
    let mut found = Vec::new();

    for &(label, table) in AUDITED_TABLES {
        let audited = storage.audited_subjects(AuditAction::Create, label)?;
        for id in ids(storage, &format!("SELECT id FROM {table} ORDER BY id"))? {
            if !audited.contains(&id) {
                found.push(Discrepancy {
                    entity: label,
                    entity_id: id,
                    missing: AuditAction::Create,
                });
            }
        }
    }

    let updated = storage.audited_subjects(AuditAction::Update, entity::ALERT)?;
    for id in ids(storage, "SELECT id FROM alerts WHERE is_resolved = 1 ORDER BY id")? {
        if !updated.contains(&id) {
            found.push(Discrepancy {
                entity: entity::ALERT,
                entity_id: id,
                missing: AuditAction::Update,
            });
        }
    }

    for &(label, table, column, action) in REVISION_COUNTERS {
        let recorded = storage.audit_counts(action, label)?;
        let sql = format!("SELECT id, {column} FROM {table} WHERE {column} > 0 ORDER BY id");
        for (id, revisions) in counters(storage, &sql)? {
            if recorded.get(&id).copied().unwrap_or(0) < revisions {
                found.push(Discrepancy {
                    entity: label,
                    entity_id: id,
                    missing: action,
                });
            }
        }
    }

    for d in &found {
        warn!(entity = d.entity, id = d.entity_id, missing = %d.missing, "Unaudited record");
    }
    Ok(found)
}

fn ids(storage: &Storage, sql: &str) -> Result<Vec<i64>> {
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    })
}

fn counters(storage: &Storage, sql: &str) -> Result<Vec<(i64, i64)>> {
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AircraftStatus, CreateBase, Role, UpdateActor, UpdateAircraft};
    use crate::services::testing::Fixture;

    fn take_ledger_offline(f: &Fixture) {
        f.services
            .storage
            .with_conn(|conn| {
                conn.execute_batch("ALTER TABLE audit_log RENAME TO audit_log_offline;")?;
                Ok(())
            })
            .unwrap();
    }

    fn bring_ledger_back(f: &Fixture) {
        f.services
            .storage
            .with_conn(|conn| {
                conn.execute_batch("ALTER TABLE audit_log_offline RENAME TO audit_log;")?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_clean_database_has_no_discrepancies() {
        let f = Fixture::new();
        let base = f.base("North");
        f.aircraft("GAF-101", 100.0, base);
        assert!(scan(&f.services.storage).unwrap().is_empty());
    }

    #[test]
    fn test_unaudited_write_is_found() {
        let f = Fixture::new();
        f.services
            .storage
            .insert_base(&CreateBase {
                name: "Ghost".to_string(),
                location: "Nowhere".to_string(),
            })
            .unwrap();

        let found = scan(&f.services.storage).unwrap();
        assert_eq!(
            found,
            vec![Discrepancy {
                entity: "Base",
                entity_id: 1,
                missing: AuditAction::Create,
            }]
        );
    }

    #[test]
    fn test_resolved_alert_without_update_is_found() {
        let f = Fixture::new();
        let base = f.base("North");
        let aircraft = f.aircraft("GAF-101", 10.0, base);
        let outcome = f
            .services
            .maintenance
            .create_log(
                &f.admin,
                crate::models::CreateMaintenanceLog {
                    aircraft_id: aircraft,
                    total_flight_hours: 12.0,
                    last_maintenance_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                    component_status: "due".to_string(),
                    maintenance_notes: None,
                },
                None,
            )
            .unwrap();
        let alert = outcome.alert.unwrap();
        f.services.storage.mark_alert_resolved(alert.id).unwrap();

        let found = scan(&f.services.storage).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, alert.id);
        assert_eq!(found[0].missing, AuditAction::Update);
    }

    #[test]
    fn test_failed_append_is_detected_afterwards() {
        let f = Fixture::new();
        take_ledger_offline(&f);

        let err = f
            .services
            .operations
            .create_base(
                &f.admin,
                CreateBase {
                    name: "North".to_string(),
                    location: "Tamale".to_string(),
                },
                None,
            )
            .unwrap_err();
        assert!(err.is_integrity_alarm());
        assert_eq!(f.services.storage.list_bases().unwrap().len(), 1);

        bring_ledger_back(&f);
        let found = scan(&f.services.storage).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity, "Base");
    }

    #[test]
    fn test_audited_updates_are_accounted_for() {
        let f = Fixture::new();
        let ops = f.actor("ops", Role::FlightOperations);
        f.services
            .users
            .update(
                &f.admin,
                ops.id,
                UpdateActor {
                    role: Some(Role::Commander),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap();
        let base = f.base("North");
        let aircraft = f.aircraft("GAF-101", 100.0, base);
        f.services
            .operations
            .update_aircraft(
                &f.admin,
                aircraft,
                UpdateAircraft {
                    status: Some(AircraftStatus::Grounded),
                    ..UpdateAircraft::default()
                },
                None,
            )
            .unwrap();

        assert!(scan(&f.services.storage).unwrap().is_empty());
    }

    #[test]
    fn test_unaudited_role_change_is_detected() {
        let f = Fixture::new();
        let ops = f.actor("ops", Role::FlightOperations);

        take_ledger_offline(&f);
        let err = f
            .services
            .users
            .update(
                &f.admin,
                ops.id,
                UpdateActor {
                    role: Some(Role::Administrator),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap_err();
        assert!(err.is_integrity_alarm());
        bring_ledger_back(&f);

        let stored = f.services.storage.get_actor(ops.id).unwrap().unwrap();
        assert_eq!(stored.role, Role::Administrator);
        let found = scan(&f.services.storage).unwrap();
        assert_eq!(
            found,
            vec![
                Discrepancy {
                    entity: "User",
                    entity_id: ops.id,
                    missing: AuditAction::Update,
                },
                Discrepancy {
                    entity: "User",
                    entity_id: ops.id,
                    missing: AuditAction::RoleChange,
                },
            ]
        );
    }

    #[test]
    fn test_second_unaudited_update_is_detected() {
        let f = Fixture::new();
        let ops = f.actor("ops", Role::FlightOperations);
        let rename = |first_name: &str| UpdateActor {
            first_name: Some(first_name.to_string()),
            ..UpdateActor::default()
        };
        f.services.users.update(&f.admin, ops.id, rename("Ama"), None).unwrap();

        take_ledger_offline(&f);
        assert!(f
            .services
            .users
            .update(&f.admin, ops.id, rename("Akosua"), None)
            .unwrap_err()
            .is_integrity_alarm());
        bring_ledger_back(&f);

        let found = scan(&f.services.storage).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].missing, AuditAction::Update);
        assert_eq!(found[0].entity_id, ops.id);
    }

    #[test]
    fn test_unaudited_aircraft_update_is_detected() {
        let f = Fixture::new();
        let base = f.base("North");
        let aircraft = f.aircraft("GAF-101", 100.0, base);

        take_ledger_offline(&f);
        let err = f
            .services
            .operations
            .update_aircraft(
                &f.admin,
                aircraft,
                UpdateAircraft {
                    status: Some(AircraftStatus::Grounded),
                    ..UpdateAircraft::default()
                },
                None,
            )
            .unwrap_err();
        assert!(err.is_integrity_alarm());
        bring_ledger_back(&f);

        let found = scan(&f.services.storage).unwrap();
        assert_eq!(
            found,
            vec![Discrepancy {
                entity: "Aircraft",
                entity_id: aircraft,
                missing: AuditAction::Update,
            }]
        );
    }
}

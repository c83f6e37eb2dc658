//! Bases, crew, aircraft and flight log queries.

use chrono::SubsecRound;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{constraint_error, encode_time, now, sql_limit, time_column, Storage};
use crate::error::Result;
use crate::models::{
    Aircraft, Base, CreateAircraft, CreateBase, CreateCrew, CreateFlightLog, Crew, FlightLog,
    DEFAULT_THRESHOLD_HOURS,
};

const AIRCRAFT_COLUMNS: &str =
    "id, tail_number, model, maintenance_threshold_hours, status, home_base_id";

const FLIGHT_LOG_COLUMNS: &str = r"
    f.id, f.aircraft_id, f.pilot_name, f.mission_type, f.mission_status, f.flight_datetime,
    f.flight_hours, f.fuel_used, f.departure_base_id, f.arrival_base_id, f.remarks,
    f.logged_by_id, f.created_at,
    (SELECT group_concat(c.crew_id) FROM flight_log_crew c WHERE c.flight_log_id = f.id)
";

impl Storage {
    /// Insert a base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) if the name is taken, or a query error.
    pub fn insert_base(&self, dto: &CreateBase) -> Result<Base> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bases (name, location) VALUES (?1, ?2)",
                params![dto.name, dto.location],
            )
            .map_err(|e| constraint_error(e, &format!("base '{}'", dto.name)))?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(Base {
            id,
            name: dto.name.clone(),
            location: dto.location.clone(),
        })
    }

    /// Get a base by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_base(&self, id: i64) -> Result<Option<Base>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, location FROM bases WHERE id = ?1",
                    [id],
                    row_to_base,
                )
                .optional()?)
        })
    }

    /// List every base by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_bases(&self) -> Result<Vec<Base>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, location FROM bases ORDER BY name")?;
            let bases = stmt
                .query_map([], row_to_base)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(bases)
        })
    }

    /// Insert a crew member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_crew(&self, dto: &CreateCrew) -> Result<Crew> {
        let is_available = dto.is_available.unwrap_or(true);
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO crew (full_name, rank, role, is_available) VALUES (?1, ?2, ?3, ?4)",
                params![dto.full_name, dto.rank, dto.role, is_available],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(Crew {
            id,
            full_name: dto.full_name.clone(),
            rank: dto.rank.clone(),
            role: dto.role.clone(),
            is_available,
        })
    }

    /// Get a crew member by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_crew(&self, id: i64) -> Result<Option<Crew>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, full_name, rank, role, is_available FROM crew WHERE id = ?1",
                    [id],
                    row_to_crew,
                )
                .optional()?)
        })
    }

    /// List every crew member by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_crew(&self) -> Result<Vec<Crew>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, full_name, rank, role, is_available FROM crew ORDER BY full_name",
            )?;
            let crew = stmt
                .query_map([], row_to_crew)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(crew)
        })
    }

    /// Insert an aircraft, applying the threshold and status defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) if the tail number is taken, or a query error.
    pub fn insert_aircraft(&self, dto: &CreateAircraft) -> Result<Aircraft> {
        let threshold = dto
            .maintenance_threshold_hours
            .unwrap_or(DEFAULT_THRESHOLD_HOURS);
        let status = dto.status.unwrap_or_default();
        let id = self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO aircraft (tail_number, model, maintenance_threshold_hours, status, home_base_id)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![dto.tail_number, dto.model, threshold, status, dto.home_base_id],
            )
            .map_err(|e| constraint_error(e, &format!("aircraft '{}'", dto.tail_number)))?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(Aircraft {
            id,
            tail_number: dto.tail_number.clone(),
            model: dto.model.clone(),
            maintenance_threshold_hours: threshold,
            status,
            home_base_id: dto.home_base_id,
        })
    }

    /// Get an aircraft by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_aircraft(&self, id: i64) -> Result<Option<Aircraft>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE id = ?1"),
                    [id],
                    row_to_aircraft,
                )
                .optional()?)
        })
    }

    /// Persist every mutable field of `aircraft` and bump its `revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home base does not exist or the database
    /// operation fails.
    pub fn update_aircraft(&self, aircraft: &Aircraft) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                UPDATE aircraft
                SET model = ?2, maintenance_threshold_hours = ?3, status = ?4,
                    home_base_id = ?5, revision = revision + 1
                WHERE id = ?1
                ",
                params![
                    aircraft.id,
                    aircraft.model,
                    aircraft.maintenance_threshold_hours,
                    aircraft.status,
                    aircraft.home_base_id,
                ],
            )
            .map_err(|e| constraint_error(e, &format!("aircraft '{}'", aircraft.tail_number)))?;
            Ok(())
        })
    }

    /// List every aircraft by tail number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_aircraft(&self) -> Result<Vec<Aircraft>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AIRCRAFT_COLUMNS} FROM aircraft ORDER BY tail_number"
            ))?;
            let aircraft = stmt
                .query_map([], row_to_aircraft)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(aircraft)
        })
    }

    /// Insert a flight log and its crew assignments in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written
    /// in that case.
    pub fn insert_flight_log(&self, dto: &CreateFlightLog, logged_by_id: i64) -> Result<FlightLog> {
        let created_at = now();
        let mission_status = dto.mission_status.unwrap_or_default();
        let mut crew_member_ids = dto.crew_member_ids.clone();
        crew_member_ids.sort_unstable();
        crew_member_ids.dedup();
        let flight_datetime = dto.flight_datetime.trunc_subsecs(3);

        let id = self.transaction(TransactionBehavior::Deferred, |conn| {
            conn.execute(
                r"
                INSERT INTO flight_logs
                    (aircraft_id, pilot_name, mission_type, mission_status, flight_datetime,
                     flight_hours, fuel_used, departure_base_id, arrival_base_id, remarks,
                     logged_by_id, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                ",
                params![
                    dto.aircraft_id,
                    dto.pilot_name,
                    dto.mission_type,
                    mission_status,
                    encode_time(&flight_datetime),
                    dto.flight_hours,
                    dto.fuel_used,
                    dto.departure_base_id,
                    dto.arrival_base_id,
                    dto.remarks,
                    logged_by_id,
                    encode_time(&created_at),
                ],
            )
            .map_err(|e| constraint_error(e, "flight log"))?;
            let id = conn.last_insert_rowid();

            let mut stmt = conn
                .prepare("INSERT INTO flight_log_crew (flight_log_id, crew_id) VALUES (?1, ?2)")?;
            for crew_id in &crew_member_ids {
                stmt.execute(params![id, crew_id])
                    .map_err(|e| constraint_error(e, "flight crew assignment"))?;
            }
            Ok(id)
        })?;

        Ok(FlightLog {
            id,
            aircraft_id: dto.aircraft_id,
            pilot_name: dto.pilot_name.clone(),
            crew_member_ids,
            mission_type: dto.mission_type.clone(),
            mission_status,
            flight_datetime,
            flight_hours: dto.flight_hours,
            fuel_used: dto.fuel_used,
            departure_base_id: dto.departure_base_id,
            arrival_base_id: dto.arrival_base_id,
            remarks: dto.remarks.clone(),
            logged_by_id: Some(logged_by_id),
            created_at,
        })
    }

    /// Get a flight log by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_flight_log(&self, id: i64) -> Result<Option<FlightLog>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {FLIGHT_LOG_COLUMNS} FROM flight_logs f WHERE f.id = ?1"),
                    [id],
                    row_to_flight_log,
                )
                .optional()?)
        })
    }

    /// List the most recent flight logs, newest flight first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_flight_logs(&self, limit: usize) -> Result<Vec<FlightLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FLIGHT_LOG_COLUMNS} FROM flight_logs f
                 ORDER BY f.flight_datetime DESC, f.id DESC LIMIT ?1"
            ))?;
            let logs = stmt
                .query_map([sql_limit(limit)], row_to_flight_log)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }

    /// Count flight logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_flight_logs(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM flight_logs", [], |row| row.get(0))?)
        })
    }
}

fn row_to_base(row: &Row<'_>) -> rusqlite::Result<Base> {
    Ok(Base {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
    })
}

fn row_to_crew(row: &Row<'_>) -> rusqlite::Result<Crew> {
    Ok(Crew {
        id: row.get(0)?,
        full_name: row.get(1)?,
        rank: row.get(2)?,
        role: row.get(3)?,
        is_available: row.get(4)?,
    })
}

fn row_to_aircraft(row: &Row<'_>) -> rusqlite::Result<Aircraft> {
    Ok(Aircraft {
        id: row.get(0)?,
        tail_number: row.get(1)?,
        model: row.get(2)?,
        maintenance_threshold_hours: row.get(3)?,
        status: row.get(4)?,
        home_base_id: row.get(5)?,
    })
}

fn row_to_flight_log(row: &Row<'_>) -> rusqlite::Result<FlightLog> {
    let crew: Option<String> = row.get(13)?;
    let crew_member_ids = crew
        .as_deref()
        .map(parse_id_list)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
        })?
        .unwrap_or_default();

    Ok(FlightLog {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        pilot_name: row.get(2)?,
        mission_type: row.get(3)?,
        mission_status: row.get(4)?,
        flight_datetime: time_column(row, 5)?,
        flight_hours: row.get(6)?,
        fuel_used: row.get(7)?,
        departure_base_id: row.get(8)?,
        arrival_base_id: row.get(9)?,
        remarks: row.get(10)?,
        logged_by_id: row.get(11)?,
        created_at: time_column(row, 12)?,
        crew_member_ids,
    })
}

fn parse_id_list(raw: &str) -> std::result::Result<Vec<i64>, std::num::ParseIntError> {
    let mut ids = raw
        .split(',')
        .map(str::parse)
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    ids.sort_unstable();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{AircraftStatus, CreateActor, MissionStatus, Role};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        storage: Storage,
        actor_id: i64,
        north: Base,
        south: Base,
    }

    fn fixture() -> Fixture {
        let storage = Storage::open_in_memory().unwrap();
        let actor = storage
            .insert_actor(
                &CreateActor {
                    username: "ops".to_string(),
                    password: String::new(),
                    first_name: None,
                    last_name: None,
                    email: None,
                    role: Role::FlightOperations,
                },
                "h",
            )
            .unwrap();
        let north = storage
            .insert_base(&CreateBase {
                name: "North".to_string(),
                location: "Tamale".to_string(),
            })
            .unwrap();
        let south = storage
            .insert_base(&CreateBase {
                name: "South".to_string(),
                location: "Takoradi".to_string(),
            })
            .unwrap();
        Fixture {
            storage,
            actor_id: actor.id,
            north,
            south,
        }
    }

    fn aircraft(tail: &str, home_base_id: i64) -> CreateAircraft {
        CreateAircraft {
            tail_number: tail.to_string(),
            model: "C-295".to_string(),
            maintenance_threshold_hours: None,
            status: None,
            home_base_id,
        }
    }

    #[test]
    fn test_base_name_is_unique() {
        let fx = fixture();
        let err = fx
            .storage
            .insert_base(&CreateBase {
                name: "North".to_string(),
                location: "Elsewhere".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(fx.storage.list_bases().unwrap().len(), 2);
    }

    #[test]
    fn test_crew_defaults_to_available() {
        let fx = fixture();
        let crew = fx
            .storage
            .insert_crew(&CreateCrew {
                full_name: "Sgt Boateng".to_string(),
                rank: "Sergeant".to_string(),
                role: "Loadmaster".to_string(),
                is_available: None,
            })
            .unwrap();
        assert!(crew.is_available);
        assert!(fx.storage.get_crew(crew.id).unwrap().unwrap().is_available);
    }

    #[test]
    fn test_aircraft_defaults() {
        let fx = fixture();
        let created = fx.storage.insert_aircraft(&aircraft("GAF-101", fx.north.id)).unwrap();
        let loaded = fx.storage.get_aircraft(created.id).unwrap().unwrap();
        assert_eq!(loaded.maintenance_threshold_hours, DEFAULT_THRESHOLD_HOURS);
        assert_eq!(loaded.status, AircraftStatus::Available);
        assert_eq!(loaded, created);
    }

    #[test]
    fn test_aircraft_tail_is_unique() {
        let fx = fixture();
        fx.storage.insert_aircraft(&aircraft("GAF-101", fx.north.id)).unwrap();
        let err = fx
            .storage
            .insert_aircraft(&aircraft("GAF-101", fx.south.id))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_update_aircraft() {
        let fx = fixture();
        let mut plane = fx.storage.insert_aircraft(&aircraft("GAF-101", fx.north.id)).unwrap();
        plane.status = AircraftStatus::Grounded;
        plane.home_base_id = fx.south.id;
        fx.storage.update_aircraft(&plane).unwrap();

        assert_eq!(fx.storage.get_aircraft(plane.id).unwrap().unwrap(), plane);
        let revision: i64 = fx
            .storage
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT revision FROM aircraft WHERE id = ?1", [plane.id], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(revision, 1);
    }

    #[test]
    fn test_flight_log_round_trips_crew() {
        let fx = fixture();
        let plane = fx.storage.insert_aircraft(&aircraft("GAF-101", fx.north.id)).unwrap();
        let mut crew_ids = Vec::new();
        for name in ["A", "B"] {
            crew_ids.push(
                fx.storage
                    .insert_crew(&CreateCrew {
                        full_name: name.to_string(),
                        rank: "Cpl".to_string(),
                        role: "Crew chief".to_string(),
                        is_available: Some(false),
                    })
                    .unwrap()
                    .id,
            );
        }

        let dto = CreateFlightLog {
            aircraft_id: plane.id,
            pilot_name: "Flt Lt Asante".to_string(),
            crew_member_ids: vec![crew_ids[1], crew_ids[0], crew_ids[1]],
            mission_type: "Transport".to_string(),
            mission_status: Some(MissionStatus::Active),
            flight_datetime: Utc.with_ymd_and_hms(2026, 5, 4, 6, 30, 0).unwrap(),
            flight_hours: 3.2,
            fuel_used: 410.0,
            departure_base_id: fx.north.id,
            arrival_base_id: fx.south.id,
            remarks: Some("Crosswind on arrival".to_string()),
        };
        let created = fx.storage.insert_flight_log(&dto, fx.actor_id).unwrap();
        assert_eq!(created.crew_member_ids, crew_ids);

        let loaded = fx.storage.get_flight_log(created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(fx.storage.list_flight_logs(10).unwrap().len(), 1);
    }

    #[test]
    fn test_flight_log_without_crew() {
        let fx = fixture();
        let plane = fx.storage.insert_aircraft(&aircraft("GAF-102", fx.north.id)).unwrap();
        let dto = CreateFlightLog {
            aircraft_id: plane.id,
            pilot_name: "Lt Addo".to_string(),
            crew_member_ids: vec![],
            mission_type: "Training".to_string(),
            mission_status: None,
            flight_datetime: Utc::now(),
            flight_hours: 1.0,
            fuel_used: 90.0,
            departure_base_id: fx.north.id,
            arrival_base_id: fx.south.id,
            remarks: None,
        };
        let created = fx.storage.insert_flight_log(&dto, fx.actor_id).unwrap();
        let loaded = fx.storage.get_flight_log(created.id).unwrap().unwrap();
        assert!(loaded.crew_member_ids.is_empty());
        assert_eq!(loaded.mission_status, MissionStatus::Completed);
    }

    #[test]
    fn test_flight_log_missing_crew_writes_nothing() {
        let fx = fixture();
        let plane = fx.storage.insert_aircraft(&aircraft("GAF-103", fx.north.id)).unwrap();
        let dto = CreateFlightLog {
            aircraft_id: plane.id,
            pilot_name: "Lt Addo".to_string(),
            crew_member_ids: vec![404],
            mission_type: "Training".to_string(),
            mission_status: None,
            flight_datetime: Utc::now(),
            flight_hours: 1.0,
            fuel_used: 90.0,
            departure_base_id: fx.north.id,
            arrival_base_id: fx.south.id,
            remarks: None,
        };
        assert!(fx.storage.insert_flight_log(&dto, fx.actor_id).is_err());
        assert_eq!(fx.storage.count_flight_logs().unwrap(), 0);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("3,1,2").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("1,x").is_err());
    }
}

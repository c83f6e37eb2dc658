//! `SQLite` schema definitions for fleetledger.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the actors table.
pub const CREATE_ACTORS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS actors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0,
    role_revision INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create the bases table.
pub const CREATE_BASES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS bases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    location TEXT NOT NULL
)
";

/// SQL statement to create the crew table.
pub const CREATE_CREW_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS crew (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    rank TEXT NOT NULL,
    role TEXT NOT NULL,
    is_available INTEGER NOT NULL DEFAULT 1
)
";

/// SQL statement to create the aircraft table.
pub const CREATE_AIRCRAFT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tail_number TEXT NOT NULL UNIQUE,
    model TEXT NOT NULL,
    maintenance_threshold_hours REAL NOT NULL DEFAULT 100,
    status TEXT NOT NULL DEFAULT 'available',
    home_base_id INTEGER NOT NULL REFERENCES bases(id),
    revision INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create the flight logs table.
pub const CREATE_FLIGHT_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id),
    pilot_name TEXT NOT NULL,
    mission_type TEXT NOT NULL,
    mission_status TEXT NOT NULL DEFAULT 'completed',
    flight_datetime TEXT NOT NULL,
    flight_hours REAL NOT NULL,
    fuel_used REAL NOT NULL,
    departure_base_id INTEGER NOT NULL REFERENCES bases(id),
    arrival_base_id INTEGER NOT NULL REFERENCES bases(id),
    remarks TEXT,
    logged_by_id INTEGER REFERENCES actors(id),
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the flight log / crew join table.
pub const CREATE_FLIGHT_LOG_CREW_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_log_crew (
    flight_log_id INTEGER NOT NULL REFERENCES flight_logs(id),
    crew_id INTEGER NOT NULL REFERENCES crew(id),
    PRIMARY KEY (flight_log_id, crew_id)
)
";

/// SQL statement to create the maintenance logs table.
pub const CREATE_MAINTENANCE_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maintenance_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id),
    total_flight_hours REAL NOT NULL,
    last_maintenance_date TEXT NOT NULL,
    component_status TEXT NOT NULL,
    maintenance_notes TEXT,
    logged_by_id INTEGER REFERENCES actors(id),
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the alerts table.
pub const CREATE_ALERTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id),
    maintenance_log_id INTEGER NOT NULL REFERENCES maintenance_logs(id),
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    target_role TEXT NOT NULL,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the audit ledger.
///
/// `actor_id` carries no foreign key; listings tolerate ids that no longer
/// resolve.
pub const CREATE_AUDIT_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id INTEGER,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id INTEGER,
    description TEXT NOT NULL,
    source_address TEXT,
    created_at TEXT NOT NULL,
    previous_checksum TEXT NOT NULL,
    checksum TEXT NOT NULL
)
";

/// Index for flights-today queries.
pub const CREATE_FLIGHT_DATETIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flight_logs_datetime ON flight_logs(flight_datetime)
";

/// Index for reconciliation lookups by subject.
pub const CREATE_AUDIT_SUBJECT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_audit_log_subject ON audit_log(entity, entity_id)
";

/// Rejects every UPDATE of a ledger row.
pub const CREATE_AUDIT_NO_UPDATE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END
";

/// Rejects every DELETE of a ledger row.
pub const CREATE_AUDIT_NO_DELETE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END
";

/// Rejects every UPDATE of a maintenance log.
pub const CREATE_MAINTENANCE_NO_UPDATE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS maintenance_logs_no_update
BEFORE UPDATE ON maintenance_logs
BEGIN
    SELECT RAISE(ABORT, 'maintenance_logs is append-only');
END
";

/// Rejects every DELETE of a maintenance log.
pub const CREATE_MAINTENANCE_NO_DELETE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS maintenance_logs_no_delete
BEFORE DELETE ON maintenance_logs
BEGIN
    SELECT RAISE(ABORT, 'maintenance_logs is append-only');
END
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ACTORS_TABLE,
    CREATE_BASES_TABLE,
    CREATE_CREW_TABLE,
    CREATE_AIRCRAFT_TABLE,
    CREATE_FLIGHT_LOGS_TABLE,
    CREATE_FLIGHT_LOG_CREW_TABLE,
    CREATE_MAINTENANCE_LOGS_TABLE,
    CREATE_ALERTS_TABLE,
    CREATE_AUDIT_LOG_TABLE,
    CREATE_FLIGHT_DATETIME_INDEX,
    CREATE_AUDIT_SUBJECT_INDEX,
    CREATE_AUDIT_NO_UPDATE_TRIGGER,
    CREATE_AUDIT_NO_DELETE_TRIGGER,
    CREATE_MAINTENANCE_NO_UPDATE_TRIGGER,
    CREATE_MAINTENANCE_NO_DELETE_TRIGGER,
    CREATE_METADATA_TABLE,
];

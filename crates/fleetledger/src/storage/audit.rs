//! Audit ledger rows.
//!
//! Only [`Ledger`](crate::ledger::Ledger) writes here, through
//! [`insert_audit_entry`] inside its append transaction.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{encode_time, sql_limit, time_column, Storage};
use crate::error::Result;
use crate::models::{ActorSummary, AuditAction, AuditEntry, AuditRecord};

const ENTRY_COLUMNS: &str = r"
    l.id, l.actor_id, l.action, l.entity, l.entity_id, l.description, l.source_address,
    l.created_at, l.previous_checksum, l.checksum
";

/// Checksum of the newest entry, if any.
pub(crate) fn latest_checksum(conn: &Connection) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT checksum FROM audit_log ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?)
}

/// Insert a fully chained entry and return its sequence id.
pub(crate) fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO audit_log
            (actor_id, action, entity, entity_id, description, source_address, created_at,
             previous_checksum, checksum)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
        params![
            entry.actor_id,
            entry.action,
            entry.entity,
            entry.entity_id,
            entry.description,
            entry.source_address,
            encode_time(&entry.created_at),
            entry.previous_checksum,
            entry.checksum,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Storage {
    /// The newest `limit` entries with their actors, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_audit_records(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS}, a.id, a.username, a.role
                 FROM audit_log l LEFT JOIN actors a ON a.id = l.actor_id
                 ORDER BY l.id DESC LIMIT ?1"
            ))?;
            let records = stmt
                .query_map([sql_limit(limit)], |row| {
                    let entry = row_to_entry(row)?;
                    let actor = match row.get::<_, Option<i64>>(10)? {
                        Some(id) => Some(ActorSummary {
                            id,
                            username: row.get(11)?,
                            role: row.get(12)?,
                        }),
                        None => None,
                    };
                    Ok(AuditRecord { entry, actor })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// Every entry in sequence order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entries_ascending(&self) -> Result<Vec<AuditEntry>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM audit_log l ORDER BY l.id"))?;
            let entries = stmt
                .query_map([], row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    /// Subject ids that have at least one entry of `action` for `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audited_subjects(&self, action: AuditAction, entity: &str) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT entity_id FROM audit_log
                 WHERE action = ?1 AND entity = ?2 AND entity_id IS NOT NULL",
            )?;
            let ids = stmt
                .query_map(params![action, entity], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }

    /// Number of `action` entries per subject id of `entity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_counts(&self, action: AuditAction, entity: &str) -> Result<HashMap<i64, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id, COUNT(*) FROM audit_log
                 WHERE action = ?1 AND entity = ?2 AND entity_id IS NOT NULL
                 GROUP BY entity_id",
            )?;
            let counts = stmt
                .query_map(params![action, entity], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;
            Ok(counts)
        })
    }

    /// Count ledger entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_audit_entries(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?)
        })
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        action: row.get(2)?,
        entity: row.get(3)?,
        entity_id: row.get(4)?,
        description: row.get(5)?,
        source_address: row.get(6)?,
        created_at: time_column(row, 7)?,
        previous_checksum: row.get(8)?,
        checksum: row.get(9)?,
    })
}

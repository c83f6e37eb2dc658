//! Actor account queries.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_error, encode_time, now, time_column, Storage};
use crate::error::Result;
use crate::models::{Actor, CreateActor};

const ACTOR_COLUMNS: &str = "id, username, first_name, last_name, email, role, is_active, password_hash, created_at";

impl Storage {
    /// Insert a new actor with an already hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) if the username
    /// is taken, or a query error.
    pub fn insert_actor(&self, dto: &CreateActor, password_hash: &str) -> Result<Actor> {
        let created_at = now();
        let id = self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO actors
                    (username, first_name, last_name, email, role, is_active, password_hash, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
                ",
                params![
                    dto.username,
                    dto.first_name,
                    dto.last_name,
                    dto.email,
                    dto.role,
                    password_hash,
                    encode_time(&created_at),
                ],
            )
            .map_err(|e| constraint_error(e, &format!("user '{}'", dto.username)))?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Actor {
            id,
            username: dto.username.clone(),
            first_name: dto.first_name.clone(),
            last_name: dto.last_name.clone(),
            email: dto.email.clone(),
            role: dto.role,
            is_active: true,
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    /// Get an actor by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_actor(&self, id: i64) -> Result<Option<Actor>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE id = ?1"),
                    [id],
                    row_to_actor,
                )
                .optional()?)
        })
    }

    /// Get an actor by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_actor_by_username(&self, username: &str) -> Result<Option<Actor>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE username = ?1"),
                    [username],
                    row_to_actor,
                )
                .optional()?)
        })
    }

    /// Persist every mutable field of `actor`.
    ///
    /// Bumps the row's `revision`, and its `role_revision` when the stored
    /// role differs from `actor.role`. Reconciliation compares both counters
    /// with the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_actor(&self, actor: &Actor) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                UPDATE actors
                SET first_name = ?2, last_name = ?3, email = ?4, role = ?5,
                    is_active = ?6, password_hash = ?7,
                    revision = revision + 1,
                    role_revision = role_revision + (role IS NOT ?5)
                WHERE id = ?1
                ",
                params![
                    actor.id,
                    actor.first_name,
                    actor.last_name,
                    actor.email,
                    actor.role,
                    actor.is_active,
                    actor.password_hash,
                ],
            )?;
            Ok(())
        })
    }

    /// List every actor in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_actors(&self) -> Result<Vec<Actor>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {ACTOR_COLUMNS} FROM actors ORDER BY id"))?;
            let actors = stmt
                .query_map([], row_to_actor)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(actors)
        })
    }

    /// Count provisioned actors.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_actors(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM actors", [], |row| row.get(0))?))
    }
}

fn row_to_actor(row: &Row<'_>) -> rusqlite::Result<Actor> {
    Ok(Actor {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        role: row.get(5)?,
        is_active: row.get(6)?,
        password_hash: row.get(7)?,
        created_at: time_column(row, 8)?,
    })
}

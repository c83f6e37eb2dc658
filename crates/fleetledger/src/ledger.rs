//! The tamper-evident audit ledger.
//!
//! Every audited event becomes one [`AuditEntry`] whose checksum covers the
//! entry's content and the checksum of the entry before it:
//!
//! ```text
//! checksum = blake3(action | entity | entity_id | actor_id | description | previous_checksum)
//! ```
//!
//! with absent ids rendered as the empty string and [`GENESIS`] standing in
//! for the predecessor of the first entry. Rewriting any hashed field of a
//! stored entry therefore breaks that entry and, through the links, every
//! entry after it. [`Ledger::verify`] walks the chain and reports where.
//!
//! The ledger is the only writer of the `audit_log` table; the table itself
//! refuses UPDATE and DELETE.

use std::sync::Arc;

use rusqlite::TransactionBehavior;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::logging::INTEGRITY_TARGET;
use crate::models::{AuditAction, AuditEntry, AuditRecord, NewAuditEntry, GENESIS};
use crate::storage::{insert_audit_entry, latest_checksum, now, Storage};

/// Smallest page [`Ledger::list`] returns.
pub const MIN_LIST_LIMIT: usize = 1;

/// Largest page [`Ledger::list`] returns.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: usize = 200;

/// Compute the chained checksum of an entry.
#[must_use]
pub fn compute_checksum(
    action: AuditAction,
    entity: &str,
    entity_id: Option<i64>,
    actor_id: Option<i64>,
    description: &str,
    previous_checksum: &str,
) -> String {
    let entity_id = entity_id.map(|id| id.to_string()).unwrap_or_default();
    let actor_id = actor_id.map(|id| id.to_string()).unwrap_or_default();
    let payload = [
        action.as_str(),
        entity,
        &entity_id,
        &actor_id,
        description,
        previous_checksum,
    ]
    .join("|");
    blake3::hash(payload.as_bytes()).to_hex().to_string()
}

fn checksum_of(entry: &AuditEntry) -> String {
    compute_checksum(
        entry.action,
        &entry.entity,
        entry.entity_id,
        entry.actor_id,
        &entry.description,
        &entry.previous_checksum,
    )
}

/// Why verification stopped trusting the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The stored checksum does not match the entry's content.
    ChecksumMismatch,
    /// The stored previous checksum does not match the preceding entry.
    BrokenLink,
}

/// The first point at which the chain fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// Sequence id of the first failing entry.
    pub id: i64,
    /// What failed.
    pub kind: BreakKind,
    /// Every sequence id from the break onward; none of them can be trusted.
    pub unverifiable: Vec<i64>,
}

/// Result of walking the chain from genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Entries examined.
    pub total: usize,
    /// Entries verified before the first break (all of them if intact).
    pub verified: usize,
    /// The first break, if any.
    pub first_break: Option<ChainBreak>,
}

impl ChainReport {
    /// Whether every entry verified.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.first_break.is_none()
    }
}

/// Appends, lists and verifies audit entries.
#[derive(Debug, Clone)]
pub struct Ledger {
    storage: Arc<Storage>,
    default_limit: usize,
}

impl Ledger {
    /// Create a ledger over the shared storage.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            default_limit: DEFAULT_LIST_LIMIT,
        }
    }

    /// Use `limit` when [`Ledger::list`] is called without one.
    #[must_use]
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = clamp_limit(Some(limit), DEFAULT_LIST_LIMIT);
        self
    }

    /// Append one entry to the chain.
    ///
    /// Reading the predecessor and inserting the new entry happen in one
    /// `BEGIN IMMEDIATE` transaction, so two appends can never chain to the
    /// same predecessor.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is appended
    /// in that case.
    pub fn append(&self, new: NewAuditEntry) -> Result<AuditEntry> {
        let entry = self
            .storage
            .transaction(TransactionBehavior::Immediate, |conn| {
                let previous_checksum =
                    latest_checksum(conn)?.unwrap_or_else(|| GENESIS.to_string());
                let checksum = compute_checksum(
                    new.action,
                    &new.entity,
                    new.entity_id,
                    new.actor_id,
                    &new.description,
                    &previous_checksum,
                );
                let mut entry = AuditEntry {
                    id: 0,
                    actor_id: new.actor_id,
                    action: new.action,
                    entity: new.entity,
                    entity_id: new.entity_id,
                    description: new.description,
                    source_address: new.source_address,
                    created_at: now(),
                    previous_checksum,
                    checksum,
                };
                entry.id = insert_audit_entry(conn, &entry)?;
                Ok(entry)
            })?;

        debug!(
            id = entry.id,
            action = %entry.action,
            entity = %entry.entity,
            entity_id = ?entry.entity_id,
            "Appended audit entry"
        );
        Ok(entry)
    }

    /// Append the entry for a domain write that has already committed.
    ///
    /// On failure the write stays in place; the failure is logged on the
    /// `fleetledger::integrity` target and returned as
    /// [`Error::Unaudited`] so the caller cannot mistake it for a rejected
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unaudited`] wrapping the append failure.
    pub fn record(&self, new: NewAuditEntry) -> Result<AuditEntry> {
        let entity = new.entity.clone();
        let entity_id = new.entity_id;
        self.append(new).map_err(|source| {
            error!(
                target: INTEGRITY_TARGET,
                entity = %entity,
                entity_id = ?entity_id,
                error = %source,
                "Domain write committed without an audit entry"
            );
            Error::Unaudited {
                entity,
                entity_id,
                source: Box::new(source),
            }
        })
    }

    /// The newest entries with their actors, newest first.
    ///
    /// `limit` defaults to the configured page size and is clamped to
    /// [`MIN_LIST_LIMIT`]..=[`MAX_LIST_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<AuditRecord>> {
        self.storage
            .list_audit_records(clamp_limit(limit, self.default_limit))
    }

    /// Walk the chain from genesis and recompute every checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. A broken chain is
    /// not an error; it is reported in the [`ChainReport`].
    pub fn verify(&self) -> Result<ChainReport> {
        let entries = self.storage.audit_entries_ascending()?;
        Ok(verify_entries(&entries))
    }
}

/// Clamp a requested page size, substituting `default` when absent.
#[must_use]
pub fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit
        .unwrap_or(default)
        .clamp(MIN_LIST_LIMIT, MAX_LIST_LIMIT)
}

fn verify_entries(entries: &[AuditEntry]) -> ChainReport {
    let mut expected_previous = GENESIS.to_string();

    for (index, entry) in entries.iter().enumerate() {
        let kind = if entry.previous_checksum != expected_previous {
            Some(BreakKind::BrokenLink)
        } else if checksum_of(entry) != entry.checksum {
            Some(BreakKind::ChecksumMismatch)
        } else {
            None
        };

        if let Some(kind) = kind {
            return ChainReport {
                total: entries.len(),
                verified: index,
                first_break: Some(ChainBreak {
                    id: entry.id,
                    kind,
                    unverifiable: entries[index..].iter().map(|e| e.id).collect(),
                }),
            };
        }
        expected_previous.clone_from(&entry.checksum);
    }

    ChainReport {
        total: entries.len(),
        verified: entries.len(),
        first_break: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ledger() -> (Arc<Storage>, Ledger) {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        (storage.clone(), Ledger::new(storage))
    }

    /// Rewrites one stored row the way an attacker with file access would.
    fn tamper(storage: &Storage, sql: &str, id: i64) {
        storage
            .with_conn(|conn| {
                conn.execute_batch("DROP TRIGGER audit_log_no_update;")?;
                conn.execute(sql, [id])?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_checksum_format() {
        let sum = compute_checksum(AuditAction::Login, "User", Some(1), Some(1), "User logged in", GENESIS);
        assert_eq!(sum.len(), 64);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_renders_absent_ids_as_empty() {
        let expected = blake3::hash(b"CREATE|User|||Bootstrapped|GENESIS").to_hex().to_string();
        assert_eq!(
            compute_checksum(AuditAction::Create, "User", None, None, "Bootstrapped", GENESIS),
            expected
        );
    }

    #[test]
    fn test_checksum_depends_on_every_field() {
        let base = compute_checksum(AuditAction::Create, "Base", Some(1), Some(2), "d", "p");
        assert_ne!(base, compute_checksum(AuditAction::Update, "Base", Some(1), Some(2), "d", "p"));
        assert_ne!(base, compute_checksum(AuditAction::Create, "Crew", Some(1), Some(2), "d", "p"));
        assert_ne!(base, compute_checksum(AuditAction::Create, "Base", Some(9), Some(2), "d", "p"));
        assert_ne!(base, compute_checksum(AuditAction::Create, "Base", Some(1), None, "d", "p"));
        assert_ne!(base, compute_checksum(AuditAction::Create, "Base", Some(1), Some(2), "e", "p"));
        assert_ne!(base, compute_checksum(AuditAction::Create, "Base", Some(1), Some(2), "d", "q"));
    }

    #[test]
    fn test_first_entry_chains_to_genesis() {
        let (_, ledger) = ledger();
        let entry = ledger
            .append(NewAuditEntry::new(AuditAction::Login, "User", "User logged in").by(1).subject(1))
            .unwrap();
        assert_eq!(entry.previous_checksum, GENESIS);
        assert_eq!(entry.id, 1);
        assert_eq!(entry.checksum, checksum_of(&entry));
    }

    #[test]
    fn test_login_create_update_scenario() {
        let (_, ledger) = ledger();
        let a = ledger
            .append(NewAuditEntry::new(AuditAction::Login, "User", "User logged in").by(1).subject(1))
            .unwrap();
        let b = ledger
            .append(NewAuditEntry::new(AuditAction::Create, "Base", "Created base North").by(1).subject(1))
            .unwrap();
        let c = ledger
            .append(NewAuditEntry::new(AuditAction::Update, "User", "Updated user ops").by(1).subject(2))
            .unwrap();

        assert_eq!(a.previous_checksum, GENESIS);
        assert_eq!(b.previous_checksum, a.checksum);
        assert_eq!(c.previous_checksum, b.checksum);

        let report = ledger.verify().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.total, 3);
        assert_eq!(report.verified, 3);
    }

    #[test]
    fn test_n_appends_verify() {
        let (_, ledger) = ledger();
        for i in 0..25 {
            ledger
                .append(NewAuditEntry::new(AuditAction::Create, "Crew", format!("Created crew {i}")).subject(i))
                .unwrap();
        }
        let report = ledger.verify().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.verified, 25);
    }

    #[test]
    fn test_empty_chain_is_intact() {
        let (_, ledger) = ledger();
        let report = ledger.verify().unwrap();
        assert!(report.is_intact());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_tampered_description_breaks_entry_and_successors() {
        let (storage, ledger) = ledger();
        for i in 1..=5 {
            ledger
                .append(NewAuditEntry::new(AuditAction::Create, "Base", format!("Created base {i}")).subject(i))
                .unwrap();
        }
        tamper(&storage, "UPDATE audit_log SET description = 'Created base X' WHERE id = ?1", 3);

        let report = ledger.verify().unwrap();
        let broken = report.first_break.unwrap();
        assert_eq!(broken.id, 3);
        assert_eq!(broken.kind, BreakKind::ChecksumMismatch);
        assert_eq!(broken.unverifiable, vec![3, 4, 5]);
        assert_eq!(report.verified, 2);
    }

    #[test]
    fn test_tampered_actor_is_detected() {
        let (storage, ledger) = ledger();
        for _ in 0..3 {
            ledger
                .append(NewAuditEntry::new(AuditAction::Update, "Alert", "Alert marked as resolved").by(4).subject(1))
                .unwrap();
        }
        tamper(&storage, "UPDATE audit_log SET actor_id = 99 WHERE id = ?1", 1);

        let broken = ledger.verify().unwrap().first_break.unwrap();
        assert_eq!(broken.id, 1);
        assert_eq!(broken.unverifiable, vec![1, 2, 3]);
    }

    #[test]
    fn test_rehashed_entry_breaks_the_next_link() {
        let (storage, ledger) = ledger();
        for i in 1..=3 {
            ledger
                .append(NewAuditEntry::new(AuditAction::Create, "Base", format!("Created base {i}")).subject(i))
                .unwrap();
        }
        let entries = storage.audit_entries_ascending().unwrap();
        let forged = compute_checksum(
            AuditAction::Create,
            "Base",
            Some(2),
            None,
            "Created base Z",
            &entries[1].previous_checksum,
        );
        storage
            .with_conn(|conn| {
                conn.execute_batch("DROP TRIGGER audit_log_no_update;")?;
                conn.execute(
                    "UPDATE audit_log SET description = 'Created base Z', checksum = ?1 WHERE id = 2",
                    [&forged],
                )?;
                Ok(())
            })
            .unwrap();

        let broken = ledger.verify().unwrap().first_break.unwrap();
        assert_eq!(broken.id, 3);
        assert_eq!(broken.kind, BreakKind::BrokenLink);
    }

    #[test]
    fn test_concurrent_appends_do_not_fork() {
        let (storage, ledger) = ledger();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        ledger
                            .append(NewAuditEntry::new(AuditAction::Create, "Crew", format!("t{t} #{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = storage.audit_entries_ascending().unwrap();
        assert_eq!(entries.len(), 80);
        let mut previous: Vec<_> = entries.iter().map(|e| e.previous_checksum.clone()).collect();
        previous.sort();
        previous.dedup();
        assert_eq!(previous.len(), 80);
        assert!(ledger.verify().unwrap().is_intact());
    }

    #[test]
    fn test_list_clamps_limit() {
        assert_eq!(clamp_limit(None, DEFAULT_LIST_LIMIT), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0), DEFAULT_LIST_LIMIT), 1);
        assert_eq!(clamp_limit(Some(5000), DEFAULT_LIST_LIMIT), 1000);
        assert_eq!(clamp_limit(Some(42), DEFAULT_LIST_LIMIT), 42);

        let (_, ledger) = ledger();
        for i in 0..3 {
            ledger
                .append(NewAuditEntry::new(AuditAction::Create, "Base", format!("b{i}")))
                .unwrap();
        }
        let page = ledger.list(Some(0)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].entry.description, "b2");
        assert_eq!(ledger.list(None).unwrap().len(), 3);
        assert_eq!(ledger.with_default_limit(2).list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_record_failure_is_an_integrity_alarm() {
        let (storage, ledger) = ledger();
        storage
            .with_conn(|conn| {
                conn.execute_batch("DROP TABLE audit_log;")?;
                Ok(())
            })
            .unwrap();

        let err = ledger
            .record(NewAuditEntry::new(AuditAction::Create, "Base", "Created base North").subject(7))
            .unwrap_err();
        assert!(err.is_integrity_alarm());
        match err {
            Error::Unaudited { entity, entity_id, .. } => {
                assert_eq!(entity, "Base");
                assert_eq!(entity_id, Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

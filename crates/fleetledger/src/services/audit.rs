//! Ledger review for audit readers.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::guard::{self, AUDIT_READERS};
use crate::ledger::{ChainReport, Ledger};
use crate::models::{AuditRecord, Principal};
use crate::reconcile::{self, Discrepancy};
use crate::storage::Storage;

/// Lists, verifies and reconciles the ledger.
#[derive(Debug, Clone)]
pub struct AuditService {
    storage: Arc<Storage>,
    ledger: Ledger,
}

impl AuditService {
    /// Create the service.
    #[must_use]
    pub fn new(storage: Arc<Storage>, ledger: Ledger) -> Self {
        Self { storage, ledger }
    }

    /// The newest entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for roles outside audit readers.
    pub fn list(&self, principal: &Principal, limit: Option<usize>) -> Result<Vec<AuditRecord>> {
        guard::require(principal, AUDIT_READERS, "read the audit log")?;
        self.ledger.list(limit)
    }

    /// Verify the whole chain.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for roles outside audit readers.
    pub fn verify(&self, principal: &Principal) -> Result<ChainReport> {
        guard::require(principal, AUDIT_READERS, "verify the audit log")?;
        let report = self.ledger.verify()?;
        info!(
            actor_id = principal.actor_id,
            total = report.total,
            intact = report.is_intact(),
            "Ledger verified"
        );
        Ok(report)
    }

    /// Domain records with no matching ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an authorization error for roles outside audit readers.
    pub fn reconcile(&self, principal: &Principal) -> Result<Vec<Discrepancy>> {
        guard::require(principal, AUDIT_READERS, "reconcile the audit log")?;
        reconcile::scan(&self.storage)
    }
}

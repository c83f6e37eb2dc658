//! Role-based capability checks.
//!
//! Every mutation calls [`require`] first with the literal set of roles it
//! admits. There is no per-record ownership.

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Principal, Role};

/// Account and fleet reference data management.
pub const ADMIN_ONLY: &[Role] = &[Role::Administrator];

/// Flight recording.
pub const FLIGHT_OPS: &[Role] = &[Role::Administrator, Role::FlightOperations];

/// Maintenance recording and alert resolution.
pub const MAINTENANCE: &[Role] = &[Role::Administrator, Role::Maintenance];

/// Aircraft status changes.
pub const FLEET_STATUS: &[Role] = &[Role::Administrator, Role::FlightOperations, Role::Maintenance];

/// Audit review.
pub const AUDIT_READERS: &[Role] = &[Role::Administrator, Role::Auditor, Role::Commander];

/// Daily flight report.
pub const FLIGHT_REPORT_READERS: &[Role] = &[
    Role::Administrator,
    Role::FlightOperations,
    Role::Commander,
    Role::Auditor,
];

/// Weekly maintenance report.
pub const MAINTENANCE_REPORT_READERS: &[Role] = &[
    Role::Administrator,
    Role::Maintenance,
    Role::Commander,
    Role::Auditor,
];

/// Utilization report.
pub const EVERY_ROLE: &[Role] = Role::ALL;

/// Whether `role` is in `allowed`. An empty set admits nobody.
#[must_use]
pub fn authorize(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

/// Fail unless the principal's role is in `allowed`.
///
/// # Errors
///
/// Returns [`Error::Authorization`] naming the role and `operation`.
pub fn require(principal: &Principal, allowed: &[Role], operation: &'static str) -> Result<()> {
    if authorize(principal.role, allowed) {
        return Ok(());
    }
    warn!(
        actor_id = principal.actor_id,
        role = %principal.role,
        operation,
        "Capability check denied"
    );
    Err(Error::Authorization {
        role: principal.role,
        operation,
    })
}

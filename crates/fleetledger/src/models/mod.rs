//! Core record types for fleetledger.
//!
//! This module defines the persisted records (actors, fleet, maintenance,
//! audit entries), the input DTOs accepted by the mutation services and the
//! derived [`MetricsSnapshot`].

/// Implements the string label conversions shared by every stored enum:
/// `as_str`, `Display`, `FromStr` and the `rusqlite` column conversions.
macro_rules! labelled_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The label stored in the database and sent over the wire.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::models::ParseLabelError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err($crate::models::ParseLabelError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

mod actor;
mod audit;
mod fleet;
mod maintenance;
mod metrics;
mod report;

pub use actor::{
    Actor, ActorSummary, CreateActor, Principal, Role, UpdateActor, MIN_PASSWORD_LENGTH,
};
pub use audit::{entity, AuditAction, AuditEntry, AuditRecord, NewAuditEntry, GENESIS};
pub use fleet::{
    Aircraft, AircraftStatus, Base, CreateAircraft, CreateBase, CreateCrew, CreateFlightLog, Crew,
    FlightLog, MissionStatus, UpdateAircraft, DEFAULT_THRESHOLD_HOURS,
};
pub use maintenance::{Alert, CreateMaintenanceLog, MaintenanceLog, NewAlert, Severity};
pub use metrics::{MetricsSnapshot, UtilizationRow};
pub use report::{FlightReportRow, MaintenanceReportRow, UsageReportRow};

/// Error returned when a stored or submitted label names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseLabelError {
    /// The enum being parsed.
    pub kind: &'static str,
    /// The rejected label.
    pub value: String,
}

impl From<ParseLabelError> for crate::error::Error {
    fn from(err: ParseLabelError) -> Self {
        Self::validation(err.to_string())
    }
}

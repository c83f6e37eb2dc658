//! Newline-delimited JSON messages exchanged with gateway clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broadcast::Push;
use crate::error::Error;
use crate::models::{
    CreateActor, CreateAircraft, CreateBase, CreateCrew, CreateFlightLog, CreateMaintenanceLog,
    Role, UpdateActor, UpdateAircraft,
};

/// The first line a client sends.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Handshake {
    /// Resume with a previously issued token.
    Token {
        /// Bearer token.
        token: String,
    },
    /// Open a new session.
    Login {
        /// Login name.
        username: String,
        /// Plaintext password.
        password: String,
    },
}

/// A request line, correlated by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Client-chosen correlation id, echoed in the reply.
    #[serde(default)]
    pub id: Value,
    /// The operation.
    #[serde(flatten)]
    pub request: Request,
}

/// Operations a connected client may invoke.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Provision an account.
    CreateUser(CreateActor),
    /// Change an account.
    UpdateUser {
        /// Target account.
        user_id: i64,
        /// Fields to change.
        changes: UpdateActor,
    },
    /// List accounts.
    ListUsers,
    /// Register a base.
    CreateBase(CreateBase),
    /// List bases.
    ListBases,
    /// Register a crew member.
    CreateCrew(CreateCrew),
    /// List crew.
    ListCrew,
    /// Register an aircraft.
    CreateAircraft(CreateAircraft),
    /// Change an aircraft's status or assignment.
    UpdateAircraft {
        /// Target aircraft.
        aircraft_id: i64,
        /// Fields to change.
        changes: UpdateAircraft,
    },
    /// List aircraft.
    ListAircraft,
    /// Record a flight.
    CreateFlightLog(CreateFlightLog),
    /// List recent flights.
    ListFlightLogs {
        /// Page size.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Record maintenance.
    CreateMaintenanceLog(CreateMaintenanceLog),
    /// List maintenance logs.
    ListMaintenanceLogs {
        /// Restrict to one aircraft.
        #[serde(default)]
        aircraft_id: Option<i64>,
        /// Page size.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Resolve an alert.
    ResolveAlert {
        /// Alert to resolve.
        alert_id: i64,
    },
    /// List alerts.
    ListAlerts {
        /// Only unresolved alerts.
        #[serde(default)]
        unresolved_only: bool,
    },
    /// Page through the ledger.
    ListAudit {
        /// Page size.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Verify the ledger chain.
    VerifyAudit,
    /// Find records missing from the ledger.
    ReconcileAudit,
    /// Current dashboard metrics.
    Metrics,
    /// Today's flights.
    DailyFlightReport,
    /// Maintenance logs of the last seven days.
    WeeklyMaintenanceReport,
    /// Hours and fuel per aircraft.
    UtilizationReport,
    /// End the session and close the connection.
    Logout,
}

impl Request {
    /// The `op` name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "create_user",
            Self::UpdateUser { .. } => "update_user",
            Self::ListUsers => "list_users",
            Self::CreateBase(_) => "create_base",
            Self::ListBases => "list_bases",
            Self::CreateCrew(_) => "create_crew",
            Self::ListCrew => "list_crew",
            Self::CreateAircraft(_) => "create_aircraft",
            Self::UpdateAircraft { .. } => "update_aircraft",
            Self::ListAircraft => "list_aircraft",
            Self::CreateFlightLog(_) => "create_flight_log",
            Self::ListFlightLogs { .. } => "list_flight_logs",
            Self::CreateMaintenanceLog(_) => "create_maintenance_log",
            Self::ListMaintenanceLogs { .. } => "list_maintenance_logs",
            Self::ResolveAlert { .. } => "resolve_alert",
            Self::ListAlerts { .. } => "list_alerts",
            Self::ListAudit { .. } => "list_audit",
            Self::VerifyAudit => "verify_audit",
            Self::ReconcileAudit => "reconcile_audit",
            Self::Metrics => "metrics",
            Self::DailyFlightReport => "daily_flight_report",
            Self::WeeklyMaintenanceReport => "weekly_maintenance_report",
            Self::UtilizationReport => "utilization_report",
            Self::Logout => "logout",
        }
    }
}

/// Lines the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outgoing {
    /// The handshake succeeded.
    Admitted {
        /// Authenticated actor.
        actor_id: i64,
        /// The actor's role.
        role: Role,
        /// Token issued by a login handshake.
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    /// The handshake failed; the connection closes next.
    Rejected {
        /// Why.
        message: String,
    },
    /// A dashboard update.
    Push(Push),
    /// A request succeeded.
    Response {
        /// Correlation id from the request.
        id: Value,
        /// The result.
        ok: Value,
    },
    /// A request failed.
    Error {
        /// Correlation id from the request, if it parsed.
        id: Value,
        /// Stable error category.
        kind: &'static str,
        /// Human-readable detail.
        message: String,
    },
}

impl Outgoing {
    /// Reply for a failed request.
    #[must_use]
    pub fn error(id: Value, err: &Error) -> Self {
        Self::Error {
            id,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

//! Audit ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActorSummary;

/// Previous checksum recorded on the first entry of a chain.
pub const GENESIS: &str = "GENESIS";

/// Entity labels written into the ledger's `entity` column.
pub mod entity {
    /// An actor account.
    pub const USER: &str = "User";
    /// An operating base.
    pub const BASE: &str = "Base";
    /// A crew member.
    pub const CREW: &str = "Crew";
    /// An aircraft.
    pub const AIRCRAFT: &str = "Aircraft";
    /// A flight log.
    pub const FLIGHT_LOG: &str = "FlightLog";
    /// A maintenance log.
    pub const MAINTENANCE_LOG: &str = "MaintenanceLog";
    /// A maintenance alert.
    pub const ALERT: &str = "Alert";
}

/// The kind of event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A record was created.
    Create,
    /// A record was changed.
    Update,
    /// An actor's role was changed.
    RoleChange,
    /// An actor authenticated.
    Login,
    /// An actor ended a session.
    Logout,
}

labelled_enum!(AuditAction, "audit action", {
    Create => "CREATE",
    Update => "UPDATE",
    RoleChange => "ROLE_CHANGE",
    Login => "LOGIN",
    Logout => "LOGOUT",
});

/// An audit event awaiting its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Acting actor; `None` for system-initiated events.
    pub actor_id: Option<i64>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of the subject record.
    pub entity: String,
    /// Identifier of the subject record.
    pub entity_id: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Network address the request came from.
    pub source_address: Option<String>,
}

impl NewAuditEntry {
    /// Start a system-initiated entry with no subject id.
    #[must_use]
    pub fn new(
        action: AuditAction,
        entity: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: None,
            action,
            entity: entity.into(),
            entity_id: None,
            description: description.into(),
            source_address: None,
        }
    }

    /// Attribute the entry to an actor.
    #[must_use]
    pub fn by(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Name the subject record.
    #[must_use]
    pub fn subject(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    /// Record the originating address.
    #[must_use]
    pub fn from_address(mut self, source_address: Option<&str>) -> Self {
        self.source_address = source_address.map(str::to_string);
        self
    }
}

/// An appended, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence position.
    pub id: i64,
    /// Acting actor, if any.
    pub actor_id: Option<i64>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of the subject record.
    pub entity: String,
    /// Identifier of the subject record.
    pub entity_id: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Network address the request came from.
    pub source_address: Option<String>,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
    /// Checksum of the preceding entry, or [`GENESIS`].
    pub previous_checksum: String,
    /// This entry's checksum.
    pub checksum: String,
}

/// A ledger entry joined with the actor that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The entry itself.
    #[serde(flatten)]
    pub entry: AuditEntry,
    /// The acting actor, if one is recorded and still resolvable.
    pub actor: Option<ActorSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels() {
        assert_eq!(AuditAction::RoleChange.to_string(), "ROLE_CHANGE");
        assert_eq!("LOGIN".parse::<AuditAction>().unwrap(), AuditAction::Login);
        assert!("DELETE".parse::<AuditAction>().is_err());
        assert_eq!(
            serde_json::to_string(&AuditAction::RoleChange).unwrap(),
            "\"ROLE_CHANGE\""
        );
    }

    #[test]
    fn test_new_entry_builder() {
        let entry = NewAuditEntry::new(AuditAction::Create, "Aircraft", "Created aircraft GAF-101")
            .by(3)
            .subject(12)
            .from_address(Some("10.0.0.4"));
        assert_eq!(entry.actor_id, Some(3));
        assert_eq!(entry.entity_id, Some(12));
        assert_eq!(entry.source_address.as_deref(), Some("10.0.0.4"));
        assert_eq!(entry.entity, "Aircraft");
    }

    #[test]
    fn test_system_entry_has_no_actor() {
        let entry = NewAuditEntry::new(AuditAction::Create, "User", "Bootstrapped administrator");
        assert!(entry.actor_id.is_none());
        assert!(entry.entity_id.is_none());
        assert!(entry.source_address.is_none());
    }
}

//! Error types for fleetledger.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants are
//! grouped by the layer that raises them so the gateway can map each one to a
//! stable error kind for clients.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Role;

/// The main error type for fleetledger operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Domain Errors ===
    /// The acting role is not in the operation's allowed set.
    #[error("role '{role}' is not permitted to {operation}")]
    Authorization {
        /// Role of the actor that was denied.
        role: Role,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A domain rule the input shape cannot express was violated.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of the missing record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: i64,
    },

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflicting value.
        message: String,
    },

    /// A domain write committed but its ledger entry could not be appended.
    #[error("{entity} {} was written but not audited: {source}", display_id(.entity_id))]
    Unaudited {
        /// Kind of the unaudited record.
        entity: String,
        /// Identifier of the unaudited record, if it has one.
        entity_id: Option<i64>,
        /// Why the ledger append failed.
        #[source]
        source: Box<Error>,
    },

    // === Authentication Errors ===
    /// Username or password did not match an active account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A bearer credential was missing, malformed, expired or revoked.
    #[error("credential rejected: {0}")]
    Credential(String),

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

fn display_id(id: &Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// A specialized Result type for fleetledger operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new credential error.
    #[must_use]
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable, machine-readable name of the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authorization { .. } => "authorization",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unaudited { .. } => "unaudited",
            Self::InvalidCredentials | Self::Credential(_) => "authentication",
            Self::DatabaseOpen { .. } | Self::DatabaseQuery(_) | Self::DatabaseMigration { .. } => {
                "storage"
            }
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => "config",
            Self::Io(_) | Self::DirectoryCreate { .. } => "io",
            Self::Json(_) => "malformed",
            Self::Internal(_) => "internal",
        }
    }

    /// Check if the request that produced this error was at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Authorization { .. }
                | Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::InvalidCredentials
                | Self::Credential(_)
                | Self::Json(_)
        )
    }

    /// Check if this error signals a mutation that escaped the ledger.
    #[must_use]
    pub fn is_integrity_alarm(&self) -> bool {
        matches!(self, Self::Unaudited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_display() {
        let err = Error::Authorization {
            role: Role::Auditor,
            operation: "create aircraft",
        };
        assert_eq!(
            err.to_string(),
            "role 'auditor' is not permitted to create aircraft"
        );
        assert_eq!(err.kind(), "authorization");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound {
            entity: "Aircraft",
            id: 42,
        };
        assert_eq!(err.to_string(), "Aircraft 42 not found");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_validation_helper() {
        let err = Error::validation("bases must differ");
        assert_eq!(err.to_string(), "validation failed: bases must differ");
        assert!(err.is_client_error());
        assert!(!err.is_integrity_alarm());
    }

    #[test]
    fn test_unaudited_is_alarm_not_client_error() {
        let err = Error::Unaudited {
            entity: "Base".to_string(),
            entity_id: Some(7),
            source: Box::new(Error::internal("disk full")),
        };
        assert!(err.is_integrity_alarm());
        assert!(!err.is_client_error());
        let msg = err.to_string();
        assert!(msg.contains("Base 7"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_unaudited_without_id() {
        let err = Error::Unaudited {
            entity: "User".to_string(),
            entity_id: None,
            source: Box::new(Error::internal("locked")),
        };
        assert!(err.to_string().starts_with("User - was written"));
    }

    #[test]
    fn test_credential_errors_share_kind() {
        assert_eq!(Error::InvalidCredentials.kind(), "authentication");
        assert_eq!(Error::credential("expired").kind(), "authentication");
        assert_eq!(
            Error::credential("expired").to_string(),
            "credential rejected: expired"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert_eq!(err.kind(), "storage");
            assert!(!err.is_client_error());
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
            assert_eq!(err.kind(), "malformed");
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "jwt_secret must not be empty".to_string(),
        };
        assert!(err.to_string().contains("jwt_secret"));
        assert_eq!(err.kind(), "config");
    }
}

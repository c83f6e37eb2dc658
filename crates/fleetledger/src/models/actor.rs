//! Actors: the authenticated principals that perform mutations.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// The fixed set of roles an actor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages accounts and fleet reference data.
    Administrator,
    /// Records flights.
    FlightOperations,
    /// Records maintenance and resolves alerts.
    Maintenance,
    /// Read access plus audit review.
    Commander,
    /// Audit review.
    Auditor,
}

labelled_enum!(Role, "role", {
    Administrator => "administrator",
    FlightOperations => "flight_operations",
    Maintenance => "maintenance",
    Commander => "commander",
    Auditor => "auditor",
});

/// A provisioned account.
///
/// Actors are never deleted; deactivation flips `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Contact address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Current role.
    pub role: Role,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// Argon2 PHC string; never leaves the process.
    #[serde(skip)]
    pub password_hash: String,
    /// When the account was provisioned.
    pub created_at: DateTime<Utc>,
}

impl Actor {
    /// Human-readable name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.username.clone(),
        }
    }

    /// The principal this actor acts as.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            actor_id: self.id,
            role: self.role,
        }
    }

    /// The minimal projection joined into ledger listings.
    #[must_use]
    pub fn summary(&self) -> ActorSummary {
        ActorSummary {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Minimal actor projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSummary {
    /// Actor identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Role at read time.
    pub role: Role,
}

/// The authenticated identity a request runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Acting actor.
    pub actor_id: i64,
    /// The actor's role as currently stored.
    pub role: Role,
}

/// Input for provisioning an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActor {
    /// Unique login name.
    pub username: String,
    /// Plaintext password; hashed before storage.
    pub password: String,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// Initial role.
    pub role: Role,
}

impl CreateActor {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self, min_password_length: usize) -> Result<()> {
        if !username_pattern().is_match(&self.username) {
            return Err(Error::validation(format!(
                "username '{}' must be 3-64 letters, digits, '.', '_' or '-'",
                self.username
            )));
        }
        check_password(&self.password, min_password_length)?;
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        Ok(())
    }
}

/// Partial update of an account. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateActor {
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
    /// New contact address.
    pub email: Option<String>,
    /// New role.
    pub role: Option<Role>,
    /// Activate or deactivate the account.
    pub is_active: Option<bool>,
    /// New plaintext password.
    pub password: Option<String>,
}

impl UpdateActor {
    /// Check the declared input shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self, min_password_length: usize) -> Result<()> {
        if let Some(password) = &self.password {
            check_password(password, min_password_length)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        Ok(())
    }

    /// Whether the patch touches no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
            && self.password.is_none()
    }
}

fn check_password(password: &str, min_length: usize) -> Result<()> {
    if password.chars().count() < min_length {
        return Err(Error::validation(format!(
            "password must be at least {min_length} characters"
        )));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<()> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err(Error::validation(format!("'{email}' is not an email address")))
    }
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.-]{3,64}$").unwrap_or_else(|e| unreachable!("{e}"))
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|e| unreachable!("{e}"))
    })
}

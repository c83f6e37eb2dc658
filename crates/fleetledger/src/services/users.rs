//! Account provisioning and changes.

use std::sync::Arc;

use tracing::info;

use super::PasswordScheme;
use crate::error::{Error, Result};
use crate::guard::{self, ADMIN_ONLY};
use crate::ledger::Ledger;
use crate::models::{entity, Actor, AuditAction, CreateActor, NewAuditEntry, Principal, Role, UpdateActor};
use crate::storage::Storage;

/// Creates, updates and lists actor accounts.
#[derive(Debug, Clone)]
pub struct UserService {
    storage: Arc<Storage>,
    ledger: Ledger,
    passwords: Arc<dyn PasswordScheme>,
    min_password_length: usize,
}

impl UserService {
    /// Create the service.
    #[must_use]
    pub fn new(
        storage: Arc<Storage>,
        ledger: Ledger,
        passwords: Arc<dyn PasswordScheme>,
        min_password_length: usize,
    ) -> Self {
        Self {
            storage,
            ledger,
            passwords,
            min_password_length,
        }
    }

    /// Provision an account. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or conflict error before any
    /// write, or [`Error::Unaudited`] if the ledger append failed after it.
    pub fn create(
        &self,
        principal: &Principal,
        dto: CreateActor,
        source_address: Option<&str>,
    ) -> Result<Actor> {
        guard::require(principal, ADMIN_ONLY, "create users")?;
        dto.validate(self.min_password_length)?;

        let hash = self.passwords.hash(&dto.password)?;
        let actor = self.storage.insert_actor(&dto, &hash)?;
        self.ledger.record(
            NewAuditEntry::new(
                AuditAction::Create,
                entity::USER,
                format!("Created user {}", actor.username),
            )
            .by(principal.actor_id)
            .subject(actor.id)
            .from_address(source_address),
        )?;

        info!(id = actor.id, username = %actor.username, role = %actor.role, "User created");
        Ok(actor)
    }

    /// Apply a partial update. Administrators only.
    ///
    /// Appends one `UPDATE` entry, followed by a `ROLE_CHANGE` entry if the
    /// role actually changed.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or not-found error before any
    /// write, or [`Error::Unaudited`] if a ledger append failed after it.
    pub fn update(
        &self,
        principal: &Principal,
        target_id: i64,
        patch: UpdateActor,
        source_address: Option<&str>,
    ) -> Result<Actor> {
        guard::require(principal, ADMIN_ONLY, "update users")?;
        if patch.is_empty() {
            return Err(Error::validation("update names no fields"));
        }
        patch.validate(self.min_password_length)?;

        let mut actor = self.storage.get_actor(target_id)?.ok_or(Error::NotFound {
            entity: entity::USER,
            id: target_id,
        })?;
        let previous_role = actor.role;

        if let Some(first_name) = patch.first_name {
            actor.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            actor.last_name = Some(last_name);
        }
        if let Some(email) = patch.email {
            actor.email = Some(email);
        }
        if let Some(role) = patch.role {
            actor.role = role;
        }
        if let Some(is_active) = patch.is_active {
            actor.is_active = is_active;
        }
        if let Some(password) = &patch.password {
            actor.password_hash = self.passwords.hash(password)?;
        }

        self.storage.update_actor(&actor)?;

        let entry = |action, description: String| {
            NewAuditEntry::new(action, entity::USER, description)
                .by(principal.actor_id)
                .subject(actor.id)
                .from_address(source_address)
        };
        self.ledger.record(entry(
            AuditAction::Update,
            format!("Updated user {}", actor.username),
        ))?;
        if actor.role != previous_role {
            self.ledger.record(entry(
                AuditAction::RoleChange,
                format!("Role changed from {previous_role} to {}", actor.role),
            ))?;
        }

        info!(id = actor.id, username = %actor.username, "User updated");
        Ok(actor)
    }

    /// Every account, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, _principal: &Principal) -> Result<Vec<Actor>> {
        self.storage.list_actors()
    }

    /// One account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such account exists.
    pub fn get(&self, _principal: &Principal, id: i64) -> Result<Actor> {
        self.storage.get_actor(id)?.ok_or(Error::NotFound {
            entity: entity::USER,
            id,
        })
    }

    /// Provision the first administrator on an empty database.
    ///
    /// The ledger entry carries no actor: nobody was signed in to do it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if any account already exists, or a
    /// validation error for a bad username or password.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Actor> {
        if self.storage.count_actors()? > 0 {
            return Err(Error::Conflict {
                message: "accounts already exist; bootstrap only runs on an empty database"
                    .to_string(),
            });
        }

        let dto = CreateActor {
            username: username.to_string(),
            password: password.to_string(),
            first_name: None,
            last_name: None,
            email: None,
            role: Role::Administrator,
        };
        dto.validate(self.min_password_length)?;

        let hash = self.passwords.hash(&dto.password)?;
        let actor = self.storage.insert_actor(&dto, &hash)?;
        self.ledger.record(
            NewAuditEntry::new(
                AuditAction::Create,
                entity::USER,
                format!("Created user {}", actor.username),
            )
            .subject(actor.id),
        )?;

        info!(id = actor.id, username = %actor.username, "Bootstrapped administrator");
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{Fixture, PASSWORD};

    fn create(username: &str, role: Role) -> CreateActor {
        CreateActor {
            username: username.to_string(),
            password: PASSWORD.to_string(),
            first_name: None,
            last_name: None,
            email: None,
            role,
        }
    }

    #[test]
    fn test_bootstrap_entry_has_no_actor() {
        let f = Fixture::new();
        let entries = f.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id, None);
        assert_eq!(entries[0].entity_id, Some(f.admin.actor_id));
        assert_eq!(entries[0].description, "Created user admin");
    }

    #[test]
    fn test_bootstrap_only_once() {
        let f = Fixture::new();
        let err = f
            .services
            .users
            .bootstrap_admin("second", PASSWORD)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(f.entry_count(), 1);
    }

    #[test]
    fn test_create_hashes_password_and_audits() {
        let f = Fixture::new();
        let actor = f
            .services
            .users
            .create(&f.admin, create("ops1", Role::FlightOperations), Some("10.1.1.1"))
            .unwrap();

        assert!(actor.password_hash.starts_with("$argon2id$"));
        let last = f.entries().pop().unwrap();
        assert_eq!(last.action, AuditAction::Create);
        assert_eq!(last.entity, "User");
        assert_eq!(last.entity_id, Some(actor.id));
        assert_eq!(last.actor_id, Some(f.admin.actor_id));
        assert_eq!(last.source_address.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_create_denied_for_non_admin() {
        let f = Fixture::new();
        let commander = f.principal("cdr", Role::Commander);
        let before = f.entry_count();

        let err = f
            .services
            .users
            .create(&commander, create("ops1", Role::FlightOperations), None)
            .unwrap_err();
        assert!(matches!(err, Error::Authorization { .. }));
        assert_eq!(f.entry_count(), before);
        assert!(f.services.storage.find_actor_by_username("ops1").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_conflicts_without_entry() {
        let f = Fixture::new();
        f.actor("ops1", Role::FlightOperations);
        let before = f.entry_count();
        let err = f
            .services
            .users
            .create(&f.admin, create("ops1", Role::Auditor), None)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(f.entry_count(), before);
    }

    #[test]
    fn test_role_update_appends_two_chained_entries() {
        let f = Fixture::new();
        let target = f.actor("eng", Role::Maintenance);
        let before = f.entry_count();

        let updated = f
            .services
            .users
            .update(
                &f.admin,
                target.id,
                UpdateActor {
                    role: Some(Role::Commander),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(updated.role, Role::Commander);

        let entries = f.entries();
        assert_eq!(entries.len(), before + 2);
        let (update, change) = (&entries[before], &entries[before + 1]);
        assert_eq!(update.action, AuditAction::Update);
        assert_eq!(change.action, AuditAction::RoleChange);
        assert_eq!(change.description, "Role changed from maintenance to commander");
        assert_eq!(change.previous_checksum, update.checksum);
        assert!(f.services.ledger.verify().unwrap().is_intact());
    }

    #[test]
    fn test_email_update_appends_one_entry() {
        let f = Fixture::new();
        let target = f.actor("eng", Role::Maintenance);
        let before = f.entry_count();

        f.services
            .users
            .update(
                &f.admin,
                target.id,
                UpdateActor {
                    email: Some("eng@base.local".to_string()),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap();

        let entries = f.entries();
        assert_eq!(entries.len(), before + 1);
        assert_eq!(entries[before].action, AuditAction::Update);
        assert_eq!(entries[before].description, "Updated user eng");
    }

    #[test]
    fn test_same_role_is_not_a_role_change() {
        let f = Fixture::new();
        let target = f.actor("eng", Role::Maintenance);
        let before = f.entry_count();
        f.services
            .users
            .update(
                &f.admin,
                target.id,
                UpdateActor {
                    role: Some(Role::Maintenance),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(f.entry_count(), before + 1);
    }

    #[test]
    fn test_update_rejects_empty_patch_and_missing_target() {
        let f = Fixture::new();
        let before = f.entry_count();
        let err = f
            .services
            .users
            .update(&f.admin, f.admin.actor_id, UpdateActor::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = f
            .services
            .users
            .update(
                &f.admin,
                999,
                UpdateActor {
                    is_active: Some(false),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "User", id: 999 }));
        assert_eq!(f.entry_count(), before);
    }

    #[test]
    fn test_password_update_rehashes() {
        let f = Fixture::new();
        let target = f.actor("eng", Role::Maintenance);
        let updated = f
            .services
            .users
            .update(
                &f.admin,
                target.id,
                UpdateActor {
                    password: Some("a-brand-new-password".to_string()),
                    ..UpdateActor::default()
                },
                None,
            )
            .unwrap();
        assert_ne!(updated.password_hash, target.password_hash);
    }

    #[test]
    fn test_list_and_get() {
        let f = Fixture::new();
        let auditor = f.principal("aud", Role::Auditor);
        assert_eq!(f.services.users.list(&auditor).unwrap().len(), 2);
        assert_eq!(f.services.users.get(&auditor, auditor.actor_id).unwrap().username, "aud");
        assert!(f.services.users.get(&auditor, 42).is_err());
    }
}

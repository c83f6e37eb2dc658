//! Domain mutation services.
//!
//! Each mutation follows the same sequence: capability check, cross-field
//! validation, reference resolution, persistence, one ledger entry, and (for
//! dashboard-relevant changes) a broadcast. Failures before persistence
//! leave no trace in storage or the ledger. A ledger failure after
//! persistence surfaces as [`Error::Unaudited`](crate::Error::Unaudited).
//!
//! [`Services`] wires every service to one shared storage handle, ledger
//! and hub.

mod audit;
mod auth;
mod maintenance;
mod operations;
mod password;
mod reports;
mod users;

use std::sync::Arc;

pub use audit::AuditService;
pub use auth::{AuthService, Claims, Session};
pub use maintenance::{evaluate_threshold, MaintenanceOutcome, MaintenanceService};
pub use operations::OperationsService;
pub use password::{Argon2Scheme, PasswordScheme};
pub use reports::{week_window, ReportService, MAINTENANCE_REPORT_DAYS};
pub use users::UserService;

use crate::broadcast::Hub;
use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::metrics::Aggregator;
use crate::storage::Storage;

/// Every service, sharing one storage handle, ledger and hub.
#[derive(Debug, Clone)]
pub struct Services {
    /// Shared storage.
    pub storage: Arc<Storage>,
    /// The audit ledger.
    pub ledger: Ledger,
    /// Dashboard metrics.
    pub aggregator: Aggregator,
    /// Observer registry.
    pub hub: Arc<Hub>,
    /// Account management.
    pub users: UserService,
    /// Bases, crew, aircraft and flights.
    pub operations: OperationsService,
    /// Maintenance logs and alerts.
    pub maintenance: MaintenanceService,
    /// Sessions and tokens.
    pub auth: AuthService,
    /// Ledger review.
    pub audit: AuditService,
    /// Operational reports.
    pub reports: ReportService,
}

impl Services {
    /// Build every service from configuration with the default password
    /// scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if no token secret is configured.
    pub fn new(storage: Arc<Storage>, config: &Config) -> Result<Self> {
        Self::with_passwords(storage, config, Arc::new(Argon2Scheme::default()))
    }

    /// Build every service with an explicit password scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if no token secret is configured.
    pub fn with_passwords(
        storage: Arc<Storage>,
        config: &Config,
        passwords: Arc<dyn PasswordScheme>,
    ) -> Result<Self> {
        let ledger =
            Ledger::new(storage.clone()).with_default_limit(config.ledger.default_list_limit);
        let aggregator = Aggregator::new(storage.clone());
        let hub = Arc::new(Hub::new(aggregator.clone(), config.server.observer_buffer));

        Ok(Self {
            users: UserService::new(
                storage.clone(),
                ledger.clone(),
                passwords.clone(),
                config.auth.min_password_length,
            ),
            operations: OperationsService::new(storage.clone(), ledger.clone(), hub.clone()),
            maintenance: MaintenanceService::new(storage.clone(), ledger.clone(), hub.clone()),
            auth: AuthService::new(
                storage.clone(),
                ledger.clone(),
                passwords,
                config.jwt_secret()?,
                config.token_ttl(),
            ),
            audit: AuditService::new(storage.clone(), ledger.clone()),
            reports: ReportService::new(storage.clone()),
            storage,
            ledger,
            aggregator,
            hub,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for service tests.

    use super::*;
    use crate::models::{
        Actor, AuditEntry, CreateActor, CreateAircraft, CreateBase, Principal, Role,
    };

    /// Password every fixture account uses.
    pub const PASSWORD: &str = "correct-horse-battery";

    pub struct Fixture {
        pub services: Services,
        pub admin: Principal,
    }

    impl Fixture {
        pub fn new() -> Self {
            crate::logging::init_test_logging();
            let storage = Arc::new(Storage::open_in_memory().unwrap());
            let mut config = Config::default();
            config.auth.jwt_secret = Some("test-secret-test-secret".to_string());
            let passwords = Arc::new(Argon2Scheme::with_cost(8, 1, 1).unwrap());
            let services = Services::with_passwords(storage, &config, passwords).unwrap();
            let admin = services
                .users
                .bootstrap_admin("admin", PASSWORD)
                .unwrap()
                .principal();
            Self { services, admin }
        }

        /// Provision an account with `role`.
        pub fn actor(&self, username: &str, role: Role) -> Actor {
            self.services
                .users
                .create(
                    &self.admin,
                    CreateActor {
                        username: username.to_string(),
                        password: PASSWORD.to_string(),
                        first_name: None,
                        last_name: None,
                        email: None,
                        role,
                    },
                    None,
                )
                .unwrap()
        }

        pub fn principal(&self, username: &str, role: Role) -> Principal {
            self.actor(username, role).principal()
        }

        pub fn base(&self, name: &str) -> i64 {
            self.services
                .operations
                .create_base(
                    &self.admin,
                    CreateBase {
                        name: name.to_string(),
                        location: format!("{name} field"),
                    },
                    None,
                )
                .unwrap()
                .id
        }

        pub fn aircraft(&self, tail: &str, threshold: f64, base_id: i64) -> i64 {
            self.services
                .operations
                .create_aircraft(
                    &self.admin,
                    CreateAircraft {
                        tail_number: tail.to_string(),
                        model: "C-295".to_string(),
                        maintenance_threshold_hours: Some(threshold),
                        status: None,
                        home_base_id: base_id,
                    },
                    None,
                )
                .unwrap()
                .id
        }

        /// Every ledger entry, oldest first.
        pub fn entries(&self) -> Vec<AuditEntry> {
            self.services.storage.audit_entries_ascending().unwrap()
        }

        pub fn entry_count(&self) -> usize {
            self.entries().len()
        }
    }
}

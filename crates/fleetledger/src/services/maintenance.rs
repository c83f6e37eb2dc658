//! Maintenance recording, threshold alerts and alert resolution.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::broadcast::{events, Hub};
use crate::error::{Error, Result};
use crate::guard::{self, MAINTENANCE};
use crate::ledger::{clamp_limit, Ledger, DEFAULT_LIST_LIMIT};
use crate::models::{
    entity, Aircraft, Alert, AuditAction, CreateMaintenanceLog, MaintenanceLog, NewAlert,
    NewAuditEntry, Principal, Role, Severity,
};
use crate::storage::Storage;

/// Title of every threshold alert.
pub const THRESHOLD_ALERT_TITLE: &str = "Maintenance Threshold Reached";

/// Decide whether a maintenance log crosses its aircraft's threshold.
///
/// The comparison is inclusive: reaching the threshold exactly raises an
/// alert.
#[must_use]
pub fn evaluate_threshold(aircraft: &Aircraft, log: &MaintenanceLog) -> Option<NewAlert> {
    if log.total_flight_hours < aircraft.maintenance_threshold_hours {
        return None;
    }
    Some(NewAlert {
        aircraft_id: aircraft.id,
        maintenance_log_id: log.id,
        title: THRESHOLD_ALERT_TITLE.to_string(),
        message: format!(
            "Aircraft {} recorded {} hours (threshold {}).",
            aircraft.tail_number, log.total_flight_hours, aircraft.maintenance_threshold_hours
        ),
        severity: Severity::High,
        target_role: Role::Maintenance,
    })
}

/// A recorded maintenance log and the alert it raised, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceOutcome {
    /// The persisted log.
    pub log: MaintenanceLog,
    /// The threshold alert, when the log reached the threshold.
    pub alert: Option<Alert>,
}

/// Records maintenance and manages alerts.
#[derive(Debug, Clone)]
pub struct MaintenanceService {
    storage: Arc<Storage>,
    ledger: Ledger,
    hub: Arc<Hub>,
}

impl MaintenanceService {
    /// Create the service.
    #[must_use]
    pub fn new(storage: Arc<Storage>, ledger: Ledger, hub: Arc<Hub>) -> Self {
        Self {
            storage,
            ledger,
            hub,
        }
    }

    /// Record a maintenance log and evaluate the aircraft's threshold.
    /// Administrators and maintenance.
    ///
    /// Ledger order: the log's `CREATE`, then the alert's `CREATE` if one
    /// was raised.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or not-found error before any
    /// write, or [`Error::Unaudited`] if a ledger append failed after it.
    pub fn create_log(
        &self,
        principal: &Principal,
        dto: CreateMaintenanceLog,
        source_address: Option<&str>,
    ) -> Result<MaintenanceOutcome> {
        guard::require(principal, MAINTENANCE, "create maintenance logs")?;
        dto.validate()?;
        let aircraft = self.storage.get_aircraft(dto.aircraft_id)?.ok_or(Error::NotFound {
            entity: entity::AIRCRAFT,
            id: dto.aircraft_id,
        })?;

        let log = self.storage.insert_maintenance_log(&dto, principal.actor_id)?;
        self.ledger.record(
            NewAuditEntry::new(
                AuditAction::Create,
                entity::MAINTENANCE_LOG,
                format!("Created maintenance log for {}", aircraft.tail_number),
            )
            .by(principal.actor_id)
            .subject(log.id)
            .from_address(source_address),
        )?;
        info!(id = log.id, tail = %aircraft.tail_number, hours = log.total_flight_hours, "Maintenance logged");

        let alert = match evaluate_threshold(&aircraft, &log) {
            Some(new_alert) => {
                let alert = self.storage.insert_alert(&new_alert)?;
                self.ledger.record(
                    NewAuditEntry::new(
                        AuditAction::Create,
                        entity::ALERT,
                        format!("Predictive maintenance alert created for {}", aircraft.tail_number),
                    )
                    .by(principal.actor_id)
                    .subject(alert.id)
                    .from_address(source_address),
                )?;
                warn!(
                    alert_id = alert.id,
                    tail = %aircraft.tail_number,
                    hours = log.total_flight_hours,
                    threshold = aircraft.maintenance_threshold_hours,
                    "Maintenance threshold reached"
                );
                self.hub
                    .broadcast(events::MAINTENANCE_ALERT, json!({ "alert_id": alert.id }));
                Some(alert)
            }
            None => None,
        };

        self.hub.broadcast(
            events::MAINTENANCE_LOG_CREATED,
            json!({ "maintenance_log_id": log.id }),
        );
        Ok(MaintenanceOutcome { log, alert })
    }

    /// Mark an unresolved alert resolved. Administrators and maintenance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown alert, a validation error
    /// if it is already resolved, or [`Error::Unaudited`] if the ledger
    /// append failed after the change.
    pub fn resolve_alert(
        &self,
        principal: &Principal,
        alert_id: i64,
        source_address: Option<&str>,
    ) -> Result<Alert> {
        guard::require(principal, MAINTENANCE, "resolve alerts")?;
        let mut alert = self.storage.get_alert(alert_id)?.ok_or(Error::NotFound {
            entity: entity::ALERT,
            id: alert_id,
        })?;
        let already_resolved = || Error::validation(format!("alert {alert_id} is already resolved"));
        if alert.is_resolved {
            return Err(already_resolved());
        }
        if !self.storage.mark_alert_resolved(alert_id)? {
            return Err(already_resolved());
        }
        alert.is_resolved = true;

        self.ledger.record(
            NewAuditEntry::new(AuditAction::Update, entity::ALERT, "Alert marked as resolved")
                .by(principal.actor_id)
                .subject(alert.id)
                .from_address(source_address),
        )?;

        info!(id = alert.id, "Alert resolved");
        self.hub
            .broadcast(events::ALERT_RESOLVED, json!({ "alert_id": alert.id }));
        Ok(alert)
    }

    /// Maintenance logs, newest first, optionally for one aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_logs(
        &self,
        _principal: &Principal,
        aircraft_id: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<MaintenanceLog>> {
        self.storage
            .list_maintenance_logs(aircraft_id, clamp_limit(limit, DEFAULT_LIST_LIMIT))
    }

    /// Alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_alerts(&self, _principal: &Principal, unresolved_only: bool) -> Result<Vec<Alert>> {
        self.storage.list_alerts(unresolved_only)
    }
}

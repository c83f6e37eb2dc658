//! Fleet reference data and flight recording.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::broadcast::{events, Hub};
use crate::error::{Error, Result};
use crate::guard::{self, ADMIN_ONLY, FLEET_STATUS, FLIGHT_OPS};
use crate::ledger::{clamp_limit, Ledger, DEFAULT_LIST_LIMIT};
use crate::models::{
    entity, Aircraft, AuditAction, Base, CreateAircraft, CreateBase, CreateCrew, CreateFlightLog,
    Crew, FlightLog, NewAuditEntry, Principal, UpdateAircraft,
};
use crate::storage::Storage;

/// Records bases, crew, aircraft and flights.
#[derive(Debug, Clone)]
pub struct OperationsService {
    storage: Arc<Storage>,
    ledger: Ledger,
    hub: Arc<Hub>,
}

impl OperationsService {
    /// Create the service.
    #[must_use]
    pub fn new(storage: Arc<Storage>, ledger: Ledger, hub: Arc<Hub>) -> Self {
        Self {
            storage,
            ledger,
            hub,
        }
    }

    fn entry(
        principal: &Principal,
        entity: &str,
        entity_id: i64,
        description: String,
        source_address: Option<&str>,
    ) -> NewAuditEntry {
        NewAuditEntry::new(AuditAction::Create, entity, description)
            .by(principal.actor_id)
            .subject(entity_id)
            .from_address(source_address)
    }

    /// Register a base. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or conflict error before any
    /// write, or [`Error::Unaudited`] if the ledger append failed after it.
    pub fn create_base(
        &self,
        principal: &Principal,
        dto: CreateBase,
        source_address: Option<&str>,
    ) -> Result<Base> {
        guard::require(principal, ADMIN_ONLY, "create bases")?;
        dto.validate()?;

        let base = self.storage.insert_base(&dto)?;
        self.ledger.record(Self::entry(
            principal,
            entity::BASE,
            base.id,
            format!("Created base {}", base.name),
            source_address,
        ))?;

        info!(id = base.id, name = %base.name, "Base created");
        Ok(base)
    }

    /// Register a crew member. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns an authorization or validation error before any write, or
    /// [`Error::Unaudited`] if the ledger append failed after it.
    pub fn create_crew(
        &self,
        principal: &Principal,
        dto: CreateCrew,
        source_address: Option<&str>,
    ) -> Result<Crew> {
        guard::require(principal, ADMIN_ONLY, "create crew")?;
        dto.validate()?;

        let crew = self.storage.insert_crew(&dto)?;
        self.ledger.record(Self::entry(
            principal,
            entity::CREW,
            crew.id,
            format!("Created crew {}", crew.full_name),
            source_address,
        ))?;

        info!(id = crew.id, "Crew member created");
        Ok(crew)
    }

    /// Register an aircraft. Administrators only.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation, not-found (home base) or
    /// conflict error before any write, or [`Error::Unaudited`] if the
    /// ledger append failed after it.
    pub fn create_aircraft(
        &self,
        principal: &Principal,
        dto: CreateAircraft,
        source_address: Option<&str>,
    ) -> Result<Aircraft> {
        guard::require(principal, ADMIN_ONLY, "create aircraft")?;
        dto.validate()?;
        self.require_base(dto.home_base_id)?;

        let aircraft = self.storage.insert_aircraft(&dto)?;
        self.ledger.record(Self::entry(
            principal,
            entity::AIRCRAFT,
            aircraft.id,
            format!("Created aircraft {}", aircraft.tail_number),
            source_address,
        ))?;

        info!(id = aircraft.id, tail = %aircraft.tail_number, "Aircraft created");
        self.hub
            .broadcast(events::AIRCRAFT_CREATED, json!({ "aircraft_id": aircraft.id }));
        Ok(aircraft)
    }

    /// Change an aircraft's status or assignment. Administrators, flight
    /// operations and maintenance.
    ///
    /// Appends one `UPDATE` entry naming the status transition.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or not-found error before any
    /// write, or [`Error::Unaudited`] if the ledger append failed after it.
    pub fn update_aircraft(
        &self,
        principal: &Principal,
        aircraft_id: i64,
        patch: UpdateAircraft,
        source_address: Option<&str>,
    ) -> Result<Aircraft> {
        guard::require(principal, FLEET_STATUS, "update aircraft")?;
        patch.validate()?;

        let mut aircraft = self.require_aircraft(aircraft_id)?;
        if let Some(base_id) = patch.home_base_id {
            self.require_base(base_id)?;
        }
        let previous_status = aircraft.status;
        patch.apply(&mut aircraft);

        self.storage.update_aircraft(&aircraft)?;
        let description = if aircraft.status == previous_status {
            format!("Updated aircraft {}", aircraft.tail_number)
        } else {
            format!(
                "Updated aircraft {}: status {previous_status} to {}",
                aircraft.tail_number, aircraft.status
            )
        };
        self.ledger.record(
            NewAuditEntry::new(AuditAction::Update, entity::AIRCRAFT, description)
                .by(principal.actor_id)
                .subject(aircraft.id)
                .from_address(source_address),
        )?;

        info!(id = aircraft.id, tail = %aircraft.tail_number, status = %aircraft.status, "Aircraft updated");
        self.hub.broadcast(
            events::AIRCRAFT_UPDATED,
            json!({ "aircraft_id": aircraft.id, "status": aircraft.status }),
        );
        Ok(aircraft)
    }

    /// Record a flight. Administrators and flight operations.
    ///
    /// Departure and arrival must differ, and the aircraft, both bases and
    /// every crew member must exist; all of this is checked before anything
    /// is written.
    ///
    /// # Errors
    ///
    /// Returns an authorization, validation or not-found error before any
    /// write, or [`Error::Unaudited`] if the ledger append failed after it.
    pub fn create_flight_log(
        &self,
        principal: &Principal,
        dto: CreateFlightLog,
        source_address: Option<&str>,
    ) -> Result<FlightLog> {
        guard::require(principal, FLIGHT_OPS, "create flight logs")?;
        dto.validate()?;
        if dto.departure_base_id == dto.arrival_base_id {
            return Err(Error::validation(
                "Departure and arrival bases must be different.",
            ));
        }

        let aircraft = self.require_aircraft(dto.aircraft_id)?;
        self.require_base(dto.departure_base_id)?;
        self.require_base(dto.arrival_base_id)?;
        for crew_id in &dto.crew_member_ids {
            self.storage.get_crew(*crew_id)?.ok_or(Error::NotFound {
                entity: entity::CREW,
                id: *crew_id,
            })?;
        }

        let log = self.storage.insert_flight_log(&dto, principal.actor_id)?;
        self.ledger.record(Self::entry(
            principal,
            entity::FLIGHT_LOG,
            log.id,
            format!("Created flight log for {}", aircraft.tail_number),
            source_address,
        ))?;

        info!(id = log.id, tail = %aircraft.tail_number, hours = log.flight_hours, "Flight logged");
        self.hub
            .broadcast(events::FLIGHT_LOG_CREATED, json!({ "flight_log_id": log.id }));
        Ok(log)
    }

    fn require_base(&self, id: i64) -> Result<Base> {
        self.storage.get_base(id)?.ok_or(Error::NotFound {
            entity: entity::BASE,
            id,
        })
    }

    fn require_aircraft(&self, id: i64) -> Result<Aircraft> {
        self.storage.get_aircraft(id)?.ok_or(Error::NotFound {
            entity: entity::AIRCRAFT,
            id,
        })
    }

    /// Every base.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_bases(&self, _principal: &Principal) -> Result<Vec<Base>> {
        self.storage.list_bases()
    }

    /// Every crew member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_crew(&self, _principal: &Principal) -> Result<Vec<Crew>> {
        self.storage.list_crew()
    }

    /// Every aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_aircraft(&self, _principal: &Principal) -> Result<Vec<Aircraft>> {
        self.storage.list_aircraft()
    }

    /// The most recent flights, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_flight_logs(
        &self,
        _principal: &Principal,
        limit: Option<usize>,
    ) -> Result<Vec<FlightLog>> {
        self.storage
            .list_flight_logs(clamp_limit(limit, DEFAULT_LIST_LIMIT))
    }
}

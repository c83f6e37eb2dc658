//! `fleetledger` - Fleet operations records with a tamper-evident audit ledger
//!
//! This library records bases, crew, aircraft, flights and maintenance for a
//! small air fleet. Every mutation passes a role check and is chained into an
//! append-only ledger whose checksums expose later edits. Maintenance logs
//! that reach an aircraft's threshold raise alerts, and connected dashboards
//! receive a recomputed metrics snapshot after each relevant change.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod server;
pub mod services;
pub mod storage;

pub use broadcast::{CredentialVerifier, Hub, Observer, Push};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{ChainReport, Ledger};
pub use logging::init_logging;
pub use metrics::Aggregator;
pub use services::Services;
pub use storage::Storage;

//! Command-line interface for fleetledger.
//!
//! This module provides the CLI structure for the `fleetledger` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AuditCommand, ConfigCommand, InitCommand, MetricsCommand, ReportCommand, ReportKind,
    ServeCommand,
};

use crate::logging::Verbosity;

/// fleetledger - Fleet operations records with a tamper-evident audit ledger
///
/// Records bases, crew, aircraft, flights and maintenance, raises
/// maintenance alerts, and chains every mutation into a checksummed ledger.
#[derive(Debug, Parser)]
#[command(name = "fleetledger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and the first administrator
    Init(InitCommand),

    /// Run the gateway
    Serve(ServeCommand),

    /// Inspect the audit ledger
    #[command(subcommand)]
    Audit(AuditCommand),

    /// Show dashboard metrics
    Metrics(MetricsCommand),

    /// Print an operational report
    Report(ReportCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Initialize command arguments.
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Username of the first administrator
    #[arg(long, value_name = "NAME")]
    pub admin_username: String,

    /// Password of the first administrator
    #[arg(long, value_name = "PASSWORD")]
    pub admin_password: String,
}

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.listen_addr`)
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}

/// Audit ledger commands.
#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// List the newest ledger entries
    List {
        /// Maximum number of entries (1-1000)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Verify the checksum chain from genesis
    Verify {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List records with no matching ledger entry
    Reconcile {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Metrics command arguments.
#[derive(Debug, Args)]
pub struct MetricsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Report command arguments.
#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Which report to print
    #[arg(value_enum)]
    pub kind: ReportKind,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Available reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Flights of the current local day
    DailyFlights,
    /// Maintenance logs of the last seven days
    WeeklyMaintenance,
    /// Hours and fuel per aircraft
    Utilization,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

//! `fleetledger` - CLI for the fleet operations ledger
//!
//! This binary initializes the database, runs the gateway, and gives
//! operators direct read access to the audit ledger and metrics.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use chrono::{Local, Utc};
use fleetledger::cli::{
    AuditCommand, Cli, Command, ConfigCommand, InitCommand, ReportCommand, ReportKind,
    ServeCommand,
};
use fleetledger::metrics::day_window;
use fleetledger::services::{week_window, Argon2Scheme, Services, UserService};
use fleetledger::{init_logging, reconcile, server, Aggregator, Config, Ledger, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Init(cmd) => handle_init(&config, &cmd),
        Command::Serve(cmd) => handle_serve(&config, &cmd).await,
        Command::Audit(cmd) => handle_audit(&config, cmd),
        Command::Metrics(cmd) => handle_metrics(&config, cmd.json),
        Command::Report(cmd) => handle_report(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<Storage>> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn ledger(config: &Config, storage: &Arc<Storage>) -> Ledger {
    Ledger::new(storage.clone()).with_default_limit(config.ledger.default_list_limit)
}

fn handle_init(config: &Config, cmd: &InitCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let users = UserService::new(
        storage.clone(),
        ledger(config, &storage),
        Arc::new(Argon2Scheme::default()),
        config.auth.min_password_length,
    );
    let admin = users
        .bootstrap_admin(&cmd.admin_username, &cmd.admin_password)
        .context("creating the first administrator")?;

    println!("Initialized {}", storage.path().display());
    println!("Administrator '{}' created (id {}).", admin.username, admin.id);
    Ok(())
}

async fn handle_serve(config: &Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    let addr = match cmd.listen {
        Some(addr) => addr,
        None => config.listen_addr()?,
    };
    let storage = open_storage(config)?;
    let services = Services::new(storage, config)?;
    server::serve(services, addr, config.server.max_line_bytes).await?;
    Ok(())
}

fn handle_audit(config: &Config, cmd: AuditCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        AuditCommand::List { limit, json } => {
            let records = ledger(config, &storage).list(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!(
                    "{:>6}  {:<20}  {:<12}  {:<16}  {:<12}  DESCRIPTION",
                    "ID", "TIME", "ACTION", "ENTITY", "ACTOR"
                );
                for record in &records {
                    let entry = &record.entry;
                    let subject = match entry.entity_id {
                        Some(id) => format!("{} {id}", entry.entity),
                        None => entry.entity.clone(),
                    };
                    let actor = record
                        .actor
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |a| a.username.clone());
                    println!(
                        "{:>6}  {:<20}  {:<12}  {:<16}  {:<12}  {}",
                        entry.id,
                        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                        entry.action,
                        subject,
                        actor,
                        entry.description
                    );
                }
            }
        }
        AuditCommand::Verify { json } => {
            let report = ledger(config, &storage).verify()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Entries:   {}", report.total);
                println!("Verified:  {}", report.verified);
            }
            if let Some(chain_break) = &report.first_break {
                bail!(
                    "audit chain broken at entry {} ({:?}); {} entries cannot be trusted",
                    chain_break.id,
                    chain_break.kind,
                    chain_break.unverifiable.len()
                );
            }
            if !json {
                println!("Chain intact.");
            }
        }
        AuditCommand::Reconcile { json } => {
            let found = reconcile::scan(&storage)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for d in &found {
                    println!("{} {}: missing {} entry", d.entity, d.entity_id, d.missing);
                }
            }
            if !found.is_empty() {
                bail!("{} records have no matching ledger entry", found.len());
            }
            if !json {
                println!("Every record is accounted for.");
            }
        }
    }
    Ok(())
}

fn handle_metrics(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let snapshot = Aggregator::new(storage).snapshot()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Fleet metrics ({})", snapshot.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("------------------------------------");
    println!("Aircraft available:  {}", snapshot.aircraft_available);
    println!("Flights today:       {}", snapshot.flights_today);
    println!("Active missions:     {}", snapshot.active_missions);
    println!("Maintenance alerts:  {}", snapshot.maintenance_alerts);
    println!("Crew available:      {}", snapshot.crew_available);
    if !snapshot.aircraft_utilization.is_empty() {
        println!();
        println!("Utilization (hours):");
        for row in &snapshot.aircraft_utilization {
            println!("  {:<16} {:>8.1}", row.aircraft, row.hours);
        }
    }
    Ok(())
}

fn handle_report(config: &Config, cmd: &ReportCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd.kind {
        ReportKind::DailyFlights => {
            let (start, end) = day_window(&Local::now())?;
            let rows = storage.flight_report(&start, &end)?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            println!(
                "{:<16}  {:<12}  {:<16}  {:<12}  {:>6}  {:>8}  ROUTE",
                "TIME", "AIRCRAFT", "PILOT", "MISSION", "HOURS", "FUEL"
            );
            for row in &rows {
                println!(
                    "{:<16}  {:<12}  {:<16}  {:<12}  {:>6.1}  {:>8.1}  {} -> {}",
                    row.flight_datetime.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    row.aircraft,
                    row.pilot_name,
                    row.mission_type,
                    row.flight_hours,
                    row.fuel_used,
                    row.departure_base,
                    row.arrival_base
                );
            }
            println!("{} flights today.", rows.len());
        }
        ReportKind::WeeklyMaintenance => {
            let (since, until) = week_window(Utc::now());
            let rows = storage.maintenance_report(&since, &until)?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            println!(
                "{:<16}  {:<12}  {:>8}  {:<10}  {:<12}  STATUS",
                "RECORDED", "AIRCRAFT", "HOURS", "LAST", "BY"
            );
            for row in &rows {
                println!(
                    "{:<16}  {:<12}  {:>8.1}  {:<10}  {:<12}  {}",
                    row.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    row.aircraft,
                    row.total_flight_hours,
                    row.last_maintenance_date,
                    row.logged_by.as_deref().unwrap_or("-"),
                    row.component_status
                );
            }
            println!("{} maintenance logs in the last 7 days.", rows.len());
        }
        ReportKind::Utilization => {
            let rows = storage.usage_report()?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            println!("{:<16}  {:>10}  {:>10}", "AIRCRAFT", "HOURS", "FUEL");
            for row in &rows {
                println!(
                    "{:<16}  {:>10.1}  {:>10.1}",
                    row.aircraft, row.total_flight_hours, row.total_fuel_used
                );
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                let mut shown = config.clone();
                if shown.auth.jwt_secret.is_some() {
                    shown.auth.jwt_secret = Some("<redacted>".to_string());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Auth]");
                println!(
                    "  JWT secret:         {}",
                    if config.auth.jwt_secret.is_some() { "set" } else { "not set" }
                );
                println!("  Token TTL (secs):   {}", config.auth.token_ttl_secs);
                println!("  Min password len:   {}", config.auth.min_password_length);
                println!();
                println!("[Server]");
                println!("  Listen address:     {}", config.server.listen_addr);
                println!("  Observer buffer:    {}", config.server.observer_buffer);
                println!("  Max line bytes:     {}", config.server.max_line_bytes);
                println!();
                println!("[Ledger]");
                println!("  Default list limit: {}", config.ledger.default_list_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

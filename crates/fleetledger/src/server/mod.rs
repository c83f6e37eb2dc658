//! Line-oriented TCP gateway.
//!
//! Each connection opens with a [`Handshake`] line. Once admitted, the client
//! sends [`Envelope`] lines and receives replies interleaved with dashboard
//! pushes. Every request re-checks the session token so role changes and
//! deactivation apply immediately.

mod protocol;

use std::future::Future;
use std::net::SocketAddr;

use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

pub use protocol::{Envelope, Handshake, Outgoing, Request};

use crate::broadcast::DASHBOARD_CHANNEL;
use crate::error::{Error, Result};
use crate::logging::INTEGRITY_TARGET;
use crate::models::Principal;
use crate::services::Services;

/// Default cap on one handshake or request line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(services: Services, addr: SocketAddr, max_line_bytes: usize) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, max_line_bytes, "Gateway listening");
    serve_on(listener, services, max_line_bytes, shutdown_signal()).await;
    Ok(())
}

/// Accept connections on `listener` until `shutdown` completes.
///
/// Lines longer than `max_line_bytes` end the connection.
pub async fn serve_on<F>(
    listener: TcpListener,
    services: Services,
    max_line_bytes: usize,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                let services = services.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, services, max_line_bytes).await {
                        debug!(%peer, error = %e, "Connection ended with error");
                    }
                });
            }
            () = &mut shutdown => {
                info!("Gateway shutting down");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    services: Services,
    max_line_bytes: usize,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_bytes));
    let address = peer.ip().to_string();

    let first = match lines.next().await {
        None => return Ok(()),
        Some(Ok(line)) => line,
        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
            warn!(%peer, max_line_bytes, "Handshake line too long");
            return reject(&mut writer, &oversized(max_line_bytes).to_string()).await;
        }
        Some(Err(LinesCodecError::Io(e))) => return Err(Error::from(e)),
    };
    let (credential, issued) = match serde_json::from_str::<Handshake>(&first) {
        Ok(Handshake::Token { token }) => (token, None),
        Ok(Handshake::Login { username, password }) => {
            match services.auth.login(&username, &password, Some(&address)) {
                Ok(session) => (session.token.clone(), Some(session.token)),
                Err(e) => return reject(&mut writer, &e.to_string()).await,
            }
        }
        Err(_) => return reject(&mut writer, "malformed handshake").await,
    };

    let (principal, mut observer) =
        match services
            .hub
            .connect(DASHBOARD_CHANNEL, &credential, &services.auth)
        {
            Ok(pair) => pair,
            Err(e) => return reject(&mut writer, &e.to_string()).await,
        };

    let result = async {
        send(
            &mut writer,
            &Outgoing::Admitted {
                actor_id: principal.actor_id,
                role: principal.role,
                token: issued,
            },
        )
        .await?;

        loop {
            tokio::select! {
                line = lines.next() => {
                    let line = match line {
                        None => break,
                        Some(Ok(line)) => line,
                        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                            warn!(%peer, actor_id = principal.actor_id, max_line_bytes, "Request line too long");
                            send(&mut writer, &Outgoing::error(Value::Null, &oversized(max_line_bytes))).await?;
                            writer.shutdown().await?;
                            break;
                        }
                        Some(Err(LinesCodecError::Io(e))) => return Err(Error::from(e)),
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let (reply, close) = handle_line(&services, &credential, &line, &address);
                    send(&mut writer, &reply).await?;
                    if close {
                        break;
                    }
                }
                push = observer.recv() => {
                    let Some(push) = push else { break };
                    send(&mut writer, &Outgoing::Push(push)).await?;
                }
            }
        }
        Ok::<(), Error>(())
    }
    .await;

    services.hub.remove(DASHBOARD_CHANNEL, observer.id());
    info!(id = observer.id(), actor_id = principal.actor_id, "Observer disconnected");
    result
}

fn oversized(max_line_bytes: usize) -> Error {
    Error::validation(format!("line exceeds {max_line_bytes} bytes"))
}

async fn reject<W: AsyncWrite + Unpin>(writer: &mut W, message: &str) -> Result<()> {
    send(
        writer,
        &Outgoing::Rejected {
            message: message.to_string(),
        },
    )
    .await?;
    writer.shutdown().await?;
    Ok(())
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, message: &Outgoing) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Handle one request line. Returns the reply and whether to close.
fn handle_line(services: &Services, credential: &str, line: &str, address: &str) -> (Outgoing, bool) {
    let envelope = match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            let id = serde_json::from_str::<Value>(line)
                .ok()
                .and_then(|v| v.get("id").cloned())
                .unwrap_or(Value::Null);
            return (Outgoing::error(id, &Error::Json(e)), false);
        }
    };

    let principal = match services.auth.authenticate(credential) {
        Ok(principal) => principal,
        Err(e) => return (Outgoing::error(envelope.id, &e), true),
    };

    let op = envelope.request.name();
    let close = matches!(envelope.request, Request::Logout);
    match dispatch(services, &principal, envelope.request, Some(address)) {
        Ok(ok) => (Outgoing::Response { id: envelope.id, ok }, close),
        Err(e) => {
            if e.is_integrity_alarm() {
                error!(target: INTEGRITY_TARGET, op, actor_id = principal.actor_id, error = %e, "Request left an unaudited write");
            } else if e.is_client_error() {
                debug!(op, actor_id = principal.actor_id, error = %e, "Request refused");
            } else {
                warn!(op, actor_id = principal.actor_id, error = %e, "Request failed");
            }
            (Outgoing::error(envelope.id, &e), false)
        }
    }
}

fn dispatch(
    services: &Services,
    principal: &Principal,
    request: Request,
    address: Option<&str>,
) -> Result<Value> {
    match request {
        Request::CreateUser(dto) => reply(services.users.create(principal, dto, address)?),
        Request::UpdateUser { user_id, changes } => {
            reply(services.users.update(principal, user_id, changes, address)?)
        }
        Request::ListUsers => reply(services.users.list(principal)?),
        Request::CreateBase(dto) => reply(services.operations.create_base(principal, dto, address)?),
        Request::ListBases => reply(services.operations.list_bases(principal)?),
        Request::CreateCrew(dto) => reply(services.operations.create_crew(principal, dto, address)?),
        Request::ListCrew => reply(services.operations.list_crew(principal)?),
        Request::CreateAircraft(dto) => {
            reply(services.operations.create_aircraft(principal, dto, address)?)
        }
        Request::UpdateAircraft {
            aircraft_id,
            changes,
        } => reply(
            services
                .operations
                .update_aircraft(principal, aircraft_id, changes, address)?,
        ),
        Request::ListAircraft => reply(services.operations.list_aircraft(principal)?),
        Request::CreateFlightLog(dto) => {
            reply(services.operations.create_flight_log(principal, dto, address)?)
        }
        Request::ListFlightLogs { limit } => {
            reply(services.operations.list_flight_logs(principal, limit)?)
        }
        Request::CreateMaintenanceLog(dto) => {
            reply(services.maintenance.create_log(principal, dto, address)?)
        }
        Request::ListMaintenanceLogs { aircraft_id, limit } => {
            reply(services.maintenance.list_logs(principal, aircraft_id, limit)?)
        }
        Request::ResolveAlert { alert_id } => {
            reply(services.maintenance.resolve_alert(principal, alert_id, address)?)
        }
        Request::ListAlerts { unresolved_only } => {
            reply(services.maintenance.list_alerts(principal, unresolved_only)?)
        }
        Request::ListAudit { limit } => reply(services.audit.list(principal, limit)?),
        Request::VerifyAudit => reply(services.audit.verify(principal)?),
        Request::ReconcileAudit => reply(services.audit.reconcile(principal)?),
        Request::Metrics => reply(services.aggregator.snapshot()?),
        Request::DailyFlightReport => reply(services.reports.daily_flights(principal)?),
        Request::WeeklyMaintenanceReport => {
            reply(services.reports.weekly_maintenance(principal)?)
        }
        Request::UtilizationReport => reply(services.reports.utilization(principal)?),
        Request::Logout => {
            services.auth.logout(principal, address)?;
            Ok(json!({ "logged_out": true }))
        }
    }
}

fn reply<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

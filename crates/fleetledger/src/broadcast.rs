//! Real-time fan-out of dashboard state.
//!
//! The [`Hub`] is an explicit registry of observers keyed by channel name.
//! Observers are admitted only after their credential verifies; every
//! broadcast recomputes the metrics snapshot once and offers it to each
//! observer of the dashboard channel without waiting on any of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::Aggregator;
use crate::models::{MetricsSnapshot, Principal};

/// The channel every dashboard observer joins.
pub const DASHBOARD_CHANNEL: &str = "dashboard";

/// Event names carried in [`Push::event`].
pub mod events {
    /// First push to a newly admitted observer.
    pub const INITIAL: &str = "dashboard.initial";
    /// A maintenance threshold was crossed.
    pub const MAINTENANCE_ALERT: &str = "maintenance.alert";
    /// A maintenance log was recorded.
    pub const MAINTENANCE_LOG_CREATED: &str = "maintenance_log_created";
    /// An alert was resolved.
    pub const ALERT_RESOLVED: &str = "alert_resolved";
    /// An aircraft joined the fleet.
    pub const AIRCRAFT_CREATED: &str = "aircraft_created";
    /// An aircraft's status or assignment changed.
    pub const AIRCRAFT_UPDATED: &str = "aircraft_updated";
    /// A flight was recorded.
    pub const FLIGHT_LOG_CREATED: &str = "flight_log_created";
}

/// Default per-observer queue depth.
pub const DEFAULT_OBSERVER_BUFFER: usize = 64;

/// One message delivered to an observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Push {
    /// Event name.
    pub event: String,
    /// Snapshot computed for this event.
    pub metrics: MetricsSnapshot,
    /// Event-specific details.
    pub payload: Value,
}

/// Validates the credential an observer presents on connect.
pub trait CredentialVerifier: Send + Sync {
    /// Resolve a credential to the principal it represents.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is not acceptable.
    fn verify(&self, credential: &str) -> Result<Principal>;
}

/// The receiving end of one registration.
#[derive(Debug)]
pub struct Observer {
    id: u64,
    channel: String,
    receiver: mpsc::Receiver<Push>,
}

impl Observer {
    /// Registration id, unique per hub.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Channel the observer joined.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next push. `None` once the hub dropped this observer.
    pub async fn recv(&mut self) -> Option<Push> {
        self.receiver.recv().await
    }

    /// Take a queued push without waiting.
    pub fn try_recv(&mut self) -> Option<Push> {
        self.receiver.try_recv().ok()
    }
}

type Registry = HashMap<String, HashMap<u64, mpsc::Sender<Push>>>;

/// Publish/subscribe registry for dashboard observers.
#[derive(Debug)]
pub struct Hub {
    aggregator: Aggregator,
    buffer: usize,
    next_id: AtomicU64,
    channels: RwLock<Registry>,
}

impl Hub {
    /// Create a hub whose observers each queue up to `buffer` pushes.
    #[must_use]
    pub fn new(aggregator: Aggregator, buffer: usize) -> Self {
        Self {
            aggregator,
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register an observer on `channel` without any credential check.
    pub fn admit(&self, channel: &str) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.channels
            .write()
            .entry(channel.to_string())
            .or_default()
            .insert(id, sender);
        debug!(id, channel, "Observer admitted");
        Observer {
            id,
            channel: channel.to_string(),
            receiver,
        }
    }

    /// Unregister an observer. Unknown ids are ignored.
    pub fn remove(&self, channel: &str, id: u64) {
        let mut channels = self.channels.write();
        if let Some(observers) = channels.get_mut(channel) {
            if observers.remove(&id).is_some() {
                debug!(id, channel, "Observer removed");
            }
            if observers.is_empty() {
                channels.remove(channel);
            }
        }
    }

    /// Number of observers currently registered on `channel`.
    #[must_use]
    pub fn observer_count(&self, channel: &str) -> usize {
        self.channels.read().get(channel).map_or(0, HashMap::len)
    }

    /// Verify `credential` and, if accepted, register an observer and send
    /// it the current dashboard state.
    ///
    /// A rejected credential registers nothing and pushes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if the credential is rejected.
    pub fn connect(
        &self,
        channel: &str,
        credential: &str,
        verifier: &dyn CredentialVerifier,
    ) -> Result<(Principal, Observer)> {
        let principal = verifier.verify(credential).map_err(|e| {
            warn!(channel, error = %e, "Observer rejected");
            match e {
                Error::Credential(_) => e,
                other => Error::credential(other.to_string()),
            }
        })?;

        let observer = self.admit(channel);
        info!(
            id = observer.id,
            actor_id = principal.actor_id,
            role = %principal.role,
            "Observer connected"
        );

        match self.aggregator.snapshot() {
            Ok(metrics) => {
                let push = Push {
                    event: events::INITIAL.to_string(),
                    metrics,
                    payload: Value::Null,
                };
                if let Some(sender) = self.sender(channel, observer.id) {
                    if sender.try_send(push).is_err() {
                        warn!(id = observer.id, "Initial push not delivered");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Initial snapshot failed"),
        }

        Ok((principal, observer))
    }

    fn sender(&self, channel: &str, id: u64) -> Option<mpsc::Sender<Push>> {
        self.channels.read().get(channel)?.get(&id).cloned()
    }

    /// Recompute the snapshot and offer it to every dashboard observer.
    ///
    /// Never blocks and never fails: a full observer misses this push, a
    /// closed one is unregistered, and a snapshot failure is logged.
    /// Returns the number of observers the push was queued for.
    pub fn broadcast(&self, event: &str, payload: Value) -> usize {
        let metrics = match self.aggregator.snapshot() {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(event, error = %e, "Snapshot failed; broadcast skipped");
                return 0;
            }
        };
        let push = Push {
            event: event.to_string(),
            metrics,
            payload,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let channels = self.channels.read();
            let Some(observers) = channels.get(DASHBOARD_CHANNEL) else {
                return 0;
            };
            for (id, sender) in observers {
                match sender.try_send(push.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(id, event, "Observer queue full; push dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            self.remove(DASHBOARD_CHANNEL, id);
        }
        debug!(event, delivered, "Broadcast");
        delivered
    }
}

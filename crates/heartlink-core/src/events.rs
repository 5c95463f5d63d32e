//! Observable state and event notifications.
//!
//! Current values (bpm, connection status, the `connected` projection and
//! the discovered-device snapshot) are published through
//! [`tokio::sync::watch`] channels, so a late subscriber always sees the
//! latest value. Discrete occurrences are broadcast as [`CentralEvent`]s.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use heartlink_types::{ConnectionStatus, DiscoveredPeripheral, HeartRateReading};

use crate::error::Error;

/// Coarse classification of errors reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A privileged operation was attempted without its grant.
    PermissionDenied,
    /// A transport request or GATT step failed.
    TransportError,
    /// The link dropped.
    LinkLost,
    /// A payload could not be decoded.
    DecodeAnomaly,
    /// An operation was rejected in the current state.
    InvalidState,
}

impl From<&Error> for ErrorKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::LinkLost { .. } => ErrorKind::LinkLost,
            Error::Decode(_) => ErrorKind::DecodeAnomaly,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            _ => ErrorKind::TransportError,
        }
    }
}

/// Events emitted by the central.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum CentralEvent {
    /// Scanning started.
    ScanStarted,
    /// Scanning stopped.
    ScanStopped,
    /// A peripheral was recorded.
    PeripheralDiscovered { peripheral: DiscoveredPeripheral },
    /// The published connection status changed.
    StatusChanged { status: ConnectionStatus },
    /// A heart-rate reading was decoded.
    Reading { reading: HeartRateReading },
    /// Something failed.
    Error { kind: ErrorKind, message: String },
}

/// Sender for central events.
pub type EventSender = broadcast::Sender<CentralEvent>;

/// Receiver for central events.
pub type EventReceiver = broadcast::Receiver<CentralEvent>;

/// Publisher side of all observable state.
///
/// Owned by the central; the state machine and scan coordinator publish
/// through it, callers read through [`ObserverHandle`].
#[derive(Debug)]
pub struct Observers {
    bpm: watch::Sender<u16>,
    status: watch::Sender<ConnectionStatus>,
    connected: watch::Sender<bool>,
    devices: watch::Sender<Vec<DiscoveredPeripheral>>,
    events: EventSender,
}

impl Observers {
    /// Create publishers with the given event broadcast capacity.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            bpm: watch::Sender::new(0),
            status: watch::Sender::new(ConnectionStatus::Disconnected),
            connected: watch::Sender::new(false),
            devices: watch::Sender::new(Vec::new()),
            events,
        }
    }

    /// Create a read-only view for a caller.
    pub fn handle(&self) -> ObserverHandle {
        ObserverHandle {
            bpm: self.bpm.subscribe(),
            status: self.status.subscribe(),
            connected: self.connected.subscribe(),
            devices: self.devices.subscribe(),
            events: self.events.clone(),
        }
    }

    /// Publish a decoded reading.
    pub fn publish_reading(&self, reading: HeartRateReading) {
        self.bpm.send_replace(reading.beats_per_minute);
        self.emit(CentralEvent::Reading { reading });
    }

    /// Publish a connection status. Unchanged values are not re-announced.
    pub fn publish_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        let connected = status.is_connected();
        self.connected.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
        if changed {
            self.emit(CentralEvent::StatusChanged { status });
        }
    }

    /// Publish a new device snapshot.
    pub fn publish_devices(&self, snapshot: Vec<DiscoveredPeripheral>) {
        self.devices.send_replace(snapshot);
    }

    /// Publish an error.
    pub fn publish_error(&self, err: &Error) {
        self.emit(CentralEvent::Error {
            kind: ErrorKind::from(err),
            message: err.to_string(),
        });
    }

    /// Broadcast an event.
    pub fn emit(&self, event: CentralEvent) {
        // Ignore error if no receivers
        let _ = self.events.send(event);
    }

    /// The currently published status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Read-only view of the published state.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    bpm: watch::Receiver<u16>,
    status: watch::Receiver<ConnectionStatus>,
    connected: watch::Receiver<bool>,
    devices: watch::Receiver<Vec<DiscoveredPeripheral>>,
    events: EventSender,
}

impl ObserverHandle {
    /// Latest beats per minute (0 until the first reading).
    pub fn bpm(&self) -> u16 {
        *self.bpm.borrow()
    }

    /// Latest published connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Boolean projection of the status.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Copy of the latest device snapshot.
    pub fn devices(&self) -> Vec<DiscoveredPeripheral> {
        self.devices.borrow().clone()
    }

    /// Watch the bpm value.
    pub fn watch_bpm(&self) -> watch::Receiver<u16> {
        self.bpm.clone()
    }

    /// Watch the connection status.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Watch the `connected` projection.
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Watch the device snapshot.
    pub fn watch_devices(&self) -> watch::Receiver<Vec<DiscoveredPeripheral>> {
        self.devices.clone()
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use heartlink_types::ParseError;

    use super::*;
    use crate::permission::Permission;

    #[test]
    fn test_defaults() {
        let observers = Observers::default();
        let handle = observers.handle();
        assert_eq!(handle.bpm(), 0);
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
        assert!(!handle.is_connected());
        assert!(handle.devices().is_empty());
    }

    #[test]
    fn test_publish_reading() {
        let observers = Observers::default();
        let handle = observers.handle();
        let mut events = handle.subscribe();

        observers.publish_reading(HeartRateReading::new(75));

        assert_eq!(handle.bpm(), 75);
        assert_eq!(
            events.try_recv().unwrap(),
            CentralEvent::Reading {
                reading: HeartRateReading::new(75)
            }
        );
    }

    #[test]
    fn test_status_projection_and_dedup() {
        let observers = Observers::default();
        let handle = observers.handle();
        let mut events = handle.subscribe();

        observers.publish_status(ConnectionStatus::Connecting);
        assert!(!handle.is_connected());
        observers.publish_status(ConnectionStatus::Connected);
        assert!(handle.is_connected());
        observers.publish_status(ConnectionStatus::Connected);

        assert_eq!(
            events.try_recv().unwrap(),
            CentralEvent::StatusChanged {
                status: ConnectionStatus::Connecting
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            CentralEvent::StatusChanged {
                status: ConnectionStatus::Connected
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_publish_devices_replaces_snapshot() {
        let observers = Observers::default();
        let handle = observers.handle();

        observers.publish_devices(vec![DiscoveredPeripheral::new("AA", None, -40)]);
        assert_eq!(handle.devices().len(), 1);

        observers.publish_devices(Vec::new());
        assert!(handle.devices().is_empty());
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            ErrorKind::from(&Error::PermissionDenied(Permission::Scan)),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            ErrorKind::from(&Error::link_lost("AA")),
            ErrorKind::LinkLost
        );
        assert_eq!(
            ErrorKind::from(&Error::Decode(ParseError::InsufficientBytes {
                expected: 3,
                actual: 1
            })),
            ErrorKind::DecodeAnomaly
        );
        assert_eq!(
            ErrorKind::from(&Error::transport("busy")),
            ErrorKind::TransportError
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CentralEvent::Reading {
            reading: HeartRateReading::new(61),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"reading\""));
        assert!(json.contains("\"beats_per_minute\":61"));

        let json = serde_json::to_string(&CentralEvent::ScanStarted).unwrap();
        assert_eq!(json, "{\"type\":\"scan_started\"}");
    }
}

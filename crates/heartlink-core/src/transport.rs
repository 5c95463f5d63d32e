//! The transport seam between the core and a BLE stack.
//!
//! A [`Transport`] accepts fire-and-forget requests; their outcomes arrive
//! later as [`TransportEvent`]s on a bounded channel created with
//! [`transport_channel`]. The [`HeartRateCentral`](crate::HeartRateCentral)
//! drains that channel one event at a time.
//!
//! Two implementations ship with the crate: [`BtleplugTransport`] for real
//! adapters and [`MockTransport`] for tests.
//!
//! [`BtleplugTransport`]: crate::ble::BtleplugTransport
//! [`MockTransport`]: crate::mock::MockTransport

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use heartlink_types::DiscoveredPeripheral;

use crate::error::Result;

/// Status code attached to GATT completion events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GattStatus {
    /// The operation succeeded.
    Success,
    /// The operation failed with a stack-specific code.
    Failure(u16),
}

impl GattStatus {
    /// Whether this is [`GattStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, GattStatus::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GattStatus::Success => f.write_str("success"),
            GattStatus::Failure(code) => write!(f, "status {}", code),
        }
    }
}

/// A characteristic in a discovered service table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUIDs of the descriptors attached to it.
    pub descriptors: Vec<Uuid>,
}

impl GattCharacteristic {
    /// Create a characteristic entry.
    pub fn new(uuid: Uuid, descriptors: Vec<Uuid>) -> Self {
        Self { uuid, descriptors }
    }

    /// Whether the characteristic carries `descriptor`.
    pub fn has_descriptor(&self, descriptor: Uuid) -> bool {
        self.descriptors.contains(&descriptor)
    }
}

/// A service in a discovered service table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Characteristics within the service.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Create a service entry.
    pub fn new(uuid: Uuid, characteristics: Vec<GattCharacteristic>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }

    /// Look up a characteristic by UUID.
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Asynchronous outcomes reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A scan result arrived.
    PeripheralDiscovered(DiscoveredPeripheral),
    /// The link to `address` is up.
    LinkUp {
        /// Peripheral address.
        address: String,
    },
    /// The link to `address` went down (or never came up).
    LinkDown {
        /// Peripheral address.
        address: String,
        /// Transport-supplied reason, if any.
        reason: Option<String>,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Completion status.
        status: GattStatus,
        /// The service table (empty on failure).
        services: Vec<GattService>,
    },
    /// A descriptor write was acknowledged.
    DescriptorWritten {
        /// Characteristic owning the descriptor.
        characteristic: Uuid,
        /// Descriptor that was written.
        descriptor: Uuid,
        /// Completion status.
        status: GattStatus,
    },
    /// A notification carried a new characteristic value.
    CharacteristicChanged {
        /// Characteristic that changed.
        characteristic: Uuid,
        /// Raw payload.
        value: Vec<u8>,
    },
}

/// Sender half of the transport event channel.
pub type TransportEventSender = mpsc::Sender<TransportEvent>;

/// Receiver half of the transport event channel.
pub type TransportEventReceiver = mpsc::Receiver<TransportEvent>;

/// Create a bounded transport event channel.
pub fn transport_channel(capacity: usize) -> (TransportEventSender, TransportEventReceiver) {
    mpsc::channel(capacity)
}

/// Requests the core makes of a BLE stack.
///
/// Every method returns once the stack has accepted the request. An `Err`
/// means the request was refused outright; the eventual outcome of an
/// accepted request is delivered as a [`TransportEvent`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin delivering [`TransportEvent::PeripheralDiscovered`] events.
    async fn start_scan(&self) -> Result<()>;

    /// Stop delivering scan results. Must be safe to call when not scanning.
    async fn stop_scan(&self) -> Result<()>;

    /// Open a GATT session to `address`.
    ///
    /// Completion is reported with [`TransportEvent::LinkUp`] or
    /// [`TransportEvent::LinkDown`].
    async fn connect(&self, address: &str) -> Result<()>;

    /// Discover the service table of the connected peripheral.
    async fn discover_services(&self) -> Result<()>;

    /// Enable or disable local delivery of notifications for a characteristic.
    async fn set_characteristic_notification(
        &self,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()>;

    /// Write `value` to a descriptor.
    ///
    /// Completion is reported with [`TransportEvent::DescriptorWritten`].
    async fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()>;

    /// Close the GATT session, if any. Must be safe to call in any state.
    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn start_scan(&self) -> Result<()> {
        (**self).start_scan().await
    }

    async fn stop_scan(&self) -> Result<()> {
        (**self).stop_scan().await
    }

    async fn connect(&self, address: &str) -> Result<()> {
        (**self).connect(address).await
    }

    async fn discover_services(&self) -> Result<()> {
        (**self).discover_services().await
    }

    async fn set_characteristic_notification(
        &self,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        (**self)
            .set_characteristic_notification(service, characteristic, enabled)
            .await
    }

    async fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()> {
        (**self)
            .write_descriptor(service, characteristic, descriptor, value)
            .await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }
}

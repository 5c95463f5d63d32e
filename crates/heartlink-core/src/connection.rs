//! The connection state machine.
//!
//! Owns the single peripheral session and drives it through
//!
//! ```text
//! Disconnected -> Connecting -> DiscoveringServices -> SubscribingNotifications -> Streaming
//! ```
//!
//! Every failure returns to `Disconnected`, and `disconnect()` does so from
//! any state. Transport outcomes are fed in one at a time through
//! [`ConnectionStateMachine::handle_event`].
//!
//! The published status differs from the internal state in one place: on
//! link-up the machine moves to `DiscoveringServices` but publishes
//! `Connected`, so observers see the link come up while discovery runs.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use heartlink_types::uuid::{
    CLIENT_CHARACTERISTIC_CONFIG, ENABLE_NOTIFICATION_VALUE, HEART_RATE_MEASUREMENT,
    HEART_RATE_SERVICE,
};
use heartlink_types::{ConnectionStatus, DecoderMode, HeartRateReading};

use crate::error::{Error, Result};
use crate::events::Observers;
use crate::permission::{Permission, Permissions};
use crate::transport::{GattService, GattStatus, Transport, TransportEvent};

/// Ownership of the one open (or pending) GATT session.
///
/// At most one exists at a time; it is created by a successful
/// [`ConnectionStateMachine::connect`] and dropped on any teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    address: String,
}

impl ActiveConnection {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Address of the connected peripheral.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Drives a single heart-rate peripheral session.
pub struct ConnectionStateMachine {
    transport: Arc<dyn Transport>,
    permissions: Arc<dyn Permissions>,
    observers: Arc<Observers>,
    decoder: DecoderMode,
    state: ConnectionStatus,
    active: Option<ActiveConnection>,
}

impl std::fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

impl ConnectionStateMachine {
    /// Create a machine in the `Disconnected` state.
    pub fn new(
        transport: Arc<dyn Transport>,
        permissions: Arc<dyn Permissions>,
        observers: Arc<Observers>,
        decoder: DecoderMode,
    ) -> Self {
        Self {
            transport,
            permissions,
            observers,
            decoder,
            state: ConnectionStatus::Disconnected,
            active: None,
        }
    }

    /// Current internal state.
    pub fn state(&self) -> ConnectionStatus {
        self.state
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<&ActiveConnection> {
        self.active.as_ref()
    }

    /// Address of the active session, if any.
    pub fn active_address(&self) -> Option<&str> {
        self.active.as_ref().map(ActiveConnection::address)
    }

    /// Request a connection to `address`.
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if the connect grant is missing; nothing
    ///   is attempted and the state stays `Disconnected`.
    /// - [`Error::InvalidState`] if a session already exists.
    /// - Any error from the transport refusing the request; the state stays
    ///   `Disconnected`.
    #[tracing::instrument(level = "info", skip_all, fields(address = %address))]
    pub async fn connect(&mut self, address: &str) -> Result<()> {
        self.require(Permission::Connect)?;

        if self.state != ConnectionStatus::Disconnected || self.active.is_some() {
            return Err(Error::invalid_state("connect", self.state));
        }

        self.transport.connect(address).await?;
        self.active = Some(ActiveConnection::new(address));
        self.enter(ConnectionStatus::Connecting);
        Ok(())
    }

    /// Tear down the session from any state.
    ///
    /// Transport errors while closing are logged; the machine always ends in
    /// `Disconnected` with no active session.
    pub async fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Disconnecting from {}", active.address);
            if let Err(e) = self.transport.disconnect().await {
                warn!("Transport disconnect from {} failed: {}", active.address, e);
            }
        }
        self.enter(ConnectionStatus::Disconnected);
    }

    /// Apply one transport event.
    ///
    /// Events that do not apply to the current state are ignored. Scan
    /// results are not handled here.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended (or stalled) the session, or a decode
    /// error for an unusable notification payload.
    pub async fn handle_event(&mut self, event: &TransportEvent) -> Result<()> {
        match event {
            TransportEvent::LinkUp { address } => self.on_link_up(address).await,
            TransportEvent::LinkDown { address, reason } => {
                self.on_link_down(address, reason.as_deref()).await
            }
            TransportEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(*status, services).await
            }
            TransportEvent::DescriptorWritten {
                characteristic,
                descriptor,
                status,
            } => {
                self.on_descriptor_written(*characteristic, *descriptor, *status)
                    .await
            }
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            } => self.on_characteristic_changed(*characteristic, value).map(|_| ()),
            TransportEvent::PeripheralDiscovered(_) => Ok(()),
        }
    }

    async fn on_link_up(&mut self, address: &str) -> Result<()> {
        if self.state != ConnectionStatus::Connecting || !self.is_active(address) {
            debug!("Ignoring link-up from {} while {}", address, self.state);
            return Ok(());
        }

        self.require(Permission::Connect)?;

        info!("Connected to {}", address);
        if let Err(e) = self.transport.discover_services().await {
            self.teardown().await;
            return Err(e);
        }

        self.set_state(ConnectionStatus::DiscoveringServices);
        self.observers.publish_status(ConnectionStatus::Connected);
        Ok(())
    }

    async fn on_link_down(&mut self, address: &str, reason: Option<&str>) -> Result<()> {
        if self.state == ConnectionStatus::Disconnected || !self.is_active(address) {
            debug!("Ignoring link-down from {} while {}", address, self.state);
            return Ok(());
        }

        info!(
            "Link to {} down while {}: {}",
            address,
            self.state,
            reason.unwrap_or("no reason given")
        );
        self.teardown().await;
        Err(Error::link_lost(address))
    }

    async fn on_services_discovered(
        &mut self,
        status: GattStatus,
        services: &[GattService],
    ) -> Result<()> {
        if self.state != ConnectionStatus::DiscoveringServices {
            debug!("Ignoring service table while {}", self.state);
            return Ok(());
        }

        if !status.is_success() {
            self.teardown().await;
            return Err(Error::gatt("discover services", status));
        }

        debug!("Found {} services", services.len());
        let Some(service) = services.iter().find(|s| s.uuid == HEART_RATE_SERVICE) else {
            self.teardown().await;
            return Err(Error::service_not_found(HEART_RATE_SERVICE, services.len()));
        };
        let Some(characteristic) = service.characteristic(HEART_RATE_MEASUREMENT) else {
            self.teardown().await;
            return Err(Error::characteristic_not_found(
                HEART_RATE_MEASUREMENT,
                HEART_RATE_SERVICE,
            ));
        };
        if !characteristic.has_descriptor(CLIENT_CHARACTERISTIC_CONFIG) {
            debug!("Heart Rate Measurement lists no CCCD; writing it anyway");
        }

        self.require(Permission::Connect)?;

        let subscribed = async {
            self.transport
                .set_characteristic_notification(HEART_RATE_SERVICE, HEART_RATE_MEASUREMENT, true)
                .await?;
            self.transport
                .write_descriptor(
                    HEART_RATE_SERVICE,
                    HEART_RATE_MEASUREMENT,
                    CLIENT_CHARACTERISTIC_CONFIG,
                    &ENABLE_NOTIFICATION_VALUE,
                )
                .await
        }
        .await;
        if let Err(e) = subscribed {
            self.teardown().await;
            return Err(e);
        }

        self.enter(ConnectionStatus::SubscribingNotifications);
        Ok(())
    }

    async fn on_descriptor_written(
        &mut self,
        characteristic: Uuid,
        descriptor: Uuid,
        status: GattStatus,
    ) -> Result<()> {
        if self.state != ConnectionStatus::SubscribingNotifications
            || characteristic != HEART_RATE_MEASUREMENT
            || descriptor != CLIENT_CHARACTERISTIC_CONFIG
        {
            debug!(
                "Ignoring write ack for {}/{} while {}",
                characteristic, descriptor, self.state
            );
            return Ok(());
        }

        if !status.is_success() {
            self.teardown().await;
            return Err(Error::gatt("write descriptor", status));
        }

        self.enter(ConnectionStatus::Streaming);
        Ok(())
    }

    /// Decode and publish a notification payload.
    ///
    /// Returns `Ok(None)` for notifications that are ignored (wrong
    /// characteristic or not streaming).
    fn on_characteristic_changed(
        &mut self,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<Option<HeartRateReading>> {
        if characteristic != HEART_RATE_MEASUREMENT || self.state != ConnectionStatus::Streaming {
            debug!(
                "Ignoring notification from {} while {}",
                characteristic, self.state
            );
            return Ok(None);
        }

        let reading = self.decoder.decode(value)?;
        debug!("Heart rate: {}", reading);
        self.observers.publish_reading(reading);
        Ok(Some(reading))
    }

    fn require(&self, permission: Permission) -> Result<()> {
        if self.permissions.is_granted(permission) {
            Ok(())
        } else {
            warn!("{} permission not granted while {}", permission, self.state);
            Err(Error::PermissionDenied(permission))
        }
    }

    fn is_active(&self, address: &str) -> bool {
        self.active_address() == Some(address)
    }

    async fn teardown(&mut self) {
        self.disconnect().await;
    }

    fn set_state(&mut self, next: ConnectionStatus) {
        if self.state != next {
            info!("Connection state: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn enter(&mut self, next: ConnectionStatus) {
        self.set_state(next);
        self.observers.publish_status(next);
    }
}

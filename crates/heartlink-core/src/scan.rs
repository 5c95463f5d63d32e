//! Scan session management and the handoff to the connection state machine.

use std::sync::Arc;

use tracing::{debug, info, warn};

use heartlink_types::DiscoveredPeripheral;

use crate::connection::ConnectionStateMachine;
use crate::error::{Error, Result};
use crate::events::{CentralEvent, Observers};
use crate::permission::{Permission, Permissions};
use crate::registry::DeviceRegistry;
use crate::transport::Transport;

/// Starts and stops scans, records results, and hands the first peripheral
/// advertising the target name to the [`ConnectionStateMachine`].
///
/// Each scan session performs at most one handoff. The scan is always
/// stopped before the connection request is made.
pub struct ScanCoordinator {
    transport: Arc<dyn Transport>,
    permissions: Arc<dyn Permissions>,
    observers: Arc<Observers>,
    registry: DeviceRegistry,
    target_name: String,
    scanning: bool,
    handed_off: bool,
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("target_name", &self.target_name)
            .field("scanning", &self.scanning)
            .field("handed_off", &self.handed_off)
            .field("discovered", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl ScanCoordinator {
    /// Create an idle coordinator looking for `target_name`.
    pub fn new(
        transport: Arc<dyn Transport>,
        permissions: Arc<dyn Permissions>,
        observers: Arc<Observers>,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            permissions,
            observers,
            registry: DeviceRegistry::new(),
            target_name: target_name.into(),
            scanning: false,
            handed_off: false,
        }
    }

    /// Whether a scan session is in progress.
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// The advertised name that triggers a connection.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Peripherals recorded in the current scan session.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Begin a new scan session.
    ///
    /// Any existing connection is torn down first. The registry is cleared
    /// and the empty snapshot published before the radio is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] without touching the radio or the
    /// connection if the scan grant is missing, or the transport's error if
    /// it refuses to scan.
    pub async fn start_scan(&mut self, connection: &mut ConnectionStateMachine) -> Result<()> {
        if !self.permissions.is_granted(Permission::Scan) {
            warn!("Scan permission not granted");
            return Err(Error::PermissionDenied(Permission::Scan));
        }

        if connection.state().has_session() {
            info!("Closing session while {} before scanning", connection.state());
            connection.disconnect().await;
        }

        if self.scanning {
            debug!("Restarting scan session");
            self.stop_scan().await?;
        }

        self.registry.clear();
        self.observers.publish_devices(self.registry.snapshot());
        self.handed_off = false;

        self.transport.start_scan().await?;
        self.scanning = true;
        info!("Scanning for '{}'", self.target_name);
        self.observers.emit(CentralEvent::ScanStarted);
        Ok(())
    }

    /// End the scan session. Calling this while idle does nothing.
    ///
    /// # Errors
    ///
    /// Returns the transport's error. The coordinator stops accepting
    /// results either way.
    pub async fn stop_scan(&mut self) -> Result<()> {
        if !self.scanning {
            return Ok(());
        }
        self.scanning = false;
        self.transport.stop_scan().await?;
        info!("Scan stopped after {} results", self.registry.len());
        self.observers.emit(CentralEvent::ScanStopped);
        Ok(())
    }

    /// Handle one scan result.
    ///
    /// Results outside a scan session, and all results while the connect
    /// grant is missing, are dropped unrecorded. A recorded result is
    /// published as a fresh snapshot. The first result advertising the
    /// target name stops the scan and is handed to `connection`.
    ///
    /// # Errors
    ///
    /// Returns the error from the connection request made on handoff.
    pub async fn on_peripheral_discovered(
        &mut self,
        peripheral: DiscoveredPeripheral,
        connection: &mut ConnectionStateMachine,
    ) -> Result<()> {
        if !self.scanning {
            debug!("Dropping late scan result from {}", peripheral.address);
            return Ok(());
        }
        if !self.permissions.is_granted(Permission::Connect) {
            debug!(
                "Dropping scan result from {}: connect permission not granted",
                peripheral.address
            );
            return Ok(());
        }

        debug!("Discovered {}", peripheral);
        let is_target = peripheral.has_name(&self.target_name);
        let address = peripheral.address.clone();

        self.registry.record(peripheral.clone());
        self.observers.publish_devices(self.registry.snapshot());
        self.observers.emit(CentralEvent::PeripheralDiscovered { peripheral });

        if !is_target {
            return Ok(());
        }
        if self.handed_off {
            debug!("Ignoring repeat match from {}", address);
            return Ok(());
        }

        self.handed_off = true;
        info!("Found '{}' at {}", self.target_name, address);
        if let Err(e) = self.stop_scan().await {
            warn!("Failed to stop scan before connecting: {}", e);
        }
        connection.connect(&address).await
    }
}

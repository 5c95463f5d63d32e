//! [`Transport`] over a real Bluetooth adapter, via btleplug.
//!
//! btleplug connects and discovers with blocking calls, while the core
//! expects requests to return immediately and report their outcome later.
//! Each long-running request therefore runs on its own task, bounded by the
//! configured timeout, and posts a [`TransportEvent`] when it finishes.
//!
//! btleplug's `subscribe` writes the Client Characteristic Configuration
//! descriptor itself, so a CCCD write request is acknowledged without a
//! second write.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent as AdapterEvent, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, Service,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use heartlink_types::DiscoveredPeripheral;
use heartlink_types::uuid::CLIENT_CHARACTERISTIC_CONFIG;

use crate::config::CentralConfig;
use crate::error::{Error, Result};
use crate::transport::{
    GattCharacteristic, GattService, GattStatus, Transport, TransportEvent, TransportEventSender,
};
use crate::util::{create_identifier, format_peripheral_id, lock};

/// Status reported for failures the stack does not attach a code to.
const GATT_FAILURE: u16 = 0x0101;

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

/// The open session: its peripheral and the tasks serving it.
struct Session {
    address: String,
    peripheral: Peripheral,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn abort(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// A [`Transport`] backed by a btleplug adapter.
pub struct BtleplugTransport {
    adapter: Adapter,
    events: TransportEventSender,
    connect_timeout: Duration,
    discovery_timeout: Duration,
    /// Peripherals seen while scanning, by identifier.
    peripherals: Arc<Mutex<HashMap<String, Peripheral>>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for BtleplugTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugTransport")
            .field("connect_timeout", &self.connect_timeout)
            .field("discovery_timeout", &self.discovery_timeout)
            .field("known_peripherals", &lock(&self.peripherals).len())
            .field(
                "session",
                &lock(&self.session).as_ref().map(|s| s.address.clone()),
            )
            .finish_non_exhaustive()
    }
}

impl BtleplugTransport {
    /// Open the first adapter and deliver events to `events`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if the system has no Bluetooth adapter.
    pub async fn new(events: TransportEventSender, config: &CentralConfig) -> Result<Self> {
        let adapter = get_adapter().await?;
        Ok(Self::with_adapter(adapter, events, config))
    }

    /// Use a specific adapter.
    pub fn with_adapter(
        adapter: Adapter,
        events: TransportEventSender,
        config: &CentralConfig,
    ) -> Self {
        Self {
            adapter,
            events,
            connect_timeout: config.connect_timeout_duration(),
            discovery_timeout: config.discovery_timeout_duration(),
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            scan_task: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    fn session_peripheral(&self, operation: &'static str) -> Result<(String, Peripheral)> {
        lock(&self.session)
            .as_ref()
            .map(|s| (s.address.clone(), s.peripheral.clone()))
            .ok_or_else(|| Error::transport(format!("Cannot {}: no open session", operation)))
    }

    fn track(&self, task: JoinHandle<()>) {
        match lock(&self.session).as_mut() {
            Some(session) => session.tasks.push(task),
            None => task.abort(),
        }
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| Error::characteristic_not_found(characteristic, service))
    }
}

/// Drop every peripheral remembered from earlier scans. Returns how many
/// were dropped.
fn forget_peripherals<P>(known: &Mutex<HashMap<String, P>>) -> usize {
    let mut known = lock(known);
    let count = known.len();
    known.clear();
    count
}

async fn post(events: &TransportEventSender, event: TransportEvent) {
    if events.send(event).await.is_err() {
        debug!("Transport event receiver dropped");
    }
}

/// Build a scan result from a peripheral's advertised properties.
async fn discovered(peripheral: &Peripheral) -> Option<(String, DiscoveredPeripheral)> {
    let properties = match peripheral.properties().await {
        Ok(Some(p)) => p,
        Ok(None) => return None,
        Err(e) => {
            debug!("No properties for {:?}: {}", peripheral.id(), e);
            return None;
        }
    };
    let address = create_identifier(&properties.address.to_string(), &peripheral.id());
    let rssi = properties.rssi.unwrap_or_default();
    let result = DiscoveredPeripheral::new(address.clone(), properties.local_name, rssi);
    Some((address, result))
}

fn gatt_services(services: &BTreeSet<Service>) -> Vec<GattService> {
    services
        .iter()
        .map(|service| {
            let characteristics = service
                .characteristics
                .iter()
                .map(|c| {
                    GattCharacteristic::new(c.uuid, c.descriptors.iter().map(|d| d.uuid).collect())
                })
                .collect();
            GattService::new(service.uuid, characteristics)
        })
        .collect()
}

/// Post `LinkDown` when the adapter reports `id` disconnected.
async fn watch_disconnect(
    adapter: Adapter,
    id: PeripheralId,
    address: String,
    events: TransportEventSender,
) {
    let mut stream = match adapter.events().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Disconnect watcher: could not subscribe to adapter events: {}", e);
            return;
        }
    };
    while let Some(event) = stream.next().await {
        if let AdapterEvent::DeviceDisconnected(gone) = event
            && gone == id
        {
            info!("Adapter reports {} disconnected", format_peripheral_id(&id));
            post(
                &events,
                TransportEvent::LinkDown {
                    address,
                    reason: Some("disconnected by adapter".to_string()),
                },
            )
            .await;
            return;
        }
    }
}

#[async_trait]
impl Transport for BtleplugTransport {
    async fn start_scan(&self) -> Result<()> {
        let forgotten = forget_peripherals(&*self.peripherals);
        if forgotten > 0 {
            debug!("Forgot {} peripherals from the previous scan", forgotten);
        }
        let mut stream = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let peripherals = self.peripherals.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let id = match event {
                    AdapterEvent::DeviceDiscovered(id) | AdapterEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let Some((address, result)) = discovered(&peripheral).await else {
                    continue;
                };
                lock(&peripherals).insert(address, peripheral);
                post(&events, TransportEvent::PeripheralDiscovered(result)).await;
            }
        });

        if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
            task.abort();
            return Err(e.into());
        }
        if let Some(previous) = lock(&self.scan_task).replace(task) {
            previous.abort();
        }
        info!("Adapter scan started");
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let Some(task) = lock(&self.scan_task).take() else {
            return Ok(());
        };
        task.abort();
        self.adapter.stop_scan().await?;
        info!("Adapter scan stopped");
        Ok(())
    }

    #[tracing::instrument(level = "info", skip_all, fields(address = %address))]
    async fn connect(&self, address: &str) -> Result<()> {
        let peripheral = lock(&self.peripherals)
            .get(address)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound(address.to_string()))?;

        if let Some(mut previous) = lock(&self.session).take() {
            warn!("Replacing session with {}", previous.address);
            previous.abort();
        }

        let watcher = tokio::spawn(watch_disconnect(
            self.adapter.clone(),
            peripheral.id(),
            address.to_string(),
            self.events.clone(),
        ));

        let connect_timeout = self.connect_timeout;
        let events = self.events.clone();
        let link = peripheral.clone();
        let target = address.to_string();
        let connector = tokio::spawn(async move {
            let event = match timeout(connect_timeout, link.connect()).await {
                Ok(Ok(())) => TransportEvent::LinkUp { address: target },
                Ok(Err(e)) => TransportEvent::LinkDown {
                    address: target,
                    reason: Some(e.to_string()),
                },
                Err(_) => TransportEvent::LinkDown {
                    address: target,
                    reason: Some(Error::timeout("connect", connect_timeout).to_string()),
                },
            };
            post(&events, event).await;
        });

        *lock(&self.session) = Some(Session {
            address: address.to_string(),
            peripheral,
            tasks: vec![watcher, connector],
        });
        Ok(())
    }

    async fn discover_services(&self) -> Result<()> {
        let (address, peripheral) = self.session_peripheral("discover services")?;
        let discovery_timeout = self.discovery_timeout;
        let events = self.events.clone();

        self.track(tokio::spawn(async move {
            let event = match timeout(discovery_timeout, peripheral.discover_services()).await {
                Ok(Ok(())) => {
                    let services = gatt_services(&peripheral.services());
                    debug!("{} exposes {} services", address, services.len());
                    TransportEvent::ServicesDiscovered {
                        status: GattStatus::Success,
                        services,
                    }
                }
                Ok(Err(e)) => {
                    warn!("Service discovery on {} failed: {}", address, e);
                    TransportEvent::ServicesDiscovered {
                        status: GattStatus::Failure(GATT_FAILURE),
                        services: Vec::new(),
                    }
                }
                Err(_) => {
                    warn!(
                        "Service discovery on {} timed out after {:?}",
                        address, discovery_timeout
                    );
                    TransportEvent::ServicesDiscovered {
                        status: GattStatus::Failure(GATT_FAILURE),
                        services: Vec::new(),
                    }
                }
            };
            post(&events, event).await;
        }));
        Ok(())
    }

    async fn set_characteristic_notification(
        &self,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        let (_, peripheral) = self.session_peripheral("configure notifications")?;
        let target = Self::find_characteristic(&peripheral, service, characteristic)?;
        if enabled {
            peripheral.subscribe(&target).await?;
        } else {
            peripheral.unsubscribe(&target).await?;
        }
        debug!(
            "Notifications for {} {}",
            characteristic,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    async fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let (_, peripheral) = self.session_peripheral("write descriptor")?;
        let events = self.events.clone();

        if descriptor == CLIENT_CHARACTERISTIC_CONFIG {
            // Open the stream before acknowledging so no notification that
            // follows the ack is missed.
            let mut notifications = peripheral.notifications().await?;
            self.track(tokio::spawn(async move {
                post(
                    &events,
                    TransportEvent::DescriptorWritten {
                        characteristic,
                        descriptor,
                        status: GattStatus::Success,
                    },
                )
                .await;
                while let Some(notification) = notifications.next().await {
                    post(
                        &events,
                        TransportEvent::CharacteristicChanged {
                            characteristic: notification.uuid,
                            value: notification.value,
                        },
                    )
                    .await;
                }
                debug!("Notification stream ended");
            }));
            return Ok(());
        }

        let owner = Self::find_characteristic(&peripheral, service, characteristic)?;
        let target = owner
            .descriptors
            .iter()
            .find(|d| d.uuid == descriptor)
            .cloned()
            .ok_or_else(|| Error::transport(format!("Descriptor {} not found", descriptor)))?;
        let value = value.to_vec();

        self.track(tokio::spawn(async move {
            let status = match peripheral.write_descriptor(&target, &value).await {
                Ok(()) => GattStatus::Success,
                Err(e) => {
                    warn!("Descriptor write failed: {}", e);
                    GattStatus::Failure(GATT_FAILURE)
                }
            };
            post(
                &events,
                TransportEvent::DescriptorWritten {
                    characteristic,
                    descriptor,
                    status,
                },
            )
            .await;
        }));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(mut session) = lock(&self.session).take() else {
            return Ok(());
        };
        session.abort();
        if session.peripheral.is_connected().await.unwrap_or(false) {
            session.peripheral.disconnect().await?;
        }
        info!("Closed session with {}", session.address);
        Ok(())
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.scan_task).take() {
            task.abort();
        }
        if let Some(mut session) = lock(&self.session).take() {
            session.abort();
        }
    }
}

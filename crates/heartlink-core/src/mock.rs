//! Mock transport for testing.
//!
//! [`MockTransport`] records every request made of it, can be told to refuse
//! specific operations, and lets tests play the peripheral's side by
//! pushing [`TransportEvent`]s into the same channel a real transport would.
//!
//! With auto-respond enabled it behaves like a well-behaved heart-rate
//! peripheral: connects come up, discovery reports the Heart Rate service,
//! and the CCCD write is acknowledged.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use heartlink_types::DiscoveredPeripheral;
use heartlink_types::uuid::{
    CLIENT_CHARACTERISTIC_CONFIG, HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE,
};

use crate::error::{Error, Result};
use crate::transport::{
    GattCharacteristic, GattService, GattStatus, Transport, TransportEvent, TransportEventSender,
};
use crate::util::lock;

/// A request recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    StartScan,
    StopScan,
    Connect(String),
    DiscoverServices,
    SetNotification {
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    },
    WriteDescriptor {
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: Vec<u8>,
    },
    Disconnect,
}

impl MockCall {
    /// The operation this call belongs to.
    pub fn operation(&self) -> MockOperation {
        match self {
            MockCall::StartScan => MockOperation::StartScan,
            MockCall::StopScan => MockOperation::StopScan,
            MockCall::Connect(_) => MockOperation::Connect,
            MockCall::DiscoverServices => MockOperation::DiscoverServices,
            MockCall::SetNotification { .. } => MockOperation::SetNotification,
            MockCall::WriteDescriptor { .. } => MockOperation::WriteDescriptor,
            MockCall::Disconnect => MockOperation::Disconnect,
        }
    }
}

/// Transport operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    StartScan,
    StopScan,
    Connect,
    DiscoverServices,
    SetNotification,
    WriteDescriptor,
    Disconnect,
}

/// A scriptable [`Transport`].
///
/// # Example
///
/// ```
/// use heartlink_core::mock::{MockOperation, MockTransport};
/// use heartlink_core::transport::{Transport, transport_channel};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, _rx) = transport_channel(8);
///     let transport = MockTransport::new(tx);
///
///     transport.fail(MockOperation::Connect);
///     assert!(transport.connect("AA:BB:CC:DD:EE:FF").await.is_err());
///     assert_eq!(transport.count(MockOperation::Connect), 1);
/// }
/// ```
pub struct MockTransport {
    events: TransportEventSender,
    calls: Mutex<Vec<MockCall>>,
    failing: Mutex<HashSet<MockOperation>>,
    services: Mutex<Vec<GattService>>,
    connected_to: Mutex<Option<String>>,
    scanning: AtomicBool,
    auto_respond: AtomicBool,
    /// Simulated latency for every request in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("scanning", &self.scanning.load(Ordering::Relaxed))
            .field("auto_respond", &self.auto_respond.load(Ordering::Relaxed))
            .field("connected_to", &*lock(&self.connected_to))
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a passive mock delivering events to `events`.
    pub fn new(events: TransportEventSender) -> Self {
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            services: Mutex::new(vec![Self::heart_rate_service()]),
            connected_to: Mutex::new(None),
            scanning: AtomicBool::new(false),
            auto_respond: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Start building a mock.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// A Heart Rate service exposing the measurement characteristic and its
    /// CCCD.
    pub fn heart_rate_service() -> GattService {
        GattService::new(
            HEART_RATE_SERVICE,
            vec![GattCharacteristic::new(
                HEART_RATE_MEASUREMENT,
                vec![CLIENT_CHARACTERISTIC_CONFIG],
            )],
        )
    }

    /// Every request made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of requests made for `operation`.
    pub fn count(&self, operation: MockOperation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Refuse `operation` until [`succeed`](Self::succeed) is called.
    pub fn fail(&self, operation: MockOperation) {
        lock(&self.failing).insert(operation);
    }

    /// Accept `operation` again.
    pub fn succeed(&self, operation: MockOperation) {
        lock(&self.failing).remove(&operation);
    }

    /// Replace the service table reported by auto-respond discovery.
    pub fn set_services(&self, services: Vec<GattService>) {
        *lock(&self.services) = services;
    }

    /// Enable or disable auto-respond.
    pub fn set_auto_respond(&self, enabled: bool) {
        self.auto_respond.store(enabled, Ordering::Relaxed);
    }

    /// Set simulated request latency.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Address of the current session, if any.
    pub fn connected_to(&self) -> Option<String> {
        lock(&self.connected_to).clone()
    }

    /// Deliver an arbitrary event.
    pub async fn emit(&self, event: TransportEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| Error::ChannelClosed)
    }

    /// Deliver a scan result.
    pub async fn advertise(&self, address: &str, name: Option<&str>, rssi: i16) -> Result<()> {
        self.emit(TransportEvent::PeripheralDiscovered(DiscoveredPeripheral::new(
            address,
            name.map(str::to_string),
            rssi,
        )))
        .await
    }

    /// Report the link to `address` as up.
    pub async fn link_up(&self, address: &str) -> Result<()> {
        self.emit(TransportEvent::LinkUp {
            address: address.to_string(),
        })
        .await
    }

    /// Report the link to `address` as down.
    pub async fn link_down(&self, address: &str, reason: Option<&str>) -> Result<()> {
        self.emit(TransportEvent::LinkDown {
            address: address.to_string(),
            reason: reason.map(str::to_string),
        })
        .await
    }

    /// Deliver a Heart Rate Measurement notification.
    pub async fn notify(&self, value: &[u8]) -> Result<()> {
        self.emit(TransportEvent::CharacteristicChanged {
            characteristic: HEART_RATE_MEASUREMENT,
            value: value.to_vec(),
        })
        .await
    }

    async fn request(&self, call: MockCall) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let operation = call.operation();
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(&operation) {
            return Err(Error::transport(format!("Mock {:?} refused", operation)));
        }
        Ok(())
    }

    /// Queue an auto-respond event without waiting, since the caller is
    /// usually the task draining the channel.
    fn respond(&self, event: TransportEvent) {
        if !self.auto_respond.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.events.try_send(event) {
            warn!("Mock transport dropped auto-response: {}", e);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_scan(&self) -> Result<()> {
        self.request(MockCall::StartScan).await?;
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scanning.store(false, Ordering::Relaxed);
        self.request(MockCall::StopScan).await
    }

    async fn connect(&self, address: &str) -> Result<()> {
        self.request(MockCall::Connect(address.to_string())).await?;
        *lock(&self.connected_to) = Some(address.to_string());
        self.respond(TransportEvent::LinkUp {
            address: address.to_string(),
        });
        Ok(())
    }

    async fn discover_services(&self) -> Result<()> {
        self.request(MockCall::DiscoverServices).await?;
        let services = lock(&self.services).clone();
        self.respond(TransportEvent::ServicesDiscovered {
            status: GattStatus::Success,
            services,
        });
        Ok(())
    }

    async fn set_characteristic_notification(
        &self,
        service: Uuid,
        characteristic: Uuid,
        enabled: bool,
    ) -> Result<()> {
        self.request(MockCall::SetNotification {
            service,
            characteristic,
            enabled,
        })
        .await
    }

    async fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.request(MockCall::WriteDescriptor {
            service,
            characteristic,
            descriptor,
            value: value.to_vec(),
        })
        .await?;
        self.respond(TransportEvent::DescriptorWritten {
            characteristic,
            descriptor,
            status: GattStatus::Success,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        lock(&self.connected_to).take();
        self.request(MockCall::Disconnect).await
    }
}

/// Builder for [`MockTransport`].
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    auto_respond: bool,
    services: Option<Vec<GattService>>,
    failing: Vec<MockOperation>,
    latency: Duration,
}

impl MockTransportBuilder {
    /// Create a builder for a passive mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests the way a healthy peripheral would.
    #[must_use]
    pub fn auto_respond(mut self, enabled: bool) -> Self {
        self.auto_respond = enabled;
        self
    }

    /// Service table reported by discovery.
    #[must_use]
    pub fn services(mut self, services: Vec<GattService>) -> Self {
        self.services = Some(services);
        self
    }

    /// Refuse `operation` from the start.
    #[must_use]
    pub fn failing(mut self, operation: MockOperation) -> Self {
        self.failing.push(operation);
        self
    }

    /// Delay every request.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Build the mock around `events`.
    pub fn build(self, events: TransportEventSender) -> MockTransport {
        let transport = MockTransport::new(events);
        transport.set_auto_respond(self.auto_respond);
        transport.set_latency(self.latency);
        if let Some(services) = self.services {
            transport.set_services(services);
        }
        for operation in self.failing {
            transport.fail(operation);
        }
        transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::transport_channel;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let (tx, _rx) = transport_channel(8);
        let transport = MockTransport::new(tx);

        transport.start_scan().await.unwrap();
        transport.stop_scan().await.unwrap();
        transport.connect("AA:BB:CC:DD:EE:FF").await.unwrap();
        transport.disconnect().await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                MockCall::StartScan,
                MockCall::StopScan,
                MockCall::Connect("AA:BB:CC:DD:EE:FF".to_string()),
                MockCall::Disconnect,
            ]
        );
        assert_eq!(transport.count(MockOperation::Connect), 1);
        assert!(transport.connected_to().is_none());

        transport.clear_calls();
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let (tx, _rx) = transport_channel(8);
        let transport = MockTransport::builder()
            .failing(MockOperation::StartScan)
            .build(tx);

        assert!(matches!(
            transport.start_scan().await,
            Err(Error::Transport(_))
        ));
        assert!(!transport.is_scanning());

        transport.succeed(MockOperation::StartScan);
        transport.start_scan().await.unwrap();
        assert!(transport.is_scanning());
    }

    #[tokio::test]
    async fn test_passive_mock_sends_nothing() {
        let (tx, mut rx) = transport_channel(8);
        let transport = MockTransport::new(tx);

        transport.connect("AA:BB:CC:DD:EE:FF").await.unwrap();
        transport.discover_services().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_auto_respond_plays_peripheral() {
        let (tx, mut rx) = transport_channel(8);
        let transport = MockTransport::builder().auto_respond(true).build(tx);

        transport.connect("AA:BB:CC:DD:EE:FF").await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::LinkUp {
                address: "AA:BB:CC:DD:EE:FF".to_string()
            }
        );

        transport.discover_services().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::ServicesDiscovered {
                status: GattStatus::Success,
                services: vec![MockTransport::heart_rate_service()],
            }
        );

        transport
            .write_descriptor(
                HEART_RATE_SERVICE,
                HEART_RATE_MEASUREMENT,
                CLIENT_CHARACTERISTIC_CONFIG,
                &[0x01, 0x00],
            )
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            TransportEvent::DescriptorWritten {
                status: GattStatus::Success,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_event_helpers() {
        let (tx, mut rx) = transport_channel(8);
        let transport = MockTransport::new(tx);

        transport
            .advertise("11:22:33:44:55:66", Some("BLEScanner"), -42)
            .await
            .unwrap();
        transport.notify(&[0x00, 0x50, 0x00]).await.unwrap();

        match rx.recv().await.unwrap() {
            TransportEvent::PeripheralDiscovered(p) => {
                assert_eq!(p.address, "11:22:33:44:55:66");
                assert_eq!(p.rssi, -42);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::CharacteristicChanged {
                characteristic: HEART_RATE_MEASUREMENT,
                value: vec![0x00, 0x50, 0x00],
            }
        );
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped() {
        let (tx, rx) = transport_channel(8);
        let transport = MockTransport::new(tx);
        drop(rx);

        assert!(matches!(
            transport.link_up("AA").await,
            Err(Error::ChannelClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let (tx, _rx) = transport_channel(8);
        let transport = MockTransport::builder()
            .latency(Duration::from_millis(200))
            .build(tx);

        let start = tokio::time::Instant::now();
        transport.start_scan().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}

//! BLE central client for standard heart-rate monitors.
//!
//! This crate scans for a peripheral advertising a fixed name, connects to
//! it, subscribes to the Heart Rate Measurement characteristic and publishes
//! each decoded beats-per-minute value to observers.
//!
//! # Architecture
//!
//! - [`Transport`]: the seam to a BLE stack. Requests return at once;
//!   outcomes arrive later as [`TransportEvent`]s.
//! - [`ScanCoordinator`]: scan sessions, the [`DeviceRegistry`] and the
//!   handoff of the first matching peripheral.
//! - [`ConnectionStateMachine`]: the single GATT session, from connect to
//!   streaming.
//! - [`Observers`]: watch channels for current values, a broadcast channel
//!   for [`CentralEvent`]s.
//! - [`HeartRateCentral`]: all of the above on one task, driven through a
//!   [`CentralHandle`].
//!
//! Every privileged transport call is preceded by a fresh [`Permissions`]
//! check.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use heartlink_core::{AllGranted, BtleplugTransport, CentralConfig, HeartRateCentral};
//! use heartlink_core::transport::transport_channel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CentralConfig::default();
//!     let (tx, rx) = transport_channel(config.event_buffer);
//!     let transport = Arc::new(BtleplugTransport::new(tx, &config).await?);
//!
//!     let central = HeartRateCentral::new(transport, Arc::new(AllGranted), &config)?;
//!     let (handle, _task) = central.spawn(rx);
//!     handle.start_scan().await?;
//!
//!     let mut bpm = handle.observers().watch_bpm();
//!     while bpm.changed().await.is_ok() {
//!         println!("{} bpm", *bpm.borrow());
//!     }
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod central;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod mock;
pub mod permission;
pub mod registry;
pub mod scan;
pub mod transport;
pub mod util;

// Re-export the shared data model
pub use heartlink_types::types;
pub use heartlink_types::uuid;
pub use heartlink_types::{
    ConnectionStatus, DecoderMode, DiscoveredPeripheral, HeartRateReading, ParseError,
};

pub use ble::BtleplugTransport;
pub use central::{CentralHandle, Command, HeartRateCentral};
pub use config::{CentralConfig, DEFAULT_TARGET_NAME};
pub use connection::{ActiveConnection, ConnectionStateMachine};
pub use error::{Error, Result};
pub use events::{CentralEvent, ErrorKind, EventReceiver, EventSender, ObserverHandle, Observers};
pub use mock::{MockTransport, MockTransportBuilder};
pub use permission::{AllGranted, Permission, Permissions};
pub use registry::DeviceRegistry;
pub use scan::ScanCoordinator;
pub use transport::{GattService, GattStatus, Transport, TransportEvent};

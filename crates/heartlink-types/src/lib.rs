//! Platform-agnostic types for BLE heart-rate monitors.
//!
//! This crate provides the data model shared by the heartlink client and any
//! other consumer of Heart Rate profile data.
//!
//! # Features
//!
//! - Discovered-peripheral, connection-status and reading types
//! - UUID constants for the Heart Rate service
//! - Decoders for Heart Rate Measurement notification payloads
//! - Error types for payload parsing
//!
//! # Example
//!
//! ```
//! use heartlink_types::{decode_heart_rate, ConnectionStatus};
//!
//! let reading = decode_heart_rate(&[0x00, 0x48, 0x00]).unwrap();
//! assert_eq!(reading.beats_per_minute, 72);
//! assert!(!ConnectionStatus::default().is_connected());
//! ```

pub mod error;
pub mod measurement;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use measurement::{DecoderMode, HeartRateMeasurement, SensorContact, decode_heart_rate};
pub use types::{ConnectionStatus, DiscoveredPeripheral, HeartRateReading, UNKNOWN_NAME};

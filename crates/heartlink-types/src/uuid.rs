//! Bluetooth UUIDs for the standard Heart Rate profile.
//!
//! These identifiers are fixed by the Bluetooth SIG and must match exactly
//! to interoperate with any standard heart-rate peripheral.

use uuid::{Uuid, uuid};

// --- Service UUIDs ---

/// Heart Rate service.
pub const HEART_RATE_SERVICE: Uuid = uuid!("0000180d-0000-1000-8000-00805f9b34fb");

// --- Characteristic UUIDs ---

/// Heart Rate Measurement characteristic (notify only).
pub const HEART_RATE_MEASUREMENT: Uuid = uuid!("00002a37-0000-1000-8000-00805f9b34fb");

// --- Descriptor UUIDs ---

/// Client Characteristic Configuration descriptor (CCCD).
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid = uuid!("00002902-0000-1000-8000-00805f9b34fb");

/// Value written to the CCCD to enable notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

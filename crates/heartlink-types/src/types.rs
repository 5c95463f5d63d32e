//! Core types for heart-rate monitor sessions.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Placeholder shown for peripherals that advertise no name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A peripheral reported by a single scan-result event.
///
/// Peripherals are not deduplicated by address: every advertisement produces
/// a new value, so the same device may appear several times in a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiscoveredPeripheral {
    /// Address of the peripheral, stable for the lifetime of a session.
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

impl DiscoveredPeripheral {
    /// Create a new discovered peripheral.
    pub fn new(address: impl Into<String>, name: Option<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
        }
    }

    /// The advertised name, or [`UNKNOWN_NAME`] when none was advertised.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    /// Whether the advertised name equals `target` exactly.
    ///
    /// Matching is case-sensitive and a missing name never matches.
    #[must_use]
    pub fn has_name(&self, target: &str) -> bool {
        self.name.as_deref() == Some(target)
    }
}

impl fmt::Display for DiscoveredPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} dBm",
            self.address,
            self.display_name(),
            self.rssi
        )
    }
}

/// Connection status of the single peripheral session.
///
/// `Disconnected` is both the initial state and the state every failure
/// returns to; a new connection attempt may start from it at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionStatus {
    /// No session exists.
    #[default]
    Disconnected,
    /// A connection request has been accepted by the transport.
    Connecting,
    /// The link is up.
    Connected,
    /// Waiting for the GATT service table.
    DiscoveringServices,
    /// Waiting for the CCCD write acknowledgment.
    SubscribingNotifications,
    /// Heart-rate notifications are flowing.
    Streaming,
}

impl ConnectionStatus {
    /// Boolean projection used by observers: `true` once the link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected
                | ConnectionStatus::DiscoveringServices
                | ConnectionStatus::SubscribingNotifications
                | ConnectionStatus::Streaming
        )
    }

    /// Whether a session (pending or open) exists in this status.
    #[must_use]
    pub fn has_session(&self) -> bool {
        !matches!(self, ConnectionStatus::Disconnected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::DiscoveringServices => "discovering services",
            ConnectionStatus::SubscribingNotifications => "subscribing to notifications",
            ConnectionStatus::Streaming => "streaming",
        };
        f.write_str(s)
    }
}

/// A single decoded heart-rate value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeartRateReading {
    /// Beats per minute.
    pub beats_per_minute: u16,
}

impl HeartRateReading {
    /// Create a reading from a bpm value.
    pub const fn new(beats_per_minute: u16) -> Self {
        Self { beats_per_minute }
    }
}

impl fmt::Display for HeartRateReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.beats_per_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let named = DiscoveredPeripheral::new("AA:BB", Some("BLEScanner".into()), -60);
        let unnamed = DiscoveredPeripheral::new("CC:DD", None, -70);

        assert_eq!(named.display_name(), "BLEScanner");
        assert_eq!(unnamed.display_name(), UNKNOWN_NAME);
    }

    #[test]
    fn test_has_name_is_exact() {
        let p = DiscoveredPeripheral::new("AA:BB", Some("BLEScanner".into()), -60);
        assert!(p.has_name("BLEScanner"));
        assert!(!p.has_name("blescanner"));
        assert!(!p.has_name("BLEScanner "));
        assert!(!DiscoveredPeripheral::new("AA:BB", None, -60).has_name("BLEScanner"));
    }

    #[test]
    fn test_peripheral_display() {
        let p = DiscoveredPeripheral::new("AA:BB:CC:DD:EE:FF", Some("BLEScanner".into()), -58);
        assert_eq!(p.to_string(), "AA:BB:CC:DD:EE:FF - BLEScanner - -58 dBm");
    }

    #[test]
    fn test_status_default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_status_connected_projection() {
        assert!(!ConnectionStatus::Disconnected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(ConnectionStatus::DiscoveringServices.is_connected());
        assert!(ConnectionStatus::SubscribingNotifications.is_connected());
        assert!(ConnectionStatus::Streaming.is_connected());
    }

    #[test]
    fn test_status_has_session() {
        assert!(!ConnectionStatus::Disconnected.has_session());
        assert!(ConnectionStatus::Connecting.has_session());
        assert!(ConnectionStatus::Streaming.has_session());
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(HeartRateReading::new(72).to_string(), "72 bpm");
        assert_eq!(HeartRateReading::default().beats_per_minute, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionStatus::SubscribingNotifications).unwrap();
        assert_eq!(json, "\"subscribing_notifications\"");
    }
}

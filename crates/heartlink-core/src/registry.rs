//! Accumulates peripherals discovered during a scan session.

use heartlink_types::DiscoveredPeripheral;

/// Ordered record of discovered peripherals.
///
/// Insertion order is discovery order. Duplicates are kept: the same address
/// advertising twice produces two entries.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    peripherals: Vec<DiscoveredPeripheral>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a peripheral.
    pub fn record(&mut self, peripheral: DiscoveredPeripheral) {
        self.peripherals.push(peripheral);
    }

    /// Copy of the current sequence. Later mutation does not affect it.
    pub fn snapshot(&self) -> Vec<DiscoveredPeripheral> {
        self.peripherals.clone()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.peripherals.clear();
    }

    /// Number of recorded entries, duplicates included.
    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }
}

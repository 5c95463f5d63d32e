//! Utility functions for heartlink-core.

use std::sync::{Mutex, MutexGuard, PoisonError};

use btleplug::platform::PeripheralId;

/// Address reported by CoreBluetooth, which hides real addresses.
const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they wrap the
/// Bluetooth address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// Uses the peripheral ID when the stack hides the address, otherwise the
/// address itself.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if is_hidden_address(address) {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Whether `address` is the placeholder used when the real one is hidden.
pub fn is_hidden_address(address: &str) -> bool {
    address == HIDDEN_ADDRESS
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Output formatting for watch events.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use heartlink_core::events::{CentralEvent, ErrorKind};
use heartlink_types::{ConnectionStatus, DiscoveredPeripheral, HeartRateReading};

/// Text formatting options
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }
}

/// One scan result: `address - name - rssi dBm`
pub fn format_peripheral(peripheral: &DiscoveredPeripheral, opts: &FormatOptions) -> String {
    if opts.no_color {
        peripheral.to_string()
    } else {
        format!(
            "{} - {} - {} dBm",
            peripheral.address.cyan(),
            peripheral.display_name(),
            peripheral.rssi.dimmed()
        )
    }
}

pub fn format_status(status: ConnectionStatus, opts: &FormatOptions) -> String {
    let label = status.to_string();
    if opts.no_color {
        return format!("Status: {}", label);
    }
    let colored = match status {
        ConnectionStatus::Disconnected => label.red().to_string(),
        ConnectionStatus::Streaming => label.green().to_string(),
        _ => label.yellow().to_string(),
    };
    format!("Status: {}", colored)
}

pub fn format_reading(reading: &HeartRateReading, opts: &FormatOptions) -> String {
    if opts.no_color {
        reading.to_string()
    } else {
        format!("{} bpm", reading.beats_per_minute.bold())
    }
}

pub fn format_error(kind: ErrorKind, message: &str, opts: &FormatOptions) -> String {
    let label = match kind {
        ErrorKind::PermissionDenied => "permission denied",
        ErrorKind::TransportError => "transport error",
        ErrorKind::LinkLost => "link lost",
        ErrorKind::DecodeAnomaly => "decode error",
        ErrorKind::InvalidState => "invalid state",
    };
    if opts.no_color {
        format!("Error ({}): {}", label, message)
    } else {
        format!("{} ({}): {}", "Error".red(), label, message)
    }
}

/// Human-readable line for an event.
pub fn format_event_text(event: &CentralEvent, opts: &FormatOptions) -> Option<String> {
    match event {
        CentralEvent::ScanStarted => Some("Scanning...".to_string()),
        CentralEvent::ScanStopped => Some("Scan stopped".to_string()),
        CentralEvent::PeripheralDiscovered { peripheral } => {
            Some(format_peripheral(peripheral, opts))
        }
        CentralEvent::StatusChanged { status } => Some(format_status(*status, opts)),
        CentralEvent::Reading { reading } => Some(format_reading(reading, opts)),
        CentralEvent::Error { kind, message } => Some(format_error(*kind, message, opts)),
        _ => None,
    }
}

/// Compact JSON line for an event.
pub fn format_event_json(event: &CentralEvent) -> Result<String> {
    serde_json::to_string(event).context("Failed to serialize event")
}

//! Watch command implementation.
//!
//! Runs the central on a btleplug adapter, scans for the target peripheral
//! and prints every event until Ctrl+C, a reading limit, or the link drops.
//! The link is not re-established.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use heartlink_core::events::{CentralEvent, ErrorKind};
use heartlink_core::transport::transport_channel;
use heartlink_core::{
    AllGranted, BtleplugTransport, CentralConfig, CentralHandle, EventReceiver, HeartRateCentral,
};

use crate::format::{FormatOptions, format_event_json, format_event_text};

/// Options for the watch command.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Stop after this many readings
    pub count: Option<u32>,
    pub json: bool,
    pub format: FormatOptions,
}

/// Why the event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Interrupted,
    CountReached,
    LinkLost,
    Closed,
}

pub async fn cmd_watch(central_config: CentralConfig, opts: WatchOptions) -> Result<()> {
    central_config
        .validate()
        .context("Invalid central configuration")?;

    let (tx, rx) = transport_channel(central_config.event_buffer);
    let transport = BtleplugTransport::new(tx, &central_config)
        .await
        .context("Failed to open Bluetooth adapter")?;
    let central =
        HeartRateCentral::new(Arc::new(transport), Arc::new(AllGranted), &central_config)?;
    let (handle, task) = central.spawn(rx);

    let target = if opts.format.no_color {
        central_config.target_name.clone()
    } else {
        central_config.target_name.green().to_string()
    };
    match opts.count {
        Some(n) => eprintln!("Watching for '{}' | Count: {} | Press Ctrl+C to stop", target, n),
        None => eprintln!("Watching for '{}' | Press Ctrl+C to stop", target),
    }
    eprintln!("{}", "-".repeat(50));

    let events = handle.subscribe();
    handle.start_scan().await.context("Failed to start scan")?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    let outcome = watch_events(events, &opts, &mut std::io::stdout(), shutdown).await?;
    match outcome {
        WatchOutcome::Interrupted => eprintln!("\nShutting down..."),
        WatchOutcome::CountReached => eprintln!("Completed {} readings.", opts.count.unwrap_or(0)),
        WatchOutcome::LinkLost => eprintln!("Connection lost."),
        WatchOutcome::Closed => eprintln!("Central stopped."),
    }

    stop(&handle, task).await
}

async fn stop(handle: &CentralHandle, task: tokio::task::JoinHandle<()>) -> Result<()> {
    handle.shutdown();
    task.await.context("Central task failed")
}

/// Print events from `events` to `out` until `shutdown` resolves or the
/// watch ends on its own.
pub async fn watch_events<W, F>(
    mut events: EventReceiver,
    opts: &WatchOptions,
    out: &mut W,
    shutdown: F,
) -> Result<WatchOutcome>
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut readings: u32 = 0;

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => return Ok(WatchOutcome::Interrupted),
            event = events.recv() => event,
        };
        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Output fell behind, skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => return Ok(WatchOutcome::Closed),
        };

        let line = if opts.json {
            Some(format_event_json(&event)?)
        } else {
            format_event_text(&event, &opts.format)
        };
        if let Some(line) = line {
            writeln!(out, "{}", line).context("Failed to write output")?;
        }

        match event {
            CentralEvent::Reading { .. } => {
                readings += 1;
                if opts.count.is_some_and(|n| readings >= n) {
                    return Ok(WatchOutcome::CountReached);
                }
            }
            CentralEvent::Error {
                kind: ErrorKind::LinkLost,
                ..
            } => return Ok(WatchOutcome::LinkLost),
            _ => {}
        }
    }
}

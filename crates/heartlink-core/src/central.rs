//! The heart-rate central: scan coordinator, connection state machine and
//! observers assembled behind one event loop.
//!
//! All state lives on a single task. Commands from [`CentralHandle`] and
//! events from the transport are processed strictly one at a time, so no
//! two transitions ever interleave. Queued transport events are handled
//! before the next command.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use heartlink_types::{ConnectionStatus, DiscoveredPeripheral};

use crate::config::CentralConfig;
use crate::connection::ConnectionStateMachine;
use crate::error::{Error, Result};
use crate::events::{EventReceiver, ObserverHandle, Observers};
use crate::permission::Permissions;
use crate::scan::ScanCoordinator;
use crate::transport::{Transport, TransportEvent, TransportEventReceiver};

/// Requests accepted by the event loop.
#[derive(Debug)]
pub enum Command {
    /// Start a scan session.
    StartScan {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Stop the scan session.
    StopScan {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Tear down the connection.
    Disconnect { reply: oneshot::Sender<()> },
}

/// The central, driven directly.
///
/// Use [`spawn`](Self::spawn) to run it on its own task, or call its methods
/// directly when the caller already serializes access.
pub struct HeartRateCentral {
    scanner: ScanCoordinator,
    connection: ConnectionStateMachine,
    observers: Arc<Observers>,
    command_buffer: usize,
}

impl std::fmt::Debug for HeartRateCentral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartRateCentral")
            .field("scanner", &self.scanner)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl HeartRateCentral {
    /// Assemble a central over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails
    /// [`CentralConfig::validate`].
    pub fn new(
        transport: Arc<dyn Transport>,
        permissions: Arc<dyn Permissions>,
        config: &CentralConfig,
    ) -> Result<Self> {
        config.validate()?;
        let observers = Arc::new(Observers::new(config.observer_capacity));
        let scanner = ScanCoordinator::new(
            transport.clone(),
            permissions.clone(),
            observers.clone(),
            config.target_name.clone(),
        );
        let connection =
            ConnectionStateMachine::new(transport, permissions, observers.clone(), config.decoder);
        Ok(Self {
            scanner,
            connection,
            observers,
            command_buffer: config.command_buffer,
        })
    }

    /// A read-only view of the published state.
    pub fn observers(&self) -> ObserverHandle {
        self.observers.handle()
    }

    /// Internal connection state.
    pub fn state(&self) -> ConnectionStatus {
        self.connection.state()
    }

    /// Whether a scan session is in progress.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Peripherals recorded in the current scan session.
    pub fn devices(&self) -> Vec<DiscoveredPeripheral> {
        self.scanner.registry().snapshot()
    }

    /// Start a scan session, closing any existing connection first.
    pub async fn start_scan(&mut self) -> Result<()> {
        let result = self.scanner.start_scan(&mut self.connection).await;
        self.report(result)
    }

    /// Stop the scan session.
    pub async fn stop_scan(&mut self) -> Result<()> {
        let result = self.scanner.stop_scan().await;
        self.report(result)
    }

    /// Tear down the connection from any state.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    /// Apply one transport event. Failures are published to observers.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        let result = match event {
            TransportEvent::PeripheralDiscovered(peripheral) => {
                self.scanner
                    .on_peripheral_discovered(peripheral, &mut self.connection)
                    .await
            }
            other => self.connection.handle_event(&other).await,
        };
        let _ = self.report(result);
    }

    /// Stop scanning and disconnect.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.scanner.stop_scan().await {
            warn!("Failed to stop scan on shutdown: {}", e);
        }
        self.connection.disconnect().await;
    }

    fn report(&self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            debug!("Reporting error: {}", e);
            self.observers.publish_error(e);
        }
        result
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartScan { reply } => {
                let _ = reply.send(self.start_scan().await);
            }
            Command::StopScan { reply } => {
                let _ = reply.send(self.stop_scan().await);
            }
            Command::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(());
            }
        }
    }

    /// Run the central on its own task.
    ///
    /// The loop ends when the returned handle is shut down, every handle is
    /// dropped, or the transport's event channel closes. It stops scanning
    /// and disconnects on the way out.
    pub fn spawn(self, events: TransportEventReceiver) -> (CentralHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(self.command_buffer);
        let cancel_token = CancellationToken::new();
        let handle = CentralHandle {
            commands: command_tx,
            observers: self.observers(),
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(self.run(events, command_rx, cancel_token));
        (handle, task)
    }

    async fn run(
        mut self,
        mut events: TransportEventReceiver,
        mut commands: mpsc::Receiver<Command>,
        cancel_token: CancellationToken,
    ) {
        info!("Heart-rate central started");
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!("Central cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Transport event channel closed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All handles dropped");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
        info!("Heart-rate central stopped");
    }
}

/// Cloneable handle to a spawned [`HeartRateCentral`].
#[derive(Debug, Clone)]
pub struct CentralHandle {
    commands: mpsc::Sender<Command>,
    observers: ObserverHandle,
    cancel_token: CancellationToken,
}

impl CentralHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Start a scan session.
    ///
    /// # Errors
    ///
    /// Returns the scan error, or [`Error::ChannelClosed`] if the central
    /// has stopped.
    pub async fn start_scan(&self) -> Result<()> {
        self.request(|reply| Command::StartScan { reply }).await?
    }

    /// Stop the scan session.
    pub async fn stop_scan(&self) -> Result<()> {
        self.request(|reply| Command::StopScan { reply }).await?
    }

    /// Tear down the connection.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Stop the event loop. It disconnects before exiting.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// A read-only view of the published state.
    pub fn observers(&self) -> &ObserverHandle {
        &self.observers
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.observers.subscribe()
    }
}

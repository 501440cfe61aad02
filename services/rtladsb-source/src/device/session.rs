//! Device session - owns one decoder process and its ingestion loop

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::decoder::{DecoderLauncher, DecoderProcess, DecoderSettings};
use crate::ingest::{self, TransportError};
use crate::output::Record;
use crate::registry::AircraftRegistry;

use super::state::{DeviceStats, SessionState, StopReason};

/// Requests from the supervisor to a running session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Stop the decoder and relaunch it with new settings
    Reconfigure(DecoderSettings),
    Shutdown,
}

/// Reports from a session to the supervisor
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The decoder failed before producing a single valid frame
    Fault { device: String, message: String },
    /// The session is idle and will not run again
    Finished { device: String, decoded: u64 },
}

enum Exit {
    Command(Option<SessionCommand>),
    Stream(Result<(), TransportError>),
}

/// One decoder process and the loop that consumes it.
///
/// The session task is the only owner of the decoder and of its state, so a
/// requested stop and a crash can never be confused.
pub struct DeviceSession<L> {
    name: String,
    settings: DecoderSettings,
    launcher: L,
    registry: Arc<AircraftRegistry>,
    records: mpsc::Sender<Record>,
    events: mpsc::Sender<SessionEvent>,
    stats: Arc<DeviceStats>,
    state: SessionState,
}

impl<L: DecoderLauncher> DeviceSession<L> {
    pub fn new(
        name: String,
        settings: DecoderSettings,
        launcher: L,
        registry: Arc<AircraftRegistry>,
        records: mpsc::Sender<Record>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            name,
            settings,
            launcher,
            registry,
            records,
            events,
            stats: Arc::new(DeviceStats::new()),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Counters shared with whoever reports statistics
    pub fn stats(&self) -> Arc<DeviceStats> {
        self.stats.clone()
    }

    /// Run until shut down or until the decoder dies on its own
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!("Starting device session {}", self.name);

        loop {
            let decoded_before = self.stats.get_decoded();

            let mut process = match self.launcher.launch(&self.settings) {
                Ok(process) => process,
                Err(e) => {
                    let message = format!("Unable to start rtl_adsb: {}", e);
                    error!("[{}] {}", self.name, message);
                    if self.state == SessionState::Restarting {
                        self.enter(SessionState::Idle);
                    }
                    self.report_fault(message).await;
                    break;
                }
            };
            self.enter(SessionState::Running);

            // Commands win over a stream that ended at the same moment
            let exit = tokio::select! {
                biased;
                command = commands.recv() => Exit::Command(command),
                result = ingest::run_frames(
                    &mut process.output,
                    &self.registry,
                    &self.records,
                    &self.stats,
                ) => Exit::Stream(result),
            };

            match exit {
                Exit::Command(Some(SessionCommand::Reconfigure(settings))) => {
                    self.enter(SessionState::Stopping(StopReason::Reconfigure));
                    process.terminate().await;
                    info!("[{}] Relaunching rtl_adsb with {:?}", self.name, settings);
                    self.settings = settings;
                    self.enter(SessionState::Restarting);
                }
                Exit::Command(Some(SessionCommand::Shutdown)) | Exit::Command(None) => {
                    self.enter(SessionState::Stopping(StopReason::Shutdown));
                    process.terminate().await;
                    self.enter(SessionState::Idle);
                    break;
                }
                Exit::Stream(result) => {
                    self.enter(SessionState::Stopping(StopReason::ProcessExited));
                    let seen_valid = self.stats.get_decoded() > decoded_before;
                    self.handle_exit(&mut process, result, seen_valid).await;
                    self.enter(SessionState::Idle);
                    break;
                }
            }
        }

        info!("Device session {} stopped. {}", self.name, self.stats);
        let finished = SessionEvent::Finished {
            device: self.name.clone(),
            decoded: self.stats.get_decoded(),
        };
        if self.events.send(finished).await.is_err() {
            debug!("[{}] Supervisor gone before session finished", self.name);
        }
    }

    async fn handle_exit(
        &mut self,
        process: &mut DecoderProcess,
        result: Result<(), TransportError>,
        seen_valid: bool,
    ) {
        process.terminate().await;

        if !self.state.is_unexpected_stop() {
            return;
        }

        let cause = match result {
            Ok(()) => "rtl_adsb process exited".to_string(),
            Err(e) => e.to_string(),
        };

        if seen_valid {
            warn!("[{}] Unable to process output from rtl_adsb: {}", self.name, cause);
        } else {
            let message = format!(
                "{}; no valid frames were seen. Is the USB device plugged in? \
                 Try running rtl_adsb in a terminal and confirm that it can connect to the device.",
                cause
            );
            error!("[{}] {}", self.name, message);
            self.report_fault(message).await;
        }
    }

    async fn report_fault(&self, message: String) {
        let fault = SessionEvent::Fault {
            device: self.name.clone(),
            message,
        };
        if self.events.send(fault).await.is_err() {
            warn!("[{}] Supervisor gone, fault not delivered", self.name);
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_enter(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        debug!("[{}] {} -> {}", self.name, self.state, next);
        self.state = next;
    }
}

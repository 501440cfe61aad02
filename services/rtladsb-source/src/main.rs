//! rtladsb source - ADS-B data source for rtl_adsb radios
//!
//! Runs one rtl_adsb per configured radio, decodes its Mode S output and
//! writes one JSON aircraft record per valid frame to stdout. Logs go to
//! stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rtladsb_source::config::{Config, InputMode};
use rtladsb_source::decoder::RtlAdsbLauncher;
use rtladsb_source::device::{DeviceSession, DeviceStats, SessionCommand, SessionEvent};
use rtladsb_source::ingest;
use rtladsb_source::output::{self, Record};
use rtladsb_source::registry::AircraftRegistry;

/// Supervisor-side handle on a spawned session
struct RunningSession {
    name: String,
    commands: mpsc::Sender<SessionCommand>,
    stats: Arc<DeviceStats>,
    handle: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    info!("===========================================");
    info!("   rtladsb source - ADS-B to JSON");
    info!("===========================================");

    let config = Config::from_env().context("Invalid configuration")?;

    info!("Configuration:");
    info!("  Input: {:?}", config.input);
    info!("  rtl_adsb path: {}", config.rtl_adsb_path.display());
    info!("  Sources: {:?}", config.sources.iter().map(|s| &s.name).collect::<Vec<_>>());
    info!("  Gain: {}", config.gain_db.map_or("auto".to_string(), |g| format!("{} dB", g)));
    info!("  PPM error: {}", config.ppm_error.unwrap_or(0));
    info!("  Channel: {} Hz", config.channel_hz);
    info!("  Registry: {}", config.registry_path.display());

    // An unreadable or empty registry is fatal
    let registry = Arc::new(
        AircraftRegistry::load(&config.registry_path)
            .context("Failed to load aircraft registry")?,
    );

    let (records_tx, records_rx) = mpsc::channel::<Record>(1000);
    let output_handle = tokio::spawn(output::write_records(records_rx, tokio::io::stdout()));

    let faults = match config.input {
        InputMode::Json => {
            run_passthrough(records_tx).await?;
            0
        }
        InputMode::Rtladsb => run_sources(&config, registry, records_tx).await?,
    };

    let written = output_handle.await.context("Output task panicked")??;
    info!("Shutdown complete. Records written: {}", written);

    if faults > 0 {
        bail!("{} of {} sources failed", faults, config.sources.len());
    }
    Ok(())
}

/// Forward pre-decoded records from stdin
async fn run_passthrough(records_tx: mpsc::Sender<Record>) -> Result<()> {
    info!("Reading pre-decoded records from stdin...");
    let stats = DeviceStats::new();
    ingest::run_passthrough(BufReader::new(tokio::io::stdin()), &records_tx, &stats)
        .await
        .context("Pre-decoded input failed")?;
    info!("Pre-decoded input closed. {}", stats);
    Ok(())
}

/// Run one session per source until they all finish or we are interrupted.
/// Returns the number of faults reported.
async fn run_sources(
    config: &Config,
    registry: Arc<AircraftRegistry>,
    records_tx: mpsc::Sender<Record>,
) -> Result<usize> {
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(16);

    let mut sessions = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let session = DeviceSession::new(
            source.name.clone(),
            config.decoder_settings(source),
            RtlAdsbLauncher::new(&config.rtl_adsb_path),
            registry.clone(),
            records_tx.clone(),
            events_tx.clone(),
        );
        let (commands_tx, commands_rx) = mpsc::channel(4);
        let stats = session.stats();
        let handle = tokio::spawn(session.run(commands_rx));

        sessions.push(RunningSession {
            name: source.name.clone(),
            commands: commands_tx,
            stats,
            handle,
        });
    }
    drop(events_tx);
    drop(records_tx);

    info!("===========================================");
    info!("  Started {} session(s).", sessions.len());
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    let mut stats_interval =
        tokio::time::interval(Duration::from_secs(config.stats_interval_secs));
    stats_interval.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut reload = ReloadSignal::new()?;

    let mut active = sessions.len();
    let mut faults = 0usize;

    while active > 0 {
        tokio::select! {
            Some(event) = events_rx.recv() => {
                if handle_event(event) {
                    faults += 1;
                } else {
                    active -= 1;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping sessions");
                break;
            }
            _ = reload.recv() => {
                reconfigure(&sessions).await;
            }
            _ = stats_interval.tick() => {
                for session in &sessions {
                    info!("[Stats] {} | {}", session.name, session.stats);
                }
            }
        }
    }

    for session in &sessions {
        // Already finished sessions have dropped their receiver
        let _ = session.commands.send(SessionCommand::Shutdown).await;
    }

    while let Some(event) = events_rx.recv().await {
        if handle_event(event) {
            faults += 1;
        }
    }

    for session in sessions {
        if let Err(e) = session.handle.await {
            error!("Session {} panicked: {}", session.name, e);
        }
    }

    Ok(faults)
}

/// Log a session event; true for faults
fn handle_event(event: SessionEvent) -> bool {
    match event {
        SessionEvent::Fault { device, message } => {
            error!("[{}] Source fault: {}", device, message);
            true
        }
        SessionEvent::Finished { device, decoded } => {
            info!("[{}] Session finished after {} messages", device, decoded);
            false
        }
    }
}

/// Re-read the environment and relaunch each session with its new settings
async fn reconfigure(sessions: &[RunningSession]) {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring reload, configuration is invalid: {}", e);
            return;
        }
    };

    for session in sessions {
        match config.sources.iter().find(|s| s.name == session.name) {
            Some(source) => {
                let settings = config.decoder_settings(source);
                info!("Reconfiguring {}", session.name);
                if session
                    .commands
                    .send(SessionCommand::Reconfigure(settings))
                    .await
                    .is_err()
                {
                    warn!("Session {} already stopped", session.name);
                }
            }
            None => warn!(
                "Source {} is no longer configured; new sources need a restart",
                session.name
            ),
        }
    }
}

/// SIGHUP on unix; never fires elsewhere
struct ReloadSignal {
    #[cfg(unix)]
    hangup: Option<tokio::signal::unix::Signal>,
}

impl ReloadSignal {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
            Ok(Self {
                hangup: Some(hangup),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            if let Some(hangup) = self.hangup.as_mut() {
                if hangup.recv().await.is_some() {
                    return;
                }
                self.hangup = None;
            }
        }
        std::future::pending::<()>().await
    }
}

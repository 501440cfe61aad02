//! Decoder runner - spawns the rtl_adsb subprocess and exposes its output

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ingest::TransportError;

/// Arguments that select and tune the radio
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderSettings {
    /// Device index or serial, passed to `-d`
    pub device: Option<String>,
    /// Tuner gain in dB, passed to `-g` (auto when unset)
    pub gain_db: Option<f32>,
    /// Frequency correction, passed to `-p`
    pub ppm_error: Option<i32>,
}

impl DecoderSettings {
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(device) = &self.device {
            args.push("-d".to_string());
            args.push(device.clone());
        }
        if let Some(gain) = self.gain_db {
            args.push("-g".to_string());
            args.push(gain.to_string());
        }
        if let Some(ppm) = self.ppm_error {
            args.push("-p".to_string());
            args.push(ppm.to_string());
        }
        args
    }
}

/// Starts a decoder and hands back its line output
pub trait DecoderLauncher: Send + Sync + 'static {
    fn launch(&self, settings: &DecoderSettings) -> Result<DecoderProcess, TransportError>;
}

/// A launched decoder: its output stream and, for real processes, the child
pub struct DecoderProcess {
    pub output: Box<dyn AsyncBufRead + Send + Unpin>,
    child: Option<Child>,
    stderr_task: Option<JoinHandle<()>>,
}

impl DecoderProcess {
    /// Wrap a stream that is not backed by a child process
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            output: Box::new(reader),
            child: None,
            stderr_task: None,
        }
    }

    /// Kill the child if still alive and drain its stderr logger
    pub async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!("rtl_adsb already exited: {}", status),
                _ => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill rtl_adsb: {}", e);
                    }
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
    }
}

/// Launches the rtl_adsb binary
pub struct RtlAdsbLauncher {
    rtl_adsb_path: PathBuf,
}

impl RtlAdsbLauncher {
    pub fn new(rtl_adsb_path: &Path) -> Self {
        Self {
            rtl_adsb_path: rtl_adsb_path.to_path_buf(),
        }
    }
}

impl DecoderLauncher for RtlAdsbLauncher {
    fn launch(&self, settings: &DecoderSettings) -> Result<DecoderProcess, TransportError> {
        let args = settings.args();
        info!("Starting rtl_adsb: {} {}", self.rtl_adsb_path.display(), args.join(" "));

        let mut child = Command::new(&self.rtl_adsb_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;

        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingPipe("stderr"))?;

        // rtl_adsb reports tuner and device info on stderr
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.is_empty() {
                    info!("rtl_adsb: {}", line);
                }
            }
        });

        Ok(DecoderProcess {
            output: Box::new(BufReader::new(stdout)),
            child: Some(child),
            stderr_task: Some(stderr_task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_full() {
        let settings = DecoderSettings {
            device: Some("00000002".to_string()),
            gain_db: Some(49.6),
            ppm_error: Some(-3),
        };
        assert_eq!(settings.args(), vec!["-d", "00000002", "-g", "49.6", "-p", "-3"]);
    }

    #[test]
    fn test_args_defaults_are_omitted() {
        let settings = DecoderSettings {
            device: None,
            gain_db: None,
            ppm_error: None,
        };
        assert!(settings.args().is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let launcher = RtlAdsbLauncher::new(Path::new("/nonexistent/rtl_adsb"));
        let settings = DecoderSettings {
            device: Some("0".to_string()),
            gain_db: None,
            ppm_error: None,
        };
        assert!(matches!(
            launcher.launch(&settings),
            Err(TransportError::Spawn(_))
        ));
    }
}

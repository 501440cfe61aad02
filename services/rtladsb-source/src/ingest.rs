//! Ingestion loops - turn a line stream into output records

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::adsb::{decode_line, DecodeError};
use crate::device::DeviceStats;
use crate::output::Record;
use crate::registry::AircraftRegistry;

/// Failures of the stream itself, as opposed to individual lines
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn decoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("decoder {0} was not captured")]
    MissingPipe(&'static str),

    #[error("failed to read decoder output: {0}")]
    Read(#[source] std::io::Error),

    #[error("output channel closed")]
    OutputClosed,
}

/// Read hex frames until the stream ends.
///
/// Malformed lines and checksum failures are counted and skipped. Returns
/// `Ok` at end of stream.
pub async fn run_frames<R>(
    reader: R,
    registry: &AircraftRegistry,
    records: &mpsc::Sender<Record>,
    stats: &DeviceStats,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut first_message = true;

    while let Some(line) = lines.next_segment().await.map_err(TransportError::Read)? {
        if line.trim_ascii().is_empty() {
            continue;
        }
        stats.record_line();

        match decode_line(&line, registry) {
            Ok(msg) => {
                // Counted only once the channel has room; a cancelled wait drops the record
                let permit = records
                    .reserve()
                    .await
                    .map_err(|_| TransportError::OutputClosed)?;
                stats.record_decoded();
                if first_message {
                    info!("First ADS-B message received! Decoder is working.");
                    first_message = false;
                }
                permit.send(Record::from(msg));
                stats.record_sent();
            }
            Err(DecodeError::ChecksumMismatch { embedded, computed }) => {
                stats.record_crc_error();
                trace!("CRC mismatch: embedded {:06x}, computed {:06x}", embedded, computed);
            }
            Err(DecodeError::MalformedLine(e)) => {
                stats.record_malformed();
                debug!("Skipping line {:?}: {}", String::from_utf8_lossy(&line), e);
            }
        }
    }

    Ok(())
}

/// Forward already-decoded JSON records unchanged.
///
/// Lines that are not JSON objects are counted as malformed and skipped.
pub async fn run_passthrough<R>(
    reader: R,
    records: &mpsc::Sender<Record>,
    stats: &DeviceStats,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');

    while let Some(line) = lines.next_segment().await.map_err(TransportError::Read)? {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        stats.record_line();

        match serde_json::from_slice::<serde_json::Value>(line) {
            Ok(value) if value.is_object() => {
                let permit = records
                    .reserve()
                    .await
                    .map_err(|_| TransportError::OutputClosed)?;
                stats.record_decoded();
                permit.send(Record::Passthrough(value));
                stats.record_sent();
            }
            Ok(_) => {
                stats.record_malformed();
                warn!("Pre-decoded record is not a JSON object, skipping");
            }
            Err(e) => {
                stats.record_malformed();
                warn!("Could not parse pre-decoded JSON: {}", e);
            }
        }
    }

    Ok(())
}

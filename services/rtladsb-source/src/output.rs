//! Output sink - one JSON object per line

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::adsb::DecodedMessage;

/// A unit of output handed to the host
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// Frame decoded by this process
    Decoded(DecodedMessage),
    /// Record that arrived already decoded
    Passthrough(serde_json::Value),
}

impl From<DecodedMessage> for Record {
    fn from(msg: DecodedMessage) -> Self {
        Record::Decoded(msg)
    }
}

/// Drain the record channel into `writer` until every sender is gone
pub async fn write_records<W>(mut rx: mpsc::Receiver<Record>, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(record) = rx.recv().await {
        let mut line = serde_json::to_vec(&record).context("Failed to serialize record")?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .context("Failed to write record")?;
        writer.flush().await.context("Failed to flush output")?;

        written += 1;
        if written == 1 {
            debug!("First record written");
        }
    }

    info!("Output closed after {} records", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adsb::{Icao, MessageKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_one_object_per_line() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Record::from(DecodedMessage {
            icao: Icao([0xAB, 0xCD, 0xEF]),
            crc_valid: true,
            aircraft: None,
            kind: MessageKind::Surveillance { altitude: 1500 },
        }))
        .await
        .unwrap();
        tx.send(Record::Passthrough(json!({ "icao": "4840d6", "callsign": "KLM1023" })))
            .await
            .unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = write_records(rx, &mut out).await.unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, json!({ "icao": "abcdef", "crc_valid": true, "altitude": 1500 }));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["callsign"], json!("KLM1023"));
    }
}

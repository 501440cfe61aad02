//! ADS-B message parser: line framing, CRC gate and type dispatch

use thiserror::Error;
use tracing::trace;

use super::crc::check_crc;
use super::fields;
use super::frame::{ExtendedSquitter, Frame, LineError, LONG_FRAME_BYTES, SHORT_FRAME_BYTES};
use super::types::{DecodedMessage, MessageKind};
use crate::registry::AircraftRegistry;

/// Parse error types
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed line: {0}")]
    MalformedLine(#[from] LineError),

    #[error("checksum mismatch: embedded {embedded:06x}, computed {computed:06x}")]
    ChecksumMismatch { embedded: u32, computed: u32 },
}

/// Parse rtl_adsb output line format: `*<hex_bytes>;`
///
/// Surrounding whitespace and the `*`/`;` sentinels are optional.
pub fn parse_hex_line(line: &[u8]) -> Result<Vec<u8>, LineError> {
    let line = line.trim_ascii();
    let line = line.strip_prefix(b"*").unwrap_or(line);
    let hex_str = line.strip_suffix(b";").unwrap_or(line);

    if hex_str.is_empty() {
        return Err(LineError::Empty);
    }

    let bytes = hex::decode(hex_str)?;
    if bytes.len() != SHORT_FRAME_BYTES && bytes.len() != LONG_FRAME_BYTES {
        return Err(LineError::BadLength(bytes.len()));
    }

    Ok(bytes)
}

/// Decode one text line into a message
pub fn decode_line(line: &[u8], registry: &AircraftRegistry) -> Result<DecodedMessage, DecodeError> {
    let bytes = parse_hex_line(line)?;
    let frame = Frame::from_bytes(&bytes)?;
    decode_frame(&frame, registry)
}

/// Validate the frame's CRC and build the output record
pub fn decode_frame(frame: &Frame, registry: &AircraftRegistry) -> Result<DecodedMessage, DecodeError> {
    check_crc(frame)
        .map_err(|(embedded, computed)| DecodeError::ChecksumMismatch { embedded, computed })?;

    let icao = fields::icao(frame);
    let kind = classify(frame);
    trace!(
        "df={} fs={} icao={} kind={:?}",
        frame.message_type(),
        fields::flight_status(frame),
        icao,
        kind
    );

    Ok(DecodedMessage {
        icao,
        crc_valid: true,
        aircraft: registry.lookup(&icao),
        kind,
    })
}

/// Pick the extraction rule for a frame's type and ME sub-type
pub fn classify(frame: &Frame) -> MessageKind {
    match fields::message_type(frame) {
        0 | 4 | 16 | 20 => MessageKind::Surveillance {
            altitude: fields::altitude13(frame),
        },
        17 => match frame.extended_squitter() {
            Some(es) => classify_extended_squitter(es),
            None => MessageKind::Other,
        },
        _ => MessageKind::Other,
    }
}

fn classify_extended_squitter(es: ExtendedSquitter<'_>) -> MessageKind {
    match fields::me_subtype(es) {
        (1..=4, _) => MessageKind::Identification {
            callsign: fields::callsign(es),
        },
        (19, mesub @ 1..=4) => MessageKind::AirbornePosition {
            position: fields::raw_position(es),
            altitude: fields::altitude12(es),
            velocity: matches!(mesub, 1 | 2).then(|| fields::velocity_and_heading(es)),
        },
        _ => MessageKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adsb::crc::tests::seal;
    use crate::adsb::{Icao, RawPosition};
    use serde_json::{json, Value};

    fn registry() -> AircraftRegistry {
        AircraftRegistry::from_reader(
            "4840d6,PH-BXK,Boeing 737-8K2,B738,KLM Royal Dutch Airlines\n".as_bytes(),
        )
        .unwrap()
    }

    fn keys(value: &Value) -> Vec<&str> {
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_parse_hex_line_with_sentinels() {
        let bytes = parse_hex_line(b"*8D4840D6202CC371C32CE0576098;\r\n").unwrap();
        assert_eq!(bytes.len(), 14);
    }

    #[test]
    fn test_parse_hex_line_bare() {
        let bytes = parse_hex_line(b"02E197B2F3F9A1").unwrap();
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn test_parse_hex_line_invalid() {
        assert!(matches!(parse_hex_line(b"  \r\n"), Err(LineError::Empty)));
        assert!(matches!(parse_hex_line(b"*;"), Err(LineError::Empty)));
        assert!(matches!(parse_hex_line(b"*invalid;"), Err(LineError::InvalidHex(_))));
        assert!(matches!(parse_hex_line(b"*123456;"), Err(LineError::BadLength(3))));
    }

    #[test]
    fn test_identification_end_to_end() {
        let msg = decode_line(b"*8D4840D6202CC371C32CE0576098;", &registry()).unwrap();
        assert!(msg.crc_valid);
        assert_eq!(msg.icao, Icao([0x48, 0x40, 0xD6]));
        assert_eq!(
            msg.kind,
            MessageKind::Identification { callsign: "KLM1023".to_string() }
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["icao"], json!("4840d6"));
        assert_eq!(value["callsign"], json!("KLM1023"));
        assert_eq!(value["regid"], json!("PH-BXK"));
    }

    #[test]
    fn test_airborne_position_end_to_end() {
        let msg = decode_line(b"*8D485020994409940838175B284F;", &registry()).unwrap();
        assert_eq!(msg.icao.to_hex(), "485020");
        assert!(msg.aircraft.is_none());

        match &msg.kind {
            MessageKind::AirbornePosition { position, altitude, velocity } => {
                assert_eq!(
                    *position,
                    RawPosition { parity: false, raw_lat: 51716, raw_lon: 14359 }
                );
                assert_eq!(*altitude, 0);
                let velocity = velocity.expect("sub-type 1 carries velocity");
                assert!((velocity.speed - 160.252925).abs() < 1e-5);
                assert!((velocity.heading - 183.219494).abs() < 1e-5);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            keys(&value),
            vec![
                "altitude",
                "coordpair_even",
                "crc_valid",
                "heading",
                "icao",
                "raw_lat",
                "raw_lon",
                "speed"
            ]
        );
    }

    #[test]
    fn test_position_subtype_3_has_no_velocity() {
        // ME 19 sub-type 3
        let frame = seal("8D4850209B440994083817000000");
        match classify(&frame) {
            MessageKind::AirbornePosition { velocity, .. } => assert!(velocity.is_none()),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_surveillance_altitude() {
        let frame = seal("00A10194000000");
        let msg = decode_frame(&frame, &registry()).unwrap();
        assert_eq!(msg.kind, MessageKind::Surveillance { altitude: 1500 });
    }

    #[test]
    fn test_unknown_type_is_minimal() {
        let msg = decode_line(b"*28ABCDEFCEF56F;", &registry()).unwrap();
        assert_eq!(msg.kind, MessageKind::Other);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(keys(&value), vec!["crc_valid", "icao"]);
    }

    #[test]
    fn test_unhandled_me_type_is_minimal() {
        // ME 11 airborne position is not routed
        let msg = decode_line(b"*8D40621D58C382D690C8AC2863A7;", &registry()).unwrap();
        assert_eq!(msg.kind, MessageKind::Other);
    }

    #[test]
    fn test_registry_miss_omits_keys() {
        let msg = decode_line(b"*8DABCDEF200420E08208207C708F;", &registry()).unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(keys(&value), vec!["callsign", "crc_valid", "icao"]);
        assert_eq!(value["callsign"], json!("ABC"));
    }

    #[test]
    fn test_checksum_mismatch() {
        let result = decode_line(b"*8D4840D6202CC371C32CE0576099;", &registry());
        assert!(matches!(
            result,
            Err(DecodeError::ChecksumMismatch { embedded: 0x576099, computed: 0x576098 })
        ));
    }

    #[test]
    fn test_truncated_long_frame() {
        let result = decode_line(b"*8D4840D6202CC3;", &registry());
        assert!(matches!(
            result,
            Err(DecodeError::MalformedLine(LineError::Truncated { .. }))
        ));
    }
}

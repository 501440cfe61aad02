//! Field extractors over validated frames
//!
//! Bit positions count from the MSB of byte 0. Extended squitter fields take
//! an [`ExtendedSquitter`] so they can only be applied to 112-bit frames.

use super::frame::{ExtendedSquitter, Frame};
use super::types::{Icao, RawPosition, Velocity};

/// Callsign character lookup table
const CALLSIGN_CHARS: &[u8; 64] =
    b"?ABCDEFGHIJKLMNOPQRSTUVWXYZ????? ???????????????0123456789??????";

/// Downlink format (top 5 bits of byte 0)
pub fn message_type(frame: &Frame) -> u8 {
    frame.bits(0, 5) as u8
}

/// Bytes 1-3. Not checked against the CRC; callers validate separately.
pub fn icao(frame: &Frame) -> Icao {
    Icao(super::crc::get_icao(frame))
}

/// Flight status, meaningful for types 0, 4, 20, 21
pub fn flight_status(frame: &Frame) -> u8 {
    frame.bits(5, 3) as u8
}

/// ME type and sub-type from byte 4
pub fn me_subtype(es: ExtendedSquitter<'_>) -> (u8, u8) {
    (es.bits(32, 5) as u8, es.bits(37, 3) as u8)
}

/// 13-bit altitude code (types 0, 4, 16, 20).
///
/// Only the Q-bit (25 ft) encoding is decoded; Gillham-coded altitudes and
/// metric altitudes (M bit set) return 0.
pub fn altitude13(frame: &Frame) -> i32 {
    let m_bit = frame.bit(25);
    let q_bit = frame.bit(27);

    if m_bit || !q_bit {
        return 0;
    }

    // 11-bit N with the M and Q bits removed
    let n = (frame.bits(19, 5) << 6)
        | (frame.bits(24, 1) << 5)
        | (frame.bits(26, 1) << 4)
        | frame.bits(28, 4);

    n as i32 * 25 - 1000
}

/// 12-bit altitude code from an airborne position ME field
pub fn altitude12(es: ExtendedSquitter<'_>) -> i32 {
    if !es.bit(47) {
        return 0;
    }

    // 11-bit N with the Q bit removed
    let n = (es.bits(40, 7) << 4) | es.bits(48, 4);

    n as i32 * 25 - 1000
}

/// Eight 6-bit characters from bytes 5-10, trailing spaces trimmed
pub fn callsign(es: ExtendedSquitter<'_>) -> String {
    let callsign: String = (0..8)
        .map(|i| CALLSIGN_CHARS[es.bits(40 + 6 * i, 6) as usize] as char)
        .collect();

    callsign.trim_end_matches(' ').to_string()
}

/// CPR format bit and the raw 17-bit latitude and longitude
pub fn raw_position(es: ExtendedSquitter<'_>) -> RawPosition {
    RawPosition {
        parity: es.bit(53),
        raw_lat: es.bits(54, 17),
        raw_lon: es.bits(71, 17),
    }
}

/// Ground speed and heading from the signed EW/NS velocity components
pub fn velocity_and_heading(es: ExtendedSquitter<'_>) -> Velocity {
    let ew_west = es.bit(45);
    let ew_velocity = es.bits(46, 10) as i32;
    let ns_south = es.bit(56);
    let ns_velocity = es.bits(57, 10) as i32;

    let ew = f64::from(if ew_west { -ew_velocity } else { ew_velocity });
    let ns = f64::from(if ns_south { -ns_velocity } else { ns_velocity });

    let speed = ew.hypot(ns);
    let mut heading = ew.atan2(ns).to_degrees();
    if heading < 0.0 {
        heading += 360.0;
    }

    Velocity { speed, heading }
}

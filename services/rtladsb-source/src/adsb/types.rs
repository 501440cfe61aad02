//! ADS-B data types

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::registry::AircraftRecord;

/// 24-bit ICAO aircraft address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Icao(pub [u8; 3]);

impl Icao {
    /// Lowercase hex form, as used for registry keys and output
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Icao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Icao {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Undecoded CPR position components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPosition {
    /// CPR format bit (F)
    pub parity: bool,
    /// 17-bit encoded latitude
    pub raw_lat: u32,
    /// 17-bit encoded longitude
    pub raw_lon: u32,
}

/// Ground velocity synthesized from the EW/NS components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    /// Ground speed in knots
    pub speed: f64,
    /// Track in degrees, [0, 360)
    pub heading: f64,
}

/// What a frame carries, by message type and ME sub-type
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// Types 0, 4, 16, 20: 13-bit altitude code
    Surveillance { altitude: i32 },

    /// Type 17, ME 1-4
    Identification { callsign: String },

    /// Type 17, ME 19 with sub-type 1-4
    AirbornePosition {
        position: RawPosition,
        altitude: i32,
        velocity: Option<Velocity>,
    },

    /// Anything without an extraction rule
    Other,
}

/// A validated, decoded frame ready for output
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub icao: Icao,
    pub crc_valid: bool,
    pub aircraft: Option<Arc<AircraftRecord>>,
    pub kind: MessageKind,
}

impl Serialize for DecodedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("icao", &self.icao)?;
        map.serialize_entry("crc_valid", &self.crc_valid)?;

        if let Some(aircraft) = &self.aircraft {
            map.serialize_entry("regid", &aircraft.regid)?;
            map.serialize_entry("mdl", &aircraft.model)?;
            map.serialize_entry("type", &aircraft.aircraft_type)?;
            map.serialize_entry("operator", &aircraft.operator)?;
        }

        match &self.kind {
            MessageKind::Surveillance { altitude } => {
                map.serialize_entry("altitude", altitude)?;
            }
            MessageKind::Identification { callsign } => {
                map.serialize_entry("callsign", callsign)?;
            }
            MessageKind::AirbornePosition {
                position,
                altitude,
                velocity,
            } => {
                map.serialize_entry("coordpair_even", &position.parity)?;
                map.serialize_entry("raw_lat", &position.raw_lat)?;
                map.serialize_entry("raw_lon", &position.raw_lon)?;
                map.serialize_entry("altitude", altitude)?;
                if let Some(velocity) = velocity {
                    map.serialize_entry("speed", &velocity.speed)?;
                    map.serialize_entry("heading", &velocity.heading)?;
                }
            }
            MessageKind::Other => {}
        }

        map.end()
    }
}

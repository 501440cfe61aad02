//! ADS-B message parsing module

pub mod crc;
pub mod fields;
pub mod frame;
pub mod parser;
mod types;

pub use frame::{adsb_len_by_type, Frame, FrameLength, LineError};
pub use parser::{decode_frame, decode_line, DecodeError};
pub use types::{DecodedMessage, Icao, MessageKind, RawPosition, Velocity};

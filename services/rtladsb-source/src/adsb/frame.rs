//! Mode S frame buffer with a bounds-checked bit reader

use thiserror::Error;

/// Byte length of a long (112-bit) frame
pub const LONG_FRAME_BYTES: usize = 14;

/// Byte length of a short (56-bit) frame
pub const SHORT_FRAME_BYTES: usize = 7;

/// Reasons a received line cannot become a frame
#[derive(Debug, Error)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("unexpected frame length of {0} bytes")]
    BadLength(usize),

    #[error("type {message_type} needs {expected} bytes, got {actual}")]
    Truncated {
        message_type: u8,
        expected: usize,
        actual: usize,
    },
}

/// Frame length, derived from the 5-bit message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    Short,
    Long,
}

impl FrameLength {
    /// Types 16, 17, 19, 20 and 21 are long; everything else is short
    pub fn for_type(message_type: u8) -> Self {
        match message_type {
            16 | 17 | 19 | 20 | 21 => Self::Long,
            _ => Self::Short,
        }
    }

    pub const fn bits(self) -> usize {
        match self {
            Self::Short => 56,
            Self::Long => 112,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// Expected length in bits of a message of the given type
pub fn adsb_len_by_type(message_type: u8) -> usize {
    FrameLength::for_type(message_type).bits()
}

/// A received frame.
///
/// Only the bytes covered by the type's declared length are kept; every bit
/// read is checked against that length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: [u8; LONG_FRAME_BYTES],
    length: FrameLength,
}

impl Frame {
    /// Build a frame from decoded line bytes.
    ///
    /// The buffer must hold at least as many bytes as the type field
    /// declares. Extra trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LineError> {
        let first = *bytes.first().ok_or(LineError::Empty)?;
        let message_type = first >> 3;
        let length = FrameLength::for_type(message_type);

        if bytes.len() < length.bytes() {
            return Err(LineError::Truncated {
                message_type,
                expected: length.bytes(),
                actual: bytes.len(),
            });
        }

        let mut data = [0u8; LONG_FRAME_BYTES];
        data[..length.bytes()].copy_from_slice(&bytes[..length.bytes()]);

        Ok(Self { data, length })
    }

    pub fn length(&self) -> FrameLength {
        self.length
    }

    pub fn bit_len(&self) -> usize {
        self.length.bits()
    }

    /// Frame bytes up to the declared length
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length.bytes()]
    }

    /// Downlink format: top 5 bits of byte 0
    pub fn message_type(&self) -> u8 {
        self.data[0] >> 3
    }

    /// Read one bit, 0 being the MSB of byte 0.
    ///
    /// Panics if `index` lies beyond the frame's declared length.
    pub fn bit(&self, index: usize) -> bool {
        assert!(
            index < self.bit_len(),
            "bit {} read past {}-bit frame",
            index,
            self.bit_len()
        );
        (self.data[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Read `width` bits starting at `start`, MSB first.
    ///
    /// Panics if the field extends past the declared length or is wider
    /// than 32 bits.
    pub fn bits(&self, start: usize, width: usize) -> u32 {
        assert!(width <= 32, "field of {} bits does not fit in u32", width);
        assert!(
            start + width <= self.bit_len(),
            "field {}..{} read past {}-bit frame",
            start,
            start + width,
            self.bit_len()
        );

        (start..start + width).fold(0u32, |acc, index| {
            let bit = (self.data[index / 8] >> (7 - index % 8)) & 1;
            (acc << 1) | bit as u32
        })
    }

    /// View of the ME field, available only for type 17 frames
    pub fn extended_squitter(&self) -> Option<ExtendedSquitter<'_>> {
        if self.message_type() == 17 {
            Some(ExtendedSquitter { frame: self })
        } else {
            None
        }
    }
}

/// A type 17 frame; always 112 bits long, so ME field reads are in range
#[derive(Debug, Clone, Copy)]
pub struct ExtendedSquitter<'a> {
    frame: &'a Frame,
}

impl ExtendedSquitter<'_> {
    pub fn bit(&self, index: usize) -> bool {
        self.frame.bit(index)
    }

    pub fn bits(&self, start: usize, width: usize) -> u32 {
        self.frame.bits(start, width)
    }
}

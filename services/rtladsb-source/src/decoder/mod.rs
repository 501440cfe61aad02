//! External rtl_adsb decoder process

mod runner;

pub use runner::{DecoderLauncher, DecoderProcess, DecoderSettings, RtlAdsbLauncher};

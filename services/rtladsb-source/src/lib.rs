//! rtladsb data source
//!
//! Decodes Mode S / ADS-B frames printed by rtl_adsb into JSON aircraft
//! records, enriched from a static aircraft registry.

pub mod adsb;
pub mod config;
pub mod decoder;
pub mod device;
pub mod ingest;
pub mod output;
pub mod registry;

//! Configuration loaded from environment variables

use std::path::PathBuf;

use thiserror::Error;

use crate::decoder::DecoderSettings;

/// Default ADS-B channel, reported to the host
const DEFAULT_CHANNEL: &str = "1090.000MHz";

/// Prefix every local source definition carries
const SOURCE_PREFIX: &str = "rtladsb-";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source {0:?} is not of the form rtladsb-<index|serial>")]
    InvalidSource(String),

    #[error("unknown input mode {0:?} (expected rtladsb or json)")]
    InvalidInput(String),

    #[error("cannot parse channel {0:?}")]
    InvalidChannel(String),

    #[error("no sources configured")]
    NoSources,
}

/// Where records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Spawn rtl_adsb per source and decode its frames
    Rtladsb,
    /// Read pre-decoded JSON records from stdin
    Json,
}

/// A local radio, named `rtladsb-<selector>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefinition {
    pub name: String,
    /// Device index or serial number
    pub selector: String,
}

impl SourceDefinition {
    pub fn parse(definition: &str) -> Result<Self, ConfigError> {
        let name = definition.trim();
        match name.strip_prefix(SOURCE_PREFIX) {
            Some(selector) if !selector.is_empty() => Ok(Self {
                name: name.to_string(),
                selector: selector.to_string(),
            }),
            _ => Err(ConfigError::InvalidSource(definition.to_string())),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to rtl_adsb executable
    pub rtl_adsb_path: PathBuf,

    /// One session is started per source
    pub sources: Vec<SourceDefinition>,

    /// Tuner gain in dB (auto when unset)
    pub gain_db: Option<f32>,

    /// PPM frequency correction
    pub ppm_error: Option<i32>,

    /// Channel frequency in Hz
    pub channel_hz: u64,

    /// Aircraft registry table
    pub registry_path: PathBuf,

    pub input: InputMode,

    /// Per-device statistics logging interval in seconds
    pub stats_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sources = var("SOURCES")
            .unwrap_or_else(|| format!("{}0", SOURCE_PREFIX))
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(SourceDefinition::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let input = match var("INPUT").as_deref().map(str::trim) {
            None | Some("rtladsb") => InputMode::Rtladsb,
            Some("json") => InputMode::Json,
            Some(other) => return Err(ConfigError::InvalidInput(other.to_string())),
        };

        let channel = var("CHANNEL").unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        Ok(Self {
            rtl_adsb_path: var("RTL_ADSB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("rtl_adsb")),

            sources,

            gain_db: var("DEVICE_GAIN").and_then(|s| s.parse().ok()),

            ppm_error: var("PPM_ERROR").and_then(|s| s.parse().ok()),

            channel_hz: parse_channel(&channel)?,

            registry_path: var("REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                        .join("data")
                        .join("aircraft_db.csv")
                }),

            input,

            stats_interval_secs: var("STATS_INTERVAL_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .unwrap_or(10),
        })
    }

    /// rtl_adsb arguments for one source
    pub fn decoder_settings(&self, source: &SourceDefinition) -> DecoderSettings {
        DecoderSettings {
            device: Some(source.selector.clone()),
            gain_db: self.gain_db,
            ppm_error: self.ppm_error,
        }
    }
}

/// Parse `1090.000MHz`, `1090000KHz` or a raw Hz value
pub fn parse_channel(channel: &str) -> Result<u64, ConfigError> {
    let trimmed = channel.trim();
    let lower = trimmed.to_ascii_lowercase();

    let (number, scale) = if let Some(n) = lower.strip_suffix("mhz") {
        (n, 1_000_000.0)
    } else if let Some(n) = lower.strip_suffix("khz") {
        (n, 1_000.0)
    } else {
        (lower.as_str(), 1.0)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidChannel(channel.to_string()))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidChannel(channel.to_string()));
    }

    Ok((value * scale).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("1090.000MHz").unwrap(), 1_090_000_000);
        assert_eq!(parse_channel("1090000KHz").unwrap(), 1_090_000_000);
        assert_eq!(parse_channel("1090000000").unwrap(), 1_090_000_000);
        assert_eq!(parse_channel(" 978mhz ").unwrap(), 978_000_000);
        assert!(parse_channel("MHz").is_err());
        assert!(parse_channel("-5").is_err());
    }

    #[test]
    fn test_source_definition() {
        let source = SourceDefinition::parse("rtladsb-00000002").unwrap();
        assert_eq!(source.name, "rtladsb-00000002");
        assert_eq!(source.selector, "00000002");

        assert!(SourceDefinition::parse("rtl433-0").is_err());
        assert!(SourceDefinition::parse("rtladsb-").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.rtl_adsb_path, PathBuf::from("rtl_adsb"));
        assert_eq!(config.sources, vec![SourceDefinition::parse("rtladsb-0").unwrap()]);
        assert_eq!(config.gain_db, None);
        assert_eq!(config.channel_hz, 1_090_000_000);
        assert_eq!(config.input, InputMode::Rtladsb);
        assert_eq!(config.stats_interval_secs, 10);
        assert!(config.registry_path.ends_with("data/aircraft_db.csv"));
    }

    #[test]
    fn test_multiple_sources_and_settings() {
        let config = config(&[
            ("SOURCES", "rtladsb-0, rtladsb-1"),
            ("DEVICE_GAIN", "42.1"),
            ("PPM_ERROR", "-2"),
            ("INPUT", "rtladsb"),
        ])
        .unwrap();
        assert_eq!(config.sources.len(), 2);

        let settings = config.decoder_settings(&config.sources[1]);
        assert_eq!(settings.device.as_deref(), Some("1"));
        assert_eq!(settings.gain_db, Some(42.1));
        assert_eq!(settings.ppm_error, Some(-2));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("SOURCES", "mqtt")]),
            Err(ConfigError::InvalidSource(_))
        ));
        assert!(matches!(
            config(&[("INPUT", "udp")]),
            Err(ConfigError::InvalidInput(_))
        ));
        assert!(matches!(
            config(&[("CHANNEL", "fast")]),
            Err(ConfigError::InvalidChannel(_))
        ));
        assert!(matches!(config(&[("SOURCES", " , ")]), Err(ConfigError::NoSources)));
        assert!(matches!(config(&[("SOURCES", "")]), Err(ConfigError::NoSources)));
    }
}

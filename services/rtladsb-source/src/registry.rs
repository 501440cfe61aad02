//! Static aircraft registry, keyed by ICAO address

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::adsb::Icao;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot open aircraft table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse aircraft table: {0}")]
    Csv(#[from] csv::Error),

    #[error("aircraft table line {line}: expected 5 fields, found {found}")]
    MissingField { line: u64, found: usize },

    #[error("aircraft table is empty")]
    Empty,
}

/// One row of the aircraft table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AircraftRecord {
    pub icao: String,
    pub regid: String,
    pub model: String,
    pub aircraft_type: String,
    pub operator: String,
}

/// Read-only ICAO -> aircraft metadata map.
///
/// Rows are `icao,regid,model,type,operator` without a header. When an ICAO
/// appears more than once the last row wins.
#[derive(Debug, Default)]
pub struct AircraftRegistry {
    aircraft: HashMap<String, Arc<AircraftRecord>>,
}

impl AircraftRegistry {
    /// Load the table from disk. An unreadable or empty table is an error.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let registry = Self::from_reader(file)?;
        info!("Loaded {} aircraft from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut aircraft = HashMap::new();
        for row in reader.records() {
            let row = row?;
            if row.len() < 5 {
                return Err(RegistryError::MissingField {
                    line: row.position().map(|p| p.line()).unwrap_or(0),
                    found: row.len(),
                });
            }

            let record = AircraftRecord {
                icao: row[0].to_ascii_lowercase(),
                regid: row[1].to_string(),
                model: row[2].to_string(),
                aircraft_type: row[3].to_string(),
                operator: row[4].to_string(),
            };
            aircraft.insert(record.icao.clone(), Arc::new(record));
        }

        if aircraft.is_empty() {
            return Err(RegistryError::Empty);
        }

        debug!("Aircraft registry holds {} entries", aircraft.len());
        Ok(Self { aircraft })
    }

    pub fn lookup(&self, icao: &Icao) -> Option<Arc<AircraftRecord>> {
        self.aircraft.get(&icao.to_hex()).cloned()
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = "\
4840d6,PH-BXK,Boeing 737-8K2,B738,KLM Royal Dutch Airlines
ABCDEF,N12345,Cessna 172S,C172,Private
40621d,G-EZUH,Airbus A319-111,A319,easyJet
";

    #[test]
    fn test_lookup_hit() {
        let registry = AircraftRegistry::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(registry.len(), 3);

        let record = registry.lookup(&Icao([0x48, 0x40, 0xD6])).unwrap();
        assert_eq!(record.regid, "PH-BXK");
        assert_eq!(record.model, "Boeing 737-8K2");
        assert_eq!(record.aircraft_type, "B738");
        assert_eq!(record.operator, "KLM Royal Dutch Airlines");
    }

    #[test]
    fn test_lookup_normalizes_case() {
        let registry = AircraftRegistry::from_reader(TABLE.as_bytes()).unwrap();
        assert!(registry.lookup(&Icao([0xAB, 0xCD, 0xEF])).is_some());
    }

    #[test]
    fn test_lookup_miss() {
        let registry = AircraftRegistry::from_reader(TABLE.as_bytes()).unwrap();
        assert!(registry.lookup(&Icao([0x00, 0x00, 0x01])).is_none());
    }

    #[test]
    fn test_last_duplicate_wins() {
        let table = "4840d6,OLD,a,b,c\n4840d6,NEW,a,b,c\n";
        let registry = AircraftRegistry::from_reader(table.as_bytes()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&Icao([0x48, 0x40, 0xD6])).unwrap().regid, "NEW");
    }

    #[test]
    fn test_short_row_is_rejected() {
        let table = "4840d6,PH-BXK,Boeing 737-8K2,B738,KLM\nabcdef,N1\n";
        match AircraftRegistry::from_reader(table.as_bytes()) {
            Err(RegistryError::MissingField { line, found }) => {
                assert_eq!(line, 2);
                assert_eq!(found, 2);
            }
            other => panic!("expected missing field, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(matches!(
            AircraftRegistry::from_reader("".as_bytes()),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let registry = AircraftRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        assert!(matches!(
            AircraftRegistry::load(&path),
            Err(RegistryError::Io { .. })
        ));
    }
}

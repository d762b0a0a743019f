// Stop geocoding table and linear position interpolation
//
// The built-in table covers the Bengaluru / Chikkaballapur / Kolar demo network.
// Lookups never fail: an unknown stop makes `interpolate` fall back to the first
// entry of the table.

use crate::sbt_models::{Coordinate, Result, SBTError, Stop};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const BUILTIN_STOPS: &[(&str, f64, f64)] = &[
    // Bengaluru → Chikkaballapur
    ("Majestic", 12.9633, 77.5617),
    ("Hebbal", 13.0089, 77.5946),
    ("Yelahanka", 13.1089, 77.6023),
    ("Kogilu", 13.1567, 77.5899),
    ("Airport Trumpet", 13.1926, 77.5789),
    ("Devanahalli Bus Stand", 13.2267, 77.5612),
    ("Nagarjuna College (NCET)", 13.2567, 77.5467),
    ("Nandi Upachar", 13.2890, 77.5234),
    ("Chikkaballapur Bus Stand", 13.3156, 77.4501),
    // Chikkaballapur → Chintamani
    ("Nayanahalli", 13.3234, 77.4234),
    ("Jathavarahalli", 13.3567, 77.3901),
    ("Hosaudya", 13.3801, 77.3567),
    ("Shidlagatta", 13.4012, 77.3234),
    ("Hunnesaenahalli", 13.4234, 77.2901),
    ("Upparpete", 13.4456, 77.2567),
    ("Chintamani KSRTC Depot", 13.4701, 77.2201),
    // Chintamani → Kolar
    ("Dodaanatta Halt", 13.4901, 77.1834),
    ("Srinivaspura", 13.5089, 77.1467),
    ("Dalasanuru Halt", 13.5267, 77.1101),
    ("Gootihalli", 13.5456, 76.9701),
    ("Jannagatta Halt", 13.5634, 76.9234),
    ("Kolar Bus Stand", 13.5834, 76.8734),
    // Kolar → Devanahalli
    ("Vemagal", 13.5567, 77.0123),
    ("Narasapura", 13.5234, 77.0567),
    ("H Cross", 13.4567, 77.1234),
    // Airport
    ("Kempegowda International Airport", 13.1979, 77.7063),
];

/// Used only when a table is empty; matches the first built-in entry.
const LAST_RESORT: Coordinate = Coordinate::new(12.9633, 77.5617);

lazy_static! {
    static ref DEFAULT_TABLE: GeocodingTable = GeocodingTable::from_entries(
        BUILTIN_STOPS
            .iter()
            .map(|(name, lat, lng)| (name.to_string(), Coordinate::new(*lat, *lng)))
    );
}

#[derive(Debug, Deserialize)]
struct StopRow {
    name: String,
    latitude: f64,
    longitude: f64,
}

/// Ordered stop-name → coordinate mapping.
///
/// Insertion order is kept so that "the first entry" is well defined for the
/// interpolation fallback.
#[derive(Debug, Clone, Default)]
pub struct GeocodingTable {
    stops: Vec<Stop>,
    index: HashMap<String, usize>,
}

impl GeocodingTable {
    /// The built-in demo table.
    pub fn builtin() -> &'static GeocodingTable {
        &DEFAULT_TABLE
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Coordinate)>,
    {
        let mut table = GeocodingTable::default();
        for (name, coordinate) in entries {
            table.insert(name, coordinate);
        }
        table
    }

    /// Inserts or replaces a stop. Replacing keeps the original position.
    pub fn insert(&mut self, name: String, coordinate: Coordinate) {
        match self.index.get(&name) {
            Some(&i) => self.stops[i].coordinate = coordinate,
            None => {
                self.index.insert(name.clone(), self.stops.len());
                self.stops.push(Stop { name, coordinate });
            }
        }
    }

    /// Reads `name,latitude,longitude` rows (with header). Malformed rows are
    /// skipped with a warning.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut table = GeocodingTable::default();

        for (line, record) in rdr.deserialize::<StopRow>().enumerate() {
            match record {
                Ok(row) => table.insert(row.name, Coordinate::new(row.latitude, row.longitude)),
                Err(e) => log::warn!("Skipping invalid stop row {}: {}", line + 1, e),
            }
        }

        if table.is_empty() {
            return Err(SBTError::ParseError(
                "No valid stops found in CSV input".to_string(),
            ));
        }
        Ok(table)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            SBTError::FileError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Self::from_csv_reader(file)
    }

    /// Built-in table overlaid with the entries of `other`.
    pub fn merged_with(&self, other: &GeocodingTable) -> GeocodingTable {
        let mut merged = self.clone();
        for stop in &other.stops {
            merged.insert(stop.name.clone(), stop.coordinate);
        }
        merged
    }

    pub fn get(&self, name: &str) -> Option<Coordinate> {
        self.index.get(name).map(|&i| self.stops[i].coordinate)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn fallback(&self) -> Coordinate {
        self.stops.first().map(|s| s.coordinate).unwrap_or(LAST_RESORT)
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Linear interpolation between two stops, each axis independently.
    ///
    /// `progress` is expected in [0, 1]: 0 is `from`, 1 is `to`. If either stop
    /// is unknown the table's fallback coordinate is returned. NaN counts as 0.
    pub fn interpolate(&self, from: &str, to: &str, progress: f64) -> Coordinate {
        let (Some(a), Some(b)) = (self.get(from), self.get(to)) else {
            return self.fallback();
        };

        if progress.is_nan() || progress <= 0.0 {
            return a;
        }
        if progress >= 1.0 {
            return b;
        }

        Coordinate::new(
            a.latitude + (b.latitude - a.latitude) * progress,
            a.longitude + (b.longitude - a.longitude) * progress,
        )
    }
}

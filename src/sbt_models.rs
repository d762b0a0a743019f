// Data model for the Smart Bus Tracker simulation core
//
// Routes and buses are static reference data generated at load time. Everything
// "current" about a bus (status, next stop, ETA, position) is derived from the
// wall clock by the ETA engine and never stored on these structures.

use geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Geography
// ============================================================================

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }

    /// geo points are (x = longitude, y = latitude)
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Coordinate { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub coordinate: Coordinate,
}

// ============================================================================
// Routes and Buses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: String,
    /// Epoch milliseconds at which the bus left `stops[start_index]`
    pub departure_time: i64,
    pub segment_time_seconds: i64,
    pub start_index: usize,
    /// Generation seeds. Only the fallback ETA mode reads them at runtime.
    pub eta: String,
    pub status: String,
    pub next_stop: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub stops: Vec<String>,
    pub buses: Vec<Bus>,
}

impl Route {
    pub fn stop_index(&self, stop: &str) -> Option<usize> {
        self.stops.iter().position(|s| s == stop)
    }

    pub fn final_stop(&self) -> Option<&str> {
        self.stops.last().map(String::as_str)
    }

    /// True when `source` comes strictly before `destination` on this route.
    pub fn serves(&self, source: &str, destination: &str) -> bool {
        match (self.stop_index(source), self.stop_index(destination)) {
            (Some(src), Some(dst)) => src < dst,
            _ => false,
        }
    }

    pub fn find_bus(&self, bus_id: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.id == bus_id)
    }
}

// ============================================================================
// Derived snapshots
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusStatus {
    #[serde(rename = "On the way")]
    OnTheWay,
    #[serde(rename = "At stop")]
    AtStop,
    #[serde(rename = "Departed")]
    Departed,
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BusStatus::OnTheWay => "On the way",
            BusStatus::AtStop => "At stop",
            BusStatus::Departed => "Departed",
        };
        f.write_str(label)
    }
}

/// Per-tick view of a bus. Recomputed on every evaluation, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub status: BusStatus,
    /// Stop the bus is standing at or most recently left
    pub current_stop: String,
    pub next_stop: String,
    pub remaining_seconds: i64,
    pub eta: String,
    pub is_departed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationSummary {
    pub mean_meters: f64,
    pub max_meters: f64,
    pub samples: usize,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum SBTError {
    DataError(String),
    ParseError(String),
    FileError(String),
    NotFound(String),
}

impl fmt::Display for SBTError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SBTError::DataError(e) => write!(f, "Data error: {}", e),
            SBTError::ParseError(e) => write!(f, "Parse error: {}", e),
            SBTError::FileError(e) => write!(f, "File error: {}", e),
            SBTError::NotFound(e) => write!(f, "Not found: {}", e),
        }
    }
}

impl std::error::Error for SBTError {}

pub type Result<T> = std::result::Result<T, SBTError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Route {
        Route {
            id: "r1".to_string(),
            name: "A → C".to_string(),
            stops: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            buses: Vec::new(),
        }
    }

    #[test]
    fn serves_requires_source_before_destination() {
        let r = route();
        assert!(r.serves("A", "C"));
        assert!(r.serves("B", "C"));
        assert!(!r.serves("C", "A"));
        assert!(!r.serves("A", "A"));
        assert!(!r.serves("A", "Z"));
    }

    #[test]
    fn status_labels_match_display_strings() {
        assert_eq!(BusStatus::OnTheWay.to_string(), "On the way");
        assert_eq!(BusStatus::AtStop.to_string(), "At stop");
        assert_eq!(
            serde_json::to_string(&BusStatus::Departed).unwrap(),
            "\"Departed\""
        );
    }

    #[test]
    fn coordinate_converts_to_lng_lat_point() {
        let p = Coordinate::new(12.9633, 77.5617).to_point();
        assert_eq!(p.x(), 77.5617);
        assert_eq!(p.y(), 12.9633);
    }
}

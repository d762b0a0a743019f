// Route catalogue: demo network, bus generation and stop-pair search
//
// Route seeds describe each bus the way a timetable board would ("7 min",
// "On the way", next stop). At load time they are turned into `Bus` values with
// fresh departure timestamps so that a demo always starts with live buses.

use crate::sbt_geocoding::GeocodingTable;
use crate::sbt_models::{Bus, Result, Route, SBTError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Minimum travel time of a generated segment.
const MIN_SEGMENT_SECONDS: i64 = 30;
/// Used when a seed ETA carries no digits at all.
const DEFAULT_SEED_MINUTES: i64 = 7;
/// Gap between consecutive buses of a route.
const BUS_STAGGER_MS: i64 = 7 * 60 * 1000;

lazy_static! {
    static ref SEED_MINUTES: Regex = Regex::new(r"(\d+)").expect("valid seed regex");
}

// ============================================================================
// Seeds
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusSeed {
    pub id: String,
    #[serde(default)]
    pub eta: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub next_stop: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSeed {
    pub id: String,
    pub name: String,
    pub stops: Vec<String>,
    #[serde(default)]
    pub buses: Vec<BusSeed>,
}

/// Turns seeds into buses with departure times relative to `now_ms`.
///
/// The bus starts from the stop before its seed `next_stop` (or the first stop
/// when that is unknown) and buses are spread BUS_STAGGER_MS apart.
pub fn generate_buses(seeds: &[BusSeed], stops: &[String], now_ms: i64) -> Vec<Bus> {
    seeds
        .iter()
        .enumerate()
        .map(|(idx, seed)| {
            let eta_minutes = SEED_MINUTES
                .captures(&seed.eta)
                .and_then(|c| c[1].parse::<i64>().ok())
                .unwrap_or(DEFAULT_SEED_MINUTES);
            let segment_time_seconds = eta_minutes.saturating_mul(60).max(MIN_SEGMENT_SECONDS);

            let start_index = stops
                .iter()
                .position(|s| s == &seed.next_stop)
                .map(|next| next.saturating_sub(1))
                .unwrap_or(0);

            Bus {
                id: seed.id.clone(),
                departure_time: now_ms - idx as i64 * BUS_STAGGER_MS,
                segment_time_seconds,
                start_index,
                eta: seed.eta.clone(),
                status: seed.status.clone(),
                next_stop: seed.next_stop.clone(),
            }
        })
        .collect()
}

fn seed(id: &str, name: &str, stops: &[&str], buses: &[(&str, &str, &str, &str)]) -> RouteSeed {
    RouteSeed {
        id: id.to_string(),
        name: name.to_string(),
        stops: stops.iter().map(|s| s.to_string()).collect(),
        buses: buses
            .iter()
            .map(|(id, eta, status, next_stop)| BusSeed {
                id: id.to_string(),
                eta: eta.to_string(),
                status: status.to_string(),
                next_stop: next_stop.to_string(),
            })
            .collect(),
    }
}

/// The Bengaluru-region demo network.
#[rustfmt::skip]
pub fn builtin_seeds() -> Vec<RouteSeed> {
    const BLR_CBP: &[&str] = &[
        "Majestic",
        "Hebbal",
        "Yelahanka",
        "Kogilu",
        "Airport Trumpet",
        "Devanahalli Bus Stand",
        "Nagarjuna College (NCET)",
        "Nandi Upachar",
        "Chikkaballapur Bus Stand",
    ];
    const CBP_CHINTAMANI: &[&str] = &[
        "Chikkaballapur Bus Stand",
        "Nayanahalli",
        "Jathavarahalli",
        "Hosaudya",
        "Shidlagatta",
        "Hunnesaenahalli",
        "Upparpete",
        "Chintamani KSRTC Depot",
    ];
    const CBP_AIRPORT: &[&str] = &[
        "Chikkaballapur Bus Stand",
        "Nandi Upachar",
        "Nagarjuna College (NCET)",
        "Devanahalli Bus Stand",
        "Airport Trumpet",
        "Kempegowda International Airport",
    ];
    const CHINTAMANI_KOLAR: &[&str] = &[
        "Chintamani KSRTC Depot",
        "Dodaanatta Halt",
        "Srinivaspura",
        "Dalasanuru Halt",
        "Gootihalli",
        "Jannagatta Halt",
        "Kolar Bus Stand",
    ];

    let reversed =
        |stops: &[&'static str]| -> Vec<&'static str> { stops.iter().rev().copied().collect() };

    vec![
        seed("blr-chikkaballapur", "Bengaluru → Chikkaballapur", BLR_CBP, &[
            ("KA01 F 5521", "7 min", "On the way", "Nagarjuna College (NCET)"),
            ("KA40 F 8829", "12 min", "At stop", "Devanahalli Bus Stand"),
            ("KA01 F 7710", "18 min", "On the way", "Nandi Upachar"),
            ("KA40 F 9913", "26 min", "On the way", "Airport Trumpet"),
            ("KA01 F 4408", "34 min", "On the way", "Yelahanka"),
        ]),
        seed("chikkaballapur-blr", "Chikkaballapur → Bengaluru", &reversed(BLR_CBP), &[
            ("KA01 F 4408", "34 min", "On the way", "Yelahanka"),
            ("KA40 F 9913", "26 min", "On the way", "Airport Trumpet"),
            ("KA01 F 7710", "18 min", "On the way", "Nandi Upachar"),
            ("KA40 F 8829", "12 min", "At stop", "Devanahalli Bus Stand"),
            ("KA01 F 5521", "7 min", "On the way", "Nagarjuna College (NCET)"),
        ]),
        seed("chikkaballapur-chintamani", "Chikkaballapur → Chintamani", CBP_CHINTAMANI, &[
            ("KA40 F 2351", "5 min", "On the way", "Nayanahalli"),
            ("KA40 F 6630", "12 min", "On the way", "Jathavarahalli"),
            ("KA40 F 1189", "18 min", "At stop", "Hosaudya"),
            ("KA40 F 7719", "25 min", "On the way", "Shidlagatta"),
            ("KA40 F 9924", "30 min", "On the way", "Hunnesaenahalli"),
        ]),
        seed("chintamani-chikkaballapur", "Chintamani → Chikkaballapur", &reversed(CBP_CHINTAMANI), &[
            ("KA40 F 5521", "6 min", "On the way", "Upparpete"),
            ("KA40 F 7740", "13 min", "On the way", "Hunnesaenahalli"),
            ("KA40 F 2272", "19 min", "At stop", "Shidlagatta"),
            ("KA40 F 6633", "26 min", "On the way", "Hosaudya"),
            ("KA40 F 4491", "33 min", "On the way", "Jathavarahalli"),
        ]),
        seed("chikkaballapur-devanahalli-airport", "Chikkaballapur → Devanahalli → Airport", CBP_AIRPORT, &[
            ("KA40 F 9901", "6 min", "On the way", "Nandi Upachar"),
            ("KA40 F 4410", "13 min", "On the way", "Nagarjuna College (NCET)"),
            ("KA40 F 7718", "19 min", "At stop", "Devanahalli Bus Stand"),
            ("KA40 F 5502", "25 min", "On the way", "Airport Trumpet"),
            ("KA40 F 8890", "33 min", "On the way", "Kempegowda International Airport"),
        ]),
        seed("airport-devanahalli-chikkaballapur", "Airport → Devanahalli → Chikkaballapur", &reversed(CBP_AIRPORT), &[
            ("KA40 F 8821", "5 min", "On the way", "Airport Trumpet"),
            ("KA40 F 6642", "12 min", "On the way", "Devanahalli Bus Stand"),
            ("KA40 F 9914", "18 min", "At stop", "Nagarjuna College (NCET)"),
            ("KA40 F 4477", "24 min", "On the way", "Nandi Upachar"),
            ("KA40 F 3302", "31 min", "On the way", "Chikkaballapur Bus Stand"),
        ]),
        seed("chintamani-kolar", "Chintamani → Kolar", CHINTAMANI_KOLAR, &[
            ("KA07 F 6612", "3 min", "On the way", "Dodaanatta Halt"),
            ("KA07 F 4420", "9 min", "At stop", "Srinivaspura"),
            ("KA07 F 7711", "15 min", "On the way", "Dalasanuru Halt"),
            ("KA07 F 5584", "22 min", "On the way", "Gootihalli"),
            ("KA07 F 9924", "27 min", "On the way", "Kolar Bus Stand"),
        ]),
        seed("kolar-chintamani", "Kolar → Chintamani", &reversed(CHINTAMANI_KOLAR), &[
            ("KA07 F 5521", "4 min", "On the way", "Jannagatta Halt"),
            ("KA07 F 7744", "10 min", "On the way", "Gootihalli"),
            ("KA07 F 2290", "17 min", "At stop", "Dalasanuru Halt"),
            ("KA07 F 6633", "23 min", "On the way", "Srinivaspura"),
            ("KA07 F 4491", "30 min", "On the way", "Dodaanatta Halt"),
        ]),
        seed("kolar-devanahalli", "Kolar → Devanahalli", &[
            "Kolar Bus Stand",
            "Vemagal",
            "Narasapura",
            "H Cross",
            "Devanahalli Bus Stand",
        ], &[
            ("KA07 F 5579", "5 min", "On the way", "Vemagal"),
            ("KA07 F 9910", "12 min", "At stop", "Narasapura"),
            ("KA07 F 2278", "19 min", "On the way", "H Cross"),
            ("KA07 F 7749", "25 min", "On the way", "Devanahalli Bus Stand"),
            ("KA07 F 6605", "32 min", "On the way", "Kolar Bus Stand"),
        ]),
        seed("chikkaballapur-bagalur", "Chikkaballapur → Bagalur", &[
            "Chikkaballapur Bus Stand",
            "Sathanur",
            "Kundana",
            "Bagalur Cross",
            "Bagalur Town",
        ], &[
            ("KA40 F 3087", "4 min", "On the way", "Sathanur"),
            ("KA40 F 1145", "10 min", "On the way", "Kundana"),
            ("KA40 F 9921", "16 min", "At stop", "Bagalur Cross"),
            ("KA40 F 6630", "23 min", "On the way", "Bagalur Town"),
            ("KA40 F 4477", "29 min", "On the way", "Chikkaballapur Bus Stand"),
        ]),
    ]
}

// ============================================================================
// Catalogue
// ============================================================================

/// A bus found by a stop-pair search, with the route it runs.
#[derive(Debug, Clone, Copy)]
pub struct BusMatch<'a> {
    pub route: &'a Route,
    pub bus: &'a Bus,
}

#[derive(Debug, Clone)]
pub struct RouteCatalogue {
    routes: Vec<Route>,
}

impl RouteCatalogue {
    pub fn builtin(now_ms: i64) -> Self {
        Self::from_seeds(builtin_seeds(), now_ms)
    }

    pub fn from_seeds(seeds: Vec<RouteSeed>, now_ms: i64) -> Self {
        let routes = seeds
            .into_iter()
            .map(|s| {
                let buses = generate_buses(&s.buses, &s.stops, now_ms);
                Route {
                    id: s.id,
                    name: s.name,
                    stops: s.stops,
                    buses,
                }
            })
            .collect();
        RouteCatalogue { routes }
    }

    /// Routes already carrying generated buses (no regeneration).
    pub fn from_routes(routes: Vec<Route>) -> Self {
        RouteCatalogue { routes }
    }

    pub fn from_json_str(json: &str, now_ms: i64) -> Result<Self> {
        let seeds: Vec<RouteSeed> = serde_json::from_str(json)
            .map_err(|e| SBTError::ParseError(format!("Invalid route JSON: {}", e)))?;

        if seeds.is_empty() {
            return Err(SBTError::DataError("Route file contains no routes".to_string()));
        }
        for s in &seeds {
            if s.stops.len() < 2 {
                log::warn!("Route {} has fewer than two stops", s.id);
            }
        }
        Ok(Self::from_seeds(seeds, now_ms))
    }

    pub fn from_json_path(path: &Path, now_ms: i64) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SBTError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents, now_ms)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == route_id)
    }

    /// Every stop of every route, first appearance order, no duplicates.
    pub fn all_stops(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .flat_map(|r| r.stops.iter())
            .filter(|s| seen.insert(s.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Stops reachable after `source` on at least one route.
    pub fn destinations_from(&self, source: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .filter_map(|r| r.stop_index(source).map(|i| &r.stops[i + 1..]))
            .flatten()
            .filter(|s| seen.insert(s.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// All buses on routes visiting `source` strictly before `destination`.
    pub fn search(&self, source: &str, destination: &str) -> Result<Vec<BusMatch<'_>>> {
        if source.is_empty() || destination.is_empty() {
            return Err(SBTError::DataError(
                "Please select both source and destination.".to_string(),
            ));
        }
        if source == destination {
            return Err(SBTError::DataError(
                "Source and destination cannot be the same. Please select different stops."
                    .to_string(),
            ));
        }

        Ok(self
            .routes
            .iter()
            .filter(|r| r.serves(source, destination))
            .flat_map(|route| route.buses.iter().map(move |bus| BusMatch { route, bus }))
            .collect())
    }

    /// Looks the bus up on `route_id` first, then on any route.
    pub fn find_bus(&self, bus_id: &str, route_id: Option<&str>) -> Option<(&Route, &Bus)> {
        let preferred = route_id
            .and_then(|id| self.route(id))
            .and_then(|r| r.find_bus(bus_id).map(|b| (r, b)));

        preferred.or_else(|| {
            self.routes
                .iter()
                .find_map(|r| r.find_bus(bus_id).map(|b| (r, b)))
        })
    }

    /// (route id, stop) pairs the geocoding table cannot place.
    pub fn missing_coordinates<'a>(&'a self, table: &GeocodingTable) -> Vec<(&'a str, &'a str)> {
        self.routes
            .iter()
            .flat_map(|r| {
                r.stops
                    .iter()
                    .filter(|s| !table.contains(s))
                    .map(move |s| (r.id.as_str(), s.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn generated_buses_follow_their_seeds() {
        let catalogue = RouteCatalogue::builtin(NOW);
        let route = catalogue.route("blr-chikkaballapur").unwrap();

        let first = &route.buses[0];
        assert_eq!(first.segment_time_seconds, 420);
        // next stop is NCET (index 6), so the bus left index 5
        assert_eq!(first.start_index, 5);
        assert_eq!(first.departure_time, NOW);

        let second = &route.buses[1];
        assert_eq!(second.departure_time, NOW - BUS_STAGGER_MS);
    }

    #[test]
    fn unknown_next_stop_starts_at_origin_and_short_etas_are_raised() {
        let seeds = vec![BusSeed {
            id: "X".to_string(),
            eta: "0 min".to_string(),
            status: String::new(),
            next_stop: "Nowhere".to_string(),
        }];
        let stops = vec!["A".to_string(), "B".to_string()];
        let buses = generate_buses(&seeds, &stops, NOW);
        assert_eq!(buses[0].start_index, 0);
        assert_eq!(buses[0].segment_time_seconds, MIN_SEGMENT_SECONDS);
    }

    #[test]
    fn search_respects_travel_direction() {
        let catalogue = RouteCatalogue::builtin(NOW);

        let outbound = catalogue.search("Majestic", "Hebbal").unwrap();
        assert_eq!(outbound.len(), 5);
        assert!(outbound.iter().all(|m| m.route.id == "blr-chikkaballapur"));

        let inbound = catalogue.search("Hebbal", "Majestic").unwrap();
        assert!(inbound.iter().all(|m| m.route.id == "chikkaballapur-blr"));

        assert!(catalogue.search("Majestic", "Kolar Bus Stand").unwrap().is_empty());
        assert!(catalogue.search("Hebbal", "Hebbal").is_err());
        assert!(catalogue.search("", "Hebbal").is_err());
    }

    #[test]
    fn destinations_only_include_downstream_stops() {
        let catalogue = RouteCatalogue::builtin(NOW);
        let from_kolar = catalogue.destinations_from("Kolar Bus Stand");
        assert!(from_kolar.contains(&"Vemagal"));
        assert!(from_kolar.contains(&"Chintamani KSRTC Depot"));
        assert!(!from_kolar.contains(&"Kolar Bus Stand"));
        assert!(catalogue.destinations_from("Nowhere").is_empty());
    }

    #[test]
    fn find_bus_prefers_requested_route() {
        let catalogue = RouteCatalogue::builtin(NOW);
        let (route, _) = catalogue.find_bus("KA01 F 4408", Some("chikkaballapur-blr")).unwrap();
        assert_eq!(route.id, "chikkaballapur-blr");

        let (route, _) = catalogue.find_bus("KA01 F 4408", None).unwrap();
        assert_eq!(route.id, "blr-chikkaballapur");

        assert!(catalogue.find_bus("KA99 Z 0000", None).is_none());
    }

    #[test]
    fn bagalur_stops_lack_coordinates() {
        let catalogue = RouteCatalogue::builtin(NOW);
        let missing = catalogue.missing_coordinates(GeocodingTable::builtin());
        assert_eq!(missing.len(), 4);
        assert!(missing.iter().all(|(route, _)| *route == "chikkaballapur-bagalur"));
    }

    #[test]
    fn all_stops_are_unique() {
        let catalogue = RouteCatalogue::builtin(NOW);
        let stops = catalogue.all_stops();
        assert_eq!(stops[0], "Majestic");
        let unique: HashSet<_> = stops.iter().collect();
        assert_eq!(unique.len(), stops.len());
    }

    #[test]
    fn json_routes_are_regenerated() {
        let json = r#"[{"id":"r","name":"A → B","stops":["A","B"],
                        "buses":[{"id":"B1","eta":"5 min","nextStop":"B"}]}]"#;
        let catalogue = RouteCatalogue::from_json_str(json, NOW).unwrap();
        let bus = &catalogue.routes()[0].buses[0];
        assert_eq!(bus.segment_time_seconds, 300);
        assert_eq!(bus.start_index, 0);
        assert_eq!(bus.departure_time, NOW);

        assert!(RouteCatalogue::from_json_str("[]", NOW).is_err());
        assert!(RouteCatalogue::from_json_str("{", NOW).is_err());
    }
}

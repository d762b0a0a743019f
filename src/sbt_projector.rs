// Position projector: ETA engine output → live coordinate

use crate::sbt_eta::resolve_segment_time;
use crate::sbt_geocoding::GeocodingTable;
use crate::sbt_models::{Bus, BusStatus, Coordinate, MetricsSnapshot};

/// Fraction of the current segment already travelled, in [0, 1].
///
/// A zero-length segment counts as fully travelled.
pub fn segment_progress(segment_time_seconds: i64, remaining_seconds: i64) -> f64 {
    if segment_time_seconds <= 0 {
        return 1.0;
    }
    let elapsed = (segment_time_seconds - remaining_seconds) as f64;
    (elapsed / segment_time_seconds as f64).clamp(0.0, 1.0)
}

/// Where the bus should be drawn for `metrics`.
///
/// A bus at a stop (or past the end of its route) sits on `current_stop`;
/// otherwise it is interpolated from the stop it left towards `next_stop`.
pub fn project_position(
    bus: &Bus,
    metrics: &MetricsSnapshot,
    table: &GeocodingTable,
) -> Coordinate {
    let (from, to) = match metrics.status {
        BusStatus::AtStop | BusStatus::Departed => (&metrics.current_stop, &metrics.current_stop),
        BusStatus::OnTheWay => (&metrics.current_stop, &metrics.next_stop),
    };

    let progress = segment_progress(resolve_segment_time(bus), metrics.remaining_seconds);
    table.interpolate(from, to, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbt_eta::EtaEngine;
    use crate::sbt_models::Route;

    const NOW: i64 = 1_760_000_000_000;

    fn setup(elapsed_ms: i64) -> (Bus, Route) {
        let route = Route {
            id: "blr".to_string(),
            name: "Majestic → Yelahanka".to_string(),
            stops: vec![
                "Majestic".to_string(),
                "Hebbal".to_string(),
                "Yelahanka".to_string(),
            ],
            buses: Vec::new(),
        };
        let bus = Bus {
            id: "KA01 F 5521".to_string(),
            departure_time: NOW - elapsed_ms,
            segment_time_seconds: 400,
            start_index: 0,
            eta: "7 min".to_string(),
            status: "On the way".to_string(),
            next_stop: "Hebbal".to_string(),
        };
        (bus, route)
    }

    #[test]
    fn progress_is_clamped_and_safe_for_zero_segments() {
        assert_eq!(segment_progress(0, 10), 1.0);
        assert_eq!(segment_progress(400, 400), 0.0);
        assert_eq!(segment_progress(400, 100), 0.75);
        assert_eq!(segment_progress(400, 900), 0.0);
        assert_eq!(segment_progress(400, -5), 1.0);
    }

    #[test]
    fn halfway_between_first_two_stops() {
        let table = GeocodingTable::builtin();
        let (bus, route) = setup(200_000);
        let metrics = EtaEngine::default().compute_metrics(&bus, Some(&route), NOW);
        let pos = project_position(&bus, &metrics, table);

        let a = table.get("Majestic").unwrap();
        let b = table.get("Hebbal").unwrap();
        assert!((pos.latitude - (a.latitude + b.latitude) / 2.0).abs() < 1e-9);
        assert!((pos.longitude - (a.longitude + b.longitude) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn dwelling_bus_sits_on_its_stop() {
        let table = GeocodingTable::builtin();
        let (bus, route) = setup(410_000);
        let metrics = EtaEngine::default().compute_metrics(&bus, Some(&route), NOW);
        assert_eq!(metrics.status, BusStatus::AtStop);
        assert_eq!(project_position(&bus, &metrics, table), table.get("Hebbal").unwrap());
    }

    #[test]
    fn departed_bus_stays_on_final_stop() {
        let table = GeocodingTable::builtin();
        let (bus, route) = setup(10_000_000);
        let metrics = EtaEngine::default().compute_metrics(&bus, Some(&route), NOW);
        assert!(metrics.is_departed);
        assert_eq!(project_position(&bus, &metrics, table), table.get("Yelahanka").unwrap());
    }
}

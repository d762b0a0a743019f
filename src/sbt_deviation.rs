// Route deviation analysis
//
// Compares the positions observed for a bus during a tracking session with the
// polyline through its route's stops. Distances are computed in a local planar
// frame per polyline segment, referenced on that segment's midpoint latitude.

use crate::sbt_geocoding::GeocodingTable;
use crate::sbt_models::{Coordinate, DeviationSummary, Route};
use geo::{Distance, Haversine};
use geo_types::{Coord, coord};
use std::collections::HashMap;

/// Points closer than this to the last recorded one are dropped.
pub const MIN_TRACE_STEP_METERS: f64 = 3.0;

const WGS84_EQUATORIAL_RADIUS: f64 = 6_378_137.0;

// ============================================================================
// Observed trace
// ============================================================================

/// Append-only sequence of observed positions for one bus.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    points: Vec<Coordinate>,
    frozen: bool,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `point` unless the trace is frozen or the point is within
    /// MIN_TRACE_STEP_METERS of the last one. Returns whether it was recorded.
    pub fn push(&mut self, point: Coordinate) -> bool {
        if self.frozen {
            return false;
        }
        if let Some(last) = self.points.last() {
            if haversine_meters(*last, point) < MIN_TRACE_STEP_METERS {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(a.to_point(), b.to_point())
}

// ============================================================================
// Geometry
// ============================================================================

/// Route stops resolved to coordinates, in travel order. Unknown stops are skipped.
pub fn expected_polyline(route: &Route, table: &GeocodingTable) -> Vec<Coordinate> {
    route.stops.iter().filter_map(|stop| table.get(stop)).collect()
}

/// Equirectangular projection to meters around `ref_lat`.
fn to_local_meters(point: Coordinate, ref_lat: f64) -> Coord<f64> {
    let phi = ref_lat.to_radians();
    let meters_per_deg_lat = 111_132.92 - 559.82 * (2.0 * phi).cos() + 1.175 * (4.0 * phi).cos();
    let meters_per_deg_lng = std::f64::consts::PI / 180.0 * WGS84_EQUATORIAL_RADIUS * phi.cos();
    coord! {
        x: point.longitude * meters_per_deg_lng,
        y: point.latitude * meters_per_deg_lat,
    }
}

/// Distance in meters from `p` to the closest point of segment `v`-`w`.
pub fn point_to_segment_meters(p: Coordinate, v: Coordinate, w: Coordinate) -> f64 {
    let ref_lat = (v.latitude + w.latitude) / 2.0;
    let p = to_local_meters(p, ref_lat);
    let v = to_local_meters(v, ref_lat);
    let w = to_local_meters(w, ref_lat);

    let d = w - v;
    let len_sq = d.x * d.x + d.y * d.y;
    if len_sq == 0.0 {
        return (p.x - v.x).hypot(p.y - v.y);
    }

    let t = (((p.x - v.x) * d.x + (p.y - v.y) * d.y) / len_sq).clamp(0.0, 1.0);
    let proj = v + d * t;
    (p.x - proj.x).hypot(p.y - proj.y)
}

/// Mean and max distance from each observed point to the expected polyline.
///
/// Returns `None` when there is not enough data: fewer than two polyline points
/// or no observations.
pub fn compute_deviation(
    expected: &[Coordinate],
    observed: &[Coordinate],
) -> Option<DeviationSummary> {
    if expected.len() < 2 || observed.is_empty() {
        return None;
    }

    let distances: Vec<f64> = observed
        .iter()
        .map(|&p| {
            expected
                .windows(2)
                .map(|seg| point_to_segment_meters(p, seg[0], seg[1]))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    let sum: f64 = distances.iter().sum();
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(DeviationSummary {
        mean_meters: sum / distances.len() as f64,
        max_meters: max,
        samples: distances.len(),
    })
}

// ============================================================================
// Per-bus cache
// ============================================================================

/// First-write-wins store of deviation summaries, keyed by bus id.
#[derive(Debug, Default)]
pub struct DeviationCache {
    results: HashMap<String, DeviationSummary>,
}

impl DeviationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the deviation for `bus_id` once. Later calls return the stored
    /// summary untouched, whatever the trace looks like by then. A result that
    /// is not computable yet is not stored.
    pub fn finalize(
        &mut self,
        bus_id: &str,
        expected: &[Coordinate],
        observed: &[Coordinate],
    ) -> Option<DeviationSummary> {
        if let Some(cached) = self.results.get(bus_id) {
            return Some(*cached);
        }

        let summary = compute_deviation(expected, observed)?;
        log::debug!(
            "Deviation for {}: mean {:.1} m, max {:.1} m over {} samples",
            bus_id,
            summary.mean_meters,
            summary.max_meters,
            summary.samples
        );
        self.results.insert(bus_id.to_string(), summary);
        Some(summary)
    }

    pub fn get(&self, bus_id: &str) -> Option<DeviationSummary> {
        self.results.get(bus_id).copied()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ~1000 m due north along a meridian near Bengaluru
    const START: Coordinate = Coordinate::new(13.0, 77.5);
    const END: Coordinate = Coordinate::new(13.009_044, 77.5);

    #[test]
    fn trace_skips_points_closer_than_three_meters() {
        let mut trace = Trace::new();
        assert!(trace.push(START));
        assert!(!trace.push(Coordinate::new(13.000_01, 77.5)));
        assert!(trace.push(Coordinate::new(13.000_05, 77.5)));
        assert_eq!(trace.len(), 2);

        trace.freeze();
        assert!(!trace.push(END));
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn on_line_points_have_zero_deviation() {
        let observed = [START, Coordinate::new(13.004_5, 77.5), END];
        let summary = compute_deviation(&[START, END], &observed).unwrap();
        assert_relative_eq!(summary.max_meters, 0.0, epsilon = 1e-6);
        assert_eq!(summary.samples, 3);
    }

    #[test]
    fn near_line_trace_stays_under_two_meters() {
        // 0.000_008° of longitude ≈ 0.87 m at this latitude
        let observed: Vec<Coordinate> = (0..=20)
            .map(|i| {
                let lat = START.latitude + (END.latitude - START.latitude) * i as f64 / 20.0;
                let offset = if i % 2 == 0 { 0.000_008 } else { -0.000_008 };
                Coordinate::new(lat, 77.5 + offset)
            })
            .collect();

        let summary = compute_deviation(&[START, END], &observed).unwrap();
        assert!(summary.mean_meters < 2.0);
        assert!(summary.max_meters < 2.0);
        assert!(summary.max_meters > 0.5);
    }

    #[test]
    fn distance_is_to_segment_not_infinite_line() {
        // Beyond END along the same meridian: distance is to END, not 0.
        let beyond = Coordinate::new(13.018_088, 77.5);
        let d = point_to_segment_meters(beyond, START, END);
        assert!(d > 900.0 && d < 1100.0, "d = {}", d);
    }

    #[test]
    fn degenerate_segment_measures_to_the_point() {
        let d = point_to_segment_meters(END, START, START);
        assert!(d > 900.0 && d < 1100.0, "d = {}", d);
    }

    #[test]
    fn insufficient_data_is_none() {
        assert!(compute_deviation(&[START], &[END]).is_none());
        assert!(compute_deviation(&[START, END], &[]).is_none());
    }

    #[test]
    fn cache_is_first_write_wins() {
        let mut cache = DeviationCache::new();
        let first = cache.finalize("KA01", &[START, END], &[START]).unwrap();

        let far = Coordinate::new(13.0, 77.6);
        let second = cache.finalize("KA01", &[START, END], &[START, far]).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_does_not_store_uncomputable_results() {
        let mut cache = DeviationCache::new();
        assert!(cache.finalize("KA01", &[START], &[START]).is_none());
        assert!(cache.is_empty());
        assert!(cache.finalize("KA01", &[START, END], &[END]).is_some());
    }
}

// GeoJSON export of a finished (or in-progress) tracking session

use crate::sbt_models::{Coordinate, DeviationSummary, Result, Route, SBTError};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;
use std::path::Path;

fn positions(points: &[Coordinate]) -> Vec<Vec<f64>> {
    points.iter().map(|c| vec![c.longitude, c.latitude]).collect()
}

fn feature(geometry: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn properties(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Expected polyline, observed trace and one point per stop.
///
/// Geometries with fewer than two points are left out of the line features.
pub fn session_geojson(
    route: &Route,
    bus_id: &str,
    expected: &[Coordinate],
    observed: &[Coordinate],
    stops: &[(String, Coordinate)],
    deviation: Option<&DeviationSummary>,
) -> GeoJson {
    let mut features = Vec::new();

    if expected.len() >= 2 {
        features.push(feature(
            Value::LineString(positions(expected)),
            properties(json!({
                "kind": "expected",
                "routeId": route.id,
                "routeName": route.name,
            })),
        ));
    }

    if observed.len() >= 2 {
        let mut props = properties(json!({
            "kind": "observed",
            "busId": bus_id,
            "samples": observed.len(),
        }));
        if let Some(d) = deviation {
            props.insert("meanDeviationMeters".to_string(), json!(d.mean_meters));
            props.insert("maxDeviationMeters".to_string(), json!(d.max_meters));
        }
        features.push(feature(Value::LineString(positions(observed)), props));
    }

    for (index, (name, coord)) in stops.iter().enumerate() {
        features.push(feature(
            Value::Point(vec![coord.longitude, coord.latitude]),
            properties(json!({ "kind": "stop", "name": name, "index": index })),
        ));
    }

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

pub fn write_geojson(path: &Path, geojson: &GeoJson) -> Result<()> {
    fs::write(path, geojson.to_string()).map_err(|e| {
        SBTError::FileError(format!("Failed to write {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_contains_lines_and_stops() {
        let route = Route {
            id: "r".to_string(),
            name: "A → B".to_string(),
            stops: vec!["A".to_string(), "B".to_string()],
            buses: Vec::new(),
        };
        let a = Coordinate::new(13.0, 77.5);
        let b = Coordinate::new(13.01, 77.5);
        let stops = vec![("A".to_string(), a), ("B".to_string(), b)];
        let deviation = DeviationSummary { mean_meters: 1.5, max_meters: 3.0, samples: 2 };

        let geojson = session_geojson(&route, "KA01", &[a, b], &[a, b], &stops, Some(&deviation));
        let GeoJson::FeatureCollection(fc) = &geojson else {
            panic!("expected a feature collection");
        };
        assert_eq!(fc.features.len(), 4);

        let observed = &fc.features[1];
        assert_eq!(observed.property("kind").and_then(|v| v.as_str()), Some("observed"));
        assert_eq!(observed.property("maxDeviationMeters").and_then(|v| v.as_f64()), Some(3.0));

        let text = geojson.to_string();
        assert!(text.contains("77.5"));
    }

    #[test]
    fn short_traces_are_omitted() {
        let route = Route {
            id: "r".to_string(),
            name: "r".to_string(),
            stops: Vec::new(),
            buses: Vec::new(),
        };
        let a = Coordinate::new(13.0, 77.5);
        let geojson = session_geojson(&route, "KA01", &[a], &[a], &[], None);
        let GeoJson::FeatureCollection(fc) = geojson else {
            panic!("expected a feature collection");
        };
        assert!(fc.features.is_empty());
    }
}

//! Minimal GeoJSON feature records read by the link budget engine.
//!
//! Only `Point` and `Polygon` geometries are understood; coordinates are
//! planar (projected meters), matching how site layouts are generated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Transmitter, interferer, receiver and site area features of one run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScenarioGeometry {
    pub transmitter: Vec<Feature>,
    #[serde(default)]
    pub interfering_transmitters: Vec<Feature>,
    pub receivers: Vec<Feature>,
    pub site_area: Vec<Feature>,
}

impl Feature {
    pub fn point(x: f64, y: f64, properties: Map<String, Value>) -> Feature {
        Feature {
            geometry: Geometry::Point {
                coordinates: vec![x, y],
            },
            properties,
        }
    }

    pub fn polygon(ring: Vec<[f64; 2]>, properties: Map<String, Value>) -> Feature {
        Feature {
            geometry: Geometry::Polygon {
                coordinates: vec![ring.into_iter().map(|p| p.to_vec()).collect()],
            },
            properties,
        }
    }

    /// Coordinates of a point feature.
    pub fn point_coordinates(&self) -> Result<[f64; 2]> {
        match &self.geometry {
            Geometry::Point { coordinates } => to_pair(coordinates),
            Geometry::Polygon { .. } => Err(Error::configuration(
                "geometry",
                "expected a Point geometry, found Polygon",
            )),
        }
    }

    pub fn str_property(&self, key: &str) -> Result<String> {
        match self.properties.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(missing_property(key)),
        }
    }

    pub fn f64_property(&self, key: &str) -> Result<f64> {
        self.properties
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing_property(key))
    }

    /// Numeric property falling back to `default` when absent.
    pub fn f64_property_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.properties.get(key) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| missing_property(key)),
        }
    }

    /// Booleans are accepted as JSON booleans or 0/1 numbers.
    pub fn bool_property_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.properties.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
            Some(_) => Err(missing_property(key)),
        }
    }

    /// Planar area of a polygon feature in square meters.
    pub fn area(&self) -> Result<f64> {
        match &self.geometry {
            Geometry::Polygon { coordinates } => {
                let mut rings = coordinates.iter();
                let exterior = rings
                    .next()
                    .ok_or_else(|| Error::DegenerateInput("polygon has no rings".to_string()))?;
                let mut area = ring_area(exterior)?;
                for hole in rings {
                    area -= ring_area(hole)?;
                }
                Ok(area)
            }
            Geometry::Point { .. } => Err(Error::configuration(
                "geometry",
                "expected a Polygon geometry, found Point",
            )),
        }
    }
}

fn missing_property(key: &str) -> Error {
    Error::configuration(
        format!("properties.{key}"),
        "missing or has the wrong type",
    )
}

fn to_pair(coordinates: &[f64]) -> Result<[f64; 2]> {
    match coordinates {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(Error::configuration(
            "geometry.coordinates",
            "need at least two ordinates",
        )),
    }
}

/// Shoelace area of one ring (absolute value, closing vertex optional).
fn ring_area(ring: &[Vec<f64>]) -> Result<f64> {
    let points = ring
        .iter()
        .map(|p| to_pair(p))
        .collect::<Result<Vec<[f64; 2]>>>()?;
    if points.len() < 3 {
        return Ok(0.0);
    }
    let mut twice_area = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice_area += a[0] * b[1] - b[0] * a[1];
    }
    Ok(twice_area.abs() / 2.0)
}

/// Straight-line distance between two planar points.
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

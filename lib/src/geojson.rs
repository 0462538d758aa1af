//! GeoJSON output types.
//!
//! Only the small subset the downstream viewers read is modelled, and only
//! for serialization. Field order is fixed by the struct definitions, so
//! serializing the same data twice produces identical bytes.

use serde::Serialize;

use crate::ObjectId;

/// A GeoJSON geometry. Cell outlines are always single-ring polygons.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A polygon: one outer ring, no holes
    Polygon {
        /// The polygon rings (first is the outer ring)
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

impl Geometry {
    /// Wraps a single closed ring as a polygon geometry
    pub fn polygon(ring: Vec<[f64; 2]>) -> Geometry {
        Geometry::Polygon {
            coordinates: vec![ring],
        }
    }
}

/// The properties attached to every cell outline feature
#[derive(Debug, Clone, Serialize)]
pub struct Properties {
    /// The tracked object's id
    pub id: ObjectId,
    /// 1-based frame index
    pub frame: u32,
}

/// A GeoJSON Feature holding one cell outline
#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: Geometry,
    properties: Properties,
    bbox: [f64; 4],
}

impl Feature {
    /// Builds a feature. `bbox` is `[left, bottom, right, top]`.
    pub fn new(geometry: Geometry, properties: Properties, bbox: [f64; 4]) -> Feature {
        Feature {
            kind: "Feature",
            geometry,
            properties,
            bbox,
        }
    }

    /// The feature's properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The feature's bounding box as `[left, bottom, right, top]`
    pub fn bbox(&self) -> [f64; 4] {
        self.bbox
    }
}

/// A GeoJSON container of multiple features sharing no implied order
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Wraps a list of features
    pub fn new(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            kind: "FeatureCollection",
            features,
        }
    }

    /// The contained features
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of contained features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

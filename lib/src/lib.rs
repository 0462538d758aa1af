#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]

//! This library converts cell tracking exports (TrackMate spot tables, ImageJ
//! region-of-interest files) into the GeoJSON/CSV layout consumed by the Loon
//! and Aardvark visualization tools.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use celltrack_rs::aggregate::AggregatorConfig;
//! use celltrack_rs::convert;
//! use celltrack_rs::KeyExtractor;
//!
//! fn main() -> celltrack_rs::error::Result<()> {
//!     let config = AggregatorConfig::new("./out");
//!
//!     let summary = convert::rois_to_geojson(
//!         Path::new("./in"),
//!         "*.roi",
//!         &KeyExtractor::DashDelimited,
//!         config,
//!     )?;
//!
//!     println!(
//!         "{} frame collections, {} cell features",
//!         summary.frames_written, summary.cells_written
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod convert;
/// Errors associated with converting tracking data
pub mod error;
pub mod geojson;
pub mod lineage;
pub mod trackmate;

mod naming;
mod roi;

pub use self::naming::KeyExtractor;
pub use self::roi::{RoiFile, RoiType};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use geojson::{Feature, Geometry, Properties};

/// Print to `writer` trait
pub trait Print {
    /// Formats and prints to `writer`
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result;
}

/// Represents a bounding rectangle
#[derive(Debug, Clone)]
pub struct BoundingBox<T: num_traits::Num + Copy> {
    /// Minimum x coordinate for the bounding rectangle
    pub min_x: T,
    /// Minimum y coordinate for the bounding rectangle
    pub min_y: T,
    /// Width of bounding rectangle
    pub width: T,
    /// Height of bounding rectangle
    pub height: T,
}

impl<T: num_traits::Num + Copy> BoundingBox<T> {
    /// Maximum x coordinate for the bounding rectangle
    pub fn max_x(&self) -> T {
        self.min_x + self.width
    }

    /// Maximum y coordinate for the bounding rectangle
    pub fn max_y(&self) -> T {
        self.min_y + self.height
    }
}

/// Identifier for one tracked object.
///
/// MATLAB-derived exports use bare segment numbers, TrackMate exports use
/// track labels such as `Track_4.a`. Serializes as a JSON number or string
/// accordingly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum ObjectId {
    /// A purely numeric id
    Number(u32),
    /// A track label
    Label(String),
}

impl ObjectId {
    /// Parses a filename token. Digit-only tokens that round-trip through an
    /// integer become [`ObjectId::Number`]; everything else (including
    /// zero-padded tokens like `007`) stays a label.
    pub fn parse(token: &str) -> ObjectId {
        match token.parse::<u32>() {
            Ok(number) if number.to_string() == token => ObjectId::Number(number),
            _ => ObjectId::Label(token.to_string()),
        }
    }
}

impl From<&str> for ObjectId {
    fn from(token: &str) -> ObjectId {
        ObjectId::parse(token)
    }
}

impl From<u32> for ObjectId {
    fn from(number: u32) -> ObjectId {
        ObjectId::Number(number)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectId::Number(number) => write!(f, "{}", number),
            ObjectId::Label(label) => write!(f, "{}", label),
        }
    }
}

/// One region-of-interest outline for one tracked object in one frame.
///
/// Immutable once built. The outline ring is closed: the first vertex is
/// repeated as the last.
#[derive(Debug, Clone)]
pub struct RegionRecord {
    folder: PathBuf,
    frame: u32,
    id: ObjectId,
    ring: Vec<[f64; 2]>,
    bounding_box: BoundingBox<f64>,
}

impl RegionRecord {
    /// Builds a record. An open ring is closed by repeating its first vertex
    /// as the last before any serialization happens.
    pub fn new(
        folder: PathBuf,
        frame: u32,
        id: ObjectId,
        mut ring: Vec<[f64; 2]>,
        bounding_box: BoundingBox<f64>,
    ) -> RegionRecord {
        if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
            if first != last {
                ring.push(first);
            }
        }

        RegionRecord {
            folder,
            frame,
            id,
            ring,
            bounding_box,
        }
    }

    /// The grouping folder, relative to the input root
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// 1-based frame index
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// The tracked object this outline belongs to
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// The closed outline ring
    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }

    /// Bounding box of the outline in pixel coordinates
    pub fn bounding_box(&self) -> &BoundingBox<f64> {
        &self.bounding_box
    }

    /// Builds the GeoJSON Feature for this region. The bbox follows the
    /// `[left, bottom, right, top]` convention of the downstream tools.
    pub fn to_feature(&self) -> Feature {
        let bbox = [
            self.bounding_box.min_x,
            self.bounding_box.max_y(),
            self.bounding_box.max_x(),
            self.bounding_box.min_y,
        ];

        Feature::new(
            Geometry::polygon(self.ring.clone()),
            Properties {
                id: self.id.clone(),
                frame: self.frame,
            },
            bbox,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parses_numbers_and_labels() {
        assert_eq!(ObjectId::parse("42"), ObjectId::Number(42));
        assert_eq!(ObjectId::parse("Track_4.a"), ObjectId::Label("Track_4.a".to_string()));
        // Zero-padded ids must keep their exact spelling.
        assert_eq!(ObjectId::parse("007"), ObjectId::Label("007".to_string()));
    }

    #[test]
    fn object_id_orders_numbers_numerically() {
        assert!(ObjectId::Number(2) < ObjectId::Number(10));
    }

    #[test]
    fn open_ring_is_closed_on_construction() {
        let record = RegionRecord::new(
            PathBuf::from("loc1"),
            1,
            ObjectId::Number(1),
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0]],
            BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                width: 4.0,
                height: 3.0,
            },
        );

        assert_eq!(record.ring().len(), 4);
        assert_eq!(record.ring()[0], record.ring()[3]);
    }

    #[test]
    fn closed_ring_is_left_alone() {
        let ring = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 0.0]];
        let record = RegionRecord::new(
            PathBuf::from("loc1"),
            1,
            ObjectId::Number(1),
            ring.clone(),
            BoundingBox {
                min_x: 0.0,
                min_y: 0.0,
                width: 4.0,
                height: 3.0,
            },
        );

        assert_eq!(record.ring(), ring.as_slice());
    }

    #[test]
    fn feature_bbox_is_left_bottom_right_top() {
        let record = RegionRecord::new(
            PathBuf::from("loc1"),
            2,
            ObjectId::Number(5),
            vec![[10.0, 20.0], [30.0, 20.0], [30.0, 40.0]],
            BoundingBox {
                min_x: 10.0,
                min_y: 20.0,
                width: 20.0,
                height: 20.0,
            },
        );

        let json = serde_json::to_value(record.to_feature()).expect("serializable feature");
        assert_eq!(json["bbox"][0], 10.0);
        assert_eq!(json["bbox"][1], 40.0);
        assert_eq!(json["bbox"][2], 30.0);
        assert_eq!(json["bbox"][3], 20.0);
        assert_eq!(json["properties"]["id"], 5);
        assert_eq!(json["properties"]["frame"], 2);
    }
}

//! Reader for ImageJ region-of-interest (`.roi`) files.
//!
//! TrackMate and the manual-segmentation workflows both save one `.roi` file
//! per tracked object per frame. Only the ROI types that carry a closed
//! polygon outline (polygon, freehand, traced) are accepted here; anything
//! else cannot be turned into a cell boundary and is rejected.
//!
//! The header is big-endian. Coordinates are stored as 16-bit offsets
//! relative to the (left, top) corner of the bounding box, optionally
//! followed by an absolute 32-bit float block when the file was written with
//! subpixel resolution.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{CellTrackError, Result};
use crate::{BoundingBox, ObjectId, RegionRecord};

const MAGIC: &[u8; 4] = b"Iout";

/// Options bit marking the presence of the trailing subpixel block.
const OPTION_SUB_PIXEL_RESOLUTION: u16 = 128;
/// First header version that can store subpixel coordinates.
const SUB_PIXEL_VERSION: u16 = 222;

/// The shape stored in a `.roi` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RoiType {
    Polygon,
    Rect,
    Oval,
    Line,
    Freeline,
    Polyline,
    NoRoi,
    Freehand,
    Traced,
    Angle,
    Point,
}

impl RoiType {
    fn from_header_byte(value: u8) -> Option<RoiType> {
        match value {
            0 => Some(RoiType::Polygon),
            1 => Some(RoiType::Rect),
            2 => Some(RoiType::Oval),
            3 => Some(RoiType::Line),
            4 => Some(RoiType::Freeline),
            5 => Some(RoiType::Polyline),
            6 => Some(RoiType::NoRoi),
            7 => Some(RoiType::Freehand),
            8 => Some(RoiType::Traced),
            9 => Some(RoiType::Angle),
            10 => Some(RoiType::Point),
            _ => None,
        }
    }

    /// Whether this type stores a closed polygon outline
    pub fn is_outline(self) -> bool {
        matches!(self, RoiType::Polygon | RoiType::Freehand | RoiType::Traced)
    }
}

/// A parsed ImageJ `.roi` file
#[derive(Debug, Clone)]
pub struct RoiFile {
    version: u16,
    roi_type: RoiType,
    top: i16,
    left: i16,
    bottom: i16,
    right: i16,
    coordinates: Vec<[f64; 2]>,
}

impl RoiFile {
    /// Reads and parses a single `.roi` file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<RoiFile> {
        RoiFile::parse(BufReader::new(File::open(path)?))
    }

    /// Parse the `.roi` binary format
    pub fn parse<R: Read>(mut reader: R) -> Result<RoiFile> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CellTrackError::NotAnRoiFile);
        }

        let version = reader.read_u16::<BigEndian>()?;
        let type_byte = reader.read_u8()?;
        reader.read_u8()?; // padding

        let roi_type = RoiType::from_header_byte(type_byte).ok_or_else(|| {
            CellTrackError::UnsupportedRoiType {
                name: format!("unknown({})", type_byte),
            }
        })?;
        if !roi_type.is_outline() {
            return Err(CellTrackError::UnsupportedRoiType {
                name: format!("{:?}", roi_type),
            });
        }

        let top = reader.read_i16::<BigEndian>()?;
        let left = reader.read_i16::<BigEndian>()?;
        let bottom = reader.read_i16::<BigEndian>()?;
        let right = reader.read_i16::<BigEndian>()?;

        let n_coordinates = reader.read_u16::<BigEndian>()? as usize;
        if n_coordinates == 0 {
            return Err(CellTrackError::EmptyRoi);
        }

        // Bytes 18..50: line end points, stroke and fill information.
        let mut skipped = [0u8; 32];
        reader.read_exact(&mut skipped)?;

        let options = reader.read_u16::<BigEndian>()?;

        // Bytes 52..64: arrow/position fields and the header2 offset.
        let mut skipped = [0u8; 12];
        reader.read_exact(&mut skipped)?;

        let mut xs = vec![0i16; n_coordinates];
        for x in xs.iter_mut() {
            *x = reader.read_i16::<BigEndian>()?;
        }
        let mut ys = vec![0i16; n_coordinates];
        for y in ys.iter_mut() {
            *y = reader.read_i16::<BigEndian>()?;
        }

        let subpixel =
            options & OPTION_SUB_PIXEL_RESOLUTION != 0 && version >= SUB_PIXEL_VERSION;

        let coordinates = if subpixel {
            // The float block stores absolute coordinates.
            let mut float_xs = vec![0f32; n_coordinates];
            for x in float_xs.iter_mut() {
                *x = reader.read_f32::<BigEndian>()?;
            }
            let mut float_ys = vec![0f32; n_coordinates];
            for y in float_ys.iter_mut() {
                *y = reader.read_f32::<BigEndian>()?;
            }

            float_xs
                .iter()
                .zip(float_ys.iter())
                .map(|(&x, &y)| [f64::from(x), f64::from(y)])
                .collect()
        } else {
            xs.iter()
                .zip(ys.iter())
                .map(|(&x, &y)| [f64::from(left) + f64::from(x), f64::from(top) + f64::from(y)])
                .collect()
        };

        Ok(RoiFile {
            version,
            roi_type,
            top,
            left,
            bottom,
            right,
            coordinates,
        })
    }

    /// The header version the file was written with
    pub fn version(&self) -> u16 {
        self.version
    }

    /// The ROI shape type
    pub fn roi_type(&self) -> RoiType {
        self.roi_type
    }

    /// Absolute outline coordinates, in file order (not closed)
    pub fn coordinates(&self) -> &[[f64; 2]] {
        &self.coordinates
    }

    /// Bounding box from the header's (top, left, bottom, right) fields
    pub fn bounding_box(&self) -> BoundingBox<f64> {
        BoundingBox {
            min_x: f64::from(self.left),
            min_y: f64::from(self.top),
            width: f64::from(self.right) - f64::from(self.left),
            height: f64::from(self.bottom) - f64::from(self.top),
        }
    }

    /// Consumes the ROI into a [`RegionRecord`] keyed by (folder, frame, id)
    pub fn into_record(self, folder: PathBuf, frame: u32, id: ObjectId) -> RegionRecord {
        let bounding_box = self.bounding_box();
        RegionRecord::new(folder, frame, id, self.coordinates, bounding_box)
    }
}


#[cfg(test)]
mod tests {
    use super::test_io::encode_roi;
    use super::*;

    #[test]
    fn parses_integer_polygon() {
        let buf = encode_roi(0, &[(10, 20), (30, 20), (30, 40)], None);
        let roi = RoiFile::parse(buf.as_slice()).expect("valid polygon roi");

        assert_eq!(roi.roi_type(), RoiType::Polygon);
        assert_eq!(
            roi.coordinates(),
            &[[10.0, 20.0], [30.0, 20.0], [30.0, 40.0]]
        );

        let bbox = roi.bounding_box();
        assert_eq!(bbox.min_x, 10.0);
        assert_eq!(bbox.min_y, 20.0);
        assert_eq!(bbox.max_x(), 30.0);
        assert_eq!(bbox.max_y(), 40.0);
    }

    #[test]
    fn parses_subpixel_coordinates() {
        let buf = encode_roi(
            7,
            &[(10, 20), (30, 20), (30, 40)],
            Some(&[(10.25, 20.5), (30.75, 20.5), (30.75, 40.0)]),
        );
        let roi = RoiFile::parse(buf.as_slice()).expect("valid freehand roi");

        assert_eq!(roi.roi_type(), RoiType::Freehand);
        assert_eq!(roi.coordinates()[0], [10.25, 20.5]);
        assert_eq!(roi.coordinates()[1], [30.75, 20.5]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = encode_roi(0, &[(1, 1), (2, 2), (3, 1)], None);
        buf[0] = b'X';

        assert!(matches!(
            RoiFile::parse(buf.as_slice()),
            Err(CellTrackError::NotAnRoiFile)
        ));
    }

    #[test]
    fn rejects_non_outline_types() {
        let buf = encode_roi(1, &[(1, 1), (2, 2)], None);

        assert!(matches!(
            RoiFile::parse(buf.as_slice()),
            Err(CellTrackError::UnsupportedRoiType { .. })
        ));
    }

    #[test]
    fn rejects_empty_outline() {
        let buf = encode_roi(0, &[], None);

        assert!(matches!(
            RoiFile::parse(buf.as_slice()),
            Err(CellTrackError::EmptyRoi)
        ));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let buf = encode_roi(0, &[(1, 1), (2, 2), (3, 1)], None);

        assert!(matches!(
            RoiFile::parse(&buf[..40]),
            Err(CellTrackError::Io { .. })
        ));
    }

    #[test]
    fn record_from_roi_closes_the_ring() {
        let buf = encode_roi(0, &[(10, 20), (30, 20), (30, 40)], None);
        let roi = RoiFile::parse(buf.as_slice()).expect("valid polygon roi");

        let record = roi.into_record(PathBuf::from("loc1"), 1, ObjectId::Number(3));
        assert_eq!(record.ring().len(), 4);
        assert_eq!(record.ring()[0], record.ring()[3]);
    }
}

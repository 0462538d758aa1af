use std::{io, path::PathBuf, result};

use thiserror::Error;

use crate::trackmate::ColumnType;

/// A type alias for `Result<T, celltrack_rs::CellTrackError>`.
pub type Result<T> = result::Result<T, CellTrackError>;

/// Describes what has gone wrong with a conversion run
#[derive(Error, Debug)]
pub enum CellTrackError {
    /// An I/O error occurred
    #[error("An I/O error occurred")]
    Io {
        #[from]
        /// The original error that was raised.
        source: io::Error,
    },

    /// The file does not start with the ImageJ ROI magic bytes
    #[error("missing 'Iout' magic - is this a valid ImageJ .roi file?")]
    NotAnRoiFile,

    /// The ROI type does not describe a closed polygon outline
    #[error("ROI type {name} cannot be converted to a polygon outline")]
    UnsupportedRoiType {
        /// Name of the offending ROI type
        name: String,
    },

    /// The ROI contains no coordinates
    #[error("the ROI contains no outline coordinates")]
    EmptyRoi,

    /// A region filename does not match the configured naming convention
    #[error("filename `{name}` does not match the configured naming convention")]
    InvalidFilename { name: String },

    /// No frame entry exists for a label in the reference table
    #[error("no frame found for label `{label}` in the reference table")]
    FrameNotFound { label: String },

    /// A frame index recovered from a filename exceeds the label's frame list
    #[error("label `{label}` has {count} frames, index {index} is out of range")]
    FrameIndexOutOfRange {
        label: String,
        index: usize,
        count: usize,
    },

    /// A label matched more than one reference-table row
    #[error("label `{label}` matched {count} reference-table rows, expected exactly one")]
    AmbiguousLabel { label: String, count: usize },

    /// A frame value cannot be used as a 1-based frame index
    #[error("label `{label}` maps to frame {frame}, which is not a valid frame index")]
    InvalidFrame { label: String, frame: i64 },

    /// A required column is missing from the table
    #[error("required column `{column}` is missing from the table")]
    MissingColumn { column: String },

    /// A column does not hold the expected type of data
    #[error("column `{column}` holds {found} data, expected {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    /// A field failed to parse as the column's type
    #[error("value `{value}` in column `{column}` is not a valid {expected} entry")]
    InvalidField {
        column: String,
        value: String,
        expected: ColumnType,
    },

    /// A column of the wrong length was inserted into a table
    #[error("column `{column}` has {found} rows, the table has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    /// No track ends on the frame preceding a child track's first frame
    #[error("no parent track ends on frame {frame} for track {id}")]
    ParentNotFound { id: i64, frame: i64 },

    /// The selected naming convention needs a reference table
    #[error("the selected naming convention requires a reference table")]
    ReferenceTableRequired,

    /// Converting one region file failed
    #[error("failed to convert region file `{path}`")]
    Region {
        path: PathBuf,
        source: Box<CellTrackError>,
    },

    /// An error occurred when reading or writing CSV data
    #[error("An error occurred when reading or writing CSV data")]
    Csv {
        #[from]
        /// The original error that was raised.
        source: csv::Error,
    },

    /// An error occurred when serializing GeoJSON
    #[error("An error occurred when serializing GeoJSON")]
    Json {
        #[from]
        /// The original error that was raised.
        source: serde_json::Error,
    },

    /// The region file pattern is not a valid glob
    #[error("invalid region file pattern")]
    Pattern {
        #[from]
        /// The original error that was raised.
        source: glob::PatternError,
    },

    /// A directory entry could not be read while scanning for region files
    #[error("failed to read a directory entry while scanning for region files")]
    Glob {
        #[from]
        /// The original error that was raised.
        source: glob::GlobError,
    },
}

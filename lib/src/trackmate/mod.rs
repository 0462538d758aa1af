//! Reading and reshaping TrackMate spot-table exports.
//!
//! A TrackMate spot CSV starts with one header row followed by up to three
//! human-readable name/units rows before the actual data. Columns are typed
//! (text, integer, float) by a table of known headers; unknown headers fall
//! back on a heuristic. All data for a column is stored together, which keeps
//! the reshaping operations (re-indexing, scaling, sorting) simple
//! column-wise loops.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{CellTrackError, Result};
use crate::Print;

/// The type of data stored in one spot-table column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Free-form text (labels, colors)
    Text,
    /// Integer data (ids, frames)
    Integer,
    /// Floating point data (positions, intensities)
    Float,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
        }
    }
}

/// Represents the data stored in a column. All entries share the column type.
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// Text column data
    Text(Vec<String>),
    /// Integer column data
    Integer(Vec<i64>),
    /// Floating point column data. Empty fields are stored as NaN.
    Float(Vec<f64>),
}

impl ColumnData {
    fn new(column_type: ColumnType) -> ColumnData {
        match column_type {
            ColumnType::Text => ColumnData::Text(Vec::new()),
            ColumnType::Integer => ColumnData::Integer(Vec::new()),
            ColumnType::Float => ColumnData::Float(Vec::new()),
        }
    }

    fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Text(_) => ColumnType::Text,
            ColumnData::Integer(_) => ColumnType::Integer,
            ColumnData::Float(_) => ColumnType::Float,
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::Text(data) => data.len(),
            ColumnData::Integer(data) => data.len(),
            ColumnData::Float(data) => data.len(),
        }
    }

    fn push_field(&mut self, entry: &str, column_name: &str) -> Result<()> {
        match self {
            ColumnData::Text(data) => {
                data.push(entry.to_string());
                Ok(())
            }
            ColumnData::Integer(data) => match entry.parse::<i64>() {
                Ok(value) => {
                    data.push(value);
                    Ok(())
                }
                Err(_) => Err(CellTrackError::InvalidField {
                    column: column_name.to_string(),
                    value: entry.to_string(),
                    expected: ColumnType::Integer,
                }),
            },
            ColumnData::Float(data) => {
                if entry.is_empty() {
                    data.push(f64::NAN);
                    return Ok(());
                }

                match entry.parse::<f64>() {
                    Ok(value) => {
                        data.push(value);
                        Ok(())
                    }
                    Err(_) => Err(CellTrackError::InvalidField {
                        column: column_name.to_string(),
                        value: entry.to_string(),
                        expected: ColumnType::Float,
                    }),
                }
            }
        }
    }

    fn field_string(&self, row: usize) -> String {
        match self {
            ColumnData::Text(data) => data[row].clone(),
            ColumnData::Integer(data) => data[row].to_string(),
            ColumnData::Float(data) => {
                if data[row].is_nan() {
                    String::new()
                } else {
                    data[row].to_string()
                }
            }
        }
    }

    fn permute(&mut self, order: &[usize]) {
        match self {
            ColumnData::Text(data) => *data = order.iter().map(|&i| data[i].clone()).collect(),
            ColumnData::Integer(data) => *data = order.iter().map(|&i| data[i]).collect(),
            ColumnData::Float(data) => *data = order.iter().map(|&i| data[i]).collect(),
        }
    }
}

/// Describes one column of the spot table
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
}

impl Column {
    /// Returns the name (title) of the column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type of data stored in the column
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

struct KnownColumn {
    name: &'static str,
    column_type: ColumnType,
}

const KNOWN_HEADERS: &[KnownColumn] = &[
    KnownColumn {
        name: "LABEL",
        column_type: ColumnType::Text,
    },
    KnownColumn {
        name: "ID",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "TRACK_ID",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "QUALITY",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "POSITION_X",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "POSITION_Y",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "POSITION_Z",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "POSITION_T",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "FRAME",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "RADIUS",
        column_type: ColumnType::Float,
    },
    KnownColumn {
        name: "VISIBILITY",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "MANUAL_SPOT_COLOR",
        column_type: ColumnType::Text,
    },
    // Livecyte-style lineage exports.
    KnownColumn {
        name: "Tracking ID",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "Lineage ID",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "Frame",
        column_type: ColumnType::Integer,
    },
    KnownColumn {
        name: "Parent ID",
        column_type: ColumnType::Integer,
    },
];

/// Returns the track id for a spot label: the label minus its final
/// dot-suffix (`Track_4.a` belongs to track `Track_4`).
pub fn track_id_of(label: &str) -> &str {
    match label.rsplit_once('.') {
        Some((track, _)) => track,
        None => label,
    }
}

/// A TrackMate spot table (or a compatible tracking CSV), stored column-wise
#[derive(Debug)]
pub struct SpotTable {
    columns: Vec<Column>,
    data: Vec<ColumnData>,
}

impl SpotTable {
    /// Reads and parses a spot CSV from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SpotTable> {
        SpotTable::parse(File::open(path)?)
    }

    /// Parse a spot CSV
    pub fn parse<R: Read>(reader: R) -> Result<SpotTable> {
        let mut rdr = csv::Reader::from_reader(reader);

        let header_records = rdr.headers()?;

        let mut columns = Vec::with_capacity(header_records.len());
        let mut data = Vec::with_capacity(header_records.len());

        for header in header_records.iter() {
            let column_type = KNOWN_HEADERS
                .iter()
                .find(|known| known.name == header)
                .map(|known| known.column_type)
                .unwrap_or_else(|| {
                    if header.contains("INTENSITY") {
                        ColumnType::Float
                    } else {
                        ColumnType::Text
                    }
                });

            columns.push(Column {
                name: header.to_string(),
                column_type,
            });
            data.push(ColumnData::new(column_type));
        }

        let mut in_preamble = true;
        for result in rdr.records() {
            let record = result?;

            // TrackMate writes human-readable name and units rows directly
            // below the header. Skip them until the first row that parses.
            if in_preamble && is_units_row(&record, &columns) {
                continue;
            }
            in_preamble = false;

            for ((entry, column), column_data) in
                record.iter().zip(columns.iter()).zip(data.iter_mut())
            {
                column_data.push_field(entry, &column.name)?;
            }
        }

        Ok(SpotTable { columns, data })
    }

    /// Number of data rows (spots)
    pub fn len(&self) -> usize {
        self.data.first().map(ColumnData::len).unwrap_or(0)
    }

    /// Whether the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The table's columns, in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the position of the column with the given name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| CellTrackError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// Returns the values of a text column
    pub fn text_column(&self, name: &str) -> Result<&[String]> {
        let index = self.require(name)?;
        match &self.data[index] {
            ColumnData::Text(data) => Ok(data),
            other => Err(CellTrackError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: ColumnType::Text,
                found: other.column_type(),
            }),
        }
    }

    /// Returns the values of an integer column
    pub fn integer_column(&self, name: &str) -> Result<&[i64]> {
        let index = self.require(name)?;
        match &self.data[index] {
            ColumnData::Integer(data) => Ok(data),
            other => Err(CellTrackError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: ColumnType::Integer,
                found: other.column_type(),
            }),
        }
    }

    /// Returns the values of a float column
    pub fn float_column(&self, name: &str) -> Result<&[f64]> {
        let index = self.require(name)?;
        match &self.data[index] {
            ColumnData::Float(data) => Ok(data),
            other => Err(CellTrackError::ColumnTypeMismatch {
                column: name.to_string(),
                expected: ColumnType::Float,
                found: other.column_type(),
            }),
        }
    }

    /// Inserts a column at `index` (clamped to the column count)
    pub fn insert_column(&mut self, index: usize, name: &str, data: ColumnData) -> Result<()> {
        if !self.columns.is_empty() && data.len() != self.len() {
            return Err(CellTrackError::ColumnLength {
                column: name.to_string(),
                expected: self.len(),
                found: data.len(),
            });
        }

        let index = index.min(self.columns.len());
        self.columns.insert(
            index,
            Column {
                name: name.to_string(),
                column_type: data.column_type(),
            },
        );
        self.data.insert(index, data);

        Ok(())
    }

    /// Removes a column. Returns whether the column existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(index) => {
                self.columns.remove(index);
                self.data.remove(index);
                true
            }
            None => false,
        }
    }

    /// Converts the 0-based TrackMate FRAME column to the 1-based indexing
    /// the downstream tools expect
    pub fn reindex_frames(&mut self) -> Result<()> {
        let index = self.require("FRAME")?;
        match &mut self.data[index] {
            ColumnData::Integer(data) => {
                for frame in data.iter_mut() {
                    *frame += 1;
                }
                Ok(())
            }
            other => Err(CellTrackError::ColumnTypeMismatch {
                column: "FRAME".to_string(),
                expected: ColumnType::Integer,
                found: other.column_type(),
            }),
        }
    }

    /// Stable-sorts all rows by the FRAME column
    pub fn sort_by_frame(&mut self) -> Result<()> {
        let frames = self.integer_column("FRAME")?.to_vec();

        let mut order: Vec<usize> = (0..frames.len()).collect();
        order.sort_by_key(|&row| frames[row]);

        for column_data in self.data.iter_mut() {
            column_data.permute(&order);
        }

        Ok(())
    }

    /// Multiplies POSITION_X and POSITION_Y by `factor` (pixel to micron
    /// rescaling)
    pub fn scale_positions(&mut self, factor: f64) -> Result<()> {
        for name in ["POSITION_X", "POSITION_Y"] {
            let index = self.require(name)?;
            match &mut self.data[index] {
                ColumnData::Float(data) => {
                    for value in data.iter_mut() {
                        *value *= factor;
                    }
                }
                other => {
                    return Err(CellTrackError::ColumnTypeMismatch {
                        column: name.to_string(),
                        expected: ColumnType::Float,
                        found: other.column_type(),
                    })
                }
            }
        }

        Ok(())
    }

    /// Derives the `loon_track` column (track id per spot) from LABEL and
    /// inserts it as the first column
    pub fn derive_track_column(&mut self) -> Result<()> {
        let tracks: Vec<String> = self
            .text_column("LABEL")?
            .iter()
            .map(|label| track_id_of(label).to_string())
            .collect();

        self.insert_column(0, "loon_track", ColumnData::Text(tracks))
    }

    /// All frames recorded for `label`, sorted ascending
    pub fn frames_for_label(&self, label: &str) -> Result<Vec<i64>> {
        let labels = self.text_column("LABEL")?;
        let frames = self.integer_column("FRAME")?;

        let mut found: Vec<i64> = labels
            .iter()
            .zip(frames.iter())
            .filter(|(candidate, _)| candidate.as_str() == label)
            .map(|(_, &frame)| frame)
            .collect();
        found.sort_unstable();

        Ok(found)
    }

    /// The single frame recorded for `label`; zero or multiple rows are an
    /// error
    pub fn frame_of_label(&self, label: &str) -> Result<i64> {
        let frames = self.frames_for_label(label)?;
        match frames.len() {
            0 => Err(CellTrackError::FrameNotFound {
                label: label.to_string(),
            }),
            1 => Ok(frames[0]),
            count => Err(CellTrackError::AmbiguousLabel {
                label: label.to_string(),
                count,
            }),
        }
    }

    /// Writes the table as CSV, headers first
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        wtr.write_record(self.columns.iter().map(Column::name))?;
        for row in 0..self.len() {
            wtr.write_record(self.data.iter().map(|column| column.field_string(row)))?;
        }
        wtr.flush()?;

        Ok(())
    }
}

fn is_units_row(record: &csv::StringRecord, columns: &[Column]) -> bool {
    record
        .iter()
        .zip(columns.iter())
        .any(|(entry, column)| match column.column_type {
            ColumnType::Integer => !entry.is_empty() && entry.parse::<i64>().is_err(),
            ColumnType::Float => !entry.is_empty() && entry.parse::<f64>().is_err(),
            ColumnType::Text => false,
        })
}

#[rustfmt::skip]
impl Print for SpotTable {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        writeln!(writer, "{:indent$}{} spots | {} columns", "", self.len(), self.columns.len(), indent = indent)?;

        for column in &self.columns {
            writeln!(writer, "{:indent$}{: <20} | {}", "", column.name, column.column_type, indent = indent + 4)?;
        }

        Ok(())
    }
}

impl fmt::Display for SpotTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOTS_CSV: &str = "\
LABEL,ID,FRAME,POSITION_X,POSITION_Y
Label,Spot ID,Frame,X,Y
Label,Spot ID,Frame,(micron),(micron)
Track_1,1,0,10.0,20.0
Track_1.a,2,1,11.5,21.5
Track_1.b,3,1,9.25,19.0
";

    fn table() -> SpotTable {
        SpotTable::parse(SPOTS_CSV.as_bytes()).expect("valid spot csv")
    }

    #[test]
    fn skips_units_rows() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.integer_column("FRAME").unwrap(), &[0, 1, 1]);
    }

    #[test]
    fn bad_field_after_preamble_is_fatal() {
        let csv = "LABEL,FRAME\nTrack_1,1\nTrack_2,oops\n";
        assert!(matches!(
            SpotTable::parse(csv.as_bytes()),
            Err(CellTrackError::InvalidField { .. })
        ));
    }

    #[test]
    fn reindexes_frames_to_one_based() {
        let mut table = table();
        table.reindex_frames().unwrap();
        assert_eq!(table.integer_column("FRAME").unwrap(), &[1, 2, 2]);
    }

    #[test]
    fn scales_positions() {
        let mut table = table();
        table.scale_positions(2.0).unwrap();
        assert_eq!(table.float_column("POSITION_X").unwrap(), &[20.0, 23.0, 18.5]);
        assert_eq!(table.float_column("POSITION_Y").unwrap(), &[40.0, 43.0, 38.0]);
    }

    #[test]
    fn sort_by_frame_is_stable() {
        let csv = "LABEL,FRAME\nc,2\na,1\nb,1\n";
        let mut table = SpotTable::parse(csv.as_bytes()).expect("valid csv");
        table.sort_by_frame().unwrap();

        assert_eq!(
            table.text_column("LABEL").unwrap(),
            &["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn derives_track_column_first() {
        let mut table = table();
        table.derive_track_column().unwrap();

        assert_eq!(table.columns()[0].name(), "loon_track");
        assert_eq!(
            table.text_column("loon_track").unwrap(),
            &[
                "Track_1".to_string(),
                "Track_1".to_string(),
                "Track_1".to_string()
            ]
        );
    }

    #[test]
    fn label_frame_lookups() {
        let table = table();

        assert_eq!(table.frames_for_label("Track_1").unwrap(), vec![0]);
        assert_eq!(table.frame_of_label("Track_1.a").unwrap(), 1);
        assert!(matches!(
            table.frame_of_label("Track_9"),
            Err(CellTrackError::FrameNotFound { .. })
        ));

        let duplicated = "LABEL,FRAME\nTrack_1,1\nTrack_1,2\n";
        let table = SpotTable::parse(duplicated.as_bytes()).expect("valid csv");
        assert!(matches!(
            table.frame_of_label("Track_1"),
            Err(CellTrackError::AmbiguousLabel { count: 2, .. })
        ));
    }

    #[test]
    fn drops_and_inserts_columns() {
        let mut table = table();
        assert!(table.drop_column("POSITION_Y"));
        assert!(!table.drop_column("POSITION_Y"));

        let flags = ColumnData::Integer(vec![1, 0, 1]);
        table.insert_column(99, "flag", flags).unwrap();
        assert_eq!(table.columns().last().map(Column::name), Some("flag"));

        let short = ColumnData::Integer(vec![1]);
        assert!(matches!(
            table.insert_column(0, "short", short),
            Err(CellTrackError::ColumnLength { .. })
        ));
    }

    #[test]
    fn writes_csv_with_headers() {
        let csv = "LABEL,FRAME\nTrack_1,1\nTrack_2,2\n";
        let mut table = SpotTable::parse(csv.as_bytes()).expect("valid csv");
        table.reindex_frames().unwrap();

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "LABEL,FRAME\nTrack_1,2\nTrack_2,3\n"
        );
    }

    #[test]
    fn track_id_strips_final_dot_suffix() {
        assert_eq!(track_id_of("Track_4"), "Track_4");
        assert_eq!(track_id_of("Track_4.a"), "Track_4");
        assert_eq!(track_id_of("Track_4.a.b"), "Track_4.a");
    }
}

//! Filename conventions used to recover (frame, object id) keys from region
//! files.
//!
//! Each data source names its `.roi` files differently. The conversion
//! pipelines pick one extractor per run instead of duplicating the parsing
//! logic per script.

use std::path::Path;

use crate::error::{CellTrackError, Result};
use crate::trackmate::{track_id_of, SpotTable};
use crate::ObjectId;

/// Recovers the (frame, object id) key encoded in a region filename
#[derive(Debug)]
pub enum KeyExtractor<'a> {
    /// `{frame}-{id}.roi`: the frame number and object id separated by the
    /// first dash
    DashDelimited,
    /// `{label}-{index}.roi` (index 0 written as `{label}.roi`): the frame is
    /// the index-th entry of the label's sorted frame list in the reference
    /// table
    IndexedLabel(&'a SpotTable),
    /// `{label}.roi` with exactly one reference-table row per label; the
    /// object id is the label's track id
    UniqueLabel(&'a SpotTable),
}

impl KeyExtractor<'_> {
    /// Recovers the key for one filename
    pub fn key_for(&self, filename: &str) -> Result<(u32, ObjectId)> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| CellTrackError::InvalidFilename {
                name: filename.to_string(),
            })?;

        match self {
            KeyExtractor::DashDelimited => {
                let (frame, id) =
                    stem.split_once('-')
                        .ok_or_else(|| CellTrackError::InvalidFilename {
                            name: filename.to_string(),
                        })?;
                let frame: u32 = frame.parse().map_err(|_| CellTrackError::InvalidFilename {
                    name: filename.to_string(),
                })?;

                Ok((frame, ObjectId::parse(id)))
            }
            KeyExtractor::IndexedLabel(table) => {
                let (label, index) = match stem.split_once('-') {
                    Some((label, index)) => {
                        let index: usize =
                            index.parse().map_err(|_| CellTrackError::InvalidFilename {
                                name: filename.to_string(),
                            })?;
                        (label, index)
                    }
                    None => (stem, 0),
                };

                let frames = table.frames_for_label(label)?;
                if frames.is_empty() {
                    return Err(CellTrackError::FrameNotFound {
                        label: label.to_string(),
                    });
                }
                let frame = *frames.get(index).ok_or_else(|| {
                    CellTrackError::FrameIndexOutOfRange {
                        label: label.to_string(),
                        index,
                        count: frames.len(),
                    }
                })?;

                Ok((frame_index(label, frame)?, ObjectId::parse(label)))
            }
            KeyExtractor::UniqueLabel(table) => {
                let frame = table.frame_of_label(stem)?;

                Ok((frame_index(stem, frame)?, ObjectId::parse(track_id_of(stem))))
            }
        }
    }
}

fn frame_index(label: &str, frame: i64) -> Result<u32> {
    u32::try_from(frame).map_err(|_| CellTrackError::InvalidFrame {
        label: label.to_string(),
        frame,
    })
}

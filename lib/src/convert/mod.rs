//! End-to-end conversion pipelines.
//!
//! `rois_to_geojson` is the core run: discover region files, recover their
//! (folder, frame, id) keys, sort, and stream them through a
//! [`FrameAggregator`]. `ingest_trackmate` wraps it with the spot-table
//! reshaping that TrackMate exports need before Loon can read them.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::aggregate::{AggregateSummary, AggregatorConfig, FrameAggregator};
use crate::error::{CellTrackError, Result};
use crate::lineage;
use crate::naming::KeyExtractor;
use crate::roi::RoiFile;
use crate::trackmate::SpotTable;
use crate::{ObjectId, Print};

/// One discovered region file with its recovered sort key
#[derive(Debug)]
pub struct RoiEntry {
    folder: PathBuf,
    path: PathBuf,
    frame: u32,
    id: ObjectId,
}

impl RoiEntry {
    /// The grouping folder, relative to the input root
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Full path of the region file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based frame index recovered from the filename
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Object id recovered from the filename
    pub fn id(&self) -> &ObjectId {
        &self.id
    }
}

fn region_error(path: &Path, source: CellTrackError) -> CellTrackError {
    CellTrackError::Region {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

/// Walks `input_root` for files matching `pattern`, recovers their keys with
/// `extractor` and returns them sorted by (folder, frame, id).
///
/// The sort is what lets the aggregator work in a single forward pass.
pub fn discover(
    input_root: &Path,
    pattern: &str,
    extractor: &KeyExtractor,
) -> Result<Vec<RoiEntry>> {
    let full_pattern = format!("{}/**/{}", input_root.display(), pattern);

    let mut entries = Vec::new();
    for path in glob::glob(&full_pattern)? {
        let path = path?;
        if !path.is_file() {
            continue;
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CellTrackError::InvalidFilename {
                name: path.display().to_string(),
            })?;

        let (frame, id) = extractor
            .key_for(name)
            .map_err(|source| region_error(&path, source))?;

        let folder = path
            .parent()
            .and_then(|parent| parent.strip_prefix(input_root).ok())
            .unwrap_or_else(|| Path::new(""))
            .to_path_buf();

        entries.push(RoiEntry {
            folder,
            path,
            frame,
            id,
        });
    }

    entries.sort_by(|a, b| {
        (&a.folder, a.frame, &a.id).cmp(&(&b.folder, b.frame, &b.id))
    });

    Ok(entries)
}

/// Per-folder statistics for a set of discovered region files
#[derive(Debug, Default, Clone, Copy)]
pub struct FolderStats {
    /// Number of region files found in the folder
    pub files: usize,
    /// Highest frame index seen in the folder
    pub max_frame: u32,
}

/// Statistics of a region-file scan, grouped by folder
#[derive(Debug, Default)]
pub struct ScanSummary {
    folders: BTreeMap<PathBuf, FolderStats>,
}

impl ScanSummary {
    /// Builds the per-folder statistics for a set of discovered entries
    pub fn from_entries(entries: &[RoiEntry]) -> ScanSummary {
        let mut folders: BTreeMap<PathBuf, FolderStats> = BTreeMap::new();

        for entry in entries {
            let stats = folders.entry(entry.folder.clone()).or_default();
            stats.files += 1;
            stats.max_frame = stats.max_frame.max(entry.frame);
        }

        ScanSummary { folders }
    }

    /// Total number of region files
    pub fn num_files(&self) -> usize {
        self.folders.values().map(|stats| stats.files).sum()
    }

    /// Number of distinct folders
    pub fn num_folders(&self) -> usize {
        self.folders.len()
    }

    /// Iterates over (folder, stats) pairs in folder order
    pub fn folders(&self) -> impl Iterator<Item = (&Path, &FolderStats)> {
        self.folders.iter().map(|(path, stats)| (path.as_path(), stats))
    }
}

#[rustfmt::skip]
impl Print for ScanSummary {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        writeln!(writer, "{:indent$}{} region files in {} folders", "", self.num_files(), self.num_folders(), indent = indent)?;

        for (folder, stats) in self.folders() {
            let folder = if folder.as_os_str().is_empty() { Path::new(".") } else { folder };
            writeln!(writer, "{:indent$}{} | {} files | {} frames", "", folder.display(), stats.files, stats.max_frame, indent = indent + 4)?;
        }

        Ok(())
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}

/// Converts every region file under `input_root` into per-frame GeoJSON
/// under the config's output root.
///
/// A region file that fails to parse aborts the whole run; buckets flushed
/// before the failure stay on disk.
pub fn rois_to_geojson(
    input_root: &Path,
    pattern: &str,
    extractor: &KeyExtractor,
    config: AggregatorConfig,
) -> Result<AggregateSummary> {
    let entries = discover(input_root, pattern, extractor)?;

    if !config.quiet {
        let scan = ScanSummary::from_entries(&entries);
        log::info!(
            "found {} region files in {} folders",
            scan.num_files(),
            scan.num_folders()
        );
    }

    let mut aggregator = FrameAggregator::new(config);
    for entry in entries {
        let roi =
            RoiFile::from_path(&entry.path).map_err(|source| region_error(&entry.path, source))?;
        aggregator.push(roi.into_record(entry.folder, entry.frame, entry.id))?;
    }

    aggregator.finish()
}

/// Options for the full TrackMate ingest pipeline
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// TrackMate spot CSV export
    pub csv_path: PathBuf,
    /// Folder tree containing the `Track_*.roi` files
    pub roi_folder: PathBuf,
    /// Output folder; receives `metadata.csv` and `segmentations/`
    pub output_root: PathBuf,
    /// Replace existing output files
    pub overwrite: bool,
    /// Suppress progress messages
    pub quiet: bool,
    /// Pixel-to-micron factor applied to POSITION_X/POSITION_Y, if any
    pub scaling_factor: Option<f64>,
}

/// What a TrackMate ingest run produced
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    /// Number of spot rows written to metadata.csv
    pub spots: usize,
    /// Counts of the GeoJSON conversion
    pub aggregate: AggregateSummary,
}

/// Full TrackMate ingest: reshape the spot table into `metadata.csv`, then
/// convert the ROI tree into `{output_root}/segmentations/`.
pub fn ingest_trackmate(options: &IngestOptions) -> Result<IngestSummary> {
    let mut table = SpotTable::from_path(&options.csv_path)?;

    // All-empty in practice and it confuses downstream readers.
    table.drop_column("MANUAL_SPOT_COLOR");

    table.reindex_frames()?;
    table.sort_by_frame()?;
    if let Some(factor) = options.scaling_factor {
        table.scale_positions(factor)?;
    }
    table.derive_track_column()?;
    lineage::add_parent_column(&mut table, "loon_track")?;

    fs::create_dir_all(&options.output_root)?;
    let metadata_path = options.output_root.join("metadata.csv");
    if options.overwrite || !metadata_path.exists() {
        table.write_csv(BufWriter::new(File::create(&metadata_path)?))?;
    }
    if !options.quiet {
        log::info!("wrote {} spots to {}", table.len(), metadata_path.display());
    }

    let mut config = AggregatorConfig::new(options.output_root.join("segmentations"));
    config.overwrite = options.overwrite;
    config.quiet = options.quiet;

    let extractor = KeyExtractor::UniqueLabel(&table);
    let aggregate = rois_to_geojson(&options.roi_folder, "Track_*.roi", &extractor, config)?;

    Ok(IngestSummary {
        spots: table.len(),
        aggregate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::test_io::encode_roi;

    fn write_roi(path: &Path, points: &[(i16, i16)]) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, encode_roi(0, points, None)).expect("writable roi");
    }

    fn triangle() -> Vec<(i16, i16)> {
        vec![(10, 20), (30, 20), (30, 40)]
    }

    #[test]
    fn discover_sorts_by_folder_frame_and_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["loc2/1-1.roi", "loc1/2-1.roi", "loc1/1-10.roi", "loc1/1-2.roi"] {
            write_roi(&dir.path().join(name), &triangle());
        }

        let entries =
            discover(dir.path(), "*.roi", &KeyExtractor::DashDelimited).expect("discover");

        let keys: Vec<(String, u32, String)> = entries
            .iter()
            .map(|entry| {
                (
                    entry.folder().display().to_string(),
                    entry.frame(),
                    entry.id().to_string(),
                )
            })
            .collect();

        assert_eq!(
            keys,
            vec![
                ("loc1".to_string(), 1, "2".to_string()),
                ("loc1".to_string(), 1, "10".to_string()),
                ("loc1".to_string(), 2, "1".to_string()),
                ("loc2".to_string(), 1, "1".to_string()),
            ]
        );
    }

    #[test]
    fn scan_summary_counts_files_and_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["loc1/1-1.roi", "loc1/1-2.roi", "loc1/3-1.roi", "loc2/1-7.roi"] {
            write_roi(&dir.path().join(name), &triangle());
        }

        let entries =
            discover(dir.path(), "*.roi", &KeyExtractor::DashDelimited).expect("discover");
        let scan = ScanSummary::from_entries(&entries);

        assert_eq!(scan.num_files(), 4);
        assert_eq!(scan.num_folders(), 2);

        let stats: Vec<(String, usize, u32)> = scan
            .folders()
            .map(|(folder, stats)| {
                (folder.display().to_string(), stats.files, stats.max_frame)
            })
            .collect();
        assert_eq!(
            stats,
            vec![("loc1".to_string(), 3, 3), ("loc2".to_string(), 1, 1)]
        );
    }

    #[test]
    fn converts_a_tree_of_region_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in");
        let output = dir.path().join("out");

        for name in ["loc1/1-1.roi", "loc1/1-2.roi", "loc1/2-1.roi", "loc2/1-7.roi"] {
            write_roi(&input.join(name), &triangle());
        }

        let mut config = AggregatorConfig::new(&output);
        config.quiet = true;
        let summary =
            rois_to_geojson(&input, "*.roi", &KeyExtractor::DashDelimited, config)
                .expect("conversion succeeds");

        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.cells_written, 4);

        for path in [
            "loc1/frames/1.json",
            "loc1/frames/2.json",
            "loc2/frames/1.json",
            "loc1/cells/1-1.json",
            "loc1/cells/1-2.json",
            "loc1/cells/2-1.json",
            "loc2/cells/1-7.json",
        ] {
            assert!(output.join(path).is_file(), "missing {}", path);
        }
    }

    #[test]
    fn unparseable_region_file_aborts_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in");

        write_roi(&input.join("loc1/1-1.roi"), &triangle());
        fs::write(input.join("loc1/2-1.roi"), b"not a roi file").expect("writable");

        let mut config = AggregatorConfig::new(dir.path().join("out"));
        config.quiet = true;
        let result = rois_to_geojson(&input, "*.roi", &KeyExtractor::DashDelimited, config);

        assert!(matches!(result, Err(CellTrackError::Region { .. })));
    }

    #[test]
    fn ingests_a_trackmate_export() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).expect("mkdir");

        let csv = "\
LABEL,ID,FRAME,POSITION_X,POSITION_Y
Label,Spot ID,Frame,X,Y
Track_1,1,0,10.0,20.0
Track_1.a,2,1,11.5,21.5
";
        fs::write(input.join("spots.csv"), csv).expect("writable csv");

        write_roi(&input.join("rois/Track_1.roi"), &triangle());
        write_roi(&input.join("rois/Track_1.a.roi"), &triangle());

        let summary = ingest_trackmate(&IngestOptions {
            csv_path: input.join("spots.csv"),
            roi_folder: input.join("rois"),
            output_root: output.clone(),
            overwrite: true,
            quiet: true,
            scaling_factor: Some(2.0),
        })
        .expect("ingest succeeds");

        assert_eq!(summary.spots, 2);
        assert_eq!(summary.aggregate.frames_written, 2);
        assert_eq!(summary.aggregate.cells_written, 2);

        let metadata = fs::read_to_string(output.join("metadata.csv")).expect("readable");
        let header = metadata.lines().next().expect("header row");
        assert_eq!(header, "loon_track,parent,LABEL,ID,FRAME,POSITION_X,POSITION_Y");
        assert!(metadata.lines().any(|line| line.starts_with("Track_1,Track_1,Track_1,1,1,20,40")));

        // Frames were re-indexed to 1-based before the lookup.
        assert!(output.join("segmentations/frames/1.json").is_file());
        assert!(output.join("segmentations/frames/2.json").is_file());
        assert!(output.join("segmentations/cells/1-Track_1.json").is_file());
        assert!(output.join("segmentations/cells/2-Track_1.json").is_file());
    }
}

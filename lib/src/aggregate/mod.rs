//! Streaming aggregation of region outlines into per-frame GeoJSON files.
//!
//! The aggregator consumes a stream of [`RegionRecord`]s sorted by
//! (folder, frame, id) and writes, per (folder, frame) key, one
//! FeatureCollection under `{folder}/frames/{frame}.json` plus one Feature
//! per record under `{folder}/cells/{frame}-{id}.json`. The sort order lets
//! it detect key boundaries in a single forward pass, holding at most one
//! frame's features in memory.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::geojson::{Feature, FeatureCollection};
use crate::RegionRecord;

/// Options controlling where and how aggregated GeoJSON files are written
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Root directory the `frames/` and `cells/` trees are created under
    pub output_root: PathBuf,
    /// Replace existing output files instead of leaving them untouched
    pub overwrite: bool,
    /// Suppress per-frame progress messages
    pub quiet: bool,
}

impl AggregatorConfig {
    /// Builds a config with the default flags: existing output files are
    /// preserved and progress is reported
    pub fn new<P: Into<PathBuf>>(output_root: P) -> AggregatorConfig {
        AggregatorConfig {
            output_root: output_root.into(),
            overwrite: false,
            quiet: false,
        }
    }
}

/// Accumulates the features of one (folder, frame) key
#[derive(Debug)]
struct FrameBucket {
    folder: PathBuf,
    frame: u32,
    features: Vec<Feature>,
}

/// Counts reported by a finished aggregation run
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateSummary {
    /// Number of flushed FeatureCollections, one per (folder, frame) key
    pub frames_written: usize,
    /// Number of per-object Features written
    pub cells_written: usize,
}

/// Single-pass aggregator turning a sorted record stream into per-frame
/// GeoJSON files.
///
/// The input MUST be sorted by (folder, frame, id): buckets are detected by
/// key change only, an unsorted stream silently fragments its frames.
pub struct FrameAggregator {
    config: AggregatorConfig,
    bucket: Option<FrameBucket>,
    summary: AggregateSummary,
}

impl FrameAggregator {
    /// Creates an aggregator with no open bucket
    pub fn new(config: AggregatorConfig) -> FrameAggregator {
        FrameAggregator {
            config,
            bucket: None,
            summary: AggregateSummary::default(),
        }
    }

    /// Feeds the next record of the sorted stream.
    ///
    /// A (folder, frame) key change flushes the open bucket. The record's own
    /// Feature is written immediately, independent of the bucket.
    pub fn push(&mut self, record: RegionRecord) -> Result<()> {
        let key_changed = match &self.bucket {
            Some(bucket) => {
                bucket.folder.as_path() != record.folder() || bucket.frame != record.frame()
            }
            None => false,
        };
        if key_changed {
            self.flush_bucket()?;
        }

        let feature = record.to_feature();
        self.write_cell(&record, &feature)?;

        match &mut self.bucket {
            Some(bucket) => bucket.features.push(feature),
            None => {
                self.bucket = Some(FrameBucket {
                    folder: record.folder().to_path_buf(),
                    frame: record.frame(),
                    features: vec![feature],
                })
            }
        }

        Ok(())
    }

    /// Flushes the final open bucket and returns the run's counts.
    ///
    /// An empty stream produces no writes and is not an error.
    pub fn finish(mut self) -> Result<AggregateSummary> {
        self.flush_bucket()?;
        Ok(self.summary)
    }

    fn flush_bucket(&mut self) -> Result<()> {
        let bucket = match self.bucket.take() {
            Some(bucket) => bucket,
            None => return Ok(()),
        };

        let path = self
            .config
            .output_root
            .join(&bucket.folder)
            .join("frames")
            .join(format!("{}.json", bucket.frame));

        if !self.config.quiet {
            log::info!(
                "writing {} features to {}",
                bucket.features.len(),
                path.display()
            );
        }

        self.summary.frames_written += 1;
        write_json(&path, &FeatureCollection::new(bucket.features), self.config.overwrite)
    }

    fn write_cell(&mut self, record: &RegionRecord, feature: &Feature) -> Result<()> {
        let path = self
            .config
            .output_root
            .join(record.folder())
            .join("cells")
            .join(format!("{}-{}.json", record.frame(), record.id()));

        self.summary.cells_written += 1;
        write_json(&path, feature, self.config.overwrite)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;

    Ok(())
}

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use celltrack_rs::aggregate::AggregatorConfig;
use celltrack_rs::convert::{self, IngestOptions};
use celltrack_rs::error::{CellTrackError, Result};
use celltrack_rs::lineage;
use celltrack_rs::trackmate::SpotTable;
use celltrack_rs::KeyExtractor;

/// celltrack-convert rewrites cell tracking exports into the layout the Loon
/// and Aardvark visualization tools read.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a folder tree of ImageJ .roi files into per-frame GeoJSON
    Rois {
        /// Folder containing the region files
        input: PathBuf,
        /// Output root for the frames/ and cells/ trees
        output: PathBuf,
        /// Filename pattern for region files
        #[arg(long, default_value = "*.roi")]
        pattern: String,
        /// Filename convention used to recover frame and object id
        #[arg(long, value_enum, default_value_t = Naming::Dash)]
        naming: Naming,
        /// TrackMate spot CSV used for label-to-frame lookups
        #[arg(long)]
        reference_table: Option<PathBuf>,
        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },
    /// Full TrackMate ingest: spot CSV + ROI folder to the Loon layout
    Trackmate {
        /// TrackMate spot CSV export
        csv: PathBuf,
        /// Folder containing the Track_*.roi files
        rois: PathBuf,
        /// Output folder
        output: PathBuf,
        /// Multiply POSITION_X/POSITION_Y by this pixel-to-micron factor
        #[arg(long)]
        scale: Option<f64>,
        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },
    /// Add an inferred parent column to a tracking CSV
    Lineage {
        /// Input CSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Inference rule to apply
        #[arg(long, value_enum, default_value_t = Rule::Label)]
        by: Rule,
        /// Column holding the track label (label rule only)
        #[arg(long, default_value = "LABEL")]
        column: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Naming {
    /// {frame}-{id}.roi
    Dash,
    /// {label}-{index}.roi against a reference table
    IndexedLabel,
    /// {label}.roi with one reference-table row per label
    UniqueLabel,
}

#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    /// Parent from the label's division suffix
    Label,
    /// Parent by frame adjacency within a lineage group
    Adjacency,
}

fn main() -> ExitCode {
    let opts = Opts::parse();

    let level = if opts.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();

    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{}", error);
            let mut source = error.source();
            while let Some(cause) = source {
                log::error!("caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(opts: Opts) -> Result<()> {
    match opts.command {
        Command::Rois {
            input,
            output,
            pattern,
            naming,
            reference_table,
            overwrite,
        } => {
            let table = match &reference_table {
                Some(path) => Some(SpotTable::from_path(path)?),
                None => None,
            };

            let extractor = match naming {
                Naming::Dash => KeyExtractor::DashDelimited,
                Naming::IndexedLabel => KeyExtractor::IndexedLabel(
                    table.as_ref().ok_or(CellTrackError::ReferenceTableRequired)?,
                ),
                Naming::UniqueLabel => KeyExtractor::UniqueLabel(
                    table.as_ref().ok_or(CellTrackError::ReferenceTableRequired)?,
                ),
            };

            let mut config = AggregatorConfig::new(output);
            config.overwrite = overwrite;
            config.quiet = opts.quiet;

            let summary = convert::rois_to_geojson(&input, &pattern, &extractor, config)?;
            log::info!(
                "wrote {} frame collections and {} cell features",
                summary.frames_written,
                summary.cells_written
            );

            Ok(())
        }
        Command::Trackmate {
            csv,
            rois,
            output,
            scale,
            overwrite,
        } => {
            let summary = convert::ingest_trackmate(&IngestOptions {
                csv_path: csv,
                roi_folder: rois,
                output_root: output,
                overwrite,
                quiet: opts.quiet,
                scaling_factor: scale,
            })?;

            log::info!(
                "ingested {} spots; wrote {} frame collections and {} cell features",
                summary.spots,
                summary.aggregate.frames_written,
                summary.aggregate.cells_written
            );

            Ok(())
        }
        Command::Lineage {
            input,
            output,
            by,
            column,
        } => {
            let mut table = SpotTable::from_path(&input)?;

            match by {
                Rule::Label => lineage::add_parent_column(&mut table, &column)?,
                Rule::Adjacency => lineage::add_adjacency_parents(&mut table)?,
            }

            table.write_csv(BufWriter::new(File::create(&output)?))?;
            log::info!("wrote {} rows to {}", table.len(), output.display());

            Ok(())
        }
    }
}

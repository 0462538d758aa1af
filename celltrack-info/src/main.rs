use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use celltrack_rs::convert::{discover, ScanSummary};
use celltrack_rs::error::{CellTrackError, Result};
use celltrack_rs::trackmate::SpotTable;
use celltrack_rs::KeyExtractor;

/// celltrack-info prints summaries of cell tracking exports.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarise a folder tree of region files
    Rois {
        /// Folder containing the region files
        input: PathBuf,
        /// Filename pattern for region files
        #[arg(long, default_value = "*.roi")]
        pattern: String,
        /// Filename convention used to recover frame and object id
        #[arg(long, value_enum, default_value_t = Naming::Dash)]
        naming: Naming,
        /// TrackMate spot CSV used for label-to-frame lookups
        #[arg(long)]
        reference_table: Option<PathBuf>,
    },
    /// Summarise the columns of a TrackMate spot CSV
    Csv {
        /// The spot CSV file
        input: PathBuf,
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

fn main() -> ExitCode {
    let opts = Opts::parse();

    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            let mut source = error.source();
            while let Some(cause) = source {
                eprintln!("caused by: {}", cause);
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
            pattern,
            naming,
            reference_table,
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

            let entries = discover(&input, &pattern, &extractor)?;
            print!("{}", ScanSummary::from_entries(&entries));

            Ok(())
        }
        Command::Csv { input } => {
            let table = SpotTable::from_path(&input)?;
            print!("{}", table);

            Ok(())
        }
    }
}

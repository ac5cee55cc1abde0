//! Command-line interface for cloudphotos.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::logging::Verbosity;

/// cloudphotos - Import iCloud photos into a dated folder tree
///
/// Copies every photo and video the iCloud client synced into
/// ICLOUD_PHOTOS_DIR that has not been imported before into
/// DESTINATION_DIR/YYYY/YYYY-MM/, converting HEIC images to JPEG.
#[derive(Debug, Parser)]
#[command(name = "cloudphotos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the ledger database of copied files
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Show what would be copied without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Copy HEIC images as they are instead of converting them
    #[arg(long)]
    pub no_convert: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Directory the iCloud client syncs photos into
    #[arg(value_name = "ICLOUD_PHOTOS_DIR")]
    pub source: PathBuf,

    /// Import folder to copy photos into
    #[arg(value_name = "DESTINATION_DIR")]
    pub destination: PathBuf,

    /// Appended to every year and month directory name
    #[arg(value_name = "DIR_SUFFIX", allow_hyphen_values = true)]
    pub dir_suffix: Option<String>,
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(state) = &self.state {
            config.storage.database_path = Some(state.clone());
        }
        if let Some(suffix) = &self.dir_suffix {
            config.import.dir_suffix.clone_from(suffix);
        }
        if self.no_convert {
            config.import.convert_heic = false;
        }
    }
}

//! `cloudphotos` - Import photos synced by the iCloud desktop client
//!
//! This library scans the flat directory the iCloud client syncs into, copies
//! files that have not been imported before into a `YYYY/YYYY-MM` folder tree,
//! and converts HEIC images to JPEG with an external converter. A `SQLite`
//! ledger remembers what has been copied.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod importer;
pub mod logging;
pub mod media;
pub mod storage;

pub use config::Config;
pub use convert::{CommandConverter, ImageConverter};
pub use error::{Error, Result};
pub use importer::{ImportOptions, ImportSummary, Importer};
pub use logging::init_logging;
pub use media::CloudFile;
pub use storage::{LedgerEntry, Storage};

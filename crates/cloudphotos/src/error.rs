//! Error types for cloudphotos.
//!
//! This module defines all error types used throughout the cloudphotos crate,
//! providing enough context to tell which file or directory a failure is about.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cloudphotos operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Ledger Errors ===
    /// Failed to open or create the ledger database.
    #[error("failed to open ledger at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A ledger query failed.
    #[error("ledger query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run ledger migrations.
    #[error("ledger migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Directory Errors ===
    /// A directory given on the command line does not exist or is not a directory.
    #[error("{role} directory {path} does not exist or is not a directory")]
    DirectoryMissing {
        /// Which directory this is ("source" or "destination").
        role: &'static str,
        /// The offending path.
        path: PathBuf,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === File Errors ===
    /// Failed to read a source file's metadata.
    #[error("failed to read metadata of {path}: {source}")]
    Metadata {
        /// The source file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to hash a source file.
    #[error("failed to hash {path}: {source}")]
    Hash {
        /// The source file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy a file into the import folder.
    #[error("failed to copy {from} to {to}: {source}")]
    FileCopy {
        /// The source file.
        from: PathBuf,
        /// The destination file.
        to: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Conversion Errors ===
    /// The external converter could not be found on `PATH`.
    #[error("image converter '{program}' not found on PATH")]
    ConverterNotFound {
        /// The program that was looked up.
        program: String,
    },

    /// The external converter could not be started.
    #[error("failed to run image converter {program}: {source}")]
    ConverterSpawn {
        /// The converter program.
        program: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The external converter ran but reported failure.
    #[error("conversion of {path} failed: {message}")]
    ConversionFailed {
        /// The file being converted.
        path: PathBuf,
        /// Exit status and whatever the converter printed.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for cloudphotos operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a conversion failure for the given file.
    #[must_use]
    pub fn conversion_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConversionFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error means a source or destination directory is missing.
    #[must_use]
    pub fn is_missing_directory(&self) -> bool {
        matches!(self, Self::DirectoryMissing { .. })
    }

    /// Check if this error came from the external converter.
    #[must_use]
    pub fn is_conversion_error(&self) -> bool {
        matches!(
            self,
            Self::ConverterNotFound { .. }
                | Self::ConverterSpawn { .. }
                | Self::ConversionFailed { .. }
        )
    }
}

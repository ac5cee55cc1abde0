//! The import run: scan, dedup against the ledger, copy or convert.
//!
//! Files are handled in two passes. The first pass only looks at names, so a
//! fresh batch of photos is copied without hashing anything twice. Files whose
//! name the ledger already knows are deferred to the second pass, which hashes
//! them and copies only content that has not been seen under that name.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::convert::ImageConverter;
use crate::error::{Error, Result};
use crate::media::{destination_path, CloudFile};
use crate::storage::{LedgerEntry, Storage};

/// How an import run behaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Appended to year and month directory names.
    pub dir_suffix: String,
    /// Convert HEIC images to JPEG instead of copying them.
    pub convert_heic: bool,
    /// Ignore dotfiles in the source directory.
    pub skip_hidden: bool,
    /// Check everything but write nothing.
    pub dry_run: bool,
}

/// Counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Files found in the source directory.
    pub scanned: usize,
    /// Files copied because their name had never been seen.
    pub first_pass_copied: usize,
    /// Files copied because their content was new under a known name.
    pub second_pass_copied: usize,
    /// Files skipped as already copied.
    pub already_copied: usize,
    /// Files that could not be handled.
    pub failed: usize,
    /// Nothing was written.
    pub dry_run: bool,
}

impl ImportSummary {
    /// Files copied (or that would be copied) across both passes.
    #[must_use]
    pub fn total_copied(&self) -> usize {
        self.first_pass_copied + self.second_pass_copied
    }

    /// Whether every scanned file was handled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Render the summary as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Copies new files from a synced iCloud directory into an import folder.
pub struct Importer<'a> {
    storage: &'a Storage,
    converter: &'a dyn ImageConverter,
    destination: PathBuf,
    options: ImportOptions,
}

impl std::fmt::Debug for Importer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("storage", &self.storage.path())
            .field("converter", &self.converter.name())
            .field("destination", &self.destination)
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> Importer<'a> {
    /// Create an importer writing into `destination`.
    #[must_use]
    pub fn new(
        storage: &'a Storage,
        converter: &'a dyn ImageConverter,
        destination: impl Into<PathBuf>,
        options: ImportOptions,
    ) -> Self {
        Self {
            storage,
            converter,
            destination: destination.into(),
            options,
        }
    }

    /// Import every new file from `source`.
    ///
    /// Per-file failures are logged and counted in the summary; they do not
    /// stop the run.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory is missing or the source cannot be listed.
    pub fn run(&self, source: &Path) -> Result<ImportSummary> {
        ensure_directory(source, "source")?;
        ensure_directory(&self.destination, "destination")?;

        let files = scan_source(source, self.options.skip_hidden)?;
        let mut summary = ImportSummary {
            scanned: files.len(),
            dry_run: self.options.dry_run,
            ..ImportSummary::default()
        };
        info!("Found {} files in {}", summary.scanned, source.display());

        let mut second_pass = Vec::new();
        for mut file in files {
            match self.storage.contains_name(file.file_name()) {
                Ok(false) => {
                    info!("{} hasn't been copied yet", file.path().display());
                    match self.import_file(&mut file) {
                        Ok(()) => summary.first_pass_copied += 1,
                        Err(e) => record_failure(&mut summary, &file, &e),
                    }
                }
                Ok(true) => {
                    debug!("{} may have already been copied", file.path().display());
                    second_pass.push(file);
                }
                Err(e) => record_failure(&mut summary, &file, &e),
            }
        }

        info!(
            "Copied {} files in the first pass, {} files remaining for second pass",
            summary.first_pass_copied,
            second_pass.len()
        );

        for mut file in second_pass {
            match self.is_new_content(&mut file) {
                Ok(true) => {
                    info!(
                        "{} has new content under a known name",
                        file.path().display()
                    );
                    match self.import_file(&mut file) {
                        Ok(()) => summary.second_pass_copied += 1,
                        Err(e) => record_failure(&mut summary, &file, &e),
                    }
                }
                Ok(false) => {
                    debug!("{} has already been copied", file.path().display());
                    summary.already_copied += 1;
                }
                Err(e) => record_failure(&mut summary, &file, &e),
            }
        }

        info!(
            "Copied {} files in the second pass, {} already copied, {} failed",
            summary.second_pass_copied, summary.already_copied, summary.failed
        );
        Ok(summary)
    }

    fn is_new_content(&self, file: &mut CloudFile) -> Result<bool> {
        let name = file.file_name().to_string();
        let hash = file.content_hash()?;
        Ok(!self.storage.contains(&name, hash)?)
    }

    /// Copy or convert one file and record it in the ledger.
    fn import_file(&self, file: &mut CloudFile) -> Result<()> {
        let date = file.capture_date()?;
        let convert = self.options.convert_heic && file.is_heic();
        let target = destination_path(
            &self.destination,
            &self.options.dir_suffix,
            file.path(),
            date,
            self.options.convert_heic,
        );

        if self.options.dry_run {
            info!(
                "Would {} {} to {}",
                if convert { "convert" } else { "copy" },
                file.path().display(),
                target.display()
            );
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        if target.exists() {
            warn!("Overwriting existing {}", target.display());
        }

        if convert {
            self.converter.convert(file.path(), &target)?;
        } else {
            copy_preserving_mtime(file, &target)?;
        }

        let entry = LedgerEntry {
            id: None,
            file_name: file.file_name().to_string(),
            content_hash: file.content_hash()?.to_string(),
            source_path: file.path().to_path_buf(),
            destination_path: target.clone(),
            mtime: file.mtime_utc()?,
            copied_at: Utc::now(),
        };
        self.storage.record(&entry)?;

        info!("Copied {} to {}", file.path().display(), target.display());
        Ok(())
    }
}

fn record_failure(summary: &mut ImportSummary, file: &CloudFile, err: &Error) {
    error!("Failed to import {}: {err}", file.path().display());
    summary.failed += 1;
}

/// Check that `path` is an existing directory.
///
/// # Errors
///
/// Returns [`Error::DirectoryMissing`] otherwise.
pub fn ensure_directory(path: &Path, role: &'static str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::DirectoryMissing {
            role,
            path: path.to_path_buf(),
        })
    }
}

/// List the regular files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn scan_source(dir: &Path, skip_hidden: bool) -> Result<Vec<CloudFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        // Follows symlinks
        if !path.is_file() {
            continue;
        }
        let file = CloudFile::new(path);
        if skip_hidden && file.is_hidden() {
            debug!("Skipping hidden file {}", file.path().display());
            continue;
        }
        files.push(file);
    }
    files.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    Ok(files)
}

fn copy_preserving_mtime(file: &mut CloudFile, target: &Path) -> Result<()> {
    std::fs::copy(file.path(), target).map_err(|source| Error::FileCopy {
        from: file.path().to_path_buf(),
        to: target.to_path_buf(),
        source,
    })?;

    let mtime = file.mtime()?;
    File::options()
        .write(true)
        .open(target)
        .and_then(|copied| copied.set_modified(mtime))
        .map_err(|source| Error::FileCopy {
            from: file.path().to_path_buf(),
            to: target.to_path_buf(),
            source,
        })
}

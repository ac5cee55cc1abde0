//! HEIC to JPEG conversion through an external program.
//!
//! Conversion is delegated to ImageMagick (`magick SOURCE TARGET`) or any
//! program with the same calling convention.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};

/// Something that can turn an image into another format.
///
/// The target format is implied by the target path's extension.
pub trait ImageConverter {
    /// Name of the converter (for logging).
    fn name(&self) -> &str;

    /// Convert `source` and write the result to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion could not be run or failed.
    fn convert(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Converter that shells out to an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConverter {
    program: PathBuf,
}

impl CommandConverter {
    /// Use `program` as given; resolution happens when it is spawned.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve `program` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConverterNotFound`] if the program cannot be found.
    pub fn locate(program: &str) -> Result<Self> {
        let path = which::which(program).map_err(|_| Error::ConverterNotFound {
            program: program.to_string(),
        })?;
        debug!("Using image converter at {}", path.display());
        Ok(Self::new(path))
    }

    /// The program this converter runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ImageConverter for CommandConverter {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("converter")
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        debug!(
            "Running {} {} {}",
            self.program.display(),
            source.display(),
            target.display()
        );
        let output = Command::new(&self.program)
            .arg(source)
            .arg(target)
            .output()
            .map_err(|source| Error::ConverterSpawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {stderr}", output.status)
        };
        Err(Error::conversion_failed(source, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_program() {
        let err = CommandConverter::locate("cloudphotos-no-such-converter").unwrap_err();
        assert!(matches!(err, Error::ConverterNotFound { .. }));
    }

    #[test]
    fn test_name_is_file_name() {
        let converter = CommandConverter::new("/usr/local/bin/magick");
        assert_eq!(converter.name(), "magick");
        assert_eq!(converter.program(), Path::new("/usr/local/bin/magick"));
    }

    #[test]
    fn test_spawn_failure() {
        let converter = CommandConverter::new("/nonexistent/bin/magick");
        let err = converter
            .convert(Path::new("a.heic"), Path::new("a.jpg"))
            .unwrap_err();
        assert!(matches!(err, Error::ConverterSpawn { .. }));
        assert!(err.is_conversion_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_exit() {
        let converter = CommandConverter::locate("true").unwrap();
        assert!(converter
            .convert(Path::new("a.heic"), Path::new("a.jpg"))
            .is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_exit() {
        let converter = CommandConverter::locate("false").unwrap();
        let err = converter
            .convert(Path::new("a.heic"), Path::new("a.jpg"))
            .unwrap_err();
        match err {
            Error::ConversionFailed { path, message } => {
                assert_eq!(path, PathBuf::from("a.heic"));
                assert!(message.contains("exit status"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_cp_as_converter() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.heic");
        let target = dir.path().join("a.jpg");
        std::fs::write(&source, b"pixels").unwrap();

        let converter = CommandConverter::locate("cp").unwrap();
        converter.convert(&source, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"pixels");
    }
}

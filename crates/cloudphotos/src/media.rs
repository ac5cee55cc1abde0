//! Source files and where they land in the import folder.
//!
//! A [`CloudFile`] is one file the iCloud client synced into the source
//! directory. Its metadata (modification time, content hash, capture date) is
//! read lazily and cached, because the first import pass only needs the name.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Extension given to converted HEIC images.
pub const CONVERTED_EXTENSION: &str = "jpg";

/// Format of the EXIF `DateTimeOriginal` tag.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// A photo or video in the synced iCloud directory.
#[derive(Debug, Clone)]
pub struct CloudFile {
    path: PathBuf,
    file_name: String,
    mtime: Option<SystemTime>,
    content_hash: Option<String>,
}

impl CloudFile {
    /// Wrap a path from the source directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path.file_name().map(name_key).unwrap_or_default();
        Self {
            path,
            file_name,
            mtime: None,
            content_hash: None,
        }
    }

    /// Path of the file in the source directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the ledger's name key.
    ///
    /// Names that are not valid UTF-8 are stored in escaped form so that
    /// distinct names never share a key.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Modification time, read once.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn mtime(&mut self) -> Result<SystemTime> {
        if let Some(mtime) = self.mtime {
            return Ok(mtime);
        }
        let mtime = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|source| Error::Metadata {
                path: self.path.clone(),
                source,
            })?;
        self.mtime = Some(mtime);
        Ok(mtime)
    }

    /// BLAKE3 hex digest of the contents, computed once.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can be neither read nor copied.
    pub fn content_hash(&mut self) -> Result<&str> {
        if self.content_hash.is_none() {
            self.content_hash = Some(hash_file(&self.path)?);
        }
        Ok(self.content_hash.as_deref().unwrap_or_default())
    }

    /// Whether this file is a HEIC image.
    #[must_use]
    pub fn is_heic(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("heic"))
    }

    /// Whether this file is hidden (a dotfile).
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.path
            .file_name()
            .is_some_and(|name| name.as_encoded_bytes().first() == Some(&b'.'))
    }

    /// When the photo was taken.
    ///
    /// Uses the EXIF `DateTimeOriginal` tag when present, otherwise the local
    /// modification time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the EXIF tag is missing and the modification
    /// time cannot be read either.
    pub fn capture_date(&mut self) -> Result<NaiveDateTime> {
        match read_exif_date(&self.path) {
            Ok(Some(date)) => return Ok(date),
            Ok(None) => info!("No EXIF DateTimeOriginal in {}", self.path.display()),
            Err(e) => warn!("Unable to read EXIF from {}: {e}", self.path.display()),
        }
        let mtime = self.mtime()?;
        Ok(DateTime::<Local>::from(mtime).naive_local())
    }

    /// Modification time as UTC, for the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn mtime_utc(&mut self) -> Result<DateTime<Utc>> {
        Ok(DateTime::<Utc>::from(self.mtime()?))
    }
}

/// Compute where a file lands in the import folder.
///
/// The layout is `{target}/{YYYY}{suffix}/{YYYY}-{MM}{suffix}/{stem}{ext}`,
/// with a `.heic` extension replaced by `.jpg` when `convert_heic` is set.
#[must_use]
pub fn destination_path(
    target: &Path,
    dir_suffix: &str,
    source: &Path,
    date: NaiveDateTime,
    convert_heic: bool,
) -> PathBuf {
    let year = date.year();
    let mut path = target
        .join(format!("{year}{dir_suffix}"))
        .join(format!("{year}-{:02}{dir_suffix}", date.month()))
        .join(source.file_name().unwrap_or_default());

    if convert_heic
        && source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("heic"))
    {
        path.set_extension(CONVERTED_EXTENSION);
    }
    path
}

/// Ledger key for a file name: the name itself, or its escaped form when it
/// is not valid UTF-8.
fn name_key(name: &OsStr) -> String {
    match name.to_str() {
        Some(name) => name.to_string(),
        None => format!("{name:?}"),
    }
}

/// Parse an EXIF `DateTimeOriginal` value such as `2019:07:04 10:20:30`.
#[must_use]
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(value, EXIF_DATETIME_FORMAT).ok()
}

/// Read `DateTimeOriginal` from the file's EXIF block.
///
/// `Ok(None)` means the file has no EXIF data or no such tag.
fn read_exif_date(path: &Path) -> std::result::Result<Option<NaiveDateTime>, exif::Error> {
    let file = File::open(path)?;
    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        // No EXIF block, or a container the reader does not know (videos)
        Err(exif::Error::NotFound(_) | exif::Error::InvalidFormat(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) else {
        return Ok(None);
    };
    let exif::Value::Ascii(ref values) = field.value else {
        return Ok(None);
    };
    Ok(values
        .first()
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(parse_exif_datetime))
}

/// Hash a file, falling back to hashing a scratch copy.
///
/// iCloud placeholders sometimes refuse a direct read while still allowing
/// the file to be copied.
fn hash_file(path: &Path) -> Result<String> {
    match hash_reader(File::open(path)) {
        Ok(hash) => Ok(hash),
        Err(err) => {
            debug!(
                "Direct read of {} failed ({err}), hashing a copy",
                path.display()
            );
            hash_scratch_copy(path)
        }
    }
}

/// Copy `path` to a temporary file and hash the copy.
///
/// The temporary file is removed when this returns.
fn hash_scratch_copy(path: &Path) -> Result<String> {
    let scratch = tempfile::NamedTempFile::new()?;
    std::fs::copy(path, scratch.path()).map_err(|source| Error::Hash {
        path: path.to_path_buf(),
        source,
    })?;
    hash_reader(File::open(scratch.path())).map_err(|source| Error::Hash {
        path: path.to_path_buf(),
        source,
    })
}

fn hash_reader(file: io::Result<File>) -> io::Result<String> {
    let mut file = file?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 20, 30)
            .unwrap()
    }

    /// Minimal JPEG whose EXIF block carries only `DateTimeOriginal`.
    pub(crate) fn jpeg_with_exif_date(value: &str) -> Vec<u8> {
        assert_eq!(value.len(), 19);
        let mut tiff: Vec<u8> = Vec::new();
        // Little-endian header, IFD0 at offset 8
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        // IFD0: one entry pointing at the Exif IFD (offset 26)
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x8769u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        // Exif IFD: DateTimeOriginal, ASCII, 20 bytes at offset 44
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x9003u16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&20u32.to_le_bytes());
        tiff.extend_from_slice(&44u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(value.as_bytes());
        tiff.push(0);

        let segment_len = u16::try_from(2 + 6 + tiff.len()).unwrap();
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&segment_len.to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    /// Set a file's mtime to local noon on the given day.
    pub(crate) fn set_mtime(path: &Path, y: i32, m: u32, d: u32) {
        let local = Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::from(local)).unwrap();
    }

    #[test]
    fn test_file_name_and_flags() {
        let file = CloudFile::new("/icloud/IMG_0001.HEIC");
        assert_eq!(file.file_name(), "IMG_0001.HEIC");
        assert!(file.is_heic());
        assert!(!file.is_hidden());

        let file = CloudFile::new("/icloud/.DS_Store");
        assert!(file.is_hidden());
        assert!(!file.is_heic());
    }

    #[test]
    fn test_is_heic_case_insensitive() {
        assert!(CloudFile::new("a.heic").is_heic());
        assert!(CloudFile::new("a.HeIc").is_heic());
        assert!(!CloudFile::new("a.heif").is_heic());
        assert!(!CloudFile::new("heic").is_heic());
    }

    #[test]
    fn test_destination_path_layout() {
        let path = destination_path(
            Path::new("/import"),
            "",
            Path::new("/icloud/IMG_0001.JPG"),
            date(2021, 3, 15),
            true,
        );
        assert_eq!(path, PathBuf::from("/import/2021/2021-03/IMG_0001.JPG"));
    }

    #[test]
    fn test_destination_path_converts_heic() {
        let path = destination_path(
            Path::new("/import"),
            "",
            Path::new("/icloud/IMG_0001.HEIC"),
            date(2022, 11, 1),
            true,
        );
        assert_eq!(path, PathBuf::from("/import/2022/2022-11/IMG_0001.jpg"));
    }

    #[test]
    fn test_destination_path_keeps_heic_without_conversion() {
        let path = destination_path(
            Path::new("/import"),
            "",
            Path::new("/icloud/IMG_0001.HEIC"),
            date(2022, 11, 1),
            false,
        );
        assert_eq!(path, PathBuf::from("/import/2022/2022-11/IMG_0001.HEIC"));
    }

    #[test]
    fn test_destination_path_with_suffix() {
        let path = destination_path(
            Path::new("/import"),
            " iCloud",
            Path::new("/icloud/clip.mov"),
            date(2020, 1, 9),
            true,
        );
        assert_eq!(
            path,
            PathBuf::from("/import/2020 iCloud/2020-01 iCloud/clip.mov")
        );
    }

    #[test]
    fn test_destination_path_without_extension() {
        let path = destination_path(
            Path::new("/import"),
            "",
            Path::new("/icloud/README"),
            date(2020, 12, 31),
            true,
        );
        assert_eq!(path, PathBuf::from("/import/2020/2020-12/README"));
    }

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(
            parse_exif_datetime("2021:03:15 10:20:30"),
            Some(date(2021, 3, 15))
        );
        assert_eq!(
            parse_exif_datetime("2021:03:15 10:20:30\0"),
            Some(date(2021, 3, 15))
        );
        assert_eq!(parse_exif_datetime("2021-03-15 10:20:30"), None);
        assert_eq!(parse_exif_datetime("    :  :     :  :  "), None);
    }

    #[test]
    fn test_content_hash_is_blake3_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"photo bytes").unwrap();

        let mut file = CloudFile::new(&path);
        let expected = blake3::hash(b"photo bytes").to_hex().to_string();
        assert_eq!(file.content_hash().unwrap(), expected);

        // Cached: changing the file afterwards does not change the hash
        std::fs::write(&path, b"other bytes").unwrap();
        assert_eq!(file.content_hash().unwrap(), expected);
    }

    #[test]
    fn test_scratch_copy_hash_matches_direct_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0004.HEIC");
        std::fs::write(&path, b"placeholder contents").unwrap();

        let copied = hash_scratch_copy(&path).unwrap();
        assert_eq!(copied, hash_reader(File::open(&path)).unwrap());
        assert_eq!(
            copied,
            blake3::hash(b"placeholder contents").to_hex().to_string()
        );
    }

    #[test]
    fn test_scratch_copy_hash_missing_file() {
        let err = hash_scratch_copy(Path::new("/nonexistent/IMG_0004.HEIC")).unwrap_err();
        assert!(matches!(err, Error::Hash { .. }));
    }

    #[test]
    fn test_content_hash_missing_file() {
        let mut file = CloudFile::new("/nonexistent/IMG_0001.HEIC");
        assert!(matches!(file.content_hash(), Err(Error::Hash { .. })));
    }

    #[test]
    fn test_capture_date_from_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.JPG");
        std::fs::write(&path, jpeg_with_exif_date("2019:07:04 10:20:30")).unwrap();
        set_mtime(&path, 2023, 1, 1);

        let mut file = CloudFile::new(&path);
        let taken = file.capture_date().unwrap();
        assert_eq!(taken.year(), 2019);
        assert_eq!(taken.month(), 7);
        assert_eq!(taken.day(), 4);
    }

    #[test]
    fn test_capture_date_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.MOV");
        std::fs::write(&path, b"not an image").unwrap();
        set_mtime(&path, 2020, 2, 29);

        let mut file = CloudFile::new(&path);
        let taken = file.capture_date().unwrap();
        assert_eq!((taken.year(), taken.month(), taken.day()), (2020, 2, 29));
    }

    #[test]
    fn test_video_container_has_no_exif_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.MOV");
        // QuickTime `ftyp` box
        let mut mov = Vec::new();
        mov.extend_from_slice(&20u32.to_be_bytes());
        mov.extend_from_slice(b"ftypqt  ");
        mov.extend_from_slice(&0u32.to_be_bytes());
        mov.extend_from_slice(b"qt  ");
        std::fs::write(&path, mov).unwrap();

        assert!(matches!(read_exif_date(&path), Ok(None)));
    }

    #[test]
    fn test_plain_bytes_have_no_exif_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not an image, just a few lines of plain text").unwrap();

        assert!(matches!(read_exif_date(&path), Ok(None)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_kept_verbatim() {
        use std::os::unix::ffi::OsStrExt;

        let first = Path::new("/icloud").join(OsStr::from_bytes(b"IMG_\xff1.HEIC"));
        let second = Path::new("/icloud").join(OsStr::from_bytes(b"IMG_\xfe1.HEIC"));

        let path = destination_path(Path::new("/import"), "", &first, date(2021, 3, 15), true);
        assert_eq!(
            path.file_name().unwrap().as_bytes(),
            b"IMG_\xff1.jpg".as_slice()
        );

        let path = destination_path(Path::new("/import"), "", &first, date(2021, 3, 15), false);
        assert_eq!(path.file_name().unwrap(), first.file_name().unwrap());

        assert_ne!(
            CloudFile::new(&first).file_name(),
            CloudFile::new(&second).file_name()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_hidden_file() {
        use std::os::unix::ffi::OsStrExt;

        let file = CloudFile::new(Path::new("/icloud").join(OsStr::from_bytes(b".\xff")));
        assert!(file.is_hidden());
    }

    #[test]
    fn test_capture_date_missing_file() {
        let mut file = CloudFile::new("/nonexistent/clip.MOV");
        assert!(matches!(file.capture_date(), Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_mtime_utc_matches_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        set_mtime(&path, 2021, 6, 1);

        let mut file = CloudFile::new(&path);
        let expected = Local.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(file.mtime_utc().unwrap(), expected.with_timezone(&Utc));
    }
}

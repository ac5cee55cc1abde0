//! Copy ledger for cloudphotos.
//!
//! This module provides `SQLite`-based persistent storage of every file that
//! has been copied into the import folder. The ledger answers the two dedup
//! questions the importer asks: "has a file with this name ever been copied?"
//! and "has this exact name and content been copied?".

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A file that has been copied into the import folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Row identifier (assigned by the ledger).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Source file name, the first dedup key.
    pub file_name: String,
    /// BLAKE3 hex digest of the contents, the second dedup key.
    pub content_hash: String,
    /// Where the file was copied from.
    pub source_path: PathBuf,
    /// Where the file was written to.
    pub destination_path: PathBuf,
    /// Modification time of the source file.
    pub mtime: DateTime<Utc>,
    /// When the copy was recorded.
    pub copied_at: DateTime<Utc>,
}

/// Persistent ledger of copied files.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a ledger at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening ledger at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Ledger opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether any file with this name has been copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn contains_name(&self, file_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM copied_files WHERE file_name = ?1",
            [file_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Check whether a file with this exact name and content has been copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn contains(&self, file_name: &str, content_hash: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM copied_files WHERE file_name = ?1 AND content_hash = ?2",
            params![file_name, content_hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a copied file, replacing any earlier row for the same name and content.
    ///
    /// Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record(&self, entry: &LedgerEntry) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO copied_files
                (file_name, content_hash, source_path, destination_path, mtime, copied_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                entry.file_name,
                entry.content_hash,
                entry.source_path.to_string_lossy(),
                entry.destination_path.to_string_lossy(),
                entry.mtime.to_rfc3339(),
                entry.copied_at.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded {} as ledger row {}", entry.file_name, id);
        Ok(id)
    }

    /// Get every recorded copy of files with this name, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_by_name(&self, file_name: &str) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, file_name, content_hash, source_path, destination_path, mtime, copied_at
            FROM copied_files WHERE file_name = ?1 ORDER BY id ASC
            ",
        )?;

        let entries = stmt
            .query_map([file_name], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Count recorded files.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM copied_files", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let mtime: String = row.get(5)?;
        let copied_at: String = row.get(6)?;

        Ok(LedgerEntry {
            id: Some(row.get(0)?),
            file_name: row.get(1)?,
            content_hash: row.get(2)?,
            source_path: PathBuf::from(row.get::<_, String>(3)?),
            destination_path: PathBuf::from(row.get::<_, String>(4)?),
            mtime: parse_timestamp(&mtime),
            copied_at: parse_timestamp(&copied_at),
        })
    }
}

/// Parse a stored RFC 3339 timestamp, falling back to the Unix epoch.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map_or(DateTime::UNIX_EPOCH, |dt| dt.with_timezone(&Utc))
}

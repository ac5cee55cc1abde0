//! `SQLite` schema definitions for the copy ledger.

/// SQL statement to create the copied files table.
pub const CREATE_COPIED_FILES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS copied_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    source_path TEXT NOT NULL,
    destination_path TEXT NOT NULL,
    mtime TEXT NOT NULL,
    copied_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// One row per distinct (name, content) pair.
pub const CREATE_NAME_HASH_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_copied_files_name_hash
    ON copied_files(file_name, content_hash)
";

/// SQL statement to create an index on `file_name` for the first-pass lookup.
pub const CREATE_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_copied_files_name ON copied_files(file_name)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_COPIED_FILES_TABLE,
    CREATE_NAME_HASH_INDEX,
    CREATE_NAME_INDEX,
    CREATE_METADATA_TABLE,
];

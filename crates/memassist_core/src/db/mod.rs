//! Local SQLite store for the memory-assist companion.
//!
//! One database file holds everything except face vectors and photos:
//! `people` (name, relation, description, photo file), `tasks` with their
//! `task_repeat_days` weekday rows, and `memory_logs`. Face vectors live in
//! the [`FaceRegistry`](crate::face::FaceRegistry) directory instead.
//!
//! Every connection handed to a repository has foreign keys switched on (so
//! deleting a task drops its weekday rows) and has been brought up to the
//! newest schema. The schema version is kept in `PRAGMA user_version`; a file
//! written by a newer build is refused rather than modified.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected a pragma, migration or open call.
    Sqlite(rusqlite::Error),
    /// The data directory holding the database file could not be created.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file was migrated by a newer build than this one.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Io { path, source } => {
                write!(f, "cannot create data directory `{}`: {source}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "memory-assist database is at schema {db_version}, this build understands up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

//! Storage backends for the catalog collections.
//!
//! A backend stores "a table of records with an integer auto-increment id",
//! either in SQLite or in one JSON file per collection. Which one is used is
//! decided once at startup by [`resolve_backend`].

mod collection;
mod file_backend;
mod schema;
mod sqlite_backend;

pub use collection::{Collection, CollectionSpec, FieldMapping, SortDirection};
pub use file_backend::FileBackend;
pub use sqlite_backend::SqliteBackend;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A record in its normalized wire shape: camelCase field names, counters
/// nested under `stats`, integer `id`.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Sqlite,
    File,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Sqlite => f.write_str("sqlite"),
            BackendMode::File => f.write_str("file"),
        }
    }
}

pub trait StorageBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// Human readable location of the backing store, for logs.
    fn location(&self) -> String;

    /// All records of a collection, in the collection's sort order.
    fn list(&self, collection: Collection) -> Result<Vec<Record>>;

    fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>>;

    /// Stores a new record and returns it with its assigned `id`.
    /// Any `id` present in `fields` is ignored.
    fn insert(&self, collection: Collection, fields: Record) -> Result<Record>;

    /// Merges `fields` into the stored record. `id` never changes.
    /// Returns `None` if there is no record with this id.
    fn update(&self, collection: Collection, id: i64, fields: Record) -> Result<Option<Record>>;

    /// Returns `false` if there was no record with this id.
    fn delete(&self, collection: Collection, id: i64) -> Result<bool>;

    /// Adds one to an integer field of a record and returns the updated record.
    fn increment(&self, collection: Collection, id: i64, field: &str) -> Result<Option<Record>>;

    fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Inserts or replaces a setting.
    fn put_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Best known time of the last catalog change.
    fn last_modified(&self) -> Result<Option<DateTime<Utc>>>;
}

pub type GuardedBackend = Arc<dyn StorageBackend>;

/// Where the backends keep their data.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// SQLite database file; `None` means file mode.
    pub db_path: Option<PathBuf>,
    /// Directory holding the JSON collection files.
    pub data_dir: PathBuf,
    pub read_pool_size: usize,
    /// Materialize seed records into collections whose file is missing.
    pub seed: bool,
}

/// The backend chosen at startup, together with the mode it runs in.
#[derive(Clone)]
pub struct ResolvedBackend {
    pub mode: BackendMode,
    pub backend: GuardedBackend,
}

/// Picks the backend for the lifetime of the process.
///
/// A database that cannot be opened or initialized demotes the process to
/// file mode instead of failing: requests keep being served from the JSON
/// files.
pub fn resolve_backend(settings: &StorageSettings) -> ResolvedBackend {
    if let Some(db_path) = &settings.db_path {
        match SqliteBackend::open(db_path, settings.read_pool_size) {
            Ok(backend) => {
                info!("Using SQLite backend at {:?}", db_path);
                return ResolvedBackend {
                    mode: BackendMode::Sqlite,
                    backend: Arc::new(backend),
                };
            }
            Err(err) => {
                warn!(
                    "Could not open SQLite database at {:?}, falling back to file mode: {:#}",
                    db_path, err
                );
            }
        }
    } else {
        info!("No database configured, using file mode");
    }

    let backend = FileBackend::new(&settings.data_dir, settings.seed);
    info!("Using JSON files in {:?}", settings.data_dir);
    ResolvedBackend {
        mode: BackendMode::File,
        backend: Arc::new(backend),
    }
}

/// Timestamp format shared by every stored date (`2024-05-01T10:00:00.000Z`).
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(|v| v.as_i64())
}

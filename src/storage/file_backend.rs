//! JSON-file storage.
//!
//! Each collection is one pretty-printed JSON array in the data directory.
//! Every operation reads the whole file and mutations rewrite it. There is
//! no locking: two requests mutating the same collection concurrently can
//! lose one of the writes, and ids are computed as `max(id) + 1` so the id
//! of a deleted last record is handed out again.

use super::{format_timestamp, record_id, BackendMode, Collection, Record, StorageBackend};
use crate::sqlite_persistence::SqlType;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize)]
struct SettingEntry {
    key: String,
    value: String,
}

pub struct FileBackend {
    data_dir: PathBuf,
    seed: bool,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(data_dir: P, seed: bool) -> Self {
        FileBackend {
            data_dir: data_dir.as_ref().to_path_buf(),
            seed,
        }
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.spec().file_name)
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    /// Reads a JSON array file. `None` if the file does not exist.
    fn read_array<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<Vec<T>>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Some(vec![]));
        }
        let items = serde_json::from_str(&content)
            .with_context(|| format!("{} does not contain a valid JSON array", path.display()))?;
        Ok(Some(items))
    }

    fn write_array<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;
        let content = serde_json::to_string_pretty(items)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} entries to {}", items.len(), path.display());
        Ok(())
    }

    fn load(&self, collection: Collection) -> Result<Vec<Record>> {
        let path = self.collection_path(collection);
        match Self::read_array::<Value>(&path)? {
            Some(values) => values
                .into_iter()
                .map(|value| match value {
                    Value::Object(record) => Ok(record),
                    other => Err(anyhow!(
                        "{} contains a non-object entry: {}",
                        path.display(),
                        other
                    )),
                })
                .collect(),
            None => self.materialize(collection),
        }
    }

    /// First access to a collection without a file: write the seed set, if
    /// seeding is enabled and the collection has one.
    fn materialize(&self, collection: Collection) -> Result<Vec<Record>> {
        let seed = match (self.seed, collection.spec().seed) {
            (true, Some(seed)) => seed,
            _ => return Ok(vec![]),
        };
        let now = format_timestamp(&Utc::now());
        let records = seed(&now)
            .into_iter()
            .zip(1i64..)
            .map(|(fields, id)| with_id(id, fields))
            .collect::<Vec<_>>();
        self.save(collection, &records)?;
        info!(
            "Seeded {} with {} records at {}",
            collection,
            records.len(),
            self.collection_path(collection).display()
        );
        Ok(records)
    }

    fn save(&self, collection: Collection, records: &[Record]) -> Result<()> {
        self.write_array(&self.collection_path(collection), records)
    }

    fn load_settings(&self) -> Result<Vec<SettingEntry>> {
        Ok(Self::read_array(&self.settings_path())?.unwrap_or_default())
    }
}

/// Builds a record with `id` as its first key.
fn with_id(id: i64, mut fields: Record) -> Record {
    fields.remove("id");
    let mut record = Record::new();
    record.insert("id".to_string(), Value::from(id));
    record.extend(fields);
    record
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

impl StorageBackend for FileBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::File
    }

    fn location(&self) -> String {
        self.data_dir.display().to_string()
    }

    fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        let spec = collection.spec();
        let mut records = self.load(collection)?;
        records.sort_by(|a, b| spec.compare(a, b));
        Ok(records)
    }

    fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>> {
        Ok(self
            .load(collection)?
            .into_iter()
            .find(|r| record_id(r) == Some(id)))
    }

    fn insert(&self, collection: Collection, fields: Record) -> Result<Record> {
        let mut records = self.load(collection)?;
        let next_id = records.iter().filter_map(record_id).max().unwrap_or(0) + 1;
        let record = with_id(next_id, fields);
        records.push(record.clone());
        self.save(collection, &records)?;
        Ok(record)
    }

    fn update(&self, collection: Collection, id: i64, fields: Record) -> Result<Option<Record>> {
        let mut records = self.load(collection)?;
        let Some(existing) = records.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            existing.insert(key, value);
        }
        let updated = existing.clone();
        self.save(collection, &records)?;
        Ok(Some(updated))
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<bool> {
        let mut records = self.load(collection)?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.save(collection, &records)?;
        Ok(true)
    }

    fn increment(&self, collection: Collection, id: i64, field: &str) -> Result<Option<Record>> {
        let mapping = collection
            .spec()
            .field(field)
            .filter(|m| *m.sql_type == SqlType::Integer)
            .ok_or_else(|| anyhow!("{} has no counter named {}", collection, field))?;

        let mut records = self.load(collection)?;
        let Some(existing) = records.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        let current = match mapping.lookup(existing) {
            None | Some(Value::Null) => 0,
            Some(value) => match value.as_i64() {
                Some(n) => n,
                None => bail!("{} record {} has a non-numeric {}", collection, id, field),
            },
        };
        mapping.assign(existing, Value::from(current + 1));
        let updated = existing.clone();
        self.save(collection, &records)?;
        Ok(Some(updated))
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .load_settings()?
            .into_iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value))
    }

    fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load_settings()?;
        match entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value.to_string(),
            None => entries.push(SettingEntry {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        self.write_array(&self.settings_path(), &entries)
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(Collection::ALL
            .iter()
            .filter_map(|c| modified_time(&self.collection_path(*c)))
            .max())
    }
}

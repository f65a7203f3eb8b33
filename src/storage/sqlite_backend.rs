//! SQLite-backed storage.

use super::collection::{CollectionSpec, FieldMapping};
use super::schema::{ALL_TABLES, MHOUSE_TRACKS_TABLE, SETTINGS_TABLE, TRACKS_TABLE};
use super::{BackendMode, Collection, Record, StorageBackend};
use crate::sqlite_persistence::SqlType;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Relational backend: one table per collection, auto-increment ids,
/// counters incremented inside the database.
#[derive(Clone)]
pub struct SqliteBackend {
    db_path: PathBuf,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Vec<Arc<Mutex<Connection>>>,
    read_index: Arc<AtomicUsize>,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database and makes sure every table
    /// exists with the expected columns.
    pub fn open<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let write_conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        for table in ALL_TABLES {
            table
                .create_if_missing(&write_conn)
                .with_context(|| format!("Failed to create table {}", table.name))?;
            table
                .validate(&write_conn)
                .with_context(|| format!("Unexpected layout for table {}", table.name))?;
        }

        let counts = Collection::ALL
            .iter()
            .map(|c| {
                let count: i64 = write_conn
                    .query_row(
                        &format!("SELECT COUNT(*) FROM {}", c.spec().table.name),
                        [],
                        |r| r.get(0),
                    )
                    .unwrap_or(0);
                format!("{} {}", count, c)
            })
            .collect::<Vec<_>>();
        info!("Opened catalog database: {}", counts.join(", "));

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .context("Failed to open catalog database for reading")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteBackend {
            db_path: db_path.to_path_buf(),
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn select_sql(spec: &CollectionSpec) -> String {
        let mut columns = vec!["id"];
        columns.extend(spec.fields.iter().map(|f| f.column));
        format!("SELECT {} FROM {}", columns.join(", "), spec.table.name)
    }

    /// Reshapes a flat row into the nested record layout.
    fn row_to_record(spec: &CollectionSpec, row: &Row) -> rusqlite::Result<Record> {
        let mut record = Record::new();
        record.insert("id".to_string(), Value::from(row.get::<_, i64>(0)?));
        for (index, mapping) in spec.fields.iter().enumerate() {
            let value = match mapping.sql_type {
                SqlType::Text => row
                    .get::<_, Option<String>>(index + 1)?
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                SqlType::Integer => row
                    .get::<_, Option<i64>>(index + 1)?
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            };
            mapping.assign(&mut record, value);
        }
        Ok(record)
    }

    fn fetch(conn: &Connection, spec: &CollectionSpec, id: i64) -> Result<Option<Record>> {
        let sql = format!("{} WHERE id = ?1", Self::select_sql(spec));
        let record = conn
            .query_row(&sql, params![id], |row| Self::row_to_record(spec, row))
            .optional()?;
        Ok(record)
    }

    /// Columns and values for every mapped field present in `fields`.
    fn assignments(
        spec: &'static CollectionSpec,
        fields: &Record,
    ) -> Result<Vec<(&'static str, SqlValue)>> {
        spec.fields
            .iter()
            .filter_map(|mapping| mapping.lookup(fields).map(|value| (mapping, value)))
            .map(|(mapping, value)| Ok((mapping.column, to_sql_value(mapping, value)?)))
            .collect()
    }
}

fn to_sql_value(mapping: &FieldMapping, value: &Value) -> Result<SqlValue> {
    let sql_value = match (mapping.sql_type, value) {
        (_, Value::Null) => SqlValue::Null,
        (SqlType::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (SqlType::Text, other) => SqlValue::Text(other.to_string()),
        (SqlType::Integer, Value::Number(n)) => SqlValue::Integer(
            n.as_i64()
                .ok_or_else(|| anyhow!("Field {} expects an integer, got {}", mapping.field, n))?,
        ),
        (SqlType::Integer, Value::Bool(b)) => SqlValue::Integer(*b as i64),
        (SqlType::Integer, Value::String(s)) => {
            SqlValue::Integer(s.trim().parse::<i64>().with_context(|| {
                format!("Field {} expects an integer, got {:?}", mapping.field, s)
            })?)
        }
        (SqlType::Integer, other) => {
            bail!("Field {} expects an integer, got {}", mapping.field, other)
        }
    };
    Ok(sql_value)
}

impl StorageBackend for SqliteBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Sqlite
    }

    fn location(&self) -> String {
        self.db_path.display().to_string()
    }

    fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        let spec = collection.spec();
        let sql = format!("{} ORDER BY {}", Self::select_sql(spec), spec.order_by_sql());
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&sql)?;
        let records = stmt
            .query_map([], |row| Self::row_to_record(spec, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get(&self, collection: Collection, id: i64) -> Result<Option<Record>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        Self::fetch(&conn, collection.spec(), id)
    }

    fn insert(&self, collection: Collection, fields: Record) -> Result<Record> {
        let spec = collection.spec();
        let assignments = Self::assignments(spec, &fields)?;

        let conn = self.write_conn.lock().unwrap();
        if assignments.is_empty() {
            conn.execute(
                &format!("INSERT INTO {} DEFAULT VALUES", spec.table.name),
                [],
            )?;
        } else {
            let columns = assignments.iter().map(|(c, _)| *c).collect::<Vec<_>>();
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                spec.table.name,
                columns.join(", "),
                placeholders.join(", ")
            );
            conn.execute(&sql, params_from_iter(assignments.into_iter().map(|(_, v)| v)))
                .with_context(|| format!("Failed to insert into {}", spec.table.name))?;
        }

        let id = conn.last_insert_rowid();
        Self::fetch(&conn, spec, id)?
            .ok_or_else(|| anyhow!("Inserted {} record {} could not be read back", collection, id))
    }

    fn update(&self, collection: Collection, id: i64, fields: Record) -> Result<Option<Record>> {
        let spec = collection.spec();
        let assignments = Self::assignments(spec, &fields)?;

        let conn = self.write_conn.lock().unwrap();
        if !assignments.is_empty() {
            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}",
                spec.table.name,
                set_clause,
                assignments.len() + 1
            );
            let mut values = assignments.into_iter().map(|(_, v)| v).collect::<Vec<_>>();
            values.push(SqlValue::Integer(id));
            let changed = conn
                .execute(&sql, params_from_iter(values))
                .with_context(|| format!("Failed to update {} record {}", collection, id))?;
            if changed == 0 {
                return Ok(None);
            }
        }
        Self::fetch(&conn, spec, id)
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<bool> {
        let spec = collection.spec();
        let conn = self.write_conn.lock().unwrap();
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", spec.table.name),
            params![id],
        )?;
        Ok(deleted > 0)
    }

    fn increment(&self, collection: Collection, id: i64, field: &str) -> Result<Option<Record>> {
        let spec = collection.spec();
        let mapping = spec
            .field(field)
            .filter(|m| *m.sql_type == SqlType::Integer)
            .ok_or_else(|| anyhow!("{} has no counter named {}", collection, field))?;

        let conn = self.write_conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET {col} = {col} + 1 WHERE id = ?1",
                spec.table.name,
                col = mapping.column
            ),
            params![id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::fetch(&conn, spec, id)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let value: Option<Option<String>> = conn
            .query_row(
                &format!(
                    "SELECT key_value FROM {} WHERE key_name = ?1",
                    SETTINGS_TABLE.name
                ),
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (key_name, key_value) VALUES (?1, ?2) \
                 ON CONFLICT(key_name) DO UPDATE SET key_value = excluded.key_value",
                SETTINGS_TABLE.name
            ),
            params![key, value],
        )
        .with_context(|| format!("Failed to store setting {}", key))?;
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.get_read_conn();
        let conn = conn.lock().unwrap();
        let latest: Option<String> = conn.query_row(
            &format!(
                "SELECT MAX(upload_date) FROM \
                 (SELECT upload_date FROM {} UNION ALL SELECT upload_date FROM {})",
                TRACKS_TABLE.name, MHOUSE_TRACKS_TABLE.name
            ),
            [],
            |r| r.get(0),
        )?;
        Ok(latest.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_backend() -> (TempDir, SqliteBackend) {
        let dir = TempDir::new().unwrap();
        let backend = SqliteBackend::open(dir.path().join("catalog.db"), 2).unwrap();
        (dir, backend)
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn insert_assigns_sequential_ids_and_reshapes_stats() {
        let (_dir, backend) = open_backend();

        let first = backend
            .insert(Collection::Tracks, record(json!({ "title": "A", "genre": "House" })))
            .unwrap();
        let second = backend
            .insert(Collection::Tracks, record(json!({ "title": "B" })))
            .unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
        assert_eq!(first["genre"], json!("House"));
        assert_eq!(second["genre"], Value::Null);
        assert_eq!(
            first["stats"],
            json!({ "views": 0, "downloads": 0, "wavClicks": 0, "plays": 0 })
        );
    }

    #[test]
    fn update_only_touches_given_columns() {
        let (_dir, backend) = open_backend();
        backend
            .insert(
                Collection::Banners,
                record(json!({ "imagePath": "a.png", "linkUrl": "https://a", "displayOrder": 2 })),
            )
            .unwrap();

        let updated = backend
            .update(Collection::Banners, 1, record(json!({ "displayOrder": "7" })))
            .unwrap()
            .unwrap();
        assert_eq!(updated["imagePath"], json!("a.png"));
        assert_eq!(updated["linkUrl"], json!("https://a"));
        assert_eq!(updated["displayOrder"], json!(7));

        assert!(backend
            .update(Collection::Banners, 99, record(json!({ "displayOrder": 1 })))
            .unwrap()
            .is_none());
        assert!(backend
            .update(Collection::Banners, 99, Record::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_reports_missing_ids() {
        let (_dir, backend) = open_backend();
        backend
            .insert(Collection::Youtube, record(json!({ "videoId": "abc" })))
            .unwrap();

        assert!(!backend.delete(Collection::Youtube, 42).unwrap());
        assert_eq!(backend.list(Collection::Youtube).unwrap().len(), 1);
        assert!(backend.delete(Collection::Youtube, 1).unwrap());
        assert!(backend.list(Collection::Youtube).unwrap().is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (_dir, backend) = open_backend();
        backend
            .insert(Collection::Tracks, record(json!({ "title": "A" })))
            .unwrap();
        backend.delete(Collection::Tracks, 1).unwrap();
        let next = backend
            .insert(Collection::Tracks, record(json!({ "title": "B" })))
            .unwrap();
        assert_eq!(next["id"], json!(2));
    }

    #[test]
    fn increment_adds_one_in_place() {
        let (_dir, backend) = open_backend();
        backend
            .insert(Collection::Mhouse, record(json!({ "title": "A" })))
            .unwrap();

        for _ in 0..3 {
            backend.increment(Collection::Mhouse, 1, "plays").unwrap();
        }
        let updated = backend
            .increment(Collection::Mhouse, 1, "wavClicks")
            .unwrap()
            .unwrap();
        assert_eq!(updated["stats"]["plays"], json!(3));
        assert_eq!(updated["stats"]["wavClicks"], json!(1));
        assert_eq!(updated["stats"]["views"], json!(0));

        assert!(backend
            .increment(Collection::Mhouse, 7, "plays")
            .unwrap()
            .is_none());
        assert!(backend.increment(Collection::Mhouse, 1, "title").is_err());
    }

    #[test]
    fn settings_are_upserted() {
        let (_dir, backend) = open_backend();
        assert_eq!(backend.get_setting("master_password").unwrap(), None);

        backend.put_setting("master_password", "abc").unwrap();
        backend.put_setting("master_password", "def").unwrap();
        assert_eq!(
            backend.get_setting("master_password").unwrap(),
            Some("def".to_string())
        );
    }

    #[test]
    fn last_modified_follows_newest_upload() {
        let (_dir, backend) = open_backend();
        assert!(backend.last_modified().unwrap().is_none());

        backend
            .insert(
                Collection::Tracks,
                record(json!({ "title": "A", "uploadDate": "2024-01-01T00:00:00.000Z" })),
            )
            .unwrap();
        backend
            .insert(
                Collection::Mhouse,
                record(json!({ "title": "B", "uploadDate": "2024-06-01T00:00:00.000Z" })),
            )
            .unwrap();

        let latest = backend.last_modified().unwrap().unwrap();
        assert_eq!(latest.to_rfc3339(), "2024-06-01T00:00:00+00:00");
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let backend = SqliteBackend::open(&path, 1).unwrap();
            backend
                .insert(Collection::Tracks, record(json!({ "title": "A" })))
                .unwrap();
        }
        let backend = SqliteBackend::open(&path, 1).unwrap();
        assert_eq!(backend.list(Collection::Tracks).unwrap().len(), 1);
    }

    #[test]
    fn open_rejects_foreign_table_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE tracks (id INTEGER PRIMARY KEY, name TEXT)", [])
                .unwrap();
        }
        assert!(SqliteBackend::open(&path, 1).is_err());
    }
}

use log::{debug, warn};
use rusqlite::{Connection, params};
use serde_json::Value;
use std::fs::{self, File, create_dir_all};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Backend that persists raw JSON records, grouped by collection and keyed by id.
///
/// Implementations only move JSON around; typing, id assignment and validation
/// live in [`crate::repository::Collection`].
pub trait RecordStore: Send + Sync {
    /// Every record of a collection, in insertion order. A missing collection is empty.
    fn load(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Insert the record, or replace the one that already has this id.
    fn upsert(&self, collection: &str, id: u64, record: &Value) -> Result<(), StoreError>;

    /// Remove a record. Returns whether anything was removed.
    fn remove(&self, collection: &str, id: u64) -> Result<bool, StoreError>;
}

pub(crate) fn record_id(record: &Value) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// One `<collection>.json` file per collection, each holding a JSON list.
///
/// This is the same layout the browser client keeps in local storage, so a
/// data directory can be seeded from an exported client state.
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) a data directory.
    ///
    /// # Arguments
    /// * `dir` - Directory that will hold the collection files
    ///
    /// # Errors
    /// * Returns an error if the directory cannot be created
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }
        Ok(JsonFileStore {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    fn read_list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let path = self.path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut contents = String::new();
        File::open(&path)?.read_to_string(&mut contents)?;

        // A corrupt file reads as an empty collection
        match serde_json::from_str::<Vec<Value>>(&contents) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "ignoring unreadable collection file {}: {}",
                    path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn write_list(&self, collection: &str, records: &[Value]) -> Result<(), StoreError> {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
        }
        tmp.persist(self.path(collection)).map_err(|e| e.error)?;
        debug!("wrote {} {} record(s)", records.len(), collection);
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_list(collection)
    }

    fn upsert(&self, collection: &str, id: u64, record: &Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.read_list(collection)?;

        match records.iter_mut().find(|r| record_id(r) == Some(id)) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }

        self.write_list(collection, &records)
    }

    fn remove(&self, collection: &str, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.read_list(collection)?;

        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }

        self.write_list(collection, &records)?;
        Ok(true)
    }
}

/// Embedded SQLite backend: one row per record.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file, or `":memory:"` for a throwaway store.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }
}

fn sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Invalid(format!("id {} is out of range", id)))
}

impl RecordStore for SqliteStore {
    fn load(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt =
            conn.prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match serde_json::from_str(&body) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unreadable {} record {}: {}", collection, id, e),
            }
        }
        Ok(records)
    }

    fn upsert(&self, collection: &str, id: u64, record: &Value) -> Result<(), StoreError> {
        let body = serde_json::to_string(record)?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
            params![collection, sql_id(id)?, body],
        )?;
        Ok(())
    }

    fn remove(&self, collection: &str, id: u64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, sql_id(id)?],
        )?;
        Ok(changed > 0)
    }
}

use chrono::Utc;
use log::warn;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StoreError;
use crate::models::Record;
use crate::storage::{RecordStore, record_id};

/// How new record ids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// `max(existing) + 1`, starting at 1
    #[default]
    Sequential,
    /// Current Unix time in milliseconds, bumped past the current maximum if needed
    Timestamp,
}

impl IdStrategy {
    pub fn next_id(&self, max_existing: u64) -> Result<u64, StoreError> {
        let next = max_existing
            .checked_add(1)
            .ok_or_else(|| StoreError::Invalid(format!("no id left after {}", max_existing)))?;
        Ok(match self {
            IdStrategy::Sequential => next,
            IdStrategy::Timestamp => {
                let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
                now.max(next)
            }
        })
    }
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(IdStrategy::Sequential),
            "timestamp" => Ok(IdStrategy::Timestamp),
            other => Err(format!("unknown id strategy '{}'", other)),
        }
    }
}

/// Apply a shallow JSON merge patch: patch keys replace record keys, `id` is left alone.
pub fn merge_patch<T: Record>(record: &T, patch: &Map<String, Value>) -> Result<T, StoreError> {
    let mut value = serde_json::to_value(record)?;
    let Some(fields) = value.as_object_mut() else {
        return Err(StoreError::Invalid(format!(
            "{} record is not a JSON object",
            T::COLLECTION
        )));
    };
    for (key, patch_value) in patch {
        if key == "id" {
            continue;
        }
        fields.insert(key.clone(), patch_value.clone());
    }
    decode(value)
}

/// Decode a client-supplied JSON value into a record type.
pub fn decode<T: Record>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Invalid(format!("{}: {}", T::COLLECTION, e)))
}

/// One read of a collection: the records that decode, plus every stored value.
///
/// Ids and uniqueness rules are checked against `raw`, so stored records that
/// no longer match their type are never overwritten or ignored.
struct Snapshot<T> {
    records: Vec<T>,
    raw: Vec<Value>,
}

impl<T> Snapshot<T> {
    fn max_id(&self) -> u64 {
        self.raw.iter().filter_map(record_id).max().unwrap_or(0)
    }
}

/// Typed, record-level access to one collection of a [`RecordStore`].
///
/// Every read-modify-write runs under the collection's lock, so two callers in
/// the same process cannot overwrite each other's changes.
pub struct Collection<T: Record> {
    store: Arc<dyn RecordStore>,
    ids: IdStrategy,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Collection<T> {
    pub fn new(store: Arc<dyn RecordStore>, ids: IdStrategy) -> Self {
        Collection {
            store,
            ids,
            lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    fn snapshot(&self) -> Result<Snapshot<T>, StoreError> {
        let raw = self.store.load(T::COLLECTION)?;
        let mut records = Vec::with_capacity(raw.len());
        for value in &raw {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed {} record: {}", T::COLLECTION, e),
            }
        }
        Ok(Snapshot { records, raw })
    }

    fn save(&self, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.store.upsert(T::COLLECTION, record.id(), &value)
    }

    pub fn list(&self) -> Result<Vec<T>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.snapshot()?.records)
    }

    pub fn get(&self, id: u64) -> Result<Option<T>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| r.id() == id))
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Result<Option<T>, StoreError> {
        Ok(self.list()?.into_iter().find(|r| pred(r)))
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Result<Vec<T>, StoreError> {
        Ok(self.list()?.into_iter().filter(|r| pred(r)).collect())
    }

    /// Assign the next id and store a new record.
    pub fn insert(&self, record: T) -> Result<T, StoreError> {
        self.insert_checked(record, |_| Ok(()))
    }

    /// Like [`Collection::insert`], but `check` sees every stored record as raw
    /// JSON under the same lock, so uniqueness rules cannot race with other inserts.
    pub fn insert_checked(
        &self,
        mut record: T,
        check: impl FnOnce(&[Value]) -> Result<(), StoreError>,
    ) -> Result<T, StoreError> {
        record.validate()?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot()?;
        check(&snapshot.raw)?;

        record.set_id(self.ids.next_id(snapshot.max_id())?);
        self.save(&record)?;
        Ok(record)
    }

    /// Store a record under its own id, replacing any previous version.
    pub fn upsert(&self, record: &T) -> Result<(), StoreError> {
        record.validate()?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save(record)
    }

    /// Store `records` only when nothing at all is stored yet. Returns whether anything was written.
    pub fn seed(&self, records: &[T]) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.store.load(T::COLLECTION)?.is_empty() {
            return Ok(false);
        }
        for record in records {
            record.validate()?;
            self.save(record)?;
        }
        Ok(true)
    }

    /// Merge `patch` into the first record matching `pred`. `Ok(None)` when nothing matches.
    pub fn update_where(
        &self,
        pred: impl Fn(&T) -> bool,
        patch: &Map<String, Value>,
    ) -> Result<Option<T>, StoreError> {
        self.update_checked(pred, patch, |_, _| Ok::<(), StoreError>(()))
    }

    /// Like [`Collection::update_where`]; `check` gets the merged record and
    /// every other stored record (raw) before anything is written.
    pub fn update_checked<E: From<StoreError>>(
        &self,
        pred: impl Fn(&T) -> bool,
        patch: &Map<String, Value>,
        check: impl FnOnce(&T, &[Value]) -> Result<(), E>,
    ) -> Result<Option<T>, E> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot()?;
        let Some(current) = snapshot.records.into_iter().find(|r| pred(r)) else {
            return Ok(None);
        };
        let others: Vec<Value> = snapshot
            .raw
            .into_iter()
            .filter(|value| record_id(value) != Some(current.id()))
            .collect();

        let updated = merge_patch(&current, patch)?;
        updated.validate()?;
        check(&updated, &others)?;
        self.save(&updated)?;
        Ok(Some(updated))
    }

    pub fn update(&self, id: u64, patch: &Map<String, Value>) -> Result<Option<T>, StoreError> {
        self.update_where(|r| r.id() == id, patch)
    }

    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.remove(T::COLLECTION, id)
    }

    /// Delete a record after `check` approves its current state.
    ///
    /// Returns `Ok(false)` when no record has this id.
    pub fn delete_if<E: From<StoreError>>(
        &self,
        id: u64,
        check: impl FnOnce(&T) -> Result<(), E>,
    ) -> Result<bool, E> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = self.snapshot()?.records.into_iter().find(|r| r.id() == id) else {
            return Ok(false);
        };
        check(&current)?;
        Ok(self.store.remove(T::COLLECTION, id)?)
    }

    /// Keep the records matching `keep` and delete the rest.
    ///
    /// Returns the kept records together with the number removed. Stored
    /// values that do not decode are left alone.
    pub fn retain(&self, keep: impl Fn(&T) -> bool) -> Result<(Vec<T>, usize), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (kept, dropped): (Vec<T>, Vec<T>) =
            self.snapshot()?.records.into_iter().partition(|r| keep(r));
        for record in &dropped {
            self.store.remove(T::COLLECTION, record.id())?;
        }
        Ok((kept, dropped.len()))
    }
}

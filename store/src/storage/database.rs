//! High-level database interface.
//!
//! Pairs the B-tree index with the record store: every key in the index has
//! exactly one record, and every public operation keeps it that way.
//! Persistence is explicit: nothing touches disk until [`Database::save`].
//!
//! # Files
//!
//! A persistent database lives in a directory holding:
//! - `index.json`: the whole-tree snapshot (see [`crate::storage::snapshot`])
//! - `records.json`: the payloads, as `[{ "key": .., "value": .. }, ..]`

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::storage::btree::{BTree, BTreeError, render};
use crate::storage::observer::{NoopObserver, OperationEvent, OperationKind, OperationObserver};
use crate::storage::records::{MemoryRecordStore, RecordStore};
use crate::storage::snapshot::{self, SnapshotError};
use crate::storage::time::{SystemTimeSource, TimeSource};

/// Key type of the record store.
pub type Key = i64;

/// File name of the index snapshot inside the data directory.
pub const INDEX_FILE: &str = "index.json";
/// File name of the records document inside the data directory.
pub const RECORDS_FILE: &str = "records.json";

/// Keys produced by [`Database::generate`] fall in `0..GENERATED_KEY_RANGE`.
pub const GENERATED_KEY_RANGE: Key = 1000;

/// A database instance.
///
/// This is the main entry point for the record store. It owns the index, the
/// records, and the observer that is told about every operation.
pub struct Database {
    index: BTree<Key>,
    records: MemoryRecordStore<Key, String>,
    directory: Option<PathBuf>,
    observer: Box<dyn OperationObserver>,
    time_source: Box<dyn TimeSource>,
}

/// Outcome of [`Database::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateReport {
    /// Records actually inserted.
    pub inserted: usize,
    /// Random keys skipped because they already existed.
    pub duplicates: usize,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    key: Key,
    value: &'a str,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordEntry {
    key: Key,
    value: String,
}

impl Database {
    /// Create an empty database that is never written to disk.
    pub fn in_memory(order: usize) -> Result<Self, DatabaseError> {
        Ok(Self::from_parts(BTree::new(order)?, MemoryRecordStore::new(), None))
    }

    /// Open the database stored in `directory`.
    ///
    /// Missing files yield an empty database of the given order. A snapshot
    /// written with a different order keeps its own order.
    pub fn open(directory: &Path, order: usize) -> Result<Self, DatabaseError> {
        let index: BTree<Key> = snapshot::load(&directory.join(INDEX_FILE), order)?;
        let records = load_records(&directory.join(RECORDS_FILE))?;

        if records.len() != index.len()
            || records.entries().iter().any(|&(key, _)| !index.contains(key))
        {
            return Err(SnapshotError::Corrupt {
                reason: format!(
                    "index holds {} keys but records file holds {} records",
                    index.len(),
                    records.len()
                ),
            }
            .into());
        }
        if index.order() != order {
            tracing::warn!(
                "snapshot order {} differs from configured order {order}; keeping {}",
                index.order(),
                index.order()
            );
        }

        tracing::info!(
            "Opened database at {} ({} records, order {})",
            directory.display(),
            records.len(),
            index.order()
        );
        Ok(Self::from_parts(index, records, Some(directory.to_path_buf())))
    }

    fn from_parts(
        index: BTree<Key>,
        records: MemoryRecordStore<Key, String>,
        directory: Option<PathBuf>,
    ) -> Self {
        Self {
            index,
            records,
            directory,
            observer: Box::new(NoopObserver),
            time_source: Box::new(SystemTimeSource::new()),
        }
    }

    /// Replace the operation observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl OperationObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Replace the clock used to time operations.
    #[must_use]
    pub fn with_time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Box::new(time_source);
        self
    }

    /// The key index.
    #[must_use]
    pub const fn index(&self) -> &BTree<Key> {
        &self.index
    }

    /// The record payloads.
    #[must_use]
    pub const fn records(&self) -> &MemoryRecordStore<Key, String> {
        &self.records
    }

    /// Data directory, if the database is persistent.
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the database holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::DuplicateKey`] if a record with `key` already exists.
    pub fn insert(&mut self, key: Key, value: String) -> Result<(), DatabaseError> {
        self.observe(OperationKind::Insert, |db| db.insert_record(key, value))
    }

    /// Look up the payload of a record.
    pub fn select(&mut self, key: Key) -> Result<&str, DatabaseError> {
        self.observe(OperationKind::Select, |db| db.find(key).map(|_| ()))?;
        self.find(key)
    }

    /// Replace the payload of an existing record, returning the old payload.
    pub fn update(&mut self, key: Key, value: String) -> Result<String, DatabaseError> {
        self.observe(OperationKind::Update, |db| {
            if !db.records.exists(&key) {
                return Err(DatabaseError::KeyNotFound(key));
            }
            db.records
                .put(key, value)
                .ok_or(DatabaseError::KeyNotFound(key))
        })
    }

    /// Delete a record from both the index and the record store.
    pub fn delete(&mut self, key: Key) -> Result<String, DatabaseError> {
        self.observe(OperationKind::Delete, |db| {
            db.index.delete(&key).map_err(|e| match e {
                BTreeError::KeyNotFound => DatabaseError::KeyNotFound(key),
                other => DatabaseError::Tree(other),
            })?;
            db.records
                .remove(&key)
                .ok_or(DatabaseError::KeyNotFound(key))
        })
    }

    /// Insert `count` records with random keys in `0..GENERATED_KEY_RANGE`.
    ///
    /// Keys that already exist are skipped and counted as duplicates.
    pub fn generate(
        &mut self,
        count: usize,
        rng: &mut impl Rng,
    ) -> Result<GenerateReport, DatabaseError> {
        self.observe(OperationKind::Generate, |db| {
            let mut report = GenerateReport {
                inserted: 0,
                duplicates: 0,
            };
            for _ in 0..count {
                let key = rng.random_range(0..GENERATED_KEY_RANGE);
                match db.insert_record(key, format!("Value {key}")) {
                    Ok(()) => report.inserted += 1,
                    Err(DatabaseError::DuplicateKey(_)) => report.duplicates += 1,
                    Err(e) => return Err(e),
                }
            }
            tracing::debug!(
                "generated {} records ({} duplicate keys skipped)",
                report.inserted,
                report.duplicates
            );
            Ok(report)
        })
    }

    /// Remove every record, keeping the index order.
    pub fn clear(&mut self) -> Result<(), DatabaseError> {
        self.observe(OperationKind::Clear, |db| {
            db.index.clear();
            db.records.clear();
            Ok(())
        })
    }

    /// Write the index snapshot and the records to the data directory.
    ///
    /// Both files are replaced wholesale.
    pub fn save(&mut self) -> Result<(), DatabaseError> {
        self.observe(OperationKind::Save, |db| {
            let directory = db.directory.as_deref().ok_or(DatabaseError::InMemory)?;
            fs::create_dir_all(directory).map_err(SnapshotError::Io)?;

            snapshot::save(&db.index, &directory.join(INDEX_FILE))?;
            let records: Vec<RecordRef<'_>> = db
                .records
                .entries()
                .into_iter()
                .map(|(&key, value)| RecordRef { key, value })
                .collect();
            snapshot::write_json_atomic(&directory.join(RECORDS_FILE), &records)?;

            tracing::info!(
                "Saved {} records to {}",
                records.len(),
                directory.display()
            );
            Ok(())
        })
    }

    /// The indented per-level listing of the index.
    #[must_use]
    pub fn render_index(&self) -> String {
        render(&self.index)
    }

    /// The records as a tab-separated table sorted by key.
    #[must_use]
    pub fn render_table(&self) -> String {
        let mut out = String::from("Key\tValue\n-----------------\n");
        for (key, value) in self.records.entries() {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{key}\t{value}");
        }
        out.push_str("-----------------\n");
        out
    }

    fn insert_record(&mut self, key: Key, value: String) -> Result<(), DatabaseError> {
        if self.records.exists(&key) {
            return Err(DatabaseError::DuplicateKey(key));
        }
        self.index.insert(key);
        self.records.put(key, value);
        Ok(())
    }

    fn find(&self, key: Key) -> Result<&str, DatabaseError> {
        if self.index.search(&key).is_none() {
            return Err(DatabaseError::KeyNotFound(key));
        }
        self.records
            .get(&key)
            .map(String::as_str)
            .ok_or(DatabaseError::KeyNotFound(key))
    }

    /// Run `op`, then report it to the observer.
    fn observe<T>(
        &mut self,
        kind: OperationKind,
        op: impl FnOnce(&mut Self) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let nodes_before = self.index.node_count();
        let start = self.time_source.now();

        let result = op(self);

        let event = OperationEvent {
            kind,
            duration: self.time_source.now().saturating_sub(start),
            nodes_delta: node_delta(nodes_before, self.index.node_count()),
            succeeded: result.is_ok(),
        };
        self.observer.on_operation(&event);
        result
    }
}

fn node_delta(before: usize, after: usize) -> isize {
    if after >= before {
        isize::try_from(after - before).unwrap_or(isize::MAX)
    } else {
        isize::try_from(before - after).map_or(isize::MIN, |d| -d)
    }
}

fn load_records(path: &Path) -> Result<MemoryRecordStore<Key, String>, SnapshotError> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(MemoryRecordStore::new());
        }
        Err(e) => return Err(SnapshotError::Io(e)),
    };
    let entries: Vec<RecordEntry> =
        serde_json::from_str(&json).map_err(|e| SnapshotError::Corrupt {
            reason: format!("unreadable records file: {e}"),
        })?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect())
}

/// Errors that can occur during database operations.
#[derive(Debug)]
pub enum DatabaseError {
    /// A record with this key already exists.
    DuplicateKey(Key),
    /// No record with this key exists.
    KeyNotFound(Key),
    /// The database has no data directory to save to.
    InMemory,
    /// Index error.
    Tree(BTreeError),
    /// Snapshot error.
    Snapshot(SnapshotError),
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "key {key} already exists"),
            Self::KeyNotFound(key) => write!(f, "key {key} not found"),
            Self::InMemory => write!(f, "database has no data directory"),
            Self::Tree(e) => write!(f, "index error: {e}"),
            Self::Snapshot(e) => write!(f, "snapshot error: {e}"),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(e) => Some(e),
            Self::Snapshot(e) => Some(e),
            Self::DuplicateKey(_) | Self::KeyNotFound(_) | Self::InMemory => None,
        }
    }
}

impl From<BTreeError> for DatabaseError {
    fn from(e: BTreeError) -> Self {
        Self::Tree(e)
    }
}

impl From<SnapshotError> for DatabaseError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    use super::*;
    use crate::simulation::SimulatedTimeSource;
    use crate::storage::observer::RecordingObserver;

    fn database() -> Database {
        Database::in_memory(5).expect("valid order")
    }

    #[test]
    fn test_insert_select_update_delete() {
        let mut db = database();

        db.insert(10, "Record A".to_string()).expect("insert");
        db.insert(20, "Record B".to_string()).expect("insert");
        db.insert(5, "Record C".to_string()).expect("insert");

        assert_eq!(db.select(10).expect("select"), "Record A");
        assert!(matches!(db.select(15), Err(DatabaseError::KeyNotFound(15))));

        let old = db.update(20, "Record B updated".to_string()).expect("update");
        assert_eq!(old, "Record B");
        assert_eq!(db.select(20).expect("select"), "Record B updated");

        assert_eq!(db.delete(5).expect("delete"), "Record C");
        assert!(matches!(db.select(5), Err(DatabaseError::KeyNotFound(5))));
        assert_eq!(db.len(), 2);
        db.index().check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut db = database();
        db.insert(1, "first".to_string()).expect("insert");

        let err = db.insert(1, "second".to_string()).expect_err("duplicate");
        assert!(matches!(err, DatabaseError::DuplicateKey(1)));
        assert_eq!(db.select(1).expect("select"), "first");
        assert_eq!(db.index().len(), 1);
    }

    #[test]
    fn test_update_missing_key() {
        let mut db = database();
        let err = db.update(3, "x".to_string()).expect_err("missing");
        assert!(matches!(err, DatabaseError::KeyNotFound(3)));
        assert!(db.records().is_empty());
    }

    #[test]
    fn test_delete_errors() {
        let mut db = database();
        assert!(matches!(
            db.delete(5),
            Err(DatabaseError::Tree(BTreeError::EmptyTreeDelete))
        ));

        db.insert(10, "a".to_string()).expect("insert");
        assert!(matches!(db.delete(15), Err(DatabaseError::KeyNotFound(15))));
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_generate_counts_duplicates() {
        let mut db = database();
        let mut rng = StdRng::seed_from_u64(1);

        let report = db.generate(2_000, &mut rng).expect("generate");

        assert_eq!(report.inserted + report.duplicates, 2_000);
        assert!(report.duplicates > 0);
        assert_eq!(db.len(), report.inserted);
        assert_eq!(db.records().len(), report.inserted);
        assert!(db.index().keys().iter().all(|&&k| (0..GENERATED_KEY_RANGE).contains(&k)));
        for key in db.index().keys() {
            assert_eq!(db.records().get(key), Some(&format!("Value {key}")));
        }
        db.index().check_invariants().expect("invariants hold");
    }

    #[test]
    fn test_clear() {
        let mut db = database();
        db.generate(50, &mut StdRng::seed_from_u64(2)).expect("generate");

        db.clear().expect("clear");

        assert!(db.is_empty());
        assert!(db.records().is_empty());
        assert_eq!(db.index().order(), 5);
    }

    #[test]
    fn test_observer_sees_every_operation() {
        let observer = RecordingObserver::new();
        let mut db = database()
            .with_observer(observer.clone())
            .with_time_source(SimulatedTimeSource::new(Duration::from_micros(10)));

        for key in 1..=5 {
            db.insert(key, key.to_string()).expect("insert");
        }
        let _ = db.select(42);
        db.delete(1).expect("delete");

        let events = observer.events();
        assert_eq!(events.len(), 7);
        assert!(events.iter().all(|e| e.duration == Duration::from_micros(10)));

        // The fifth insert splits the root: new root plus new sibling.
        assert_eq!(events[4].kind, OperationKind::Insert);
        assert_eq!(events[4].nodes_delta, 2);
        assert_eq!(events[5].kind, OperationKind::Select);
        assert!(!events[5].succeeded);
        assert_eq!(events[6].kind, OperationKind::Delete);
        assert_eq!(events[6].nodes_delta, 0);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempdir().expect("create temp dir");
        {
            let mut db = Database::open(dir.path(), 4).expect("open");
            db.generate(300, &mut StdRng::seed_from_u64(3)).expect("generate");
            let first = *db.index().keys()[0];
            db.delete(first).expect("delete");
            db.save().expect("save");
        }

        let before = {
            let mut db = Database::open(dir.path(), 4).expect("reopen");
            db.index().check_invariants().expect("invariants hold");
            let key = *db.index().keys()[0];
            assert_eq!(db.select(key).expect("select"), format!("Value {key}"));
            db.render_table()
        };

        // Order from the snapshot wins over the configured order.
        let db = Database::open(dir.path(), 9).expect("reopen");
        assert_eq!(db.index().order(), 4);
        assert_eq!(db.render_table(), before);
    }

    #[test]
    fn test_open_rejects_mismatched_records() {
        let dir = tempdir().expect("create temp dir");
        {
            let mut db = Database::open(dir.path(), 4).expect("open");
            db.insert(1, "one".to_string()).expect("insert");
            db.insert(2, "two".to_string()).expect("insert");
            db.save().expect("save");
        }
        fs::write(dir.path().join(RECORDS_FILE), r#"[{"key": 1, "value": "one"}]"#)
            .expect("write");

        let err = Database::open(dir.path(), 4).err().expect("mismatch");
        assert!(matches!(
            err,
            DatabaseError::Snapshot(SnapshotError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_save_in_memory_database() {
        let mut db = database();
        assert!(matches!(db.save(), Err(DatabaseError::InMemory)));
    }

    #[test]
    fn test_render_table() {
        let mut db = database();
        db.insert(2, "b".to_string()).expect("insert");
        db.insert(1, "a".to_string()).expect("insert");

        assert_eq!(
            db.render_table(),
            "Key\tValue\n-----------------\n1\ta\n2\tb\n-----------------\n"
        );
        assert_eq!(db.render_index(), "Level 0: 1, 2\n");
    }

    #[test]
    fn test_node_delta() {
        assert_eq!(node_delta(3, 5), 2);
        assert_eq!(node_delta(5, 3), -2);
        assert_eq!(node_delta(4, 4), 0);
    }
}

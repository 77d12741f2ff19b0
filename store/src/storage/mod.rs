//! Record store storage engine.
//!
//! An in-memory B-tree index paired with a key → payload map, persisted on
//! request as two JSON documents.
//!
//! # Layout
//!
//! - [`btree`]: the index engine (nodes, insert/delete, validation, rendering)
//! - [`snapshot`]: whole-tree JSON codec and file persistence
//! - [`records`]: payload storage behind the [`RecordStore`] trait
//! - [`database`]: the orchestrator keeping index and records in step
//! - [`observer`]: per-operation callbacks
//! - [`time`]: clock abstraction used to time operations
//!
//! # Usage
//!
//! ```
//! use store::storage::Database;
//!
//! let mut db = Database::in_memory(4)?;
//! db.insert(7, "seven".to_string())?;
//! assert_eq!(db.select(7)?, "seven");
//! # Ok::<(), store::storage::DatabaseError>(())
//! ```

pub mod btree;
pub mod database;
pub mod observer;
pub mod records;
pub mod snapshot;
pub mod time;

pub use btree::{BTree, BTreeError};
pub use database::{Database, DatabaseError, GenerateReport, Key};
pub use observer::{OperationEvent, OperationKind, OperationObserver, TracingObserver};
pub use records::{MemoryRecordStore, RecordStore};
pub use snapshot::SnapshotError;
pub use time::{SystemTimeSource, TimeSource};

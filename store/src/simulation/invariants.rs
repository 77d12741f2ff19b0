//! Invariant checking for deterministic simulation testing.
//!
//! The simulator replays every operation against a [`ExpectedState`] model
//! (a `BTreeMap`) and asks the [`InvariantChecker`] to compare the database
//! with it after each step.

use std::collections::BTreeMap;

use super::workload::Operation;
use crate::storage::btree::BTreeError;
use crate::storage::{Database, DatabaseError, Key, snapshot};

/// What the model says an operation should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// Success, with the payload the operation hands back (if any).
    Done(Option<String>),
    DuplicateKey,
    KeyNotFound,
    /// Delete on an empty database.
    EmptyTree,
}

/// Model of what the database should contain.
#[derive(Debug, Default)]
pub struct ExpectedState {
    records: BTreeMap<Key, String>,
}

impl ExpectedState {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `operation` to the model and return the expected outcome.
    #[allow(clippy::disallowed_methods)] // The model keeps its own copy of each payload
    pub fn apply(&mut self, operation: &Operation) -> Expected {
        match operation {
            Operation::Insert { key, value } => {
                if self.records.contains_key(key) {
                    return Expected::DuplicateKey;
                }
                self.records.insert(*key, value.clone());
                Expected::Done(None)
            }
            Operation::Select { key } => self
                .records
                .get(key)
                .map_or(Expected::KeyNotFound, |v| Expected::Done(Some(v.clone()))),
            Operation::Update { key, value } => self
                .records
                .get_mut(key)
                .map_or(Expected::KeyNotFound, |slot| {
                    Expected::Done(Some(std::mem::replace(slot, value.clone())))
                }),
            Operation::Delete { key } => {
                if self.records.is_empty() {
                    return Expected::EmptyTree;
                }
                self.records
                    .remove(key)
                    .map_or(Expected::KeyNotFound, |v| Expected::Done(Some(v)))
            }
            Operation::Clear => {
                self.records.clear();
                Expected::Done(None)
            }
        }
    }

    /// Number of records the database should hold.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the database should be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An invariant violation detected during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Checker for database invariants.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<Violation>,
}

impl InvariantChecker {
    /// Create a new invariant checker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Get all violations.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Check if any violations were detected.
    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Add a violation.
    pub fn add_violation(
        &mut self,
        operation_index: usize,
        description: impl Into<String>,
        context: String,
    ) {
        self.violations.push(Violation {
            description: description.into(),
            operation_index,
            context,
        });
    }

    /// Check that the database returned what the model expected.
    pub fn check_outcome(
        &mut self,
        operation_index: usize,
        expected: &Expected,
        actual: &Result<Option<String>, DatabaseError>,
    ) {
        let matches = match (expected, actual) {
            (Expected::Done(want), Ok(got)) => want == got,
            (Expected::DuplicateKey, Err(DatabaseError::DuplicateKey(_)))
            | (Expected::KeyNotFound, Err(DatabaseError::KeyNotFound(_)))
            | (Expected::EmptyTree, Err(DatabaseError::Tree(BTreeError::EmptyTreeDelete))) => true,
            _ => false,
        };
        if !matches {
            self.add_violation(
                operation_index,
                "outcome differs from model",
                format!("expected {expected:?}, got {actual:?}"),
            );
        }
    }

    /// Check the database structure and contents against the model.
    pub fn check_database(&mut self, operation_index: usize, db: &Database, model: &ExpectedState) {
        if let Err(e) = db.index().check_invariants() {
            self.add_violation(operation_index, "tree invariant broken", e.to_string());
        }
        if db.len() != model.len() || db.records().len() != model.len() {
            self.add_violation(
                operation_index,
                "record count differs from model",
                format!(
                    "index {} records {} model {}",
                    db.len(),
                    db.records().len(),
                    model.len()
                ),
            );
        }
        if !db.index().keys().into_iter().eq(model.records.keys()) {
            self.add_violation(
                operation_index,
                "index keys differ from model",
                String::new(),
            );
        }
        if !db.records().entries().into_iter().eq(model.records.iter()) {
            self.add_violation(
                operation_index,
                "record payloads differ from model",
                String::new(),
            );
        }
    }

    /// Check that the index survives a snapshot round trip unchanged.
    pub fn check_snapshot(&mut self, operation_index: usize, db: &Database) {
        let restored = snapshot::to_json(db.index()).and_then(|json| snapshot::from_json::<Key>(&json));
        match restored {
            Ok(tree) => {
                if tree.order() != db.index().order() || tree.root() != db.index().root() {
                    self.add_violation(
                        operation_index,
                        "snapshot round trip changed the tree",
                        String::new(),
                    );
                }
            }
            Err(e) => {
                self.add_violation(operation_index, "snapshot round trip failed", e.to_string());
            }
        }
    }
}

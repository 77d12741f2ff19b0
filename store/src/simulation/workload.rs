//! Workload generator for deterministic simulation testing.
//!
//! This module generates random but reproducible sequences of database
//! operations. Keys are drawn from a small range so that inserts collide,
//! deletes hit existing keys, and the tree repeatedly grows and shrinks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::Key;

/// Configuration for workload generation.
///
/// The four weights are relative; they need not sum to anything.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Keys are drawn from `0..key_range`.
    pub key_range: Key,
    pub insert_weight: u32,
    pub select_weight: u32,
    pub update_weight: u32,
    pub delete_weight: u32,
    /// Probability of a `Clear` instead of a weighted operation (0.0 - 1.0).
    pub clear_rate: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            key_range: 200,
            insert_weight: 5,
            select_weight: 2,
            update_weight: 1,
            delete_weight: 4,
            clear_rate: 0.0,
        }
    }
}

impl WorkloadConfig {
    const fn total_weight(&self) -> u32 {
        self.insert_weight + self.select_weight + self.update_weight + self.delete_weight
    }
}

/// One generated operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert { key: Key, value: String },
    Select { key: Key },
    Update { key: Key, value: String },
    Delete { key: Key },
    Clear,
}

/// Generator for random [`Operation`] sequences.
///
/// Produces the same sequence for the same seed and configuration.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
    /// Next value serial, so every written payload is distinct.
    next_serial: u64,
}

impl WorkloadGenerator {
    /// Create a generator with the default configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    /// Create a generator with a custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_serial: 0,
        }
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        if self.config.clear_rate > 0.0 && self.rng.random_bool(self.config.clear_rate.min(1.0)) {
            return Operation::Clear;
        }

        let key = self.random_key();
        let total = self.config.total_weight().max(1);
        let mut pick = self.rng.random_range(0..total);

        if pick < self.config.insert_weight {
            return Operation::Insert {
                key,
                value: self.next_value(),
            };
        }
        pick -= self.config.insert_weight;
        if pick < self.config.select_weight {
            return Operation::Select { key };
        }
        pick -= self.config.select_weight;
        if pick < self.config.update_weight {
            return Operation::Update {
                key,
                value: self.next_value(),
            };
        }
        Operation::Delete { key }
    }

    fn random_key(&mut self) -> Key {
        self.rng.random_range(0..self.config.key_range.max(1))
    }

    fn next_value(&mut self) -> String {
        self.next_serial += 1;
        format!("value-{}", self.next_serial)
    }
}

//! Main simulator harness for deterministic simulation testing.
//!
//! This module ties together the workload generator, the model and the
//! invariant checker, and drives a fresh in-memory database with them.

use std::time::Duration;

use super::invariants::{ExpectedState, InvariantChecker, Violation};
use super::time::SimulatedTimeSource;
use super::workload::{Operation, WorkloadConfig, WorkloadGenerator};
use crate::storage::observer::RecordingObserver;
use crate::storage::{Database, DatabaseError};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Order of the index under test.
    pub order: usize,
    /// Workload generation configuration.
    pub workload: WorkloadConfig,
    /// Round-trip the index through a snapshot every this many operations.
    /// `None` disables the check.
    pub snapshot_interval: Option<usize>,
    /// Simulated time per clock reading.
    pub time_step: Duration,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            order: 5,
            workload: WorkloadConfig::default(),
            snapshot_interval: Some(50),
            time_step: Duration::from_micros(1),
        }
    }

    /// Set the index order.
    #[must_use]
    pub const fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Set the workload configuration.
    #[must_use]
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the snapshot check interval.
    #[must_use]
    pub const fn with_snapshot_interval(mut self, interval: Option<usize>) -> Self {
        self.snapshot_interval = interval;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations processed.
    pub operations_processed: u64,
    /// Number of operations that returned `Ok`.
    pub successful_operations: u64,
    /// Number of operations that returned an expected error.
    pub failed_operations: u64,
    /// Records left at the end of the run.
    pub final_len: usize,
    /// Height of the index at the end of the run.
    pub final_height: usize,
    /// Invariant violations detected.
    pub invariant_violations: Vec<Violation>,
    /// Error message if the simulation could not start.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (started, and no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.error.is_none() && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    workload: WorkloadGenerator,
    model: ExpectedState,
    checker: InvariantChecker,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // The generator keeps its own copy of the workload config
    pub fn new(config: SimulatorConfig) -> Self {
        let workload = WorkloadGenerator::with_config(config.seed, config.workload.clone());
        Self {
            config,
            workload,
            model: ExpectedState::new(),
            checker: InvariantChecker::new(),
        }
    }

    /// Run the simulation for a given number of operations.
    ///
    /// This creates a fresh database, applies the operations, and checks
    /// invariants after each one.
    #[allow(clippy::disallowed_methods)] // Observer handle and violation list are shared copies
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        self.model = ExpectedState::new();
        self.checker = InvariantChecker::new();
        let observer = RecordingObserver::new();
        let mut db = match Database::in_memory(self.config.order) {
            Ok(db) => db
                .with_observer(observer.clone())
                .with_time_source(SimulatedTimeSource::new(self.config.time_step)),
            Err(e) => {
                return SimulationResult {
                    seed: self.config.seed,
                    operations_processed: 0,
                    successful_operations: 0,
                    failed_operations: 0,
                    final_len: 0,
                    final_height: 0,
                    invariant_violations: vec![],
                    error: Some(format!("Failed to create database: {e}")),
                };
            }
        };

        let mut successful_operations = 0;
        let mut failed_operations = 0;
        for index in 0..operation_count {
            let operation = self.workload.next_operation();
            let expected = self.model.apply(&operation);
            let actual = apply(&mut db, operation);

            if actual.is_ok() {
                successful_operations += 1;
            } else {
                failed_operations += 1;
            }

            self.checker.check_outcome(index, &expected, &actual);
            self.checker.check_database(index, &db, &self.model);
            if let Some(interval) = self.config.snapshot_interval
                && interval > 0
                && (index + 1).is_multiple_of(interval)
            {
                self.checker.check_snapshot(index, &db);
            }
        }

        let reported = observer.events().len();
        if reported != operation_count {
            self.checker.add_violation(
                operation_count,
                "observer missed operations",
                format!("{reported} events for {operation_count} operations"),
            );
        }

        tracing::debug!(
            seed = self.config.seed,
            operations = operation_count,
            records = db.len(),
            height = db.index().height(),
            "simulation finished"
        );

        SimulationResult {
            seed: self.config.seed,
            operations_processed: successful_operations + failed_operations,
            successful_operations,
            failed_operations,
            final_len: db.len(),
            final_height: db.index().height(),
            invariant_violations: self.checker.violations().to_vec(),
            error: None,
        }
    }

    /// Get the invariant checker.
    #[must_use]
    pub const fn checker(&self) -> &InvariantChecker {
        &self.checker
    }
}

/// Run one operation, normalizing its result to the payload it returned.
fn apply(db: &mut Database, operation: Operation) -> Result<Option<String>, DatabaseError> {
    match operation {
        Operation::Insert { key, value } => db.insert(key, value).map(|()| None),
        Operation::Select { key } => db.select(key).map(|value| Some(value.to_string())),
        Operation::Update { key, value } => db.update(key, value).map(Some),
        Operation::Delete { key } => db.delete(key).map(Some),
        Operation::Clear => db.clear().map(|()| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_basic() {
        let mut simulator = Simulator::new(SimulatorConfig::new(12345));

        let result = simulator.run(500);

        assert_eq!(result.operations_processed, 500);
        assert!(result.successful_operations > 0);
        assert!(result.failed_operations > 0);
        assert!(
            result.passed(),
            "Simulation should pass: {:?}",
            result.invariant_violations
        );
    }

    #[test]
    fn test_simulator_deterministic() {
        let result1 = Simulator::new(SimulatorConfig::new(777)).run(300);
        let result2 = Simulator::new(SimulatorConfig::new(777)).run(300);

        assert_eq!(result1.successful_operations, result2.successful_operations);
        assert_eq!(result1.failed_operations, result2.failed_operations);
        assert_eq!(result1.final_len, result2.final_len);
        assert_eq!(result1.final_height, result2.final_height);
    }

    #[test]
    fn test_simulator_across_orders() {
        for order in [4, 5, 6, 7, 9, 16] {
            for seed in 0..4 {
                let config = SimulatorConfig::new(seed).with_order(order);
                let result = Simulator::new(config).run(1_000);
                assert!(
                    result.passed(),
                    "order {order} seed {seed}: {:?}",
                    result.invariant_violations
                );
            }
        }
    }

    #[test]
    fn test_simulator_insert_only() {
        let inserts = WorkloadConfig {
            key_range: 500,
            insert_weight: 1,
            select_weight: 0,
            update_weight: 0,
            delete_weight: 0,
            ..WorkloadConfig::default()
        };
        let mut simulator = Simulator::new(
            SimulatorConfig::new(5).with_order(4).with_workload(inserts),
        );
        let result = simulator.run(2_000);
        assert!(result.passed(), "{:?}", result.invariant_violations);
        assert!(result.final_height > 3);
    }

    #[test]
    fn test_simulator_with_clears() {
        let workload = WorkloadConfig {
            clear_rate: 0.01,
            ..WorkloadConfig::default()
        };
        let config = SimulatorConfig::new(99)
            .with_workload(workload)
            .with_snapshot_interval(Some(7));
        let result = Simulator::new(config).run(2_000);
        assert!(result.passed(), "{:?}", result.invariant_violations);
    }

    #[test]
    fn test_simulator_invalid_order() {
        let result = Simulator::new(SimulatorConfig::new(1).with_order(2)).run(10);
        assert!(!result.passed());
        assert!(result.error.is_some());
        assert_eq!(result.operations_processed, 0);
    }

    #[test]
    #[ignore] // Long running test
    fn test_simulator_stress() {
        let config = SimulatorConfig::new(99999).with_order(4);
        let result = Simulator::new(config).run(100_000);
        assert!(result.passed());
    }
}

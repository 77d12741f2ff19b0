//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the database with:
//! - Controlled time (no real system time)
//! - Reproducible random workloads
//! - A model of the expected contents, compared after each operation
//! - Tree invariant and snapshot round-trip checks
//!
//! # Design Principles
//!
//! 1. All randomness is seeded for reproducibility
//! 2. Time is controlled, not real
//! 3. Given the same seed, execution is identical
//!
//! # Usage
//!
//! ```
//! use store::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_order(4);
//! let mut sim = Simulator::new(config);
//! let result = sim.run(1000);
//!
//! assert!(result.invariant_violations.is_empty());
//! ```

mod invariants;
mod simulator;
mod time;
mod workload;

pub use invariants::{Expected, ExpectedState, InvariantChecker, Violation};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use time::SimulatedTimeSource;
pub use workload::{Operation, WorkloadConfig, WorkloadGenerator};

#![cfg_attr(test, allow(clippy::disallowed_methods))]
// B-tree indexed key/value record store.
//
// Components:
//  - storage: B-tree index, record store, snapshots, database orchestrator
//  - command: line-oriented command surface used by the binary
//  - config: environment-based configuration
//  - simulation: seeded workloads checked against a model

pub mod command;
pub mod config;
pub mod simulation;
pub mod storage;

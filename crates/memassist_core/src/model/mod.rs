//! Domain records for people, reminder tasks, memory logs and face vectors.
//!
//! # Responsibility
//! - Define canonical data structures used by repositories and services.
//! - Own input validation/normalization rules so they can be tested directly.
//!
//! # Invariants
//! - Relational records are identified by SQLite row ids.
//! - Face vectors are keyed by person name, not by row id.

pub mod face;
pub mod memory;
pub mod person;
pub mod task;
